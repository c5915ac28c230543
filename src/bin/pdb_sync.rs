use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use signal_hook::consts::SIGINT;
use tracing_subscriber::EnvFilter;

use pdb_sync::app::{App, ProgressSink, SyncOptions};
use pdb_sync::clock::SystemClock;
use pdb_sync::config;
use pdb_sync::error::SyncError;
use pdb_sync::fetch::{CancelToken, FetchOptions};
use pdb_sync::output::{self, JsonOutput, OutputMode, TextOutput};
use pdb_sync::query::{self, ContentType, QuerySpec};
use pdb_sync::rcsb::RcsbHttpClient;
use pdb_sync::store::ProjectLayout;

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "pdb-sync")]
#[command(about = "Keep a local tree of PDB files in sync with saved RCSB search queries")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Never prompt; print JSON instead of tables.")]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download missing records and mark obsolete ones")]
    Sync(SyncArgs),
    #[command(about = "Show what a sync would do")]
    Status(ProjectArgs),
    #[command(about = "Print an advanced search query as JSON")]
    Query(QueryArgs),
    #[command(about = "Write gene-name queries to <output>/<name>/<type>/queries/")]
    Genes(GenesArgs),
}

#[derive(Args)]
struct ProjectArgs {
    project: Utf8PathBuf,
}

#[derive(Args)]
struct SyncArgs {
    project: Utf8PathBuf,

    #[arg(short = 'j', long, help = "Parallel downloads (default: $PDB_SYNC_JOBS or 1)")]
    jobs: Option<usize>,

    #[arg(short = 'y', long, help = "Do not ask for confirmation")]
    yes: bool,

    #[arg(long, help = "Only report what would be done")]
    noop: bool,

    #[arg(long, help = "Store standard entries as plain .pdb instead of .pdb.gz")]
    no_compressed: bool,

    #[arg(long, help = "Keep only the title section of each downloaded file")]
    header_only: bool,

    #[arg(long, help = "Leave files the remote no longer lists untouched")]
    keep_obsolete: bool,

    #[arg(long, help = "Skip writing data/<query>__files.json")]
    no_manifest: bool,
}

#[derive(Args)]
struct QueryArgs {
    #[arg(short = 'o', long, help = "Organism (taxon name)")]
    organism: Option<String>,

    #[arg(short = 'm', long = "method", help = "Experimental methods, or AlphaFoldDB")]
    methods: Vec<String>,

    #[arg(short = 'p', long)]
    polymer_type: Option<String>,

    #[arg(long, help = "Include computed structure models")]
    csm: bool,

    #[arg(long, requires = "csm", help = "Exclude experimental structures (requires --csm)")]
    no_experimental: bool,

    #[arg(long, default_value_t = query::DEFAULT_ROWS)]
    rows: u64,
}

#[derive(Args)]
struct GenesArgs {
    #[arg(help = "Name of the directory that groups the generated queries")]
    name: String,

    #[arg(required = true)]
    genes: Vec<String>,

    #[arg(long, default_value = "templates")]
    output: Utf8PathBuf,

    #[arg(long, value_enum, num_args = 1.., default_values_t = [ContentType::Experimental])]
    types: Vec<ContentType>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<SyncError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::ProjectInit(_) | SyncError::ConfigRead(_) | SyncError::ConfigParse(_) => 2,
        error if error.is_transport() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Sync(args) => run_sync(args, output_mode),
        Commands::Status(args) => run_status(args, output_mode),
        Commands::Query(args) => run_query(args),
        Commands::Genes(args) => run_genes(args),
    }
}

fn open_app(
    project: Utf8PathBuf,
) -> miette::Result<App<RcsbHttpClient, RcsbHttpClient, SystemClock>> {
    let client = RcsbHttpClient::new()?;
    let app = App::open(ProjectLayout::new(project), client.clone(), client, SystemClock)?;
    Ok(app)
}

fn sink_for(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &TextOutput,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn run_status(args: ProjectArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let app = open_app(args.project)?;
    let status = app.status(sink_for(output_mode))?;
    match output_mode {
        OutputMode::Interactive => output::print_status(&status),
        OutputMode::NonInteractive => JsonOutput::print_status(&status).into_diagnostic()?,
    }
    Ok(ExitCode::SUCCESS)
}

fn run_sync(args: SyncArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let app = open_app(args.project)?;
    let sink = sink_for(output_mode);
    let status = app.status(sink)?;
    if matches!(output_mode, OutputMode::Interactive) {
        output::print_status(&status);
    }

    if args.noop || !status.has_work() {
        if matches!(output_mode, OutputMode::NonInteractive) {
            JsonOutput::print_status(&status).into_diagnostic()?;
        }
        return Ok(ExitCode::SUCCESS);
    }
    let confirmed = match output_mode {
        _ if args.yes => true,
        OutputMode::Interactive => confirm("Proceed with the sync?").into_diagnostic()?,
        OutputMode::NonInteractive => false,
    };
    if !confirmed {
        eprintln!("sync not confirmed; pass --yes to proceed without a prompt");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancelToken::new();
    // A second Ctrl-C exits immediately; the first one stops after the current chunk.
    signal_hook::flag::register_conditional_shutdown(SIGINT, 1, cancel.flag())
        .into_diagnostic()?;
    signal_hook::flag::register(SIGINT, cancel.flag()).into_diagnostic()?;

    let options = SyncOptions {
        fetch: FetchOptions {
            compressed: !args.no_compressed,
            parallelism: args.jobs.unwrap_or_else(config::default_jobs),
            header_only: args.header_only,
        },
        mark_obsolete: !args.keep_obsolete,
        write_manifest: !args.no_manifest,
    };
    let report = app.sync(&status, &options, sink, &cancel)?;
    match output_mode {
        OutputMode::Interactive => {
            output::print_sync_summary(&report);
            println!("Project summary: {}", app.layout().readme_path());
        }
        OutputMode::NonInteractive => JsonOutput::print_sync(&report).into_diagnostic()?,
    }

    if report.interrupted {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_query(args: QueryArgs) -> miette::Result<ExitCode> {
    let mut content_types = vec![ContentType::Experimental];
    if args.csm {
        content_types.push(ContentType::Computational);
    }
    if args.no_experimental {
        content_types = vec![ContentType::Computational];
    }
    let spec = QuerySpec {
        polymer_type: args.polymer_type,
        organism: args.organism,
        methods: args.methods,
        content_types,
        rows: args.rows,
    };
    let document = query::advanced_query(&spec)?;
    JsonOutput::print_value(&document).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_genes(args: GenesArgs) -> miette::Result<ExitCode> {
    let written = query::write_gene_queries(&args.output, &args.name, &args.genes, &args.types)?;
    for path in written {
        println!("{path}");
    }
    Ok(ExitCode::SUCCESS)
}

fn confirm(prompt: &str) -> io::Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{prompt} [y/N] ")?;
    stdout.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}
