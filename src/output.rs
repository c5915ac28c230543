use std::fmt::Write as _;
use std::io::{self, Write};

use crossterm::style::Stylize;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, SyncReport};
use crate::reconcile::ProjectStatus;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_status(status: &ProjectStatus) -> io::Result<()> {
        Self::print_json(status)
    }

    pub fn print_sync(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_value(value: &serde_json::Value) -> io::Result<()> {
        Self::print_json(value)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        println!("{}", event.message);
    }
}

pub fn status_table(status: &ProjectStatus) -> String {
    let width = status
        .iter()
        .map(|(name, _)| name.as_str().len())
        .max()
        .unwrap_or(0)
        .max(5);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  {:>9}",
        "Query", "Remote", "Local", "Fetch", "Obsolete", "Not found"
    );
    for (name, dir) in status.iter() {
        let _ = writeln!(
            out,
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  {:>9}",
            name.as_str(),
            dir.n_remote,
            dir.n_local,
            dir.to_fetch.len(),
            dir.to_remove.len(),
            dir.zero_size.len()
        );
    }
    let totals = status.totals();
    let _ = writeln!(
        out,
        "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  {:>9}",
        "Total", totals.n_remote, totals.n_local, totals.to_fetch, totals.to_remove, totals.zero_size
    );
    out
}

pub fn print_status(status: &ProjectStatus) {
    print!("{}", status_table(status));
    for (name, dir) in status.iter() {
        if !dir.to_remove.is_empty() {
            let ids: Vec<&str> = dir.to_remove.iter().map(|id| id.as_str()).collect();
            println!(
                "{}",
                format!("{name}: obsolete {}", ids.join(", ")).yellow()
            );
        }
    }
    if !status.has_work() {
        println!("{}", "Everything is up to date.".green());
    }
}

pub fn print_sync_summary(report: &SyncReport) {
    println!("{}", "pdb-sync summary".cyan());
    for (name, fetch) in &report.fetches {
        println!(
            "{}",
            format!(
                "{name}: {} downloaded, {} not found, {:.2} MB",
                fetch.fetched,
                fetch.not_found,
                fetch.bytes as f64 / 1e6
            )
            .green()
        );
    }
    if report.marked_obsolete > 0 {
        println!(
            "{}",
            format!("{} files marked obsolete", report.marked_obsolete).yellow()
        );
    }
    if report.interrupted {
        println!(
            "{}",
            "Interrupted: completed downloads were kept, run sync again to resume.".red()
        );
    }
    print!("{}", status_table(&report.status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalScan;
    use crate::reconcile::diff;

    #[test]
    fn table_has_totals_row() {
        let mut status = ProjectStatus::default();
        let remote = vec!["hs01".parse().unwrap(), "hs02".parse().unwrap()];
        status.insert("Homo_sapiens".parse().unwrap(), diff(&remote, &LocalScan::new()));
        let table = status_table(&status);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Homo_sapiens"));
        assert!(lines[2].starts_with("Total"));
        assert!(lines[2].contains("  2  "));
    }
}
