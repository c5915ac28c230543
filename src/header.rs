use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use regex::Regex;
use serde::Serialize;

use crate::error::SyncError;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HEADER\s{3,}(.+?)(\d{2}-\w{3}-\d{2})\s(.+)").expect("valid HEADER regex")
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})-(\w{3})-(\d{2})").expect("valid date regex"));

const TITLE_SECTION: [&str; 15] = [
    "HEADER", "OBSLTE", "TITLE", "SPLIT", "CAVEAT", "COMPND", "SOURCE", "KEYWDS", "EXPDTA",
    "AUTHOR", "REVDAT", "SPRSDE", "JRNL", "REMARK", "DBREF",
];
const COORDINATE_SECTION: [&str; 4] = ["CRYST1", "MODEL", "ATOM", "HETATM"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Classification,
    Date,
    PdbId,
    Title,
    SourceOrganism,
    Method,
    Gene,
    Uniprot,
}

impl HeaderField {
    pub const ALL: [HeaderField; 8] = [
        HeaderField::Classification,
        HeaderField::Date,
        HeaderField::PdbId,
        HeaderField::Title,
        HeaderField::SourceOrganism,
        HeaderField::Method,
        HeaderField::Gene,
        HeaderField::Uniprot,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HeaderField::Classification => "Classification",
            HeaderField::Date => "Date",
            HeaderField::PdbId => "PDB ID",
            HeaderField::Title => "Title",
            HeaderField::SourceOrganism => "Source organism",
            HeaderField::Method => "Method",
            HeaderField::Gene => "Gene",
            HeaderField::Uniprot => "Uniprot",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdbHeader {
    pub classification: String,
    pub date: String,
    pub pdb_id: String,
    pub title: String,
    pub source_organism: Vec<String>,
    pub method: Vec<String>,
    pub gene: Vec<String>,
    pub uniprot: Vec<String>,
}

impl PdbHeader {
    pub fn get(&self, field: HeaderField) -> String {
        match field {
            HeaderField::Classification => self.classification.clone(),
            HeaderField::Date => self.date.clone(),
            HeaderField::PdbId => self.pdb_id.clone(),
            HeaderField::Title => self.title.clone(),
            HeaderField::SourceOrganism => self.source_organism.join(", "),
            HeaderField::Method => self.method.join(", "),
            HeaderField::Gene => self.gene.join(", "),
            HeaderField::Uniprot => self.uniprot.join(", "),
        }
    }
}

pub fn is_title_section(line: &str) -> bool {
    TITLE_SECTION.iter().any(|tag| line.starts_with(tag))
}

pub fn parse<I, S>(lines: I) -> PdbHeader
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut header = PdbHeader::default();
    let mut title = Vec::new();
    for line in lines {
        let line = line.as_ref();
        if line.starts_with("HEADER") {
            parse_header_line(line, &mut header);
        } else if line.starts_with("TITLE") {
            title.push(column(line, 10).trim().to_string());
        } else if line.contains("SOURCE") && line.contains("ORGANISM_SCIENTIFIC") {
            header
                .source_organism
                .push(column(line, 32).trim_end().trim_end_matches(';').to_string());
        } else if column(line, 11).starts_with("GENE: ") {
            header
                .gene
                .push(column(line, 17).trim().trim_end_matches(';').to_string());
        } else if line.starts_with("EXPDTA") {
            header.method.push(column(line, 7).trim().to_string());
        } else if line.starts_with("DBREF") && line.contains("UNP ") {
            let end = line.len().min(42);
            header
                .uniprot
                .push(line.get(32..end).unwrap_or_default().trim().to_string());
        }
    }
    header.title = title.join(" ");
    header
}

pub fn read_header(path: &Utf8Path) -> Result<PdbHeader, SyncError> {
    let file =
        File::open(path.as_std_path()).map_err(|err| SyncError::Filesystem(err.to_string()))?;
    let reader: Box<dyn Read> = if path.as_str().ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut lines = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line.map_err(|err| SyncError::Filesystem(format!("{path}: {err}")))?;
        if COORDINATE_SECTION.iter().any(|tag| line.starts_with(tag)) {
            break;
        }
        lines.push(line);
    }
    Ok(parse(lines))
}

fn parse_header_line(line: &str, header: &mut PdbHeader) {
    if let Some(captures) = HEADER_RE.captures(line) {
        header.classification = captures[1].trim().to_string();
        header.date = sortable_date(captures[2].trim());
        header.pdb_id = captures[3].trim().to_string();
    } else if let Some(found) = DATE_RE.find(line) {
        header.date = sortable_date(found.as_str());
    }
}

fn sortable_date(value: &str) -> String {
    let Some(captures) = DATE_RE.captures(value) else {
        return value.to_string();
    };
    let month = match &captures[2] {
        "JAN" => "01",
        "FEB" => "02",
        "MAR" => "03",
        "APR" => "04",
        "MAY" => "05",
        "JUN" => "06",
        "JUL" => "07",
        "AUG" => "08",
        "SEP" => "09",
        "OCT" => "10",
        "NOV" => "11",
        "DEC" => "12",
        _ => return value.to_string(),
    };
    let year = &captures[3];
    let century = if year < "50" { "20" } else { "19" };
    format!("{century}{year}-{month}-{}", &captures[1])
}

fn column(line: &str, start: usize) -> &str {
    line.get(start..).unwrap_or_default()
}
