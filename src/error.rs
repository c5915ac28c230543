use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("invalid entry id: {0}")]
    InvalidEntryId(String),

    #[error("not a record file name: {0}")]
    #[diagnostic(help("record files are named <id>.pdb, <id>.pdb.gz or AF-<acc>-F<n>-model_v4.pdb"))]
    InvalidFilename(String),

    #[error("invalid query document {path}: {message}")]
    InvalidQuery { path: PathBuf, message: String },

    #[error("cannot build query: {0}")]
    InvalidQueryRequest(String),

    #[error("local file for {id} is missing from {dir}")]
    #[diagnostic(help("the data directory changed between status and sync; run status again"))]
    MissingLocalFile { dir: String, id: String },

    #[error("not a project directory: {0}")]
    #[diagnostic(help("a project needs a queries/ directory or a project.yml file"))]
    ProjectInit(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse project config: {0}")]
    ConfigParse(String),

    #[error("RCSB request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("RCSB search request failed: {0}")]
    SearchHttp(String),

    #[error("RCSB search returned status {status}: {message}")]
    SearchStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SyncError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::RcsbHttp(_)
                | SyncError::RcsbStatus { .. }
                | SyncError::SearchHttp(_)
                | SyncError::SearchStatus { .. }
        )
    }
}
