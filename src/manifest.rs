use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;

use serde::Serialize;
use tracing::warn;

use crate::codec;
use crate::domain::{EntryId, QueryName};
use crate::error::SyncError;
use crate::header::{self, HeaderField, PdbHeader};
use crate::local;
use crate::reconcile::{ProjectStatus, StatusTotals};
use crate::remote::render_ids;
use crate::store::{self, ProjectLayout};

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub file_name: String,
    pub id: EntryId,
    pub size: u64,
    pub header: Option<BTreeMap<&'static str, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub name: QueryName,
    pub n_remote: usize,
    pub n_local: usize,
    pub n_present: usize,
    pub to_fetch: usize,
    pub to_remove: usize,
    pub zero_size: usize,
    pub ids_cached_on: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub generated_at: String,
    pub queries: Vec<QuerySummary>,
    pub totals: StatusTotals,
}

impl ProjectSummary {
    pub fn from_status(layout: &ProjectLayout, status: &ProjectStatus) -> Result<Self, SyncError> {
        let mut queries = Vec::new();
        for (name, dir) in status.iter() {
            let ids_cached_on = layout
                .cached_dates(name)?
                .last()
                .map(|date| date.format("%Y-%m-%d").to_string());
            queries.push(QuerySummary {
                name: name.clone(),
                n_remote: dir.n_remote,
                n_local: dir.n_local,
                n_present: dir.n_present(),
                to_fetch: dir.to_fetch.len(),
                to_remove: dir.to_remove.len(),
                zero_size: dir.zero_size.len(),
                ids_cached_on,
            });
        }
        Ok(Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            queries,
            totals: status.totals(),
        })
    }
}

pub fn write_ids(layout: &ProjectLayout, name: &QueryName, ids: &[EntryId]) -> Result<(), SyncError> {
    store::write_bytes_atomic(&layout.ids_path(name), render_ids(ids).as_bytes())
}

pub fn write_script(
    layout: &ProjectLayout,
    name: &QueryName,
    ids: &[EntryId],
    compressed: bool,
) -> Result<(), SyncError> {
    let data_dir = layout.data_dir(name);
    let mut script = String::from("#!/bin/sh\n");
    for id in ids {
        let _ = writeln!(script, "wget {} -P {data_dir}", codec::download_url(id, compressed));
    }
    let path = layout.script_path(name);
    store::write_bytes_atomic(&path, script.as_bytes())?;
    make_executable(&path)
}

#[cfg(unix)]
fn make_executable(path: &camino::Utf8Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path.as_std_path(), fs::Permissions::from_mode(0o755))
        .map_err(|err| SyncError::Filesystem(err.to_string()))
}

#[cfg(not(unix))]
fn make_executable(_path: &camino::Utf8Path) -> Result<(), SyncError> {
    Ok(())
}

pub fn file_entries(layout: &ProjectLayout, name: &QueryName) -> Result<Vec<FileEntry>, SyncError> {
    let dir = layout.data_dir(name);
    let mut entries = Vec::new();
    for (id, size) in local::scan(&dir)? {
        if size == 0 {
            continue;
        }
        let plain = codec::encode_filename(&id);
        let file_name = if dir.join(&plain).as_std_path().is_file() {
            plain
        } else {
            codec::encode_filename_with(&id, true)
        };
        let header = match header::read_header(&dir.join(&file_name)) {
            Ok(header) => Some(header_columns(&header)),
            Err(err) => {
                warn!("cannot read header of {file_name}: {err}");
                None
            }
        };
        entries.push(FileEntry {
            file_name,
            id,
            size,
            header,
        });
    }
    Ok(entries)
}

fn header_columns(header: &PdbHeader) -> BTreeMap<&'static str, String> {
    HeaderField::ALL
        .into_iter()
        .map(|field| (field.label(), header.get(field)))
        .collect()
}

pub fn write_file_manifest(layout: &ProjectLayout, name: &QueryName) -> Result<usize, SyncError> {
    let entries = file_entries(layout, name)?;
    let content = serde_json::to_vec_pretty(&entries)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    store::write_bytes_atomic(&layout.manifest_path(name), &content)?;
    Ok(entries.len())
}

pub fn write_summary(layout: &ProjectLayout, status: &ProjectStatus) -> Result<(), SyncError> {
    let summary = ProjectSummary::from_status(layout, status)?;
    let content = serde_json::to_vec_pretty(&summary)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    store::write_bytes_atomic(&layout.summary_path(), &content)?;
    store::write_bytes_atomic(&layout.readme_path(), render_readme(layout, &summary).as_bytes())
}

fn render_readme(layout: &ProjectLayout, summary: &ProjectSummary) -> String {
    let title = layout.root().file_name().unwrap_or("project");
    let mut out = String::new();
    let _ = writeln!(out, "# {title}\n");
    let _ = writeln!(out, "Last sync: {}\n", summary.generated_at);
    let _ = writeln!(
        out,
        "| Query | Remote | Local | Present | To fetch | Obsolete | Not found | Ids cached on |"
    );
    let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---:|---|");
    for row in &summary.queries {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            row.name,
            row.n_remote,
            row.n_local,
            row.n_present,
            row.to_fetch,
            row.to_remove,
            row.zero_size,
            row.ids_cached_on.as_deref().unwrap_or("-")
        );
    }
    let totals = &summary.totals;
    let _ = writeln!(
        out,
        "| **Total** | {} | {} | {} | {} | {} | {} | |",
        totals.n_remote,
        totals.n_local,
        totals.n_present,
        totals.to_fetch,
        totals.to_remove,
        totals.zero_size
    );
    let _ = writeln!(out, "\nHeader fields in `data/<query>__files.json`:");
    for field in HeaderField::ALL {
        let _ = writeln!(out, "- {}", field.label());
    }
    out
}
