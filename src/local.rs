use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use tracing::warn;

use crate::codec;
use crate::domain::EntryId;
use crate::error::SyncError;

pub type LocalScan = BTreeMap<EntryId, u64>;

pub fn scan(dir: &Utf8Path) -> Result<LocalScan, SyncError> {
    let mut files = LocalScan::new();
    if !dir.as_std_path().is_dir() {
        return Ok(files);
    }

    for entry in
        fs::read_dir(dir.as_std_path()).map_err(|err| SyncError::Filesystem(err.to_string()))?
    {
        let entry = entry.map_err(|err| SyncError::Filesystem(err.to_string()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            warn!(name = ?file_name, "skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with('.') {
            let path = dir.join(name);
            warn!("ignoring hidden file {path}; remove it with: rm \"{path}\"");
            continue;
        }
        if !codec::is_record_file(name) {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        if !metadata.is_file() {
            continue;
        }
        files.insert(codec::decode_filename(name)?, metadata.len());
    }
    Ok(files)
}
