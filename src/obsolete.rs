use std::fs;

use camino::Utf8Path;
use tracing::info;

use crate::codec;
use crate::domain::EntryId;
use crate::error::SyncError;
use crate::store::OBSOLETE_SUFFIX;

pub fn mark(dir: &Utf8Path, ids: &[EntryId]) -> Result<(), SyncError> {
    for id in ids {
        let plain = dir.join(codec::encode_filename(id));
        let compressed = dir.join(codec::encode_filename_with(id, true));
        let source = if plain.as_std_path().is_file() {
            plain
        } else if compressed.as_std_path().is_file() {
            compressed
        } else {
            return Err(SyncError::MissingLocalFile {
                dir: dir.to_string(),
                id: id.to_string(),
            });
        };
        let target = format!("{source}{OBSOLETE_SUFFIX}");
        fs::rename(source.as_std_path(), &target)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        info!("marked obsolete: {target}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    #[test]
    fn renames_plain_and_compressed() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(dir.join("hs01.pdb"), b"x").unwrap();
        fs::write(dir.join("hs02.pdb.gz"), b"x").unwrap();

        let ids: Vec<EntryId> = vec!["hs01".parse().unwrap(), "hs02".parse().unwrap()];
        mark(&dir, &ids).unwrap();

        assert!(dir.join("hs01.pdb.obsolete").as_std_path().is_file());
        assert!(dir.join("hs02.pdb.gz.obsolete").as_std_path().is_file());
        assert!(!dir.join("hs02.pdb.gz").as_std_path().exists());
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let ids: Vec<EntryId> = vec!["hs09".parse().unwrap()];
        assert_matches!(mark(&dir, &ids), Err(SyncError::MissingLocalFile { .. }));
    }
}
