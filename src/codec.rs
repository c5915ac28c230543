use crate::domain::{ALPHAFOLD_ID_PREFIX, EntryId, IdFamily};
use crate::error::SyncError;

pub const RECORD_EXT: &str = ".pdb";
pub const COMPRESSED_EXT: &str = ".pdb.gz";
pub const ALPHAFOLD_FILE_PREFIX: &str = "AF-";
pub const ALPHAFOLD_SCHEMA_TAG: &str = "model_v4";

const RCSB_DOWNLOAD_BASE: &str = "https://files.rcsb.org/download";
const ALPHAFOLD_DOWNLOAD_BASE: &str = "https://alphafold.ebi.ac.uk/files";

pub fn encode_filename(id: &EntryId) -> String {
    match id.alphafold_parts() {
        Some((accession, fragment)) => format!(
            "{ALPHAFOLD_FILE_PREFIX}{accession}-{fragment}-{ALPHAFOLD_SCHEMA_TAG}{RECORD_EXT}"
        ),
        None => format!("{}{RECORD_EXT}", id.as_str()),
    }
}

pub fn encode_filename_with(id: &EntryId, compressed: bool) -> String {
    let name = encode_filename(id);
    if compressed && id.family() == IdFamily::Standard {
        format!("{name}.gz")
    } else {
        name
    }
}

pub fn is_record_file(name: &str) -> bool {
    name.ends_with(RECORD_EXT) || name.ends_with(COMPRESSED_EXT)
}

pub fn decode_filename(name: &str) -> Result<EntryId, SyncError> {
    let stem = name
        .strip_suffix(COMPRESSED_EXT)
        .or_else(|| name.strip_suffix(RECORD_EXT))
        .ok_or_else(|| SyncError::InvalidFilename(name.to_string()))?;

    let Some(body) = stem.strip_prefix(ALPHAFOLD_FILE_PREFIX) else {
        return Ok(EntryId::from_file_stem(stem));
    };

    let invalid = || SyncError::InvalidFilename(name.to_string());
    let body = body
        .strip_suffix(ALPHAFOLD_SCHEMA_TAG)
        .and_then(|rest| rest.strip_suffix('-'))
        .ok_or_else(invalid)?;
    let (accession, fragment) = body.rsplit_once('-').ok_or_else(invalid)?;
    format!("{ALPHAFOLD_ID_PREFIX}{accession}{fragment}")
        .parse()
        .map_err(|_| invalid())
}

pub fn download_url(id: &EntryId, compressed: bool) -> String {
    match id.family() {
        IdFamily::AlphaFold => format!("{ALPHAFOLD_DOWNLOAD_BASE}/{}", encode_filename(id)),
        IdFamily::Standard => format!(
            "{RCSB_DOWNLOAD_BASE}/{}",
            encode_filename_with(id, compressed)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn id(value: &str) -> EntryId {
        value.parse().unwrap()
    }

    #[test]
    fn alphafold_filename() {
        let af = id("AF_AFQ8WZ42F166");
        assert_eq!(encode_filename(&af), "AF-Q8WZ42-F166-model_v4.pdb");
        assert_eq!(encode_filename_with(&af, true), "AF-Q8WZ42-F166-model_v4.pdb");
        assert_eq!(decode_filename("AF-Q8WZ42-F166-model_v4.pdb").unwrap(), af);
    }

    #[test]
    fn standard_filename() {
        let pdb = id("1ABC");
        assert_eq!(encode_filename(&pdb), "1ABC.pdb");
        assert_eq!(encode_filename_with(&pdb, true), "1ABC.pdb.gz");
        assert_eq!(decode_filename("1ABC.pdb.gz").unwrap(), pdb);
        assert_eq!(decode_filename("1ABC.pdb").unwrap(), pdb);
    }

    #[test]
    fn malformed_alphafold_names_fail() {
        assert_matches!(
            decode_filename("AF-Q8WZ42-F166-model_v3.pdb"),
            Err(SyncError::InvalidFilename(_))
        );
        assert_matches!(
            decode_filename("AF-Q8WZ42F166-model_v4.pdb"),
            Err(SyncError::InvalidFilename(_))
        );
        assert_matches!(decode_filename("1ABC.cif"), Err(SyncError::InvalidFilename(_)));
    }

    #[test]
    fn other_names_keep_their_stem() {
        assert_eq!(decode_filename("1abc_x.pdb").unwrap().as_str(), "1abc_x");
        assert_eq!(decode_filename("1abc-copy.pdb.gz").unwrap().as_str(), "1abc-copy");
        let stray = decode_filename("hs01 (1).pdb.gz").unwrap();
        assert_eq!(stray.family(), IdFamily::Standard);
        assert_eq!(encode_filename_with(&stray, true), "hs01 (1).pdb.gz");
    }

    #[test]
    fn urls_follow_filenames() {
        assert_eq!(
            download_url(&id("1abc"), true),
            "https://files.rcsb.org/download/1abc.pdb.gz"
        );
        assert_eq!(
            download_url(&id("1abc"), false),
            "https://files.rcsb.org/download/1abc.pdb"
        );
        assert_eq!(
            download_url(&id("AF_AFQ8WZ42F166"), true),
            "https://alphafold.ebi.ac.uk/files/AF-Q8WZ42-F166-model_v4.pdb"
        );
    }

    #[test]
    fn record_file_filter() {
        assert!(is_record_file("1abc.pdb"));
        assert!(is_record_file("1abc.pdb.gz"));
        assert!(!is_record_file("1abc.pdb.gz.obsolete"));
        assert!(!is_record_file("404.txt"));
    }
}
