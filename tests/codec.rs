use assert_matches::assert_matches;

use pdb_sync::codec::{decode_filename, download_url, encode_filename, encode_filename_with};
use pdb_sync::domain::{EntryId, IdFamily};
use pdb_sync::error::SyncError;

#[test]
fn ids_survive_a_trip_through_file_names() {
    for raw in ["1ABC", "9xyz", "hs01", "AF_AFQ8WZ42F166", "AF_AFA0A3P7E792F1"] {
        let id: EntryId = raw.parse().unwrap();
        assert_eq!(decode_filename(&encode_filename(&id)).unwrap(), id);
        assert_eq!(decode_filename(&encode_filename_with(&id, true)).unwrap(), id);
    }
}

#[test]
fn alphafold_model_file_name() {
    let id: EntryId = "AF_AFQ8WZ42F166".parse().unwrap();
    assert_eq!(id.family(), IdFamily::AlphaFold);
    assert_eq!(encode_filename(&id), "AF-Q8WZ42-F166-model_v4.pdb");
}

#[test]
fn url_and_file_name_agree() {
    for raw in ["1ABC", "AF_AFQ8WZ42F166"] {
        let id: EntryId = raw.parse().unwrap();
        for compressed in [true, false] {
            let url = download_url(&id, compressed);
            assert!(url.ends_with(&format!("/{}", encode_filename_with(&id, compressed))));
        }
    }
}

#[test]
fn malformed_names_are_format_errors() {
    assert_matches!(
        decode_filename("AF-Q8WZ42-model_v4.pdb"),
        Err(SyncError::InvalidFilename(_))
    );
    assert_matches!(
        "AFQ8WZ42F166".parse::<EntryId>(),
        Err(SyncError::InvalidEntryId(_))
    );
}
