use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const ALPHAFOLD_ID_PREFIX: &str = "AF_AF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdFamily {
    Standard,
    AlphaFold,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    // Stray local names like `hs01 (1)` are kept as is.
    pub(crate) fn from_file_stem(stem: &str) -> Self {
        Self(stem.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn family(&self) -> IdFamily {
        if self.0.starts_with(ALPHAFOLD_ID_PREFIX) {
            IdFamily::AlphaFold
        } else {
            IdFamily::Standard
        }
    }

    pub fn alphafold_parts(&self) -> Option<(&str, &str)> {
        let body = self.0.strip_prefix(ALPHAFOLD_ID_PREFIX)?;
        let split = body.rfind('F')?;
        Some((&body[..split], &body[split..]))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.starts_with("AF") {
            return parse_alphafold(value);
        }
        let is_valid = value.len() >= 4 && value.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(SyncError::InvalidEntryId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

fn parse_alphafold(value: &str) -> Result<EntryId, SyncError> {
    let invalid = || SyncError::InvalidEntryId(value.to_string());
    let body = value.strip_prefix(ALPHAFOLD_ID_PREFIX).ok_or_else(invalid)?;
    let split = body.rfind('F').ok_or_else(invalid)?;
    let (accession, fragment) = body.split_at(split);
    let digits = &fragment[1..];
    let is_valid = !accession.is_empty()
        && accession.chars().all(|ch| ch.is_ascii_alphanumeric())
        && !digits.is_empty()
        && digits.chars().all(|ch| ch.is_ascii_digit());
    if !is_valid {
        return Err(invalid());
    }
    Ok(EntryId(value.to_string()))
}

impl TryFrom<String> for EntryId {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntryId> for String {
    fn from(value: EntryId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryName(String);

impl QueryName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueryName {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace(' ', "_");
        let is_valid = !normalized.is_empty()
            && !normalized.starts_with('.')
            && !normalized.contains(['/', '\\']);
        if !is_valid {
            return Err(SyncError::InvalidQuery {
                path: value.into(),
                message: "query name must be a plain file stem".to_string(),
            });
        }
        Ok(Self(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn entry_id_keeps_case() {
        let id: EntryId = "1abc".parse().unwrap();
        assert_eq!(id.as_str(), "1abc");
        assert_eq!(id.family(), IdFamily::Standard);
    }

    #[test]
    fn entry_id_rejects_short_and_punctuated() {
        assert_matches!("1ab".parse::<EntryId>(), Err(SyncError::InvalidEntryId(_)));
        assert_matches!("1ab-".parse::<EntryId>(), Err(SyncError::InvalidEntryId(_)));
        assert_matches!("".parse::<EntryId>(), Err(SyncError::InvalidEntryId(_)));
    }

    #[test]
    fn alphafold_split_uses_last_f() {
        let id: EntryId = "AF_AFQ8WZ42F166".parse().unwrap();
        assert_eq!(id.family(), IdFamily::AlphaFold);
        assert_eq!(id.alphafold_parts(), Some(("Q8WZ42", "F166")));

        let id: EntryId = "AF_AFP0F123F1".parse().unwrap();
        assert_eq!(id.alphafold_parts(), Some(("P0F123", "F1")));
    }

    #[test]
    fn af_prefix_without_alphafold_marker_is_rejected() {
        assert_matches!("AFQ8WZ42F1".parse::<EntryId>(), Err(SyncError::InvalidEntryId(_)));
        assert_matches!("AF_AFQ8WZ42".parse::<EntryId>(), Err(SyncError::InvalidEntryId(_)));
        assert_matches!("AF_AFQ8WZ42Fx".parse::<EntryId>(), Err(SyncError::InvalidEntryId(_)));
    }

    #[test]
    fn query_name_normalizes_spaces() {
        let name: QueryName = "Homo sapiens".parse().unwrap();
        assert_eq!(name.as_str(), "Homo_sapiens");
        assert!("../x".parse::<QueryName>().is_err());
    }
}
