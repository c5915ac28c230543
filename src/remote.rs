use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;
use serde_json::Value;
use tracing::info;

use crate::clock::Clock;
use crate::domain::{EntryId, QueryName};
use crate::error::SyncError;
use crate::rcsb::SearchClient;
use crate::store::{self, ProjectLayout};

#[derive(Debug, Clone)]
pub struct NamedQuery {
    pub name: QueryName,
    pub document: Value,
}

impl NamedQuery {
    pub fn load(path: &Utf8Path) -> Result<Self, SyncError> {
        let stem = path.file_stem().ok_or_else(|| SyncError::InvalidQuery {
            path: path.as_std_path().to_path_buf(),
            message: "missing file name".to_string(),
        })?;
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        let document = serde_json::from_str(&content).map_err(|err| SyncError::InvalidQuery {
            path: path.as_std_path().to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self {
            name: stem.parse()?,
            document,
        })
    }
}

pub struct RemoteIndex<S: SearchClient, C: Clock> {
    layout: ProjectLayout,
    search: S,
    clock: C,
}

impl<S: SearchClient, C: Clock> RemoteIndex<S, C> {
    pub fn new(layout: ProjectLayout, search: S, clock: C) -> Self {
        Self {
            layout,
            search,
            clock,
        }
    }

    pub fn fetch_or_cache(&self, query: &NamedQuery) -> Result<Vec<EntryId>, SyncError> {
        let cache_file = self.layout.cache_file(&query.name, self.clock.today());
        if cache_file.as_std_path().is_file() {
            info!(query = %query.name, path = %cache_file, "using cached remote ids");
            return load_ids(&cache_file);
        }

        let previous = self.layout.cached_dates(&query.name)?.pop();
        let ids = dedup(self.search.search(&query.document)?);
        info!(
            query = %query.name,
            count = ids.len(),
            previous = ?previous,
            "fetched remote ids"
        );
        store::write_bytes_atomic(&cache_file, render_ids(&ids).as_bytes())?;
        Ok(ids)
    }
}

fn dedup(ids: Vec<EntryId>) -> Vec<EntryId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

pub fn render_ids(ids: &[EntryId]) -> String {
    let mut out = String::with_capacity(ids.len() * 5);
    for id in ids {
        out.push_str(id.as_str());
        out.push('\n');
    }
    out
}

pub fn load_ids(path: &Utf8Path) -> Result<Vec<EntryId>, SyncError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use camino::Utf8PathBuf;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSearch {
        calls: Mutex<usize>,
    }

    impl SearchClient for CountingSearch {
        fn search(&self, _query: &Value) -> Result<Vec<EntryId>, SyncError> {
            *self.calls.lock().unwrap() += 1;
            Ok(["hs01", "hs02", "hs01", "hs03"]
                .iter()
                .map(|id| id.parse().unwrap())
                .collect())
        }
    }

    #[test]
    fn caches_deduplicated_ids_once_per_day() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let layout = ProjectLayout::new(root);
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        let search = CountingSearch::default();
        let index = RemoteIndex::new(layout.clone(), &search, FixedClock(date));
        let query = NamedQuery {
            name: "Homo_sapiens".parse().unwrap(),
            document: json!({}),
        };

        let first = index.fetch_or_cache(&query).unwrap();
        let second = index.fetch_or_cache(&query).unwrap();

        let names: Vec<&str> = first.iter().map(EntryId::as_str).collect();
        assert_eq!(names, ["hs01", "hs02", "hs03"]);
        assert_eq!(first, second);
        assert_eq!(*search.calls.lock().unwrap(), 1);
        let cached = fs::read_to_string(layout.cache_file(&query.name, date).as_std_path()).unwrap();
        assert_eq!(cached, "hs01\nhs02\nhs03\n");
    }
}
