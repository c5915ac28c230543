use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::domain::{EntryId, QueryName};
use crate::local::LocalScan;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DirStatus {
    pub n_local: usize,
    pub n_remote: usize,
    // remote order
    pub to_fetch: Vec<EntryId>,
    pub to_remove: Vec<EntryId>,
    // earlier not-found records
    pub zero_size: Vec<EntryId>,
}

impl DirStatus {
    pub fn n_present(&self) -> usize {
        self.n_local - self.to_remove.len()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.to_fetch.is_empty() && self.to_remove.is_empty()
    }
}

pub fn diff(remote: &[EntryId], local: &LocalScan) -> DirStatus {
    let remote_set: HashSet<&EntryId> = remote.iter().collect();
    let to_fetch = remote
        .iter()
        .filter(|id| !local.contains_key(*id))
        .cloned()
        .collect();
    // LocalScan iterates in key order, so both lists come out sorted.
    let to_remove = local
        .keys()
        .filter(|id| !remote_set.contains(id))
        .cloned()
        .collect();
    let zero_size = local
        .iter()
        .filter(|(_, size)| **size == 0)
        .map(|(id, _)| id.clone())
        .collect();

    DirStatus {
        n_local: local.len(),
        n_remote: remote.len(),
        to_fetch,
        to_remove,
        zero_size,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusTotals {
    pub n_local: usize,
    pub n_present: usize,
    pub n_remote: usize,
    pub to_fetch: usize,
    pub to_remove: usize,
    pub zero_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ProjectStatus {
    pub queries: BTreeMap<QueryName, DirStatus>,
}

impl ProjectStatus {
    pub fn insert(&mut self, name: QueryName, status: DirStatus) {
        self.queries.insert(name, status);
    }

    pub fn get(&self, name: &QueryName) -> Option<&DirStatus> {
        self.queries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueryName, &DirStatus)> {
        self.queries.iter()
    }

    pub fn totals(&self) -> StatusTotals {
        self.queries
            .values()
            .fold(StatusTotals::default(), |acc, status| StatusTotals {
                n_local: acc.n_local + status.n_local,
                n_present: acc.n_present + status.n_present(),
                n_remote: acc.n_remote + status.n_remote,
                to_fetch: acc.to_fetch + status.to_fetch.len(),
                to_remove: acc.to_remove + status.to_remove.len(),
                zero_size: acc.zero_size + status.zero_size.len(),
            })
    }

    pub fn has_work(&self) -> bool {
        self.queries.values().any(|status| !status.is_up_to_date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<EntryId> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    fn local(entries: &[(&str, u64)]) -> LocalScan {
        entries
            .iter()
            .map(|(id, size)| (id.parse().unwrap(), *size))
            .collect()
    }

    #[test]
    fn first_sync_fetches_everything() {
        let status = diff(&ids(&["hs03", "hs01", "hs02"]), &LocalScan::new());
        assert_eq!(status.to_fetch, ids(&["hs03", "hs01", "hs02"]));
        assert_eq!(status.n_local, 0);
        assert_eq!(status.n_remote, 3);
        assert!(status.to_remove.is_empty());
    }

    #[test]
    fn partitions_remote_and_local() {
        let remote = ids(&["hs01", "hs03", "hs04"]);
        let files = local(&[("hs02", 10), ("hs01", 0), ("hs00", 5)]);
        let status = diff(&remote, &files);

        assert_eq!(status.to_fetch, ids(&["hs03", "hs04"]));
        assert_eq!(status.to_remove, ids(&["hs00", "hs02"]));
        assert_eq!(status.zero_size, ids(&["hs01"]));
        assert_eq!(status.n_present(), 1);
        assert!(!status.is_up_to_date());
        for id in &status.to_fetch {
            assert!(!status.to_remove.contains(id));
        }
    }

    #[test]
    fn empty_remote_removes_all_local() {
        let status = diff(&[], &local(&[("rn01", 3)]));
        assert_eq!(status.n_remote, 0);
        assert!(status.to_fetch.is_empty());
        assert_eq!(status.to_remove, ids(&["rn01"]));
    }

    #[test]
    fn totals_sum_queries() {
        let mut project = ProjectStatus::default();
        project.insert("a".parse().unwrap(), diff(&ids(&["hs01"]), &LocalScan::new()));
        project.insert("b".parse().unwrap(), diff(&[], &local(&[("rn01", 0)])));
        let totals = project.totals();
        assert_eq!(totals.n_remote, 1);
        assert_eq!(totals.n_local, 1);
        assert_eq!(totals.n_present, 0);
        assert_eq!(totals.to_fetch, 1);
        assert_eq!(totals.to_remove, 1);
        assert_eq!(totals.zero_size, 1);
        assert!(project.has_work());
    }
}
