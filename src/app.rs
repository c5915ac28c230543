use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::config::ConfigLoader;
use crate::domain::QueryName;
use crate::error::SyncError;
use crate::fetch::{CancelToken, FetchOptions, FetchOrchestrator, FetchReport};
use crate::local;
use crate::manifest;
use crate::obsolete;
use crate::rcsb::{RecordFetcher, SearchClient};
use crate::reconcile::{self, ProjectStatus};
use crate::remote::{self, NamedQuery, RemoteIndex};
use crate::store::{self, ProjectLayout};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub fetch: FetchOptions,
    pub mark_obsolete: bool,
    pub write_manifest: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            mark_obsolete: true,
            write_manifest: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub fetches: BTreeMap<QueryName, FetchReport>,
    pub marked_obsolete: usize,
    pub interrupted: bool,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

pub struct App<S: SearchClient, F: RecordFetcher, C: Clock> {
    layout: ProjectLayout,
    remote: RemoteIndex<S, C>,
    orchestrator: FetchOrchestrator<F>,
}

impl<S: SearchClient, F: RecordFetcher, C: Clock> std::fmt::Debug for App<S, F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl<S: SearchClient, F: RecordFetcher, C: Clock> App<S, F, C> {
    pub fn open(layout: ProjectLayout, search: S, fetcher: F, clock: C) -> Result<Self, SyncError> {
        if !layout.is_project() {
            return Err(SyncError::ProjectInit(layout.root().as_std_path().to_path_buf()));
        }
        let config_path = layout.config_path();
        if config_path.as_std_path().is_file() {
            let config = ConfigLoader::load(&config_path)?;
            let written = config.write_queries(&layout)?;
            info!(count = written.len(), "generated queries from {config_path}");
        }
        store::ensure_dir(&layout.data_root())?;
        Ok(Self {
            remote: RemoteIndex::new(layout.clone(), search, clock),
            orchestrator: FetchOrchestrator::new(fetcher),
            layout,
        })
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn queries(&self) -> Result<Vec<NamedQuery>, SyncError> {
        let dir = self.layout.queries_dir();
        if !dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let mut queries = Vec::new();
        for entry in
            fs::read_dir(dir.as_std_path()).map_err(|err| SyncError::Filesystem(err.to_string()))?
        {
            let entry = entry.map_err(|err| SyncError::Filesystem(err.to_string()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            queries.push(NamedQuery::load(&dir.join(name))?);
        }
        queries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(queries)
    }

    pub fn status(&self, sink: &dyn ProgressSink) -> Result<ProjectStatus, SyncError> {
        let mut status = ProjectStatus::default();
        for query in self.queries()? {
            phase(sink, format!("phase=Status; query={}", query.name));
            let remote_ids = self.remote.fetch_or_cache(&query)?;
            manifest::write_ids(&self.layout, &query.name, &remote_ids)?;
            let local_files = local::scan(&self.layout.data_dir(&query.name))?;
            status.insert(query.name, reconcile::diff(&remote_ids, &local_files));
        }
        Ok(status)
    }

    pub fn rescan<'a>(
        &self,
        names: impl IntoIterator<Item = &'a QueryName>,
    ) -> Result<ProjectStatus, SyncError> {
        let mut status = ProjectStatus::default();
        for name in names {
            let remote_ids = remote::load_ids(&self.layout.ids_path(name))?;
            let local_files = local::scan(&self.layout.data_dir(name))?;
            status.insert(name.clone(), reconcile::diff(&remote_ids, &local_files));
        }
        Ok(status)
    }

    pub fn sync(
        &self,
        status: &ProjectStatus,
        options: &SyncOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        let mut fetches = BTreeMap::new();
        let mut marked_obsolete = 0;
        let mut interrupted = false;

        for (name, dir_status) in status.iter() {
            let data_dir = self.layout.data_dir(name);
            if options.mark_obsolete && !dir_status.to_remove.is_empty() {
                phase(
                    sink,
                    format!(
                        "phase=Obsolete; query={name}; marking {} files",
                        dir_status.to_remove.len()
                    ),
                );
                obsolete::mark(&data_dir, &dir_status.to_remove)?;
                marked_obsolete += dir_status.to_remove.len();
            }

            let remote_ids = remote::load_ids(&self.layout.ids_path(name))?;
            manifest::write_script(&self.layout, name, &remote_ids, options.fetch.compressed)?;

            if dir_status.to_fetch.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            phase(
                sink,
                format!(
                    "phase=Fetch; query={name}; {} files to download",
                    dir_status.to_fetch.len()
                ),
            );
            let report = self.orchestrator.run(
                &dir_status.to_fetch,
                &data_dir,
                &options.fetch,
                sink,
                cancel,
            )?;
            let stop = report.interrupted;
            fetches.insert(name.clone(), report);
            if stop {
                interrupted = true;
                break;
            }
        }

        phase(sink, "phase=Verify; rescanning data directories".to_string());
        let after = self.rescan(status.iter().map(|(name, _)| name))?;
        if options.write_manifest {
            for (name, _) in after.iter() {
                let count = manifest::write_file_manifest(&self.layout, name)?;
                info!(query = %name, files = count, "wrote file manifest");
            }
        }
        manifest::write_summary(&self.layout, &after)?;

        Ok(SyncReport {
            fetches,
            marked_obsolete,
            interrupted,
            status: after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::EntryId;
    use crate::output::JsonOutput;
    use crate::rcsb::FetchOutcome;
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;
    use chrono::NaiveDate;
    use serde_json::Value;

    struct FixedSearch;

    impl SearchClient for FixedSearch {
        fn search(&self, _query: &Value) -> Result<Vec<EntryId>, SyncError> {
            Ok(vec!["hs01".parse().unwrap()])
        }
    }

    struct EchoFetcher;

    impl RecordFetcher for EchoFetcher {
        fn fetch(&self, url: &str) -> Result<FetchOutcome, SyncError> {
            Ok(FetchOutcome::Fetched(url.as_bytes().to_vec()))
        }
    }

    fn project_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    }

    #[test]
    fn empty_directory_is_not_a_project() {
        let (_temp, root) = project_root();
        let result = App::open(ProjectLayout::new(root), FixedSearch, EchoFetcher, clock());
        assert_matches!(result, Err(SyncError::ProjectInit(_)));
    }

    #[test]
    fn project_yml_generates_queries() {
        let (_temp, root) = project_root();
        fs::write(
            root.join("project.yml"),
            "name: test_project\ntaxa:\n  - Homo sapiens\n  - Rattus norvegicus\ncsm: false",
        )
        .unwrap();
        let app = App::open(ProjectLayout::new(root.clone()), FixedSearch, EchoFetcher, clock())
            .unwrap();

        assert!(root.join("queries/Homo_sapiens__exp.json").as_std_path().is_file());
        assert!(root.join("queries/Rattus_norvegicus__exp.json").as_std_path().is_file());
        let names: Vec<String> = app
            .queries()
            .unwrap()
            .into_iter()
            .map(|query| query.name.to_string())
            .collect();
        assert_eq!(names, ["Homo_sapiens__exp", "Rattus_norvegicus__exp"]);
    }

    #[test]
    fn sync_writes_sidecars() {
        let (_temp, root) = project_root();
        fs::create_dir_all(root.join("queries")).unwrap();
        fs::write(root.join("queries/q.json"), "{}").unwrap();
        let app = App::open(ProjectLayout::new(root.clone()), FixedSearch, EchoFetcher, clock())
            .unwrap();

        let status = app.status(&JsonOutput).unwrap();
        let report = app
            .sync(&status, &SyncOptions::default(), &JsonOutput, &CancelToken::new())
            .unwrap();

        assert_eq!(report.fetches.len(), 1);
        assert!(report.status.iter().all(|(_, dir)| dir.is_up_to_date()));
        assert_eq!(fs::read_to_string(root.join("data/q.ids")).unwrap(), "hs01\n");
        assert!(root.join("data/q.sh").as_std_path().is_file());
        assert!(root.join("data/q__files.json").as_std_path().is_file());
        assert!(root.join("summary.json").as_std_path().is_file());
        assert!(root.join("README.md").as_std_path().is_file());
    }
}
