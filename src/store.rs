use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;

use crate::domain::QueryName;
use crate::error::SyncError;

pub const NOT_FOUND_LOG: &str = "404.txt";
pub const OBSOLETE_SUFFIX: &str = ".obsolete";
pub const PROJECT_CONFIG: &str = "project.yml";
const CACHE_PREFIX: &str = "_ids_";

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: Utf8PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn config_path(&self) -> Utf8PathBuf {
        self.root.join(PROJECT_CONFIG)
    }

    pub fn queries_dir(&self) -> Utf8PathBuf {
        self.root.join("queries")
    }

    pub fn query_path(&self, name: &QueryName) -> Utf8PathBuf {
        self.queries_dir().join(format!("{name}.json"))
    }

    pub fn data_root(&self) -> Utf8PathBuf {
        self.root.join("data")
    }

    pub fn data_dir(&self, name: &QueryName) -> Utf8PathBuf {
        self.data_root().join(name.as_str())
    }

    pub fn cache_dir(&self, name: &QueryName) -> Utf8PathBuf {
        self.root.join("cache").join(name.as_str())
    }

    pub fn cache_file(&self, name: &QueryName, date: NaiveDate) -> Utf8PathBuf {
        self.cache_dir(name)
            .join(format!("{CACHE_PREFIX}{}.txt", date.format("%Y-%m-%d")))
    }

    pub fn not_found_log(&self, name: &QueryName) -> Utf8PathBuf {
        self.data_dir(name).join(NOT_FOUND_LOG)
    }

    pub fn ids_path(&self, name: &QueryName) -> Utf8PathBuf {
        self.data_root().join(format!("{name}.ids"))
    }

    pub fn script_path(&self, name: &QueryName) -> Utf8PathBuf {
        self.data_root().join(format!("{name}.sh"))
    }

    pub fn manifest_path(&self, name: &QueryName) -> Utf8PathBuf {
        self.data_root().join(format!("{name}__files.json"))
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.root.join("summary.json")
    }

    pub fn readme_path(&self) -> Utf8PathBuf {
        self.root.join("README.md")
    }

    pub fn is_project(&self) -> bool {
        self.queries_dir().as_std_path().is_dir() || self.config_path().as_std_path().is_file()
    }

    pub fn cached_dates(&self, name: &QueryName) -> Result<Vec<NaiveDate>, SyncError> {
        let dir = self.cache_dir(name);
        if !dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let mut dates = Vec::new();
        for entry in fs::read_dir(dir.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?
        {
            let entry = entry.map_err(|err| SyncError::Filesystem(err.to_string()))?;
            let file_name = entry.file_name();
            let Some(date) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(CACHE_PREFIX))
                .and_then(|rest| rest.strip_suffix(".txt"))
                .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
            else {
                continue;
            };
            dates.push(date);
        }
        dates.sort();
        Ok(dates)
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), SyncError> {
    fs::create_dir_all(path.as_std_path()).map_err(|err| SyncError::Filesystem(err.to_string()))
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SyncError> {
    let parent = path
        .parent()
        .ok_or_else(|| SyncError::Filesystem(format!("invalid destination path: {path}")))?;
    ensure_dir(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".pdb-sync")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn append_line(path: &Utf8Path, line: &str) -> Result<(), SyncError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    file.write_all(format!("{line}\n").as_bytes())
        .map_err(|err| SyncError::Filesystem(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = ProjectLayout::new("/tmp/prj");
        let name: QueryName = "Homo sapiens".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(layout.query_path(&name).ends_with("queries/Homo_sapiens.json"));
        assert!(layout.data_dir(&name).ends_with("data/Homo_sapiens"));
        assert!(
            layout
                .cache_file(&name, date)
                .ends_with("cache/Homo_sapiens/_ids_2024-03-01.txt")
        );
        assert!(layout.not_found_log(&name).ends_with("data/Homo_sapiens/404.txt"));
        assert!(layout.ids_path(&name).ends_with("data/Homo_sapiens.ids"));
        assert!(layout.manifest_path(&name).ends_with("data/Homo_sapiens__files.json"));
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("nested").join("file.txt");
        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second");
        let leftovers = fs::read_dir(root.join("nested").as_std_path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn append_line_accumulates() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("404.txt")).unwrap();
        append_line(&path, "0000").unwrap();
        append_line(&path, "0000").unwrap();
        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "0000\n0000\n");
    }

    #[test]
    fn cached_dates_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let layout = ProjectLayout::new(root);
        let name: QueryName = "q".parse().unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        write_bytes_atomic(&layout.cache_file(&name, later), b"").unwrap();
        write_bytes_atomic(&layout.cache_file(&name, earlier), b"").unwrap();
        assert_eq!(layout.cached_dates(&name).unwrap(), vec![earlier, later]);
    }
}
