use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::QueryName;
use crate::error::SyncError;
use crate::query::{self, ContentType, QuerySpec};
use crate::store::ProjectLayout;

pub const JOBS_ENV: &str = "PDB_SYNC_JOBS";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub taxa: Vec<String>,
    #[serde(default)]
    pub genes: Vec<String>,
    #[serde(default)]
    pub csm: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Utf8Path) -> Result<ProjectConfig, SyncError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| SyncError::ConfigRead(path.as_std_path().to_path_buf()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ProjectConfig, SyncError> {
        serde_yaml::from_str(content).map_err(|err| SyncError::ConfigParse(err.to_string()))
    }
}

impl ProjectConfig {
    fn content_types(&self) -> Vec<ContentType> {
        if self.csm {
            vec![ContentType::Experimental, ContentType::Computational]
        } else {
            vec![ContentType::Experimental]
        }
    }

    pub fn queries(&self) -> Result<Vec<(QueryName, serde_json::Value)>, SyncError> {
        let mut queries = Vec::new();
        for content in self.content_types() {
            for taxon in &self.taxa {
                let spec = QuerySpec {
                    organism: Some(taxon.clone()),
                    content_types: vec![content],
                    ..QuerySpec::default()
                };
                let name: QueryName = format!("{taxon}__{}", content.file_tag()).parse()?;
                queries.push((name, query::advanced_query(&spec)?));
            }
            for gene in &self.genes {
                let name: QueryName = format!("{gene}__{}", content.file_tag()).parse()?;
                queries.push((name, query::gene_query(gene, content)));
            }
        }
        queries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(queries)
    }

    pub fn write_queries(&self, layout: &ProjectLayout) -> Result<Vec<Utf8PathBuf>, SyncError> {
        let mut written = Vec::new();
        for (name, document) in self.queries()? {
            let path = layout.query_path(&name);
            query::write_document(&path, &document)?;
            written.push(path);
        }
        Ok(written)
    }
}

pub fn default_jobs() -> usize {
    std::env::var(JOBS_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|jobs| *jobs > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_project_yaml() {
        let config = ConfigLoader::parse(
            "name: test_project\ntaxa:\n  - Homo sapiens\n  - Rattus norvegicus\ncsm: false",
        )
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("test_project"));
        assert_eq!(config.taxa.len(), 2);
        assert!(!config.csm);
        assert!(config.genes.is_empty());
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        assert_matches!(
            ConfigLoader::parse("taxa: [unterminated"),
            Err(SyncError::ConfigParse(_))
        );
    }

    #[test]
    fn query_names_follow_taxa() {
        let config = ProjectConfig {
            taxa: vec!["Mus musculus".to_string(), "Homo sapiens".to_string()],
            csm: true,
            ..ProjectConfig::default()
        };
        let names: Vec<String> = config
            .queries()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(
            names,
            [
                "Homo_sapiens__csm",
                "Homo_sapiens__exp",
                "Mus_musculus__csm",
                "Mus_musculus__exp"
            ]
        );
    }
}
