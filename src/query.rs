use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::error::SyncError;
use crate::store;

pub const ORGANISM_ATTRIBUTE: &str = "rcsb_entity_source_organism.taxonomy_lineage.name";
pub const GENE_ATTRIBUTE: &str = "rcsb_entity_source_organism.rcsb_gene_name.value";
pub const METHOD_ATTRIBUTE: &str = "exptl.method";
pub const MODEL_SOURCE_ATTRIBUTE: &str = "rcsb_comp_model_provenance.source_db";
pub const ALPHAFOLD_SOURCE: &str = "AlphaFoldDB";
pub const DEFAULT_ROWS: u64 = 999_999;

pub const EXPERIMENTAL_METHODS: [&str; 3] =
    ["X-RAY DIFFRACTION", "SOLUTION NMR", "ELECTRON MICROSCOPY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Experimental,
    Computational,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Experimental => "experimental",
            ContentType::Computational => "computational",
        }
    }

    pub fn file_tag(self) -> &'static str {
        match self {
            ContentType::Experimental => "exp",
            ContentType::Computational => "csm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub polymer_type: Option<String>,
    pub organism: Option<String>,
    pub methods: Vec<String>,
    pub content_types: Vec<ContentType>,
    pub rows: u64,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            polymer_type: None,
            organism: None,
            methods: Vec::new(),
            content_types: vec![ContentType::Experimental],
            rows: DEFAULT_ROWS,
        }
    }
}

pub fn terminal(attribute: &str, value: &str, operator: &str) -> Value {
    json!({
        "type": "terminal",
        "service": "text",
        "parameters": {
            "attribute": attribute,
            "operator": operator,
            "negation": false,
            "value": value,
        }
    })
}

pub fn group(nodes: Vec<Value>, logical_operator: &str) -> Value {
    json!({
        "type": "group",
        "logical_operator": logical_operator,
        "nodes": nodes,
    })
}

pub fn organism(name: &str) -> Value {
    terminal(ORGANISM_ATTRIBUTE, name, "contains_phrase")
}

pub fn method(name: &str) -> Value {
    let attribute = if name == ALPHAFOLD_SOURCE {
        MODEL_SOURCE_ATTRIBUTE
    } else {
        METHOD_ATTRIBUTE
    };
    terminal(attribute, name, "exact_match")
}

pub fn methods<S: AsRef<str>>(names: &[S]) -> Option<Value> {
    match names {
        [] => None,
        [single] => Some(method(single.as_ref())),
        many => Some(group(
            many.iter().map(|name| method(name.as_ref())).collect(),
            "or",
        )),
    }
}

pub fn polymer_type(value: &str) -> Value {
    let attribute = match value {
        "Nucleic acid (only)" | "Protein (only)" => "rcsb_entry_info.selected_polymer_entity_types",
        _ => "entity_poly.rcsb_entity_polymer_type",
    };
    terminal(attribute, value, "exact_match")
}

fn request_options(content_types: &[ContentType], paginate: Value) -> Value {
    let mut options = json!({
        "results_content_type": content_types.iter().map(|ty| ty.as_str()).collect::<Vec<_>>(),
        "sort": [{"sort_by": "score", "direction": "desc"}],
        "scoring_strategy": "combined",
    });
    if let (Some(object), Value::Object(extra)) = (options.as_object_mut(), paginate) {
        object.extend(extra);
    }
    options
}

fn wrap(mut query: Value, options: Value) -> Value {
    if let Some(object) = query.as_object_mut() {
        object.insert("label".to_string(), json!("text"));
    }
    json!({
        "query": query,
        "return_type": "entry",
        "request_options": options,
    })
}

pub fn advanced_query(spec: &QuerySpec) -> Result<Value, SyncError> {
    if spec.content_types.is_empty() {
        return Err(SyncError::InvalidQueryRequest(
            "at least one result content type is required".to_string(),
        ));
    }
    let mut nodes = Vec::new();
    if let Some(value) = &spec.polymer_type {
        nodes.push(polymer_type(value));
    }
    if let Some(node) = methods(&spec.methods) {
        nodes.push(node);
    }
    if let Some(name) = &spec.organism {
        nodes.push(organism(name));
    }
    let query = match nodes.len() {
        0 => {
            return Err(SyncError::InvalidQueryRequest(
                "no search criteria given".to_string(),
            ));
        }
        1 => nodes.remove(0),
        _ => group(nodes, "and"),
    };
    let paginate = json!({"paginate": {"start": 0, "rows": spec.rows}});
    Ok(wrap(query, request_options(&spec.content_types, paginate)))
}

pub fn gene_query(gene: &str, content: ContentType) -> Value {
    let mut nodes = vec![terminal(
        "entity_poly.rcsb_entity_polymer_type",
        "Protein",
        "exact_match",
    )];
    if content == ContentType::Experimental {
        nodes.extend(methods(&EXPERIMENTAL_METHODS));
    }
    nodes.push(terminal(GENE_ATTRIBUTE, gene, "exact_match"));
    let all_hits = json!({"return_all_hits": true});
    wrap(group(nodes, "and"), request_options(&[content], all_hits))
}

pub fn write_gene_queries<S: AsRef<str>>(
    output: &Utf8Path,
    name: &str,
    genes: &[S],
    types: &[ContentType],
) -> Result<Vec<Utf8PathBuf>, SyncError> {
    if name.trim().is_empty() {
        return Err(SyncError::InvalidQueryRequest(
            "a name for the query set is required".to_string(),
        ));
    }
    if genes.is_empty() {
        return Err(SyncError::InvalidQueryRequest(
            "at least one gene name is required".to_string(),
        ));
    }
    if types.is_empty() {
        return Err(SyncError::InvalidQueryRequest(
            "at least one structure type is required".to_string(),
        ));
    }

    let mut written = Vec::new();
    for content in types {
        let dir = output.join(name).join(content.as_str()).join("queries");
        for gene in genes {
            let gene = gene.as_ref();
            let path = dir.join(format!("{gene}.json"));
            write_document(&path, &gene_query(gene, *content))?;
            info!("{} query for gene {gene} saved to {path}", content.as_str());
            written.push(path);
        }
    }
    Ok(written)
}

pub fn write_document(path: &Utf8Path, document: &Value) -> Result<(), SyncError> {
    let mut content = serde_json::to_string_pretty(document)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    content.push('\n');
    store::write_bytes_atomic(path, content.as_bytes())
}
