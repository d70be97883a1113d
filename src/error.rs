use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FimsError {
    #[error("missing config file fims.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read relational snapshot: {0}")]
    SnapshotParse(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("invalid attribute on entity {entity}: {message}")]
    InvalidAttribute { entity: String, message: String },

    #[error("No triples to write!")]
    NoTriples,

    #[error("no rows reconstructed from graph(s): {0}")]
    NoRows(String),

    #[error("unsupported filter operation: {0}")]
    UnsupportedFilterOperation(String),

    #[error("invalid filter pattern {pattern}: {message}")]
    InvalidFilterPattern { pattern: String, message: String },

    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),

    #[error("triplestore request failed: {0}")]
    TriplestoreHttp(String),

    #[error("triplestore returned status {status}: {message}")]
    TriplestoreStatus { status: u16, message: String },

    #[error("unknown graph: {0}")]
    UnknownGraph(String),

    #[error("malformed RDF: {0}")]
    RdfSyntax(String),

    #[error("triple cannot be serialized: {0}")]
    InvalidTriple(String),

    #[error("malformed SPARQL results: {0}")]
    SparqlResults(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("No entity was found containing a {0} attribute")]
    MissingSequenceRoot(String),

    #[error("No fasta data was found.")]
    NoFastaData,

    #[error("invalid FASTA input: {0}")]
    FastaParse(String),

    #[error("no dataset has been uploaded for project {project_id} expedition {expedition_code}")]
    NoDataset {
        project_id: u32,
        expedition_code: String,
    },
}

pub type FimsResult<T> = Result<T, FimsError>;
