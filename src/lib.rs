pub mod carryover;
pub mod config;
pub mod error;
pub mod identifier;
pub mod mapping;
pub mod materialize;
pub mod output;
pub mod persistence;
pub mod postprocess;
pub mod query;
pub mod rdf;
pub mod schema;
pub mod snapshot;
pub mod triplestore;
pub mod triplify;
pub mod vocab;
