//! Named-graph triplestore access: the Fuseki HTTP client and an in-memory
//! store with the same semantics.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{FimsError, FimsResult};
use crate::query::builder::typed_subjects_query;
use crate::query::eval::evaluate_construct;
use crate::query::{CarryoverUpdate, ConstructQuery, CountQuery};
use crate::rdf::{Term, Triple, TripleSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub graph: String,
    pub endpoint: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub identifiers: u64,
    pub attachments: u64,
}

pub trait Triplestore: Send + Sync {
    /// Loads a Turtle file into a freshly named graph.
    fn upload(&self, turtle_path: &Path) -> FimsResult<UploadReceipt>;

    /// Adds Turtle text to an existing graph.
    fn append(&self, graph: &str, turtle: &str) -> FimsResult<()>;

    fn construct(&self, query: &ConstructQuery) -> FimsResult<TripleSet>;

    fn count(&self, query: &CountQuery) -> FimsResult<BTreeMap<String, GraphCounts>>;

    /// IRIs of the subjects typed `type_class` in `graph`, in order.
    fn typed_subjects(&self, graph: &str, type_class: &str) -> FimsResult<Vec<String>>;

    fn update(&self, update: &CarryoverUpdate) -> FimsResult<()>;
}

pub fn mint_graph_id() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

fn read_upload(path: &Path) -> FimsResult<String> {
    fs::read_to_string(path)
        .map_err(|err| FimsError::Filesystem(format!("read {}: {err}", path.display())))
}

#[derive(Clone)]
pub struct FusekiClient {
    client: Client,
    service: String,
}

impl FusekiClient {
    /// `service` is the dataset root, e.g. `http://localhost:3030/fims`.
    pub fn new(service: impl Into<String>, timeout: Option<Duration>) -> FimsResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("fims-triplify/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?,
        );
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?;
        Ok(Self {
            client,
            service: service.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.service)
    }

    fn check(response: Response) -> FimsResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "triplestore request failed".to_string());
        Err(FimsError::TriplestoreStatus { status, message })
    }

    fn send_data(&self, graph: &str, turtle: String, replace: bool) -> FimsResult<()> {
        let url = self.endpoint("data");
        let request = if replace {
            self.client.put(&url)
        } else {
            self.client.post(&url)
        };
        let response = request
            .query(&[("graph", graph)])
            .header(CONTENT_TYPE, "text/turtle")
            .body(turtle)
            .send()
            .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?;
        Self::check(response)?;
        Ok(())
    }

    fn select(&self, sparql: &str) -> FimsResult<Vec<BTreeMap<String, SparqlValue>>> {
        debug!(%sparql, "select");
        let response = self
            .client
            .post(self.endpoint("query"))
            .header(ACCEPT, "application/sparql-results+json")
            .form(&[("query", sparql)])
            .send()
            .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?;
        let results: SparqlResults = Self::check(response)?
            .json()
            .map_err(|err| FimsError::SparqlResults(err.to_string()))?;
        Ok(results.results.bindings)
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<BTreeMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

fn binding<'a>(row: &'a BTreeMap<String, SparqlValue>, name: &str) -> FimsResult<&'a str> {
    row.get(name)
        .map(|value| value.value.as_str())
        .ok_or_else(|| FimsError::SparqlResults(format!("missing binding ?{name}")))
}

fn count_binding(row: &BTreeMap<String, SparqlValue>, name: &str) -> FimsResult<u64> {
    let raw = binding(row, name)?;
    raw.parse()
        .map_err(|_| FimsError::SparqlResults(format!("?{name} is not a count: {raw}")))
}

impl Triplestore for FusekiClient {
    fn upload(&self, turtle_path: &Path) -> FimsResult<UploadReceipt> {
        let graph = mint_graph_id();
        self.send_data(&graph, read_upload(turtle_path)?, true)?;
        info!(%graph, service = %self.service, "uploaded dataset graph");
        Ok(UploadReceipt {
            graph,
            endpoint: self.endpoint("query"),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn append(&self, graph: &str, turtle: &str) -> FimsResult<()> {
        self.send_data(graph, turtle.to_string(), false)
    }

    fn construct(&self, query: &ConstructQuery) -> FimsResult<TripleSet> {
        let sparql = query.to_sparql();
        debug!(%sparql, "construct");
        let response = self
            .client
            .post(self.endpoint("query"))
            .header(ACCEPT, "application/n-triples")
            .form(&[("query", sparql.as_str())])
            .send()
            .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?;
        let body = Self::check(response)?
            .text()
            .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?;
        TripleSet::from_ntriples(&body)
    }

    fn count(&self, query: &CountQuery) -> FimsResult<BTreeMap<String, GraphCounts>> {
        let mut counts = BTreeMap::new();
        for row in self.select(&query.to_sparql())? {
            counts.insert(
                binding(&row, "graph")?.to_string(),
                GraphCounts {
                    identifiers: count_binding(&row, "identifiers")?,
                    attachments: count_binding(&row, "attachments")?,
                },
            );
        }
        Ok(counts)
    }

    fn typed_subjects(&self, graph: &str, type_class: &str) -> FimsResult<Vec<String>> {
        self.select(&typed_subjects_query(graph, type_class))?
            .iter()
            .map(|row| binding(row, "s").map(str::to_string))
            .collect()
    }

    fn update(&self, update: &CarryoverUpdate) -> FimsResult<()> {
        let sparql = update.to_sparql();
        debug!(%sparql, "update");
        let response = self
            .client
            .post(self.endpoint("update"))
            .form(&[("update", sparql.as_str())])
            .send()
            .map_err(|err| FimsError::TriplestoreHttp(err.to_string()))?;
        Self::check(response)?;
        Ok(())
    }
}

/// Triplestore held in process memory.
#[derive(Debug, Default)]
pub struct MemoryTriplestore {
    graphs: Mutex<BTreeMap<String, TripleSet>>,
}

impl MemoryTriplestore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FimsResult<std::sync::MutexGuard<'_, BTreeMap<String, TripleSet>>> {
        self.graphs
            .lock()
            .map_err(|_| FimsError::TriplestoreHttp("triplestore lock poisoned".to_string()))
    }

    pub fn insert_graph(&self, graph: impl Into<String>, triples: TripleSet) -> FimsResult<()> {
        self.lock()?.insert(graph.into(), triples);
        Ok(())
    }

    pub fn graph(&self, graph: &str) -> FimsResult<Option<TripleSet>> {
        Ok(self.lock()?.get(graph).cloned())
    }

    pub fn graph_names(&self) -> FimsResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

impl Triplestore for MemoryTriplestore {
    fn upload(&self, turtle_path: &Path) -> FimsResult<UploadReceipt> {
        let triples = TripleSet::from_turtle(&read_upload(turtle_path)?)?;
        let graph = mint_graph_id();
        self.insert_graph(graph.clone(), triples)?;
        Ok(UploadReceipt {
            graph,
            endpoint: "memory:".to_string(),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn append(&self, graph: &str, turtle: &str) -> FimsResult<()> {
        let triples = TripleSet::from_turtle(turtle)?;
        let mut graphs = self.lock()?;
        let target = graphs
            .get_mut(graph)
            .ok_or_else(|| FimsError::UnknownGraph(graph.to_string()))?;
        target.extend(triples);
        Ok(())
    }

    fn construct(&self, query: &ConstructQuery) -> FimsResult<TripleSet> {
        let graphs = self.lock()?;
        evaluate_construct(query, &graphs)
    }

    fn count(&self, query: &CountQuery) -> FimsResult<BTreeMap<String, GraphCounts>> {
        let graphs = self.lock()?;
        let mut counts = BTreeMap::new();
        for (name, triples) in graphs.iter() {
            if !query.graphs.is_empty() && !query.graphs.contains(name) {
                continue;
            }
            let typed = triples.subjects_of_type(&query.type_class);
            if typed.is_empty() {
                continue;
            }
            let attachments = typed
                .iter()
                .filter(|subject| triples.objects(subject, &query.attachment).next().is_some())
                .count();
            counts.insert(
                name.clone(),
                GraphCounts {
                    identifiers: typed.len() as u64,
                    attachments: attachments as u64,
                },
            );
        }
        Ok(counts)
    }

    fn typed_subjects(&self, graph: &str, type_class: &str) -> FimsResult<Vec<String>> {
        let graphs = self.lock()?;
        Ok(graphs
            .get(graph)
            .map(|triples| {
                triples
                    .subjects_of_type(type_class)
                    .into_iter()
                    .filter_map(Term::as_iri)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn update(&self, update: &CarryoverUpdate) -> FimsResult<()> {
        let mut graphs = self.lock()?;
        if !graphs.contains_key(&update.new) {
            return Err(FimsError::UnknownGraph(update.new.clone()));
        }
        let Some(previous) = graphs.get(&update.previous) else {
            debug!(graph = %update.previous, "previous graph not present");
            return Ok(());
        };
        let copied: Vec<Triple> = previous
            .iter()
            .filter(|triple| triple.predicate == update.predicate)
            .cloned()
            .collect();
        if let Some(target) = graphs.get_mut(&update.new) {
            let guarded: Vec<Triple> = copied
                .into_iter()
                .filter(|triple| target.has_type(&triple.subject, &update.type_guard))
                .collect();
            target.extend(guarded);
        }
        Ok(())
    }
}
