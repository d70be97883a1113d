//! Persistent-identifier resolution for entity instances.
//!
//! Every entity with an ordinary key gets a URI prefix: the minted identifier
//! issued by the identifier authority when one exists, otherwise a local
//! `urn:x-<namespace>:<alias>:` prefix. Blank-node keyed entities never use a
//! prefix; their identity is the ordered list of columns behind their attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::sync::{Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::debug;

use crate::error::{FimsError, FimsResult};
use crate::schema::{ColumnRef, Entity, Mapping};

pub const DEFAULT_NAMESPACE: &str = "biscicol";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpeditionContext {
    pub project_id: u32,
    pub expedition_code: String,
}

impl ExpeditionContext {
    pub fn new(project_id: u32, expedition_code: impl Into<String>) -> Self {
        Self {
            project_id,
            expedition_code: expedition_code.into(),
        }
    }
}

/// The identifier-minting authority, which also records the dataset graphs
/// uploaded for each expedition.
pub trait IdentifierAuthority: Send + Sync {
    fn lookup(
        &self,
        project_id: u32,
        expedition_code: &str,
        concept_alias: &str,
    ) -> FimsResult<Option<String>>;

    /// Dataset graphs of an expedition, most recent first.
    fn dataset_graphs(&self, project_id: u32, expedition_code: &str) -> FimsResult<Vec<String>>;

    fn register_graph(&self, project_id: u32, expedition_code: &str, graph: &str)
    -> FimsResult<()>;
}

/// Dataset graphs already uploaded for one expedition, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEntry {
    pub project_id: u32,
    pub expedition_code: String,
    pub graphs: Vec<String>,
}

/// A JSON file of [`GraphEntry`] records that outlives the process, so a
/// later run sees the graphs an earlier run uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphIndex {
    path: Utf8PathBuf,
}

impl GraphIndex {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// All recorded entries; a missing file is an empty index.
    pub fn load(&self) -> FimsResult<Vec<GraphEntry>> {
        let content = match fs::read_to_string(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(FimsError::Filesystem(format!("read {}: {err}", self.path)));
            }
        };
        serde_json::from_str(&content)
            .map_err(|err| FimsError::Filesystem(format!("parse {}: {err}", self.path)))
    }

    pub fn graphs(&self, project_id: u32, expedition_code: &str) -> FimsResult<Vec<String>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|entry| entry.project_id == project_id && entry.expedition_code == expedition_code)
            .map(|entry| entry.graphs)
            .unwrap_or_default())
    }

    /// Records `graph` as the newest graph of the expedition.
    pub fn record(&self, project_id: u32, expedition_code: &str, graph: &str) -> FimsResult<()> {
        let mut entries = self.load()?;
        match entries
            .iter_mut()
            .find(|entry| entry.project_id == project_id && entry.expedition_code == expedition_code)
        {
            Some(entry) => {
                entry.graphs.retain(|existing| existing != graph);
                entry.graphs.insert(0, graph.to_string());
            }
            None => entries.push(GraphEntry {
                project_id,
                expedition_code: expedition_code.to_string(),
                graphs: vec![graph.to_string()],
            }),
        }
        self.save(&entries)
    }

    fn save(&self, entries: &[GraphEntry]) -> FimsResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FimsError::Filesystem(format!("create {parent}: {err}")))?;
        let json = serde_json::to_string_pretty(entries)
            .map_err(|err| FimsError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".fims-graphs")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| FimsError::Filesystem(err.to_string()))?;
        temp.write_all(json.as_bytes())
            .map_err(|err| FimsError::Filesystem(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| FimsError::Filesystem(format!("write {}: {err}", self.path)))?;
        debug!(path = %self.path, "saved graph index");
        Ok(())
    }
}

/// Authority backed by a fixed identifier table, used for configured
/// deployments without a minting service and in tests. Registered graphs are
/// also written to its [`GraphIndex`] when it has one.
#[derive(Debug, Default)]
pub struct StaticAuthority {
    identifiers: BTreeMap<String, String>,
    graphs: Mutex<BTreeMap<(u32, String), Vec<String>>>,
    index: Option<GraphIndex>,
}

impl StaticAuthority {
    pub fn new(identifiers: BTreeMap<String, String>) -> Self {
        Self {
            identifiers,
            graphs: Mutex::new(BTreeMap::new()),
            index: None,
        }
    }

    pub fn with_graphs(self, project_id: u32, expedition_code: &str, graphs: Vec<String>) -> Self {
        if let Ok(mut guard) = self.graphs.lock() {
            guard.insert((project_id, expedition_code.to_string()), graphs);
        }
        self
    }

    /// Loads the graphs recorded in `index` ahead of the configured ones and
    /// records later registrations there.
    pub fn with_index(mut self, index: GraphIndex) -> FimsResult<Self> {
        let recorded = index.load()?;
        {
            let mut guard = self.lock()?;
            for entry in recorded {
                let graphs = guard
                    .entry((entry.project_id, entry.expedition_code))
                    .or_default();
                let configured = std::mem::take(graphs);
                *graphs = entry.graphs;
                for graph in configured {
                    if !graphs.contains(&graph) {
                        graphs.push(graph);
                    }
                }
            }
        }
        self.index = Some(index);
        Ok(self)
    }

    fn lock(&self) -> FimsResult<MutexGuard<'_, BTreeMap<(u32, String), Vec<String>>>> {
        self.graphs
            .lock()
            .map_err(|_| FimsError::Filesystem("graph registry lock poisoned".to_string()))
    }
}

impl IdentifierAuthority for StaticAuthority {
    fn lookup(
        &self,
        _project_id: u32,
        _expedition_code: &str,
        concept_alias: &str,
    ) -> FimsResult<Option<String>> {
        Ok(self.identifiers.get(concept_alias).cloned())
    }

    fn dataset_graphs(&self, project_id: u32, expedition_code: &str) -> FimsResult<Vec<String>> {
        Ok(self
            .lock()?
            .get(&(project_id, expedition_code.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn register_graph(
        &self,
        project_id: u32,
        expedition_code: &str,
        graph: &str,
    ) -> FimsResult<()> {
        let mut guard = self.lock()?;
        if let Some(index) = &self.index {
            index.record(project_id, expedition_code, graph)?;
        }
        guard
            .entry((project_id, expedition_code.to_string()))
            .or_default()
            .insert(0, graph.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UriPrefix(String);

impl UriPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The local identifier of `iri`, if it was minted under this prefix.
    pub fn local_id<'a>(&self, iri: &'a str) -> Option<&'a str> {
        iri.strip_prefix(self.0.as_str())
            .filter(|local| !local.is_empty())
    }
}

impl fmt::Display for UriPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prefixes resolved for every entity of a mapping, keyed by concept alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierTable {
    prefixes: BTreeMap<String, UriPrefix>,
}

impl IdentifierTable {
    pub fn get(&self, concept_alias: &str) -> Option<&UriPrefix> {
        self.prefixes.get(concept_alias)
    }

    pub fn insert(&mut self, concept_alias: impl Into<String>, prefix: UriPrefix) {
        self.prefixes.insert(concept_alias.into(), prefix);
    }
}

pub struct IdentifierResolver<'a, A: IdentifierAuthority + ?Sized> {
    authority: &'a A,
    namespace: String,
}

impl<'a, A: IdentifierAuthority + ?Sized> IdentifierResolver<'a, A> {
    pub fn new(authority: &'a A, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let namespace = if namespace.trim().is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            namespace
        };
        Self {
            authority,
            namespace,
        }
    }

    pub fn fallback(&self, concept_alias: &str) -> UriPrefix {
        UriPrefix(format!("urn:x-{}:{}:", self.namespace, concept_alias))
    }

    pub fn resolve(&self, entity: &Entity, ctx: &ExpeditionContext) -> FimsResult<UriPrefix> {
        if let Some(minted) = non_blank(entity.identifier.as_deref()) {
            return Ok(UriPrefix(minted.to_string()));
        }
        let looked_up = self.authority.lookup(
            ctx.project_id,
            &ctx.expedition_code,
            &entity.concept_alias,
        )?;
        match non_blank(looked_up.as_deref()) {
            Some(minted) => Ok(UriPrefix(minted.to_string())),
            None => Ok(self.fallback(&entity.concept_alias)),
        }
    }

    pub fn resolve_mapping(
        &self,
        mapping: &Mapping,
        ctx: &ExpeditionContext,
    ) -> FimsResult<IdentifierTable> {
        let mut table = IdentifierTable::default();
        for entity in &mapping.entities {
            table.insert(entity.concept_alias.clone(), self.resolve(entity, ctx)?);
        }
        Ok(table)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty() && *value != "null")
}

/// Bytes escaped in local identifiers: everything except unreserved
/// characters, `:` and `@`.
const LOCAL_ID: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b':')
    .remove(b'@');

/// Percent-encode a key value for use after a URI prefix.
pub fn encode_local_id(value: &str) -> String {
    utf8_percent_encode(value, LOCAL_ID).to_string()
}

/// Inverse of [`encode_local_id`]; malformed escapes are kept verbatim.
pub fn decode_local_id(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Ordered `(worksheet, column)` pairs identifying a blank-node keyed entity.
pub fn blank_node_key(entity: &Entity) -> Vec<ColumnRef> {
    let table = entity.worksheet.as_deref().unwrap_or_default();
    entity
        .attributes
        .iter()
        .flat_map(|attribute| attribute.columns())
        .map(|column| ColumnRef::new(table, column))
        .collect()
}

/// Content-addressed blank node label: identical values give identical labels.
pub fn blank_node_label(class_map: &str, values: &[&str]) -> String {
    let mut label: String = class_map
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    for value in values {
        label.push('_');
        for byte in value.as_bytes() {
            label.push_str(&format!("{byte:02x}"));
        }
    }
    label
}
