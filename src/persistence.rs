//! Dataset persistence: upload a new dataset version, fetch the current one,
//! and validate a snapshot against the mapping, for each storage backend.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::Builder;
use tracing::{info, warn};

use crate::carryover::carry_sequences;
use crate::config::Settings;
use crate::error::{FimsError, FimsResult};
use crate::identifier::{
    ExpeditionContext, GraphIndex, IdentifierAuthority, IdentifierResolver, IdentifierTable,
};
use crate::mapping::{CompileNote, MappingCompiler, NoteReason, local_name};
use crate::query::{ConstructQuery, Reconstructor, TabularModel};
use crate::rdf::TripleSet;
use crate::schema::{Mapping, Validation};
use crate::snapshot::RowSource;
use crate::triplestore::{Triplestore, UploadReceipt, mint_graph_id};
use crate::triplify::Triplifier;

/// Everything a run needs about one expedition of one project.
#[derive(Debug, Clone)]
pub struct Project<'a> {
    pub settings: &'a Settings,
    pub mapping: &'a Mapping,
    pub validation: &'a Validation,
    pub context: ExpeditionContext,
    pub identifiers: IdentifierTable,
}

impl<'a> Project<'a> {
    pub fn resolve<A: IdentifierAuthority + ?Sized>(
        settings: &'a Settings,
        mapping: &'a Mapping,
        validation: &'a Validation,
        authority: &A,
        context: ExpeditionContext,
    ) -> FimsResult<Self> {
        let identifiers = IdentifierResolver::new(authority, settings.namespace.clone())
            .resolve_mapping(mapping, &context)?;
        Ok(Self {
            settings,
            mapping,
            validation,
            context,
            identifiers,
        })
    }

    pub fn triplifier(&self) -> Triplifier<'_> {
        Triplifier::new(self.settings, self.mapping, self.validation, &self.identifiers)
    }

    pub fn reconstructor(&self) -> Reconstructor<'_> {
        Reconstructor::new(
            self.mapping,
            self.validation,
            &self.identifiers,
            &self.settings.root_class,
        )
    }

    fn output_prefix(&self) -> String {
        format!("{}_output", self.context.expedition_code)
    }

    fn empty_dataset(&self) -> TabularModel {
        TabularModel {
            columns: self
                .mapping
                .column_names_for_worksheet(&self.mapping.default_sheet),
            rows: Vec::new(),
        }
    }

    /// Configuration errors the mapping has against `source`: compile errors,
    /// a missing default sheet, and entity worksheets the snapshot lacks.
    pub fn check(&self, source: &dyn RowSource) -> Vec<CompileNote> {
        let description = MappingCompiler::new(self.mapping, self.validation, &self.identifiers)
            .compile(&source.known_columns());
        let mut errors: Vec<CompileNote> = description.errors().cloned().collect();
        let default_sheet = self.mapping.default_sheet.as_str();
        if !source.has_table(default_sheet) {
            errors.push(CompileNote {
                subject: default_sheet.to_string(),
                reason: NoteReason::ConfigError {
                    message: "default sheet missing from snapshot".to_string(),
                },
            });
        }
        for entity in &self.mapping.entities {
            let Some(worksheet) = entity.worksheet.as_deref().filter(|_| entity.has_worksheet())
            else {
                continue;
            };
            if worksheet == default_sheet || source.has_table(worksheet) {
                continue;
            }
            errors.push(CompileNote {
                subject: local_name(&entity.class_map_name()),
                reason: NoteReason::ConfigError {
                    message: format!("worksheet {worksheet} missing from snapshot"),
                },
            });
        }
        errors
    }
}

pub trait DatasetPersistence {
    fn upload(&mut self, source: &dyn RowSource) -> FimsResult<UploadReceipt>;

    /// The latest uploaded dataset version, fetched once and cached.
    fn fetch_current(&mut self) -> FimsResult<&TabularModel>;

    /// Configuration errors that would affect an upload of `source`.
    fn validate(&self, source: &dyn RowSource) -> FimsResult<Vec<CompileNote>>;
}

pub struct TriplestorePersistence<'a, S: Triplestore + ?Sized, A: IdentifierAuthority + ?Sized> {
    project: Project<'a>,
    store: &'a S,
    authority: &'a A,
    dataset: Option<TabularModel>,
}

impl<'a, S: Triplestore + ?Sized, A: IdentifierAuthority + ?Sized> TriplestorePersistence<'a, S, A> {
    pub fn new(project: Project<'a>, store: &'a S, authority: &'a A) -> Self {
        Self {
            project,
            store,
            authority,
            dataset: None,
        }
    }

    pub fn project(&self) -> &Project<'a> {
        &self.project
    }

    fn latest_graph(&self) -> FimsResult<Option<String>> {
        let ctx = &self.project.context;
        Ok(self
            .authority
            .dataset_graphs(ctx.project_id, &ctx.expedition_code)?
            .into_iter()
            .next())
    }

    fn fetch_latest(&self) -> FimsResult<TabularModel> {
        let Some(graph) = self.latest_graph()? else {
            return Ok(self.project.empty_dataset());
        };
        let query = ConstructQuery::new(vec![graph], self.project.settings.root_class.clone());
        let triples = self.store.construct(&query)?;
        Ok(self.project.reconstructor().reconstruct(&triples))
    }
}

impl<S: Triplestore + ?Sized, A: IdentifierAuthority + ?Sized> DatasetPersistence
    for TriplestorePersistence<'_, S, A>
{
    fn upload(&mut self, source: &dyn RowSource) -> FimsResult<UploadReceipt> {
        let previous = self.latest_graph()?;
        let run = self
            .project
            .triplifier()
            .run(source, &self.project.output_prefix())?;
        let uploaded = self.store.upload(run.triple_path());
        run.cleanup();
        let receipt = uploaded?;

        let ctx = &self.project.context;
        self.authority
            .register_graph(ctx.project_id, &ctx.expedition_code, &receipt.graph)?;
        if let Some(previous) = previous {
            carry_sequences(self.store, self.project.mapping, &previous, &receipt.graph)?;
        }
        self.dataset = None;
        Ok(receipt)
    }

    fn fetch_current(&mut self) -> FimsResult<&TabularModel> {
        let dataset = match self.dataset.take() {
            Some(dataset) => dataset,
            None => self.fetch_latest()?,
        };
        Ok(self.dataset.insert(dataset))
    }

    fn validate(&self, source: &dyn RowSource) -> FimsResult<Vec<CompileNote>> {
        Ok(self.project.check(source))
    }
}

const GRAPH_INDEX_FILE: &str = "graphs.json";

/// `~/.local/share/fims-triplifier/graphs`.
pub fn default_graph_root() -> FimsResult<Utf8PathBuf> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".local/share/fims-triplifier/graphs"))
                .ok()
        })
        .ok_or_else(|| FimsError::Filesystem("unable to resolve graph directory".to_string()))
}

/// Keeps every dataset version as a Turtle file under
/// `<root>/<project>/<expedition>/<graph>.ttl`, with upload order recorded in
/// `<root>/graphs.json`.
pub struct FilePersistence<'a, A: IdentifierAuthority + ?Sized> {
    project: Project<'a>,
    authority: &'a A,
    root: Utf8PathBuf,
    index: GraphIndex,
    dataset: Option<TabularModel>,
}

impl<'a, A: IdentifierAuthority + ?Sized> FilePersistence<'a, A> {
    pub fn new(project: Project<'a>, authority: &'a A, root: Utf8PathBuf) -> Self {
        let index = GraphIndex::new(root.join(GRAPH_INDEX_FILE));
        Self {
            project,
            authority,
            root,
            index,
            dataset: None,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn expedition_dir(&self) -> Utf8PathBuf {
        let ctx = &self.project.context;
        self.root
            .join(ctx.project_id.to_string())
            .join(&ctx.expedition_code)
    }

    pub fn graph_path(&self, graph: &str) -> Utf8PathBuf {
        let name: String = graph
            .trim_start_matches("urn:uuid:")
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
            .collect();
        self.expedition_dir().join(format!("{name}.ttl"))
    }

    /// Graphs stored under this root, most recent first, falling back to the
    /// authority's record.
    pub fn stored_graphs(&self) -> FimsResult<Vec<String>> {
        let ctx = &self.project.context;
        let stored = self.index.graphs(ctx.project_id, &ctx.expedition_code)?;
        if !stored.is_empty() {
            return Ok(stored);
        }
        self.authority
            .dataset_graphs(ctx.project_id, &ctx.expedition_code)
    }

    fn fetch_latest(&self) -> FimsResult<TabularModel> {
        let Some(graph) = self.stored_graphs()?.into_iter().next() else {
            return Ok(self.project.empty_dataset());
        };
        let path = self.graph_path(&graph);
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| FimsError::Filesystem(format!("read {path}: {err}")))?;
        let triples = TripleSet::from_turtle(&content)?;
        Ok(self.project.reconstructor().reconstruct(&triples))
    }
}

fn copy_file_atomic(source: &std::path::Path, dest: &Utf8Path) -> FimsResult<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| FimsError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| FimsError::Filesystem(err.to_string()))?;
    let temp = Builder::new()
        .prefix("fims-graph")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| FimsError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path()).map_err(|err| FimsError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| FimsError::Filesystem(err.to_string()))?;
    Ok(())
}

impl<A: IdentifierAuthority + ?Sized> DatasetPersistence for FilePersistence<'_, A> {
    fn upload(&mut self, source: &dyn RowSource) -> FimsResult<UploadReceipt> {
        let run = self
            .project
            .triplifier()
            .run(source, &self.project.output_prefix())?;
        let graph = mint_graph_id();
        let dest = self.graph_path(&graph);
        let copied = copy_file_atomic(run.triple_path(), &dest);
        run.cleanup();
        copied?;

        let ctx = &self.project.context;
        self.index
            .record(ctx.project_id, &ctx.expedition_code, &graph)?;
        if let Err(err) = self
            .authority
            .register_graph(ctx.project_id, &ctx.expedition_code, &graph)
        {
            warn!(path = %dest, "graph written but not registered");
            return Err(err);
        }
        info!(%graph, path = %dest, "stored dataset graph");
        self.dataset = None;
        Ok(UploadReceipt {
            graph,
            endpoint: format!("file://{}", self.root),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn fetch_current(&mut self) -> FimsResult<&TabularModel> {
        let dataset = match self.dataset.take() {
            Some(dataset) => dataset,
            None => self.fetch_latest()?,
        };
        Ok(self.dataset.insert(dataset))
    }

    fn validate(&self, source: &dyn RowSource) -> FimsResult<Vec<CompileNote>> {
        Ok(self.project.check(source))
    }
}
