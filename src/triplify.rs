//! The triplification pipeline: compile, write the mapping file, evaluate,
//! post-process and write the triple file.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{FimsError, FimsResult};
use crate::identifier::IdentifierTable;
use crate::mapping::{MappingCompiler, MappingDescription, render};
use crate::materialize::materialize;
use crate::postprocess::PostProcessor;
use crate::rdf::TripleSet;
use crate::schema::{Mapping, Validation};
use crate::snapshot::RowSource;

pub struct Triplifier<'a> {
    settings: &'a Settings,
    mapping: &'a Mapping,
    validation: &'a Validation,
    identifiers: &'a IdentifierTable,
}

/// Output of one run. Both files are removed by [`TriplifyRun::cleanup`], or
/// on drop, unless [`TriplifyRun::persist`] moves them out first.
#[derive(Debug)]
pub struct TriplifyRun {
    pub description: MappingDescription,
    pub triples: TripleSet,
    mapping_file: NamedTempFile,
    triple_file: NamedTempFile,
}

impl<'a> Triplifier<'a> {
    pub fn new(
        settings: &'a Settings,
        mapping: &'a Mapping,
        validation: &'a Validation,
        identifiers: &'a IdentifierTable,
    ) -> Self {
        Self {
            settings,
            mapping,
            validation,
            identifiers,
        }
    }

    pub fn post_processor(&self) -> PostProcessor {
        let processor = PostProcessor::new(self.settings.prefixes.clone());
        match &self.settings.ontology {
            Some(ontology) => processor.with_imports(ontology.clone(), self.settings.imports.clone()),
            None => processor,
        }
    }

    pub fn run(&self, source: &dyn RowSource, filename_prefix: &str) -> FimsResult<TriplifyRun> {
        let known_columns = source.known_columns();
        let description = MappingCompiler::new(self.mapping, self.validation, self.identifiers)
            .with_defined_by_property(self.settings.defined_by_property.clone())
            .with_storage(source.storage())
            .compile(&known_columns);
        for note in description.errors() {
            warn!(subject = %note.subject, reason = ?note.reason, "mapping configuration error");
        }

        fs::create_dir_all(self.settings.output_folder.as_std_path())
            .map_err(|err| FimsError::Filesystem(err.to_string()))?;
        let mapping_file = write_temp(
            &self.settings.output_folder,
            &format!("{filename_prefix}.mapping."),
            ".n3",
            &render(&description),
        )?;
        info!(path = %mapping_file.path().display(), "wrote mapping file");

        let processor = self.post_processor();
        let triples = processor.process(materialize(&description, source)?);
        let triple_file = write_temp(
            &self.settings.output_folder,
            &format!("{filename_prefix}."),
            ".ttl",
            &processor.serialize(&triples)?,
        )?;
        info!(path = %triple_file.path().display(), triples = triples.len(), "wrote triple file");

        Ok(TriplifyRun {
            description,
            triples,
            mapping_file,
            triple_file,
        })
    }
}

fn write_temp(dir: &Utf8Path, prefix: &str, suffix: &str, content: &str) -> FimsResult<NamedTempFile> {
    let mut file = Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir.as_std_path())
        .map_err(|err| FimsError::Filesystem(err.to_string()))?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|err| FimsError::Filesystem(err.to_string()))?;
    Ok(file)
}

impl TriplifyRun {
    pub fn mapping_path(&self) -> &Path {
        self.mapping_file.path()
    }

    pub fn triple_path(&self) -> &Path {
        self.triple_file.path()
    }

    /// Removes both files. Failing to remove one is logged, not returned.
    pub fn cleanup(self) {
        for file in [self.mapping_file, self.triple_file] {
            let path = file.path().to_path_buf();
            if let Err(err) = file.close() {
                warn!(path = %path.display(), %err, "failed to remove temporary file");
            }
        }
    }

    /// Keeps both files under their generated names and returns their paths.
    pub fn persist(self) -> FimsResult<(Utf8PathBuf, Utf8PathBuf)> {
        let keep = |file: NamedTempFile| -> FimsResult<Utf8PathBuf> {
            let (_, path) = file
                .keep()
                .map_err(|err| FimsError::Filesystem(err.to_string()))?;
            Utf8PathBuf::from_path_buf(path)
                .map_err(|_| FimsError::Filesystem("invalid output path".to_string()))
        };
        Ok((keep(self.mapping_file)?, keep(self.triple_file)?))
    }
}
