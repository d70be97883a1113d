use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::FimsError;
use crate::identifier::{DEFAULT_NAMESPACE, GraphIndex, StaticAuthority};

pub use crate::identifier::GraphEntry;
use crate::schema::{Mapping, Validation};
use crate::vocab::{DEFAULT_TRIPLE_PREFIXES, rdfs};

pub const DEFAULT_CONFIG_FILE: &str = "fims.json";
/// Graph index written beside the config file unless `graphIndex` names one.
pub const DEFAULT_GRAPH_INDEX: &str = "fims-graphs.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: SettingsEntry,
    pub mapping: Mapping,
    #[serde(default)]
    pub validation: Validation,
    /// Minted identifier prefixes by concept alias.
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    #[serde(default)]
    pub graphs: Vec<GraphEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsEntry {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub prefixes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub ontology: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub defined_by_property: Option<String>,
    #[serde(default)]
    pub root_class: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub output_folder: Option<String>,
    #[serde(default)]
    pub graph_index: Option<String>,
}

/// Run-wide settings, passed explicitly to every component that needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub namespace: String,
    pub service: Option<String>,
    pub prefixes: BTreeMap<String, String>,
    pub ontology: Option<String>,
    pub imports: Vec<String>,
    pub defined_by_property: String,
    pub root_class: String,
    pub timeout: Option<Duration>,
    pub output_folder: Utf8PathBuf,
    /// Where uploaded graphs are recorded; `None` keeps them in memory.
    pub graph_index: Option<Utf8PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service: None,
            prefixes: default_prefixes(),
            ontology: None,
            imports: Vec::new(),
            defined_by_property: rdfs::IS_DEFINED_BY.to_string(),
            root_class: rdfs::RESOURCE.to_string(),
            timeout: None,
            output_folder: Utf8PathBuf::from("."),
            graph_index: None,
        }
    }
}

pub fn default_prefixes() -> BTreeMap<String, String> {
    DEFAULT_TRIPLE_PREFIXES
        .iter()
        .map(|(prefix, namespace)| (prefix.to_string(), namespace.to_string()))
        .collect()
}

#[derive(Debug)]
pub struct ResolvedConfig {
    pub settings: Settings,
    pub mapping: Mapping,
    pub validation: Validation,
    pub authority: StaticAuthority,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FimsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(FimsError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FimsError::ConfigRead(config_path.clone()))?;
        let mut config: Config = serde_json::from_str(&content)
            .map_err(|err| FimsError::ConfigParse(err.to_string()))?;
        if config.settings.graph_index.is_none() {
            let dir = config_path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            config.settings.graph_index =
                Some(dir.join(DEFAULT_GRAPH_INDEX).to_string_lossy().into_owned());
        }

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FimsError> {
        let entry = config.settings;
        let defaults = Settings::default();

        let namespace = entry
            .namespace
            .filter(|namespace| !namespace.trim().is_empty())
            .unwrap_or(defaults.namespace);
        if namespace.contains(char::is_whitespace) {
            return Err(FimsError::ConfigParse(format!(
                "namespace must not contain whitespace: {namespace:?}"
            )));
        }

        for entity in &config.mapping.entities {
            if entity.concept_alias.trim().is_empty() {
                return Err(FimsError::ConfigParse(format!(
                    "entity on worksheet {:?} has no conceptAlias",
                    entity.worksheet
                )));
            }
        }

        let settings = Settings {
            namespace,
            service: entry
                .service
                .map(|service| service.trim_end_matches('/').to_string()),
            prefixes: entry.prefixes.unwrap_or(defaults.prefixes),
            ontology: entry.ontology,
            imports: entry.imports,
            defined_by_property: entry
                .defined_by_property
                .unwrap_or(defaults.defined_by_property),
            root_class: entry.root_class.unwrap_or(defaults.root_class),
            timeout: entry.timeout_secs.map(Duration::from_secs),
            output_folder: entry
                .output_folder
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_folder),
            graph_index: entry.graph_index.map(Utf8PathBuf::from),
        };

        let mut authority = config.graphs.into_iter().fold(
            StaticAuthority::new(config.identifiers),
            |authority, entry| authority.with_graphs(entry.project_id, &entry.expedition_code, entry.graphs),
        );
        if let Some(path) = &settings.graph_index {
            authority = authority.with_index(GraphIndex::new(path.clone()))?;
        }

        Ok(ResolvedConfig {
            settings,
            mapping: config.mapping,
            validation: config.validation,
            authority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::IdentifierAuthority;

    fn config(settings: SettingsEntry) -> Config {
        Config {
            settings,
            mapping: Mapping {
                default_sheet: "Samples".to_string(),
                entities: Vec::new(),
                relations: Vec::new(),
            },
            validation: Validation::default(),
            identifiers: BTreeMap::new(),
            graphs: vec![GraphEntry {
                project_id: 1,
                expedition_code: "TEST".to_string(),
                graphs: vec!["urn:uuid:g1".to_string()],
            }],
        }
    }

    #[test]
    fn settings_defaults() {
        let resolved = ConfigLoader::resolve_config(config(SettingsEntry::default())).unwrap();
        assert_eq!(resolved.settings.namespace, "biscicol");
        assert_eq!(resolved.settings.root_class, rdfs::RESOURCE);
        assert_eq!(resolved.settings.defined_by_property, rdfs::IS_DEFINED_BY);
        assert!(resolved.settings.prefixes.contains_key("dwc"));
        assert_eq!(
            resolved.authority.dataset_graphs(1, "TEST").unwrap(),
            vec!["urn:uuid:g1".to_string()]
        );
    }

    #[test]
    fn service_url_is_normalized() {
        let resolved = ConfigLoader::resolve_config(config(SettingsEntry {
            service: Some("http://localhost:3030/fims/".to_string()),
            timeout_secs: Some(30),
            ..SettingsEntry::default()
        }))
        .unwrap();
        assert_eq!(
            resolved.settings.service.as_deref(),
            Some("http://localhost:3030/fims")
        );
        assert_eq!(resolved.settings.timeout, Some(Duration::from_secs(30)));
    }
}
