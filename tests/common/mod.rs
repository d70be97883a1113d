#![allow(dead_code)]

use std::path::PathBuf;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use fims_triplifier::config::{Config, ConfigLoader, ResolvedConfig};
use fims_triplifier::identifier::ExpeditionContext;
use fims_triplifier::persistence::Project;
use fims_triplifier::snapshot::MemorySnapshot;

pub const SAMPLE_CLASS: &str = "http://purl.obolibrary.org/obo/OBI_0000747";
pub const EVENT_CLASS: &str = "http://rs.tdwg.org/dwc/terms/Event";
pub const FRANCE: &str = "http://sws.geonames.org/3017382/";

pub const CONFIG: &str = r#"{
  "settings": {
    "rootClass": "http://purl.obolibrary.org/obo/OBI_0000747"
  },
  "mapping": {
    "defaultSheet": "Samples",
    "entities": [
      {
        "worksheet": "Samples",
        "uniqueKey": "materialSampleID",
        "conceptURI": "http://purl.obolibrary.org/obo/OBI_0000747",
        "conceptAlias": "Sample",
        "attributes": [
          { "column": "materialSampleID", "uri": "urn:materialSampleID" },
          { "column": "phylum", "uri": "urn:phylum" },
          { "column": "country", "uri": "urn:country", "list": "countries" },
          {
            "column": "yearCollected,monthCollected,dayCollected",
            "uri": "urn:eventDate",
            "combine": "ymd"
          },
          { "column": "A,B,C", "uri": "urn:abc", "combine": "all" },
          { "column": "sequence", "uri": "urn:sequence" }
        ]
      },
      {
        "worksheet": "Samples",
        "uniqueKey": "localityBNODE",
        "conceptURI": "http://rs.tdwg.org/dwc/terms/Event",
        "conceptAlias": "Event",
        "attributes": [
          { "column": "locality", "uri": "urn:locality" }
        ]
      }
    ],
    "relations": [
      {
        "subject": "Sample",
        "predicate": "http://purl.obolibrary.org/obo/BFO_0000050",
        "object": "Event"
      }
    ]
  },
  "validation": {
    "lists": [
      {
        "alias": "countries",
        "fields": [
          { "value": "France", "definedBy": "http://sws.geonames.org/3017382/" }
        ]
      }
    ]
  }
}"#;

/// Samples and collecting events on separate worksheets, each with its own
/// `status` vocabulary.
pub const TWO_SHEET_CONFIG: &str = r#"{
  "settings": {
    "rootClass": "http://purl.obolibrary.org/obo/OBI_0000747"
  },
  "mapping": {
    "defaultSheet": "Samples",
    "entities": [
      {
        "worksheet": "Samples",
        "uniqueKey": "materialSampleID",
        "conceptURI": "http://purl.obolibrary.org/obo/OBI_0000747",
        "conceptAlias": "Sample",
        "attributes": [
          { "column": "materialSampleID", "uri": "urn:materialSampleID" },
          { "column": "status", "uri": "urn:sampleStatus", "list": "sampleStatus" }
        ]
      },
      {
        "worksheet": "Events",
        "uniqueKey": "eventID",
        "conceptURI": "http://rs.tdwg.org/dwc/terms/Event",
        "conceptAlias": "Event",
        "attributes": [
          { "column": "eventID", "uri": "urn:eventID" },
          { "column": "status", "uri": "urn:eventStatus", "list": "eventStatus" }
        ]
      }
    ]
  },
  "validation": {
    "lists": [
      {
        "alias": "sampleStatus",
        "fields": [{ "value": "alive", "definedBy": "urn:vocab:alive" }]
      },
      {
        "alias": "eventStatus",
        "fields": [{ "value": "planned", "definedBy": "urn:vocab:planned" }]
      }
    ]
  }
}"#;

/// Writes the fixture configuration to `dir/fims.json`, with `dir` as its
/// output folder.
pub fn write_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fims.json");
    let config = CONFIG.replace(
        "\"rootClass\"",
        &format!("\"outputFolder\": \"{}\",\n    \"rootClass\"", dir.path().display()),
    );
    std::fs::write(&path, config).unwrap();
    path
}

pub fn two_sheets(dir: &TempDir) -> ResolvedConfig {
    let config: Config = serde_json::from_str(TWO_SHEET_CONFIG).unwrap();
    let mut resolved = ConfigLoader::resolve_config(config).unwrap();
    resolved.settings.output_folder = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    resolved
}

/// The fixture configuration with its output folder pointed at `dir`.
pub fn resolved(dir: &TempDir) -> ResolvedConfig {
    let config: Config = serde_json::from_str(CONFIG).unwrap();
    let mut resolved = ConfigLoader::resolve_config(config).unwrap();
    resolved.settings.output_folder = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    resolved
}

pub fn project(resolved: &ResolvedConfig) -> Project<'_> {
    Project::resolve(
        &resolved.settings,
        &resolved.mapping,
        &resolved.validation,
        &resolved.authority,
        ExpeditionContext::new(1, "MOOREA"),
    )
    .unwrap()
}

pub fn snapshot() -> MemorySnapshot {
    MemorySnapshot::from_json_str(
        r#"{
          "tables": {
            "Samples": [
              {
                "materialSampleID": "S1",
                "phylum": "Echinodermata",
                "country": "France",
                "yearCollected": "2020",
                "monthCollected": "3",
                "dayCollected": "15",
                "A": "a", "B": "b", "C": "c",
                "locality": "Cook's Bay"
              },
              {
                "materialSampleID": "S2",
                "phylum": "Mollusca",
                "country": "Narnia",
                "yearCollected": "2021",
                "monthCollected": "",
                "dayCollected": "7",
                "A": "a", "B": null, "C": "c",
                "locality": "Cook's Bay"
              },
              {
                "materialSampleID": "",
                "phylum": "Cnidaria",
                "locality": "Opunohu"
              }
            ]
          }
        }"#,
    )
    .unwrap()
}
