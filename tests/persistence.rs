mod common;

use camino::Utf8PathBuf;
use fims_triplifier::config::{ConfigLoader, DEFAULT_GRAPH_INDEX};
use fims_triplifier::carryover::{count_attachments, fetch_ids, parse_fasta, upload_fasta};
use fims_triplifier::identifier::IdentifierAuthority;
use fims_triplifier::mapping::NoteReason;
use fims_triplifier::persistence::{DatasetPersistence, FilePersistence, TriplestorePersistence};
use fims_triplifier::rdf::Term;
use fims_triplifier::snapshot::MemorySnapshot;
use fims_triplifier::triplestore::MemoryTriplestore;
use fims_triplifier::vocab::SEQUENCE;
use tempfile::TempDir;

fn revision_without_s2() -> MemorySnapshot {
    let mut snapshot = MemorySnapshot::new();
    snapshot.insert_row(
        "Samples",
        [("materialSampleID", "S1"), ("phylum", "Echinodermata")],
    );
    snapshot
}

#[test]
fn fetch_before_upload_is_empty() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let store = MemoryTriplestore::new();
    let mut persistence =
        TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);

    let dataset = persistence.fetch_current().unwrap();
    assert!(dataset.is_empty());
    assert_eq!(dataset.columns.len(), 7);
}

#[test]
fn upload_registers_graph_and_fetches_rows() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let store = MemoryTriplestore::new();
    let mut persistence =
        TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);

    let receipt = persistence.upload(&common::snapshot()).unwrap();
    assert!(receipt.graph.starts_with("urn:uuid:"));
    assert_eq!(
        resolved.authority.dataset_graphs(1, "MOOREA").unwrap(),
        vec![receipt.graph.clone()]
    );
    assert!(store.graph(&receipt.graph).unwrap().is_some());

    let dataset = persistence.fetch_current().unwrap().clone();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.cell("S2", "phylum"), Some("Mollusca"));
    assert_eq!(dataset.cell("S1", "country"), Some("France"));
    // only root resources come back from the construct query
    assert_eq!(dataset.cell("S1", "locality"), None);

    // uploads leave nothing behind in the output folder
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn sequences_follow_identifiers_into_the_next_revision() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let store = MemoryTriplestore::new();
    let mut persistence =
        TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);

    let first = persistence.upload(&common::snapshot()).unwrap().graph;
    let sequences = parse_fasta(">S1\nACGT\n>S2\nTTTT\n").unwrap();
    upload_fasta(
        &store,
        &resolved.mapping,
        &persistence.project().identifiers,
        &first,
        &sequences,
    )
    .unwrap();

    let second = persistence.upload(&revision_without_s2()).unwrap().graph;
    let graph = store.graph(&second).unwrap().unwrap();
    let s1 = Term::iri("urn:x-biscicol:Sample:S1");
    let s2 = Term::iri("urn:x-biscicol:Sample:S2");
    assert_eq!(
        graph.objects(&s1, SEQUENCE).next(),
        Some(&Term::literal("ACGT"))
    );
    assert_eq!(graph.about(&s2).count(), 0);

    let dataset = persistence.fetch_current().unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.cell("S1", "sequence"), Some("ACGT"));

    let counts = count_attachments(
        &store,
        &[first.clone(), second.clone()],
        common::SAMPLE_CLASS,
        SEQUENCE,
    )
    .unwrap();
    assert_eq!(counts[&first].identifiers, 2);
    assert_eq!(counts[&first].attachments, 2);
    assert_eq!(counts[&second].identifiers, 1);
    assert_eq!(counts[&second].attachments, 1);

    let ids = fetch_ids(
        &store,
        &resolved.mapping,
        &persistence.project().identifiers,
        Some(&second),
    )
    .unwrap();
    assert_eq!(ids, vec!["S1".to_string()]);
}

#[test]
fn validate_reports_missing_default_sheet() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let store = MemoryTriplestore::new();
    let persistence =
        TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);

    assert!(persistence.validate(&common::snapshot()).unwrap().is_empty());

    let mut other = MemorySnapshot::new();
    other.insert_row("Events", [("locality", "Opunohu")]);
    let errors = persistence.validate(&other).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].reason, NoteReason::ConfigError { .. }));
}

#[test]
fn file_backend_keeps_one_file_per_revision() {
    let dir = TempDir::new().unwrap();
    let graphs = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let root = Utf8PathBuf::from_path_buf(graphs.path().to_path_buf()).unwrap();
    let mut persistence =
        FilePersistence::new(common::project(&resolved), &resolved.authority, root.clone());

    let first = persistence.upload(&common::snapshot()).unwrap();
    let second = persistence.upload(&revision_without_s2()).unwrap();
    assert_ne!(first.graph, second.graph);
    assert!(persistence.graph_path(&first.graph).exists());
    assert!(persistence.graph_path(&second.graph).starts_with(root.join("1").join("MOOREA")));

    let dataset = persistence.fetch_current().unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.cell("S1", "phylum"), Some("Echinodermata"));
}

#[test]
fn validate_reports_missing_entity_worksheets() {
    let dir = TempDir::new().unwrap();
    let resolved = common::two_sheets(&dir);
    let store = MemoryTriplestore::new();
    let persistence =
        TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);

    let mut samples_only = MemorySnapshot::new();
    samples_only.insert_row("Samples", [("materialSampleID", "S1"), ("status", "alive")]);
    let errors = persistence.validate(&samples_only).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].subject, "Events_eventID_Event");
    assert!(matches!(
        &errors[0].reason,
        NoteReason::ConfigError { message } if message.contains("Events")
    ));

    samples_only.insert_row("Events", [("eventID", "E1"), ("status", "planned")]);
    assert!(persistence.validate(&samples_only).unwrap().is_empty());
}

#[test]
fn uploads_are_seen_by_a_fresh_process() {
    let dir = TempDir::new().unwrap();
    let config_path = common::write_config(&dir);
    let store = MemoryTriplestore::new();

    let graph = {
        let resolved = ConfigLoader::resolve(config_path.to_str()).unwrap();
        let mut persistence =
            TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);
        persistence.upload(&common::snapshot()).unwrap().graph
    };
    assert!(dir.path().join(DEFAULT_GRAPH_INDEX).exists());

    let resolved = ConfigLoader::resolve(config_path.to_str()).unwrap();
    assert_eq!(
        resolved.authority.dataset_graphs(1, "MOOREA").unwrap(),
        vec![graph.clone()]
    );
    let mut persistence =
        TriplestorePersistence::new(common::project(&resolved), &store, &resolved.authority);
    assert_eq!(persistence.fetch_current().unwrap().len(), 2);

    // the next upload carries on from the recorded graph
    let next = persistence.upload(&revision_without_s2()).unwrap().graph;
    let reloaded = ConfigLoader::resolve(config_path.to_str()).unwrap();
    assert_eq!(
        reloaded.authority.dataset_graphs(1, "MOOREA").unwrap(),
        vec![next, graph]
    );
}

#[test]
fn file_backend_history_survives_a_fresh_process() {
    let dir = TempDir::new().unwrap();
    let graphs = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(graphs.path().to_path_buf()).unwrap();

    let first = {
        let resolved = common::resolved(&dir);
        let mut persistence =
            FilePersistence::new(common::project(&resolved), &resolved.authority, root.clone());
        persistence.upload(&common::snapshot()).unwrap().graph
    };

    let resolved = common::resolved(&dir);
    let mut persistence =
        FilePersistence::new(common::project(&resolved), &resolved.authority, root.clone());
    assert_eq!(persistence.stored_graphs().unwrap(), vec![first]);
    assert_eq!(persistence.fetch_current().unwrap().len(), 2);
}
