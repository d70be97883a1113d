mod common;

use assert_matches::assert_matches;
use fims_triplifier::error::FimsError;
use fims_triplifier::rdf::Term;
use fims_triplifier::snapshot::MemorySnapshot;
use fims_triplifier::vocab::{owl, rdf, rdfs};
use tempfile::TempDir;

#[test]
fn reconstruction_reproduces_row_values() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let project = common::project(&resolved);

    let run = project
        .triplifier()
        .run(&common::snapshot(), "MOOREA_output")
        .unwrap();
    let model = project.reconstructor().reconstruct(&run.triples);
    run.cleanup();

    assert_eq!(
        model.columns,
        vec![
            "materialSampleID",
            "phylum",
            "country",
            "yearCollected,monthCollected,dayCollected",
            "A,B,C",
            "sequence",
            "locality",
        ]
    );
    assert_eq!(model.len(), 2);

    assert_eq!(model.cell("S1", "materialSampleID"), Some("S1"));
    assert_eq!(model.cell("S1", "phylum"), Some("Echinodermata"));
    assert_eq!(model.cell("S1", "country"), Some("France"));
    assert_eq!(
        model.cell("S1", "yearCollected,monthCollected,dayCollected"),
        Some("2020-03-15")
    );
    assert_eq!(model.cell("S1", "A,B,C"), Some("a-b-c"));
    assert_eq!(model.cell("S1", "locality"), Some("Cook's Bay"));

    // month gap drops the day; one missing part drops the joined value
    assert_eq!(
        model.cell("S2", "yearCollected,monthCollected,dayCollected"),
        Some("2021")
    );
    assert_eq!(model.cell("S2", "A,B,C"), None);
    // a value outside the vocabulary comes back from its label
    assert_eq!(model.cell("S2", "country"), Some("Narnia"));
}

#[test]
fn identical_blank_node_values_collapse() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let project = common::project(&resolved);

    let run = project
        .triplifier()
        .run(&common::snapshot(), "MOOREA_output")
        .unwrap();
    let events = run.triples.subjects_of_type(common::EVENT_CLASS);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| matches!(event, Term::BlankNode(_))));

    let s1 = Term::iri("urn:x-biscicol:Sample:S1");
    let s2 = Term::iri("urn:x-biscicol:Sample:S2");
    let part_of = "http://purl.obolibrary.org/obo/BFO_0000050";
    let event_of = |sample: &Term| run.triples.objects(sample, part_of).next().cloned();
    assert!(event_of(&s1).is_some());
    assert_eq!(event_of(&s1), event_of(&s2));
    run.cleanup();
}

#[test]
fn property_declarations_are_typed_once() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let project = common::project(&resolved);

    let run = project
        .triplifier()
        .run(&common::snapshot(), "MOOREA_output")
        .unwrap();
    let phylum = Term::iri("urn:phylum");
    let part_of = Term::iri("http://purl.obolibrary.org/obo/BFO_0000050");

    assert!(run.triples.has_type(&phylum, rdf::PROPERTY));
    assert!(run.triples.has_type(&phylum, owl::DATATYPE_PROPERTY));
    assert_eq!(
        run.triples
            .objects(&phylum, rdfs::IS_DEFINED_BY)
            .next()
            .and_then(Term::as_iri),
        Some("urn:phylum")
    );
    assert!(run.triples.has_type(&part_of, owl::OBJECT_PROPERTY));
    assert!(!run.triples.has_type(&part_of, rdf::PROPERTY));
    run.cleanup();
}

#[test]
fn temporary_files_are_removed_or_kept() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let project = common::project(&resolved);

    let run = project
        .triplifier()
        .run(&common::snapshot(), "MOOREA_output")
        .unwrap();
    let mapping_path = run.mapping_path().to_path_buf();
    let triple_path = run.triple_path().to_path_buf();
    let mapping_name = mapping_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(mapping_name.starts_with("MOOREA_output.mapping."));
    assert!(mapping_name.ends_with(".n3"));
    assert!(triple_path.extension().is_some_and(|ext| ext == "ttl"));
    run.cleanup();
    assert!(!mapping_path.exists());
    assert!(!triple_path.exists());

    let run = project
        .triplifier()
        .run(&common::snapshot(), "MOOREA_output")
        .unwrap();
    let (mapping, triples) = run.persist().unwrap();
    assert!(mapping.exists());
    let content = std::fs::read_to_string(triples.as_std_path()).unwrap();
    assert!(content.starts_with("@prefix "));
}

#[test]
fn empty_snapshot_is_fatal() {
    let dir = TempDir::new().unwrap();
    let resolved = common::resolved(&dir);
    let project = common::project(&resolved);

    let result = project.triplifier().run(&MemorySnapshot::new(), "MOOREA_output");
    assert_matches!(result, Err(FimsError::NoTriples));
}

#[test]
fn each_sheet_translates_with_its_own_vocabulary() {
    let dir = TempDir::new().unwrap();
    let resolved = common::two_sheets(&dir);
    let project = common::project(&resolved);

    let mut snapshot = MemorySnapshot::new();
    snapshot.insert_row("Samples", [("materialSampleID", "S1"), ("status", "alive")]);
    snapshot.insert_row("Events", [("eventID", "E1"), ("status", "planned")]);
    let run = project.triplifier().run(&snapshot, "MOOREA_output").unwrap();

    let s1 = Term::iri("urn:x-biscicol:Sample:S1");
    let e1 = Term::iri("urn:x-biscicol:Event:E1");
    assert_eq!(
        run.triples.objects(&s1, "urn:sampleStatus").collect::<Vec<_>>(),
        vec![&Term::iri("urn:vocab:alive")]
    );
    assert_eq!(
        run.triples.objects(&e1, "urn:eventStatus").collect::<Vec<_>>(),
        vec![&Term::iri("urn:vocab:planned")]
    );
    run.cleanup();
}
