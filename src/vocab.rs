//! Vocabulary IRIs used by the triplifier and the query layer.

/// RDF vocabulary constants
pub mod rdf {
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    /// rdf:type IRI
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    /// rdf:Property IRI, the generic typing the evaluator gives every predicate
    pub const PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
}

/// RDFS vocabulary constants
pub mod rdfs {
    pub const NS: &str = "http://www.w3.org/2000/01/rdf-schema#";

    /// rdfs:Resource IRI, the class reconstruction starts from
    pub const RESOURCE: &str = "http://www.w3.org/2000/01/rdf-schema#Resource";

    /// rdfs:comment IRI, carries the raw literal of a translated attribute
    pub const COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";

    /// rdfs:isDefinedBy IRI
    pub const IS_DEFINED_BY: &str = "http://www.w3.org/2000/01/rdf-schema#isDefinedBy";
}

/// OWL vocabulary constants
pub mod owl {
    pub const NS: &str = "http://www.w3.org/2002/07/owl#";

    pub const OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";

    pub const DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";

    pub const IMPORTS: &str = "http://www.w3.org/2002/07/owl#imports";
}

/// XSD vocabulary constants
pub mod xsd {
    pub const NS: &str = "http://www.w3.org/2001/XMLSchema#";

    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
}

/// D2RQ mapping language namespace
pub mod d2rq {
    pub const NS: &str = "http://www.wiwiss.fu-berlin.de/suhl/bizer/D2RQ/0.1#";

    pub const JDBC_NS: &str = "http://d2rq.org/terms/jdbc/";
}

/// Predicate linking an identifier to its biological sequence.
pub const SEQUENCE: &str = "urn:sequence";

/// Prefixes written at the top of every generated mapping file.
pub const MAPPING_PREFIXES: &[(&str, &str)] = &[
    ("map", ""),
    ("rdf", rdf::NS),
    ("rdfs", rdfs::NS),
    ("xsd", xsd::NS),
    ("d2rq", d2rq::NS),
    ("jdbc", d2rq::JDBC_NS),
    ("ro", "http://www.obofoundry.org/ro/ro.owl#"),
    ("bsc", "http://biscicol.org/terms/index.html#"),
    ("urn", "http://biscicol.org/terms/index.html#"),
    ("ark", "http://biscicol.org/id/ark:"),
];

/// Prefixes written at the top of every triple file unless configured otherwise.
pub const DEFAULT_TRIPLE_PREFIXES: &[(&str, &str)] = &[
    ("rdf", rdf::NS),
    ("rdfs", rdfs::NS),
    ("ark", "http://biscicol.org/id/ark:"),
    ("owl", owl::NS),
    ("dwc", "http://rs.tdwg.org/dwc/terms/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("obo", "http://purl.obolibrary.org/obo/"),
];
