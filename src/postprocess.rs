//! Rewrites applied to evaluated triples before they are written out.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::error::FimsResult;
use crate::rdf::{Term, Triple, TripleSet};
use crate::vocab::{DEFAULT_TRIPLE_PREFIXES, owl, rdf};

#[derive(Debug, Clone)]
pub struct PostProcessor {
    prefixes: Vec<(String, String)>,
    ontology: Option<String>,
    imports: Vec<String>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_TRIPLE_PREFIXES
                .iter()
                .map(|(prefix, namespace)| (prefix.to_string(), namespace.to_string()))
                .collect(),
            ontology: None,
            imports: Vec::new(),
        }
    }
}

impl PostProcessor {
    pub fn new<I, K, V>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|(prefix, namespace)| (prefix.into(), namespace.into()))
                .collect(),
            ontology: None,
            imports: Vec::new(),
        }
    }

    pub fn with_imports(mut self, ontology: impl Into<String>, imports: Vec<String>) -> Self {
        self.ontology = Some(ontology.into());
        self.imports = imports;
        self
    }

    /// Drops the generic `rdf:Property` typing of every predicate that is also
    /// typed `owl:ObjectProperty`, and adds the ontology imports.
    pub fn process(&self, mut triples: TripleSet) -> TripleSet {
        let object_properties: BTreeSet<Term> = triples
            .iter()
            .filter(|triple| {
                triple.predicate == rdf::TYPE
                    && triple.object.as_iri() == Some(owl::OBJECT_PROPERTY)
            })
            .map(|triple| triple.subject.clone())
            .collect();
        triples.retain(|triple| {
            !(triple.predicate == rdf::TYPE
                && triple.object.as_iri() == Some(rdf::PROPERTY)
                && object_properties.contains(&triple.subject))
        });

        if let Some(ontology) = &self.ontology {
            for import in &self.imports {
                triples.insert(Triple::new(
                    Term::iri(ontology.as_str()),
                    owl::IMPORTS,
                    Term::iri(import.as_str()),
                ));
            }
        }
        triples
    }

    /// Turtle text: prefix declarations followed by the triples, one per line.
    pub fn serialize(&self, triples: &TripleSet) -> FimsResult<String> {
        let mut out = String::new();
        for (prefix, namespace) in &self.prefixes {
            let _ = writeln!(out, "@prefix {prefix}: <{namespace}> .");
        }
        out.push('\n');
        out.push_str(&triples.to_ntriples()?);
        Ok(out)
    }
}
