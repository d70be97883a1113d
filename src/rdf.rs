//! RDF terms, triples and ordered triple sets.
//!
//! Terms convert to and from `oxrdf`; parsing and serialization go through
//! `oxttl`. Triple sets are kept ordered so that serialization is
//! byte-identical for identical inputs.

use std::collections::BTreeSet;
use std::fmt;

use oxrdf::vocab::xsd;
use oxrdf::{BlankNode, Literal, LiteralRef, NamedNode, Subject};
use oxttl::{NTriplesParser, NTriplesSerializer, TurtleParser};

use crate::error::{FimsError, FimsResult};
use crate::vocab::rdf;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// A typed literal; `xsd:string` is the simple literal's datatype and is
    /// not stored.
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        Term::Literal {
            value: value.into(),
            datatype: (datatype != xsd::STRING.as_str()).then_some(datatype),
            language: None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// The lexical form: IRI text, blank node label or literal value.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::BlankNode(label) => label,
            Term::Literal { value, .. } => value,
        }
    }

    pub fn to_oxrdf(&self) -> oxrdf::Term {
        match self {
            Term::Iri(iri) => NamedNode::new_unchecked(iri.as_str()).into(),
            Term::BlankNode(label) => BlankNode::new_unchecked(label.as_str()).into(),
            Term::Literal {
                value,
                datatype,
                language,
            } => match (language, datatype) {
                (Some(language), _) => Literal::new_language_tagged_literal_unchecked(
                    value.as_str(),
                    language.as_str(),
                ),
                (None, Some(datatype)) => Literal::new_typed_literal(
                    value.as_str(),
                    NamedNode::new_unchecked(datatype.as_str()),
                ),
                (None, None) => Literal::new_simple_literal(value.as_str()),
            }
            .into(),
        }
    }

    fn to_subject(&self) -> FimsResult<Subject> {
        match self {
            Term::Iri(iri) => Ok(NamedNode::new_unchecked(iri.as_str()).into()),
            Term::BlankNode(label) => Ok(BlankNode::new_unchecked(label.as_str()).into()),
            Term::Literal { value, .. } => Err(FimsError::InvalidTriple(format!(
                "literal {} in subject position",
                quoted(value)
            ))),
        }
    }
}

impl From<oxrdf::Term> for Term {
    fn from(term: oxrdf::Term) -> Self {
        match term {
            oxrdf::Term::NamedNode(node) => Term::Iri(node.into_string()),
            oxrdf::Term::BlankNode(node) => Term::BlankNode(node.into_string()),
            oxrdf::Term::Literal(literal) => literal.into(),
        }
    }
}

impl From<Subject> for Term {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::NamedNode(node) => Term::Iri(node.into_string()),
            Subject::BlankNode(node) => Term::BlankNode(node.into_string()),
        }
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        let language = literal.language().map(str::to_string);
        let datatype = (language.is_none() && literal.datatype() != xsd::STRING)
            .then(|| literal.datatype().as_str().to_string());
        Term::Literal {
            value: literal.value().to_string(),
            datatype,
            language,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_oxrdf(), f)
    }
}

/// A string as a quoted, escaped literal in N-Triples, Turtle and SPARQL
/// syntax.
pub fn quoted(value: &str) -> String {
    LiteralRef::new_simple_literal(value).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    pub fn to_oxrdf(&self) -> FimsResult<oxrdf::Triple> {
        Ok(oxrdf::Triple::new(
            self.subject.to_subject()?,
            NamedNode::new_unchecked(self.predicate.as_str()),
            self.object.to_oxrdf(),
        ))
    }
}

impl From<oxrdf::Triple> for Triple {
    fn from(triple: oxrdf::Triple) -> Self {
        Self {
            subject: triple.subject.into(),
            predicate: triple.predicate.into_string(),
            object: triple.object.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleSet {
    triples: BTreeSet<Triple>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn retain<F: FnMut(&Triple) -> bool>(&mut self, keep: F) {
        self.triples.retain(keep);
    }

    pub fn union_with(&mut self, other: &TripleSet) {
        self.triples.extend(other.triples.iter().cloned());
    }

    /// Distinct subjects typed with `class`, in term order.
    pub fn subjects_of_type(&self, class: &str) -> BTreeSet<&Term> {
        self.triples
            .iter()
            .filter(|triple| {
                triple.predicate == rdf::TYPE && triple.object.as_iri() == Some(class)
            })
            .map(|triple| &triple.subject)
            .collect()
    }

    pub fn about<'a>(&'a self, subject: &'a Term) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples
            .iter()
            .filter(move |triple| &triple.subject == subject)
    }

    pub fn objects<'a>(
        &'a self,
        subject: &'a Term,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.about(subject)
            .filter(move |triple| triple.predicate == predicate)
            .map(|triple| &triple.object)
    }

    pub fn has_type(&self, subject: &Term, class: &str) -> bool {
        self.objects(subject, rdf::TYPE)
            .any(|object| object.as_iri() == Some(class))
    }

    pub fn to_ntriples(&self) -> FimsResult<String> {
        let mut serializer = NTriplesSerializer::new().for_writer(Vec::new());
        for triple in &self.triples {
            serializer
                .serialize_triple(&triple.to_oxrdf()?)
                .map_err(|err| FimsError::InvalidTriple(err.to_string()))?;
        }
        String::from_utf8(serializer.finish())
            .map_err(|err| FimsError::InvalidTriple(err.to_string()))
    }

    pub fn from_ntriples(text: &str) -> FimsResult<Self> {
        NTriplesParser::new()
            .for_slice(text.as_bytes())
            .map(|parsed| {
                parsed
                    .map(Triple::from)
                    .map_err(|err| FimsError::RdfSyntax(err.to_string()))
            })
            .collect()
    }

    /// Reads Turtle, which covers post-processed triple files with their
    /// prefix header.
    pub fn from_turtle(text: &str) -> FimsResult<Self> {
        TurtleParser::new()
            .for_slice(text.as_bytes())
            .map(|parsed| {
                parsed
                    .map(Triple::from)
                    .map_err(|err| FimsError::RdfSyntax(err.to_string()))
            })
            .collect()
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl Extend<Triple> for TripleSet {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter);
    }
}

impl IntoIterator for TripleSet {
    type Item = Triple;
    type IntoIter = std::collections::btree_set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turtle_reader_accepts_prefix_header() {
        let text = "@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .\n\
                    <urn:a> <urn:p> \"x \\\"quoted\\\"\" .\n\
                    _:b1 <urn:p> \"5\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n";
        let set = TripleSet::from_turtle(text).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Triple::new(
            Term::iri("urn:a"),
            "urn:p",
            Term::literal("x \"quoted\"")
        )));
        assert!(set.contains(&Triple::new(
            Term::blank("b1"),
            "urn:p",
            Term::typed("5", "http://www.w3.org/2001/XMLSchema#integer")
        )));
    }

    #[test]
    fn blank_node_labels_may_contain_dots() {
        let set = TripleSet::from_ntriples("_:a.b <urn:p> \"x\" .\n").unwrap();
        assert!(set.contains(&Triple::new(
            Term::blank("a.b"),
            "urn:p",
            Term::literal("x")
        )));
    }

    #[test]
    fn serialization_is_ordered() {
        let mut set = TripleSet::new();
        set.insert(Triple::new(Term::iri("urn:b"), "urn:p", Term::literal("2")));
        set.insert(Triple::new(Term::iri("urn:a"), "urn:p", Term::literal("1")));
        assert_eq!(
            set.to_ntriples().unwrap(),
            "<urn:a> <urn:p> \"1\" .\n<urn:b> <urn:p> \"2\" .\n"
        );
    }

    #[test]
    fn literals_keep_language_and_escapes() {
        let mut set = TripleSet::new();
        set.insert(Triple::new(
            Term::iri("urn:a"),
            "urn:p",
            Term::Literal {
                value: "line\none".to_string(),
                datatype: None,
                language: Some("en".to_string()),
            },
        ));
        let text = set.to_ntriples().unwrap();
        assert_eq!(TripleSet::from_ntriples(&text).unwrap(), set);
        assert_eq!(quoted("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn rejects_literal_subject() {
        let err = TripleSet::from_ntriples("\"a\" <urn:p> <urn:o> .").unwrap_err();
        assert!(matches!(err, FimsError::RdfSyntax(_)));

        let set = TripleSet::from_iter([Triple::new(
            Term::literal("a"),
            "urn:p",
            Term::iri("urn:o"),
        )]);
        assert!(matches!(set.to_ntriples(), Err(FimsError::InvalidTriple(_))));
    }
}
