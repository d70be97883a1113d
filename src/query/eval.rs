//! Evaluation of query IR over in-memory graphs, with the same semantics the
//! rendered SPARQL has on the triplestore.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::error::{FimsError, FimsResult};
use crate::query::builder::ConstructQuery;
use crate::query::filter::{FilterCondition, validate_filters};
use crate::rdf::{Term, TripleSet};

enum Matcher<'a> {
    AnyProperty(Regex),
    Property { property: &'a str, value: &'a str },
}

impl Matcher<'_> {
    /// `str(?o)` has no value for a blank node, so blank objects never match.
    fn matches(&self, triples: &TripleSet, subject: &Term) -> bool {
        match self {
            Matcher::AnyProperty(pattern) => triples
                .about(subject)
                .filter(|triple| !triple.object.is_blank())
                .any(|triple| pattern.is_match(triple.object.lexical())),
            Matcher::Property { property, value } => triples
                .objects(subject, property)
                .filter(|object| !object.is_blank())
                .any(|object| object.lexical() == *value),
        }
    }
}

fn matchers(filters: &[FilterCondition]) -> FimsResult<Vec<Matcher<'_>>> {
    validate_filters(filters)?;
    filters
        .iter()
        .map(|filter| match &filter.property {
            None => Regex::new(&filter.value)
                .map(Matcher::AnyProperty)
                .map_err(|err| FimsError::InvalidFilterPattern {
                    pattern: filter.value.clone(),
                    message: err.to_string(),
                }),
            Some(property) => Ok(Matcher::Property {
                property,
                value: &filter.value,
            }),
        })
        .collect()
}

/// Every triple about a `root_class` subject that satisfies all filters.
pub fn filter_graph(
    triples: &TripleSet,
    root_class: &str,
    filters: &[FilterCondition],
) -> FimsResult<TripleSet> {
    let matchers = matchers(filters)?;
    let mut out = TripleSet::new();
    for subject in triples.subjects_of_type(root_class) {
        if matchers.iter().all(|matcher| matcher.matches(triples, subject)) {
            out.extend(triples.about(subject).cloned());
        }
    }
    Ok(out)
}

/// Union of the named graphs, then [`filter_graph`]. Graphs not present
/// contribute nothing, as with `FROM` on the triplestore.
pub fn evaluate_construct(
    query: &ConstructQuery,
    graphs: &BTreeMap<String, TripleSet>,
) -> FimsResult<TripleSet> {
    let mut union = TripleSet::new();
    for name in &query.graphs {
        match graphs.get(name) {
            Some(graph) => union.union_with(graph),
            None => debug!(graph = %name, "graph not present"),
        }
    }
    filter_graph(&union, &query.root_class, query.filters())
}
