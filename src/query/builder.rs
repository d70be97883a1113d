//! Query IR for the triplestore, rendered to SPARQL text on demand.

use std::fmt::Write as _;

use crate::error::FimsResult;
use crate::query::filter::{FilterCondition, validate_filters};
use crate::rdf::quoted;
use crate::vocab::rdf;

/// `CONSTRUCT {?s ?p ?o}` over the union of `graphs`, restricted to
/// subjects typed `root_class` and matching every filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructQuery {
    pub graphs: Vec<String>,
    pub root_class: String,
    filters: Vec<FilterCondition>,
}

impl ConstructQuery {
    pub fn new(graphs: Vec<String>, root_class: impl Into<String>) -> Self {
        Self {
            graphs,
            root_class: root_class.into(),
            filters: Vec::new(),
        }
    }

    /// Adds filters, refusing OR/NOT before anything is sent.
    pub fn with_filters(mut self, filters: Vec<FilterCondition>) -> FimsResult<Self> {
        validate_filters(&filters)?;
        self.filters.extend(filters);
        Ok(self)
    }

    pub fn filters(&self) -> &[FilterCondition] {
        &self.filters
    }

    pub fn to_sparql(&self) -> String {
        let mut out = String::from("CONSTRUCT { ?s ?p ?o }\n");
        from_clauses(&mut out, &self.graphs);
        out.push_str("WHERE {\n");
        let _ = writeln!(out, "\t?s a <{}> .", self.root_class);
        out.push_str("\t?s ?p ?o .\n");
        for (idx, filter) in self.filters.iter().enumerate() {
            let n = idx + 1;
            match &filter.property {
                None => {
                    let _ = writeln!(out, "\t?s ?propertyFilter{n} ?objectFilter{n} .");
                    let _ = writeln!(
                        out,
                        "\tFILTER regex(str(?objectFilter{n}), {})",
                        quoted(&filter.value)
                    );
                }
                Some(property) => {
                    let _ = writeln!(out, "\t?s <{property}> ?objectFilter{n} .");
                    let _ = writeln!(
                        out,
                        "\tFILTER (str(?objectFilter{n}) = {})",
                        quoted(&filter.value)
                    );
                }
            }
        }
        out.push('}');
        out
    }
}

/// Per-graph counts of typed resources and of resources carrying `attachment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountQuery {
    pub graphs: Vec<String>,
    pub type_class: String,
    pub attachment: String,
}

impl CountQuery {
    pub fn to_sparql(&self) -> String {
        let mut out = String::from(
            "SELECT ?graph (COUNT(DISTINCT ?s) AS ?identifiers) (COUNT(DISTINCT ?attached) AS ?attachments)\n",
        );
        out.push_str("WHERE {\n");
        out.push_str("\tGRAPH ?graph {\n");
        let _ = writeln!(out, "\t\t?s <{}> <{}> .", rdf::TYPE, self.type_class);
        let _ = writeln!(
            out,
            "\t\tOPTIONAL {{ ?s <{}> ?o . BIND(?s AS ?attached) }}",
            self.attachment
        );
        out.push_str("\t}\n");
        if !self.graphs.is_empty() {
            let graphs = self
                .graphs
                .iter()
                .map(|graph| format!("<{graph}>"))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "\tVALUES ?graph {{ {graphs} }}");
        }
        out.push_str("}\nGROUP BY ?graph");
        out
    }
}

/// Copy `(?s predicate ?o)` from `previous` into `new` for subjects already
/// typed `type_guard` in `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryoverUpdate {
    pub previous: String,
    pub new: String,
    pub predicate: String,
    pub type_guard: String,
}

impl CarryoverUpdate {
    pub fn to_sparql(&self) -> String {
        format!(
            "INSERT {{ GRAPH <{new}> {{ ?s <{predicate}> ?o }} }}\n\
             WHERE {{\n\
             \tGRAPH <{new}> {{ ?s <{ty}> <{guard}> }}\n\
             \tGRAPH <{previous}> {{ ?s <{predicate}> ?o }}\n\
             }}",
            new = self.new,
            predicate = self.predicate,
            ty = rdf::TYPE,
            guard = self.type_guard,
            previous = self.previous,
        )
    }
}

/// `SELECT ?s` for subjects typed `type_class` in one graph.
pub fn typed_subjects_query(graph: &str, type_class: &str) -> String {
    format!(
        "SELECT DISTINCT ?s\nFROM <{graph}>\nWHERE {{\n\t?s <{}> <{type_class}> .\n}}\nORDER BY ?s",
        rdf::TYPE
    )
}

fn from_clauses(out: &mut String, graphs: &[String]) {
    for graph in graphs {
        let _ = writeln!(out, "FROM <{graph}>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FimsError;
    use crate::query::filter::FilterOp;
    use crate::vocab::rdfs;
    use assert_matches::assert_matches;

    #[test]
    fn construct_scopes_graphs_and_filters() {
        let query = ConstructQuery::new(
            vec!["urn:uuid:a".to_string(), "urn:uuid:b".to_string()],
            rdfs::RESOURCE,
        )
        .with_filters(vec![
            FilterCondition::and(Some("urn:phylum"), "Echinodermata"),
            FilterCondition::and(None, "Moo\"rea"),
        ])
        .unwrap();
        let sparql = query.to_sparql();
        assert!(sparql.contains("FROM <urn:uuid:a>\nFROM <urn:uuid:b>\n"));
        assert!(sparql.contains("?s <urn:phylum> ?objectFilter1 ."));
        assert!(sparql.contains("FILTER (str(?objectFilter1) = \"Echinodermata\")"));
        assert!(sparql.contains("FILTER regex(str(?objectFilter2), \"Moo\\\"rea\")"));
    }

    #[test]
    fn or_filter_is_refused_before_rendering() {
        let result = ConstructQuery::new(Vec::new(), rdfs::RESOURCE)
            .with_filters(vec![FilterCondition::new(None, "x", FilterOp::Or)]);
        assert_matches!(result, Err(FimsError::UnsupportedFilterOperation(_)));
    }

    #[test]
    fn carryover_update_guards_on_new_graph() {
        let update = CarryoverUpdate {
            previous: "urn:uuid:old".to_string(),
            new: "urn:uuid:new".to_string(),
            predicate: "urn:sequence".to_string(),
            type_guard: rdfs::RESOURCE.to_string(),
        };
        let sparql = update.to_sparql();
        assert!(sparql.starts_with("INSERT { GRAPH <urn:uuid:new> { ?s <urn:sequence> ?o } }"));
        assert!(sparql.contains("GRAPH <urn:uuid:old> { ?s <urn:sequence> ?o }"));
    }
}
