//! Evaluation of a mapping description against the rows of a snapshot.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{FimsError, FimsResult};
use crate::identifier::{blank_node_label, encode_local_id};
use crate::mapping::{BridgeValue, Condition, Identity, MappingDescription, PropertyBridge};
use crate::rdf::{Term, Triple, TripleSet};
use crate::schema::ColumnRef;
use crate::snapshot::{Row, RowSource};
use crate::vocab::rdf;

pub fn materialize(description: &MappingDescription, source: &dyn RowSource) -> FimsResult<TripleSet> {
    let mut triples = TripleSet::new();
    // property -> additional property names declared on it
    let mut used: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for class_map in &description.class_maps {
        if !source.has_table(&class_map.table) {
            warn!(class_map = %class_map.name, table = %class_map.table, "worksheet absent from snapshot");
            continue;
        }
        let bridges: Vec<&PropertyBridge> = description.bridges_of(&class_map.name).collect();
        for row in source.rows(&class_map.table) {
            if !conditions_hold(&class_map.conditions, row) {
                continue;
            }
            let Some(subject) = subject_term(&class_map.name, &class_map.identity, row) else {
                continue;
            };
            triples.insert(Triple::new(
                subject.clone(),
                rdf::TYPE,
                Term::iri(class_map.class.as_str()),
            ));
            for bridge in &bridges {
                if !conditions_hold(&bridge.conditions, row) {
                    continue;
                }
                let Some(object) = bridge_value(description, bridge, row) else {
                    continue;
                };
                triples.insert(Triple::new(subject.clone(), bridge.property.as_str(), object));
                used.entry(bridge.property.as_str())
                    .or_default()
                    .extend(bridge.definitions.iter().map(String::as_str));
            }
        }
    }

    for (property, definitions) in used {
        let predicate = Term::iri(property);
        triples.insert(Triple::new(predicate.clone(), rdf::TYPE, Term::iri(rdf::PROPERTY)));
        for name in definitions {
            if let Some(additional) = description.additional_property(name) {
                triples.insert(Triple::new(
                    predicate.clone(),
                    additional.property.as_str(),
                    Term::iri(additional.value.as_str()),
                ));
            }
        }
    }

    if triples.is_empty() {
        return Err(FimsError::NoTriples);
    }
    info!(triples = triples.len(), "materialized dataset");
    Ok(triples)
}

fn cell<'r>(row: &'r Row, column: &ColumnRef) -> Option<&'r str> {
    row.get(&column.column)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn conditions_hold(conditions: &[Condition], row: &Row) -> bool {
    conditions
        .iter()
        .all(|condition| cell(row, condition.column()).is_some())
}

/// Subject of a row, or `None` when the row carries no identity.
pub fn subject_term(class_map: &str, identity: &Identity, row: &Row) -> Option<Term> {
    match identity {
        Identity::UriPattern { prefix, column } => {
            let value = cell(row, column)?;
            Some(Term::iri(format!("{prefix}{}", encode_local_id(value))))
        }
        Identity::BlankNode { columns } => {
            let values: Vec<&str> = columns
                .iter()
                .map(|column| cell(row, column).unwrap_or_default())
                .collect();
            if values.iter().all(|value| value.is_empty()) {
                return None;
            }
            Some(Term::blank(blank_node_label(class_map, &values)))
        }
    }
}

fn literal(value: String, datatype: Option<&String>) -> Term {
    match datatype {
        Some(datatype) => Term::typed(value, datatype.as_str()),
        None => Term::literal(value),
    }
}

fn bridge_value(description: &MappingDescription, bridge: &PropertyBridge, row: &Row) -> Option<Term> {
    match &bridge.value {
        BridgeValue::Column(column) => {
            cell(row, column).map(|value| literal(value.to_string(), bridge.datatype.as_ref()))
        }
        BridgeValue::Translated { column, table } => {
            let value = cell(row, column)?;
            let resource = description.translation_table(table)?.translate(value);
            if resource.is_none() {
                debug!(bridge = %bridge.name, %value, "value has no translation");
            }
            resource.map(Term::iri)
        }
        BridgeValue::Joined { columns, delimiter } => {
            let parts = columns
                .iter()
                .map(|column| cell(row, column))
                .collect::<Option<Vec<_>>>()?;
            Some(literal(parts.join(delimiter), bridge.datatype.as_ref()))
        }
        BridgeValue::PartialDate { year, month, day } => {
            let date = partial_date(
                cell(row, year),
                month.as_ref().and_then(|column| cell(row, column)),
                day.as_ref().and_then(|column| cell(row, column)),
            )?;
            Some(literal(date, bridge.datatype.as_ref()))
        }
        BridgeValue::Resource { class_map, identity } => subject_term(class_map, identity, row),
    }
}

/// Year is required; a day is only kept when the month is present.
pub fn partial_date(year: Option<&str>, month: Option<&str>, day: Option<&str>) -> Option<String> {
    let year = year?.trim();
    let mut date = year.to_string();
    if let Some(month) = month {
        date.push('-');
        date.push_str(&pad2(month.trim()));
        if let Some(day) = day {
            date.push('-');
            date.push_str(&pad2(day.trim()));
        }
    }
    Some(date)
}

fn pad2(value: &str) -> String {
    if value.len() == 1 && value.chars().all(|ch| ch.is_ascii_digit()) {
        format!("0{value}")
    } else {
        value.to_string()
    }
}
