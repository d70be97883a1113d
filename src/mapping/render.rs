//! D2RQ mapping language serialization of a [`MappingDescription`].
//!
//! Output depends only on the description, so identical inputs give a
//! byte-identical mapping file.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::identifier::UriPrefix;
use crate::mapping::ir::{
    AdditionalProperty, BridgeValue, ClassMap, Condition, Identity, MappingDescription,
    PropertyBridge, TranslationTable,
};
use crate::rdf::quoted;
use crate::schema::ColumnRef;
use crate::vocab::{MAPPING_PREFIXES, xsd};

const FETCH_SIZE: u32 = 500;

pub fn render(description: &MappingDescription) -> String {
    let mut out = String::new();
    for (prefix, namespace) in MAPPING_PREFIXES {
        let _ = writeln!(out, "@prefix {prefix}: <{namespace}> .");
    }
    out.push('\n');

    let equivalences: BTreeSet<&str> = description
        .property_bridges
        .iter()
        .flat_map(|bridge| bridge.definitions.iter().map(String::as_str))
        .filter(|name| name.ends_with("_Equivalence"))
        .collect();
    for property in description
        .additional_properties
        .iter()
        .filter(|property| !equivalences.contains(property.name.as_str()))
    {
        additional_property(&mut out, property);
    }

    let _ = writeln!(out, "map:database a d2rq:Database;");
    let _ = writeln!(out, "\td2rq:jdbcDriver {};", quoted(&description.storage.driver));
    let _ = writeln!(out, "\td2rq:jdbcDSN {};", quoted(&description.storage.dsn));
    let _ = writeln!(out, "\td2rq:fetchSize \"{FETCH_SIZE}\";");
    out.push_str("\t.\n\n");

    for class_map in &description.class_maps {
        render_class_map(&mut out, class_map);
    }

    let mut tables_written = BTreeSet::new();
    for bridge in &description.property_bridges {
        render_bridge(&mut out, bridge);
        if let BridgeValue::Translated { table, .. } = &bridge.value {
            if tables_written.insert(table.as_str()) {
                if let Some(table) = description.translation_table(table) {
                    translation_table(&mut out, table);
                }
            }
        }
        for name in bridge
            .definitions
            .iter()
            .filter(|name| equivalences.contains(name.as_str()))
        {
            if let Some(property) = description.additional_property(name) {
                additional_property(&mut out, property);
            }
        }
    }
    out
}

fn render_class_map(out: &mut String, class_map: &ClassMap) {
    let _ = writeln!(out, "map:{} a d2rq:ClassMap;", class_map.name);
    out.push_str("\td2rq:dataStorage map:database;\n");
    match &class_map.identity {
        Identity::UriPattern { prefix, column } => uri_pattern(out, prefix, column),
        Identity::BlankNode { columns } => {
            let joined = columns
                .iter()
                .map(ColumnRef::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "\td2rq:bNodeIdColumns {};", quoted(&joined));
        }
    }
    conditions(out, &class_map.conditions);
    let _ = writeln!(out, "\td2rq:class <{}>;", class_map.class);
    out.push_str("\t.\n\n");
}

fn render_bridge(out: &mut String, bridge: &PropertyBridge) {
    let _ = writeln!(out, "map:{} a d2rq:PropertyBridge;", bridge.name);
    let _ = writeln!(out, "\td2rq:belongsToClassMap map:{};", bridge.belongs_to);
    conditions(out, &bridge.conditions);
    for definition in &bridge.definitions {
        let _ = writeln!(out, "\td2rq:additionalPropertyDefinitionProperty map:{definition};");
    }
    let _ = writeln!(out, "\td2rq:property <{}>;", bridge.property);
    match &bridge.value {
        BridgeValue::Column(column) => {
            let _ = writeln!(out, "\td2rq:column {};", quoted(&column.to_string()));
        }
        BridgeValue::Translated { column, table } => {
            let _ = writeln!(out, "\td2rq:translateWith map:{table};");
            let _ = writeln!(out, "\td2rq:uriColumn {};", quoted(&column.to_string()));
        }
        BridgeValue::Joined { columns, delimiter } => {
            let separator = format!(" || '{}' || ", delimiter.replace('\'', "''"));
            let expression = columns
                .iter()
                .map(ColumnRef::to_string)
                .collect::<Vec<_>>()
                .join(&separator);
            let _ = writeln!(out, "\td2rq:sqlExpression {};", quoted(&expression));
        }
        BridgeValue::PartialDate { year, month, day } => {
            let expression = partial_date_expression(year, month.as_ref(), day.as_ref());
            let _ = writeln!(out, "\td2rq:sqlExpression {};", quoted(&expression));
        }
        BridgeValue::Resource { class_map, identity } => match identity {
            Identity::UriPattern { prefix, column } => uri_pattern(out, prefix, column),
            Identity::BlankNode { .. } => {
                let _ = writeln!(out, "\td2rq:refersToClassMap map:{class_map};");
            }
        },
    }
    if let Some(datatype) = &bridge.datatype {
        match datatype.strip_prefix(xsd::NS) {
            Some(local) => {
                let _ = writeln!(out, "\td2rq:datatype xsd:{local};");
            }
            None => {
                let _ = writeln!(out, "\td2rq:datatype <{datatype}>;");
            }
        }
    }
    out.push_str("\t.\n\n");
}

fn uri_pattern(out: &mut String, prefix: &UriPrefix, column: &ColumnRef) {
    let pattern = format!("{prefix}@@{column}@@");
    let _ = writeln!(out, "\td2rq:uriPattern {};", quoted(&pattern));
}

fn conditions(out: &mut String, conditions: &[Condition]) {
    for condition in conditions {
        let Condition::NonEmpty(column) = condition;
        let _ = writeln!(
            out,
            "\td2rq:condition {};",
            quoted(&format!("{column} <> ''"))
        );
    }
}

fn partial_date_expression(
    year: &ColumnRef,
    month: Option<&ColumnRef>,
    day: Option<&ColumnRef>,
) -> String {
    let pad = |column: &ColumnRef| format!("substr('0' || {column}, -2)");
    match (month, day) {
        (Some(month), Some(day)) => format!(
            "CASE WHEN {month} <> '' AND {day} <> '' THEN {year} || '-' || {} || '-' || {} \
             WHEN {month} <> '' THEN {year} || '-' || {} ELSE {year} END",
            pad(month),
            pad(day),
            pad(month)
        ),
        (Some(month), None) => format!(
            "CASE WHEN {month} <> '' THEN {year} || '-' || {} ELSE {year} END",
            pad(month)
        ),
        _ => year.to_string(),
    }
}

fn translation_table(out: &mut String, table: &TranslationTable) {
    let _ = writeln!(out, "map:{} a d2rq:TranslationTable;", table.name);
    for (database, resource) in &table.entries {
        let _ = writeln!(
            out,
            "\td2rq:translation [d2rq:databaseValue {}; d2rq:rdfValue <{resource}>];",
            quoted(database)
        );
    }
    out.push_str("\t.\n\n");
}

fn additional_property(out: &mut String, property: &AdditionalProperty) {
    let _ = writeln!(out, "map:{} a d2rq:AdditionalProperty;", property.name);
    let _ = writeln!(out, "\td2rq:propertyName <{}>;", property.property);
    let _ = writeln!(out, "\td2rq:propertyValue <{}>;", property.value);
    out.push_str("\t.\n\n");
}
