use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::identifier::{IdentifierTable, blank_node_key};
use crate::mapping::ir::{
    AdditionalProperty, BridgeValue, ClassMap, CompileNote, Condition, DATATYPE_PROPERTY_DECL,
    Identity, MappingDescription, NoteReason, OBJECT_PROPERTY_DECL, PropertyBridge,
    TranslationTable, local_name,
};
use crate::schema::{
    Attribute, ColumnRef, ColumnSource, Entity, EntityKey, Mapping, Relation, TranslationList,
    Validation,
};
use crate::snapshot::DataStorage;
use crate::vocab::{owl, rdf, rdfs, xsd};

/// Compiles a [`Mapping`] against the columns present in one dataset version.
pub struct MappingCompiler<'a> {
    mapping: &'a Mapping,
    validation: &'a Validation,
    identifiers: &'a IdentifierTable,
    defined_by_property: String,
    storage: DataStorage,
}

impl<'a> MappingCompiler<'a> {
    pub fn new(
        mapping: &'a Mapping,
        validation: &'a Validation,
        identifiers: &'a IdentifierTable,
    ) -> Self {
        Self {
            mapping,
            validation,
            identifiers,
            defined_by_property: rdfs::IS_DEFINED_BY.to_string(),
            storage: DataStorage::default(),
        }
    }

    pub fn with_defined_by_property(mut self, property: impl Into<String>) -> Self {
        self.defined_by_property = property.into();
        self
    }

    pub fn with_storage(mut self, storage: DataStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn compile(&self, known_columns: &BTreeSet<String>) -> MappingDescription {
        let mut out = MappingDescription {
            storage: self.storage.clone(),
            additional_properties: vec![
                AdditionalProperty {
                    name: DATATYPE_PROPERTY_DECL.to_string(),
                    property: rdf::TYPE.to_string(),
                    value: owl::DATATYPE_PROPERTY.to_string(),
                },
                AdditionalProperty {
                    name: OBJECT_PROPERTY_DECL.to_string(),
                    property: rdf::TYPE.to_string(),
                    value: owl::OBJECT_PROPERTY.to_string(),
                },
            ],
            ..MappingDescription::default()
        };

        for entity in &self.mapping.entities {
            self.compile_entity(entity, known_columns, &mut out);
        }
        for relation in &self.mapping.relations {
            self.compile_relation(relation, &mut out);
        }
        out
    }

    fn identity(&self, entity: &Entity) -> Result<Identity, String> {
        let table = entity.worksheet.as_deref().unwrap_or_default();
        match entity.key() {
            EntityKey::BlankNode => {
                let columns = blank_node_key(entity);
                if columns.is_empty() {
                    Err("blank node key without attributes".to_string())
                } else {
                    Ok(Identity::BlankNode { columns })
                }
            }
            EntityKey::Column(key) if key.trim().is_empty() => {
                Err("entity has no unique key".to_string())
            }
            EntityKey::Column(key) => {
                let prefix = self
                    .identifiers
                    .get(&entity.concept_alias)
                    .cloned()
                    .ok_or_else(|| format!("no identifier prefix for {}", entity.concept_alias))?;
                Ok(Identity::UriPattern {
                    prefix,
                    column: ColumnRef::new(table, key),
                })
            }
        }
    }

    fn compile_entity(
        &self,
        entity: &Entity,
        known_columns: &BTreeSet<String>,
        out: &mut MappingDescription,
    ) {
        let class_map = local_name(&entity.class_map_name());
        if !entity.has_worksheet() {
            debug!(entity = %entity.concept_alias, "entity has no worksheet, not materialized");
            out.notes.push(CompileNote {
                subject: class_map,
                reason: NoteReason::EntityNotMaterialized,
            });
            return;
        }
        let identity = match self.identity(entity) {
            Ok(identity) => identity,
            Err(message) => {
                warn!(entity = %entity.concept_alias, %message, "skipping entity");
                out.notes.push(CompileNote {
                    subject: class_map,
                    reason: NoteReason::ConfigError { message },
                });
                return;
            }
        };
        let conditions = match &identity {
            Identity::UriPattern { column, .. } if !entity.is_hash_key() => {
                vec![Condition::NonEmpty(column.clone())]
            }
            _ => Vec::new(),
        };
        let table = entity.worksheet.clone().unwrap_or_default();
        out.class_maps.push(ClassMap {
            name: class_map.clone(),
            table: table.clone(),
            class: entity.concept_uri.clone(),
            identity,
            conditions,
        });

        for attribute in &entity.attributes {
            self.compile_attribute(&class_map, &table, attribute, known_columns, out);
        }
    }

    fn compile_attribute(
        &self,
        class_map: &str,
        table: &str,
        attribute: &Attribute,
        known_columns: &BTreeSet<String>,
        out: &mut MappingDescription,
    ) {
        let name = local_name(&format!("{class_map}_{}", attribute.column));
        if attribute.column.trim().is_empty() || attribute.uri.trim().is_empty() {
            warn!(bridge = %name, "attribute needs both a column and a uri");
            out.notes.push(CompileNote {
                subject: name,
                reason: NoteReason::ConfigError {
                    message: "attribute needs both a column and a uri".to_string(),
                },
            });
            return;
        }

        let source = attribute.source();
        let missing: Vec<String> = attribute
            .columns()
            .into_iter()
            .filter(|column| !known_columns.contains(*column))
            .map(str::to_string)
            .collect();
        match (&source, missing.is_empty()) {
            (ColumnSource::Unsupported, _) => {
                warn!(bridge = %name, column = %attribute.column, "composite column without a combine rule");
                out.notes.push(CompileNote {
                    subject: name,
                    reason: NoteReason::ConfigError {
                        message: format!("no combine rule for columns {}", attribute.column),
                    },
                });
                return;
            }
            (ColumnSource::Single(column), false) => {
                debug!(bridge = %name, %column, "column absent from dataset, skipping attribute");
                out.notes.push(CompileNote {
                    subject: name,
                    reason: NoteReason::ColumnAbsent {
                        column: column.to_string(),
                    },
                });
                return;
            }
            (_, false) => {
                debug!(bridge = %name, ?missing, "composite attribute partially present, skipping");
                out.notes.push(CompileNote {
                    subject: name,
                    reason: NoteReason::PartialComposite { missing },
                });
                return;
            }
            _ => {}
        }

        let col = |column: &str| ColumnRef::new(table, column);
        let translation = match source {
            ColumnSource::Single(_) => self.validation.translation_for(attribute, table),
            _ => None,
        };

        if let (ColumnSource::Single(column), Some(list)) = (&source, translation) {
            let column = col(*column);
            let table_name = local_name(&format!("{table}_{}TranslationTable", attribute.column));
            push_translation_table(out, &table_name, list);
            let definitions = self.definitions(out, &name, attribute);
            out.property_bridges.push(PropertyBridge {
                name: name.clone(),
                belongs_to: class_map.to_string(),
                property: attribute.uri.clone(),
                value: BridgeValue::Translated {
                    column: column.clone(),
                    table: table_name,
                },
                conditions: vec![Condition::NonEmpty(column.clone())],
                datatype: None,
                definitions,
            });
            if attribute.display_annotation_property {
                out.property_bridges.push(PropertyBridge {
                    name: format!("{name}Label"),
                    belongs_to: class_map.to_string(),
                    property: rdfs::COMMENT.to_string(),
                    value: BridgeValue::Column(column.clone()),
                    conditions: vec![Condition::NonEmpty(column)],
                    datatype: datatype_iri(attribute),
                    definitions: Vec::new(),
                });
            }
            return;
        }

        if !attribute.display_annotation_property {
            debug!(bridge = %name, "attribute not displayed and has no translation");
            out.notes.push(CompileNote {
                subject: name,
                reason: NoteReason::NotDisplayed,
            });
            return;
        }

        let (value, conditions) = match source {
            ColumnSource::Single(column) => (
                BridgeValue::Column(col(column)),
                vec![Condition::NonEmpty(col(column))],
            ),
            ColumnSource::All { columns, delimiter } => {
                let columns: Vec<ColumnRef> = columns.into_iter().map(col).collect();
                let conditions = columns.iter().cloned().map(Condition::NonEmpty).collect();
                (
                    BridgeValue::Joined {
                        columns,
                        delimiter: delimiter.to_string(),
                    },
                    conditions,
                )
            }
            ColumnSource::Ymd { year, month, day } => (
                BridgeValue::PartialDate {
                    year: col(year),
                    month: month.map(col),
                    day: day.map(col),
                },
                vec![Condition::NonEmpty(col(year))],
            ),
            ColumnSource::Unsupported => return,
        };
        let definitions = self.definitions(out, &name, attribute);
        out.property_bridges.push(PropertyBridge {
            name,
            belongs_to: class_map.to_string(),
            property: attribute.uri.clone(),
            value,
            conditions,
            datatype: datatype_iri(attribute),
            definitions,
        });
    }

    /// Registers the equivalence declaration for `bridge` and returns the
    /// additional properties it references.
    fn definitions(
        &self,
        out: &mut MappingDescription,
        bridge: &str,
        attribute: &Attribute,
    ) -> Vec<String> {
        let equivalence = format!("{bridge}_Equivalence");
        out.additional_properties.push(AdditionalProperty {
            name: equivalence.clone(),
            property: self.defined_by_property.clone(),
            value: attribute.defined_by_or_uri().to_string(),
        });
        vec![equivalence, DATATYPE_PROPERTY_DECL.to_string()]
    }

    fn compile_relation(&self, relation: &Relation, out: &mut MappingDescription) {
        let name = relation_bridge_name(relation, out);
        let skip = |out: &mut MappingDescription, entity: &str| {
            debug!(relation = %name, %entity, "relation endpoint not materialized, skipping");
            out.notes.push(CompileNote {
                subject: name.clone(),
                reason: NoteReason::RelationEndpointMissing {
                    entity: entity.to_string(),
                },
            });
        };
        let Some(subject) = self
            .mapping
            .find_entity(&relation.subject)
            .filter(|entity| entity.has_worksheet())
        else {
            skip(out, &relation.subject);
            return;
        };
        let Some(object) = self.mapping.find_entity(&relation.object) else {
            skip(out, &relation.object);
            return;
        };
        let subject_map = local_name(&subject.class_map_name());
        if out.class_map(&subject_map).is_none() {
            skip(out, &relation.subject);
            return;
        }
        let identity = match self.identity(object) {
            Ok(identity) => identity,
            Err(_) => {
                skip(out, &relation.object);
                return;
            }
        };
        let conditions = match &identity {
            Identity::UriPattern { column, .. } if !object.is_hash_key() => {
                vec![Condition::NonEmpty(column.clone())]
            }
            _ => Vec::new(),
        };
        out.property_bridges.push(PropertyBridge {
            name,
            belongs_to: subject_map,
            property: relation.predicate.clone(),
            value: BridgeValue::Resource {
                class_map: local_name(&object.class_map_name()),
                identity,
            },
            conditions,
            datatype: None,
            definitions: vec![OBJECT_PROPERTY_DECL.to_string()],
        });
    }
}

/// `<subject>_<predicate local name>_<object>_rel`, suffixed with a counter
/// when an earlier relation already took the name.
fn relation_bridge_name(relation: &Relation, out: &MappingDescription) -> String {
    let predicate = relation
        .predicate
        .rsplit(['#', '/', ':'])
        .find(|part| !part.is_empty())
        .unwrap_or(relation.predicate.as_str());
    let base = local_name(&format!(
        "{}_{predicate}_{}_rel",
        relation.subject, relation.object
    ));
    let taken = |name: &str| out.property_bridges.iter().any(|bridge| bridge.name == name);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|idx| format!("{base}{idx}"))
        .find(|name| !taken(name))
        .unwrap_or(base)
}

fn push_translation_table(out: &mut MappingDescription, name: &str, list: &TranslationList) {
    if out.translation_table(name).is_some() {
        return;
    }
    let entries = list
        .fields
        .iter()
        .filter_map(|field| {
            field
                .defined_by
                .as_ref()
                .filter(|defined_by| !defined_by.trim().is_empty())
                .map(|defined_by| (field.value.clone(), defined_by.clone()))
        })
        .collect();
    out.translation_tables.push(TranslationTable {
        name: name.to_string(),
        entries,
    });
}

fn datatype_iri(attribute: &Attribute) -> Option<String> {
    attribute
        .datatype
        .as_deref()
        .map(str::trim)
        .filter(|datatype| !datatype.is_empty())
        .map(|datatype| format!("{}{}", xsd::NS, datatype.to_lowercase()))
}
