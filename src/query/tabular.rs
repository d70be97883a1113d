//! Reconstruction of row-oriented records from a resource graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{FimsError, FimsResult};
use crate::identifier::{IdentifierTable, decode_local_id};
use crate::rdf::{Term, Triple, TripleSet};
use crate::schema::{Attribute, Entity, Mapping, TranslationList, Validation};
use crate::vocab::{rdf, rdfs};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabularModel {
    pub columns: Vec<String>,
    pub rows: Vec<TabularRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabularRow {
    /// Local identifier of the root resource.
    pub id: String,
    /// One cell per column, `None` when the graph holds no value.
    pub values: Vec<Option<String>>,
}

impl TabularModel {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, id: &str) -> Option<&TabularRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn cell(&self, id: &str, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.row(id)?.values.get(idx)?.as_deref()
    }

    /// For callers that expect data: an empty model becomes [`FimsError::NoRows`].
    pub fn require_rows(self, graphs: &[String]) -> FimsResult<Self> {
        if self.rows.is_empty() {
            return Err(FimsError::NoRows(graphs.join(", ")));
        }
        Ok(self)
    }
}

struct Column<'a> {
    name: &'a str,
    attribute: &'a Attribute,
    entity: &'a Entity,
}

/// Rebuilds one row per root resource, projecting only the attributes the
/// mapping declares for its default sheet.
pub struct Reconstructor<'a> {
    mapping: &'a Mapping,
    validation: &'a Validation,
    identifiers: &'a IdentifierTable,
    root_class: &'a str,
}

impl<'a> Reconstructor<'a> {
    pub fn new(
        mapping: &'a Mapping,
        validation: &'a Validation,
        identifiers: &'a IdentifierTable,
        root_class: &'a str,
    ) -> Self {
        Self {
            mapping,
            validation,
            identifiers,
            root_class,
        }
    }

    fn columns(&self) -> Vec<Column<'a>> {
        let sheet = self.mapping.default_sheet.as_str();
        self.mapping
            .entities
            .iter()
            .filter(|entity| entity.worksheet.as_deref() == Some(sheet))
            .flat_map(|entity| {
                entity.attributes.iter().map(move |attribute| Column {
                    name: attribute.column.as_str(),
                    attribute,
                    entity,
                })
            })
            .collect()
    }

    pub fn reconstruct(&self, triples: &TripleSet) -> TabularModel {
        let columns = self.columns();
        let mut by_subject: BTreeMap<&Term, Vec<&Triple>> = BTreeMap::new();
        let mut referrers: BTreeMap<&Term, BTreeSet<&Term>> = BTreeMap::new();
        for triple in triples.iter() {
            by_subject.entry(&triple.subject).or_default().push(triple);
            if !triple.object.is_literal() && triple.predicate != rdf::TYPE {
                referrers.entry(&triple.object).or_default().insert(&triple.subject);
            }
        }

        let root_entity = self.mapping.root_entity(self.root_class);
        let mut rows: Vec<TabularRow> = triples
            .subjects_of_type(self.root_class)
            .into_iter()
            .map(|root| {
                // the root, the nodes it links to and the nodes linking to it
                let mut nodes: Vec<&Term> = vec![root];
                for triple in by_subject.get(root).into_iter().flatten() {
                    if !triple.object.is_literal()
                        && triple.predicate != rdf::TYPE
                        && by_subject.contains_key(&triple.object)
                    {
                        nodes.push(&triple.object);
                    }
                }
                nodes.extend(referrers.get(root).into_iter().flatten().copied());

                let values = columns
                    .iter()
                    .map(|column| {
                        let node = nodes.iter().copied().find(|node| {
                            by_subject.get(node).into_iter().flatten().any(|triple| {
                                triple.predicate == rdf::TYPE
                                    && triple.object.as_iri() == Some(column.entity.concept_uri.as_str())
                            })
                        })?;
                        let node_triples = by_subject.get(node)?;
                        match first_object(node_triples, &column.attribute.uri) {
                            Some(object) => Some(self.cell_value(column, object)),
                            None => self.label_value(column, node_triples, &columns),
                        }
                    })
                    .collect();

                TabularRow {
                    id: self.local_id(root_entity, root),
                    values,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        TabularModel {
            columns: columns.iter().map(|column| column.name.to_string()).collect(),
            rows,
        }
    }

    fn translation(&self, column: &Column<'_>) -> Option<&'a TranslationList> {
        let sheet = column.entity.worksheet.as_deref().unwrap_or_default();
        self.validation.translation_for(column.attribute, sheet)
    }

    fn cell_value(&self, column: &Column<'_>, object: &Term) -> String {
        if let Term::Iri(iri) = object
            && let Some(value) = self.translation(column).and_then(|list| list.value_for(iri))
        {
            return value.to_string();
        }
        object.lexical().to_string()
    }

    /// A translated value with no canonical resource survives only as its
    /// `rdfs:comment` label. Labels already explained by a sibling's resource
    /// are set aside; when several siblings lack a resource, a label goes to
    /// the one list that contains it.
    fn label_value(
        &self,
        column: &Column<'_>,
        node_triples: &[&Triple],
        columns: &[Column<'a>],
    ) -> Option<String> {
        if !column.attribute.display_annotation_property {
            return None;
        }
        let list = self.translation(column)?;
        let mut labels: BTreeSet<&str> = node_triples
            .iter()
            .filter(|triple| triple.predicate == rdfs::COMMENT && triple.object.is_literal())
            .map(|triple| triple.object.lexical())
            .collect();

        let mut unresolved: Vec<&TranslationList> = Vec::new();
        let siblings = columns.iter().filter(|other| {
            other.entity.concept_alias == column.entity.concept_alias
                && other.attribute.display_annotation_property
        });
        for sibling in siblings {
            let Some(sibling_list) = self.translation(sibling) else {
                continue;
            };
            match first_object(node_triples, &sibling.attribute.uri) {
                Some(Term::Iri(iri)) => {
                    if let Some(value) = sibling_list.value_for(iri) {
                        labels.remove(value);
                    }
                }
                Some(_) => {}
                None => unresolved.push(sibling_list),
            }
        }

        if unresolved.len() <= 1 {
            return labels.first().map(|label| label.to_string());
        }
        labels
            .into_iter()
            .find(|label| {
                list.contains(label)
                    && unresolved.iter().filter(|other| other.contains(label)).count() == 1
            })
            .map(str::to_string)
    }

    /// The root's key value: its IRI with the entity prefix stripped, or the
    /// blank node label.
    fn local_id(&self, root_entity: Option<&Entity>, root: &Term) -> String {
        let prefix = root_entity.and_then(|entity| self.identifiers.get(&entity.concept_alias));
        match (root, prefix) {
            (Term::Iri(iri), Some(prefix)) => prefix
                .local_id(iri)
                .map(decode_local_id)
                .unwrap_or_else(|| iri.clone()),
            _ => root.lexical().to_string(),
        }
    }
}

fn first_object<'t>(triples: &[&'t Triple], predicate: &str) -> Option<&'t Term> {
    triples
        .iter()
        .filter(|triple| triple.predicate == predicate)
        .map(|&triple| &triple.object)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{ExpeditionContext, IdentifierResolver, StaticAuthority};

    #[test]
    fn empty_graph_is_a_valid_empty_model() {
        let mapping = Mapping {
            default_sheet: "Samples".to_string(),
            entities: vec![Entity {
                worksheet: Some("Samples".to_string()),
                unique_key: "materialSampleID".to_string(),
                concept_uri: rdfs::RESOURCE.to_string(),
                concept_alias: "Resource".to_string(),
                identifier: None,
                attributes: vec![Attribute::new("phylum", "urn:phylum")],
            }],
            relations: Vec::new(),
        };
        let authority = StaticAuthority::default();
        let identifiers = IdentifierResolver::new(&authority, "biscicol")
            .resolve_mapping(&mapping, &ExpeditionContext::new(1, "TEST"))
            .unwrap();
        let validation = Validation::default();
        let model = Reconstructor::new(&mapping, &validation, &identifiers, rdfs::RESOURCE)
            .reconstruct(&TripleSet::new());
        assert!(model.is_empty());
        assert_eq!(model.columns, vec!["phylum".to_string()]);
        assert!(model.require_rows(&["urn:uuid:g".to_string()]).is_err());
    }

    #[test]
    fn untranslated_labels_go_to_the_list_that_holds_them() {
        use crate::schema::Field;

        let field = |value: &str, defined_by: Option<&str>| Field {
            value: value.to_string(),
            defined_by: defined_by.map(str::to_string),
        };
        let mut country = Attribute::new("country", "urn:country");
        country.list = Some("countries".to_string());
        let mut status = Attribute::new("status", "urn:status");
        status.list = Some("statuses".to_string());
        let mapping = Mapping {
            default_sheet: "Samples".to_string(),
            entities: vec![Entity {
                worksheet: Some("Samples".to_string()),
                unique_key: "materialSampleID".to_string(),
                concept_uri: rdfs::RESOURCE.to_string(),
                concept_alias: "Resource".to_string(),
                identifier: None,
                attributes: vec![country, status],
            }],
            relations: Vec::new(),
        };
        let validation = Validation {
            worksheets: Vec::new(),
            lists: vec![
                TranslationList {
                    alias: "countries".to_string(),
                    fields: vec![field("France", Some("urn:geo:france")), field("Narnia", None)],
                },
                TranslationList {
                    alias: "statuses".to_string(),
                    fields: vec![field("alive", Some("urn:vocab:alive")), field("dormant", None)],
                },
            ],
        };
        let authority = StaticAuthority::default();
        let identifiers = IdentifierResolver::new(&authority, "biscicol")
            .resolve_mapping(&mapping, &ExpeditionContext::new(1, "TEST"))
            .unwrap();

        let s1 = Term::iri("urn:x-biscicol:Resource:S1");
        let s2 = Term::iri("urn:x-biscicol:Resource:S2");
        let triples = TripleSet::from_iter([
            Triple::new(s1.clone(), rdf::TYPE, Term::iri(rdfs::RESOURCE)),
            Triple::new(s1.clone(), rdfs::COMMENT, Term::literal("Narnia")),
            Triple::new(s1.clone(), rdfs::COMMENT, Term::literal("dormant")),
            Triple::new(s2.clone(), rdf::TYPE, Term::iri(rdfs::RESOURCE)),
            Triple::new(s2.clone(), "urn:country", Term::iri("urn:geo:france")),
            Triple::new(s2.clone(), rdfs::COMMENT, Term::literal("France")),
            Triple::new(s2, rdfs::COMMENT, Term::literal("dormant")),
        ]);
        let model = Reconstructor::new(&mapping, &validation, &identifiers, rdfs::RESOURCE)
            .reconstruct(&triples);

        assert_eq!(model.cell("S1", "country"), Some("Narnia"));
        assert_eq!(model.cell("S1", "status"), Some("dormant"));
        assert_eq!(model.cell("S2", "country"), Some("France"));
        assert_eq!(model.cell("S2", "status"), Some("dormant"));
    }
}
