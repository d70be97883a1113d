use serde::{Deserialize, Serialize};

/// Marker inside a unique key naming a key synthesized from all attribute columns.
pub const BNODE_MARKER: &str = "BNODE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub default_sheet: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Mapping {
    pub fn find_entity(&self, concept_alias: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|entity| entity.concept_alias == concept_alias)
    }

    /// Attributes of every entity extracted from `sheet`, in declaration order.
    pub fn all_attributes(&self, sheet: &str) -> Vec<&Attribute> {
        self.entities
            .iter()
            .filter(|entity| entity.worksheet.as_deref() == Some(sheet))
            .flat_map(|entity| entity.attributes.iter())
            .collect()
    }

    pub fn column_names_for_worksheet(&self, sheet: &str) -> Vec<String> {
        self.all_attributes(sheet)
            .into_iter()
            .map(|attribute| attribute.column.clone())
            .collect()
    }

    /// The entity owning an attribute with property `uri`, e.g. the sequence root.
    pub fn entity_with_attribute_uri(&self, uri: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|entity| entity.attributes.iter().any(|attribute| attribute.uri == uri))
    }

    /// The default-sheet entity reconstruction starts from: the one typed with
    /// `root_class`, otherwise the first entity on the default sheet.
    pub fn root_entity(&self, root_class: &str) -> Option<&Entity> {
        let on_sheet = || {
            self.entities
                .iter()
                .filter(|entity| entity.worksheet.as_deref() == Some(self.default_sheet.as_str()))
        };
        on_sheet()
            .find(|entity| entity.concept_uri == root_class)
            .or_else(|| on_sheet().next())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub worksheet: Option<String>,
    pub unique_key: String,
    #[serde(rename = "conceptURI")]
    pub concept_uri: String,
    pub concept_alias: String,
    /// Minted persistent identifier, absent until the authority issues one.
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKey<'a> {
    Column(&'a str),
    BlankNode,
}

impl Entity {
    pub fn has_worksheet(&self) -> bool {
        self.worksheet
            .as_deref()
            .is_some_and(|sheet| !sheet.trim().is_empty())
    }

    pub fn key(&self) -> EntityKey<'_> {
        if self.unique_key.contains(BNODE_MARKER) {
            EntityKey::BlankNode
        } else {
            EntityKey::Column(&self.unique_key)
        }
    }

    /// The key column with any blank-node marker stripped.
    pub fn key_column(&self) -> &str {
        self.unique_key
            .split(BNODE_MARKER)
            .next()
            .unwrap_or_default()
    }

    /// Hash keys are assumed always present and valid, so they carry no gate.
    pub fn is_hash_key(&self) -> bool {
        self.key_column().to_lowercase().contains("hash")
    }

    /// Name of the class map generated for this entity.
    pub fn class_map_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.worksheet.as_deref().unwrap_or_default(),
            self.unique_key,
            self.concept_alias
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// Delimiter-joined concatenation of every listed column.
    All,
    /// Year, month and day columns composed into a partial ISO date.
    Ymd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub column: String,
    pub uri: String,
    #[serde(default)]
    pub defined_by: Option<String>,
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default = "default_display")]
    pub display_annotation_property: bool,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default)]
    pub combine: Option<Combine>,
    #[serde(default)]
    pub delimiter: Option<String>,
}

fn default_display() -> bool {
    true
}

pub const DEFAULT_DELIMITER: &str = "-";

/// A `(worksheet, column)` pair in the relational snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Where an attribute's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource<'a> {
    Single(&'a str),
    All {
        columns: Vec<&'a str>,
        delimiter: &'a str,
    },
    Ymd {
        year: &'a str,
        month: Option<&'a str>,
        day: Option<&'a str>,
    },
    /// A comma-joined column list with no combine rule.
    Unsupported,
}

impl Attribute {
    pub fn new(column: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            uri: uri.into(),
            defined_by: None,
            list: None,
            display_annotation_property: true,
            datatype: None,
            combine: None,
            delimiter: None,
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.column
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .collect()
    }

    pub fn is_composite(&self) -> bool {
        self.column.contains(',') || self.combine.is_some()
    }

    pub fn source(&self) -> ColumnSource<'_> {
        let columns = self.columns();
        match self.combine {
            None if columns.len() == 1 => ColumnSource::Single(columns[0]),
            None => ColumnSource::Unsupported,
            Some(Combine::All) if !columns.is_empty() => ColumnSource::All {
                columns,
                delimiter: self.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER),
            },
            Some(Combine::Ymd) if (1..=3).contains(&columns.len()) => ColumnSource::Ymd {
                year: columns[0],
                month: columns.get(1).copied(),
                day: columns.get(2).copied(),
            },
            Some(_) => ColumnSource::Unsupported,
        }
    }

    /// The `rdfs:isDefinedBy` target: the declared equivalence or the property itself.
    pub fn defined_by_or_uri(&self) -> &str {
        self.defined_by
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(&self.uri)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub worksheets: Vec<ValidationSheet>,
    #[serde(default)]
    pub lists: Vec<TranslationList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSheet {
    pub sheet_name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub list: Option<String>,
}

impl Rule {
    fn is_vocabulary_rule(&self) -> bool {
        matches!(self.kind.as_str(), "controlledVocabulary" | "checkInXMLFields")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationList {
    pub alias: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl TranslationList {
    pub fn has_definitions(&self) -> bool {
        self.fields.iter().any(|field| field.defined_by.is_some())
    }

    pub fn defined_by(&self, value: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.value == value)
            .and_then(|field| field.defined_by.as_deref())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.fields.iter().any(|field| field.value == value)
    }

    /// Reverse lookup from a canonical resource back to the entered value.
    pub fn value_for(&self, defined_by: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.defined_by.as_deref() == Some(defined_by))
            .map(|field| field.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub value: String,
    #[serde(default)]
    pub defined_by: Option<String>,
}

impl Validation {
    pub fn find_list(&self, alias: &str) -> Option<&TranslationList> {
        self.lists.iter().find(|list| list.alias == alias)
    }

    /// The translation list applying to `attribute`, if it declares any
    /// `defined_by` values. A list named on the attribute wins over
    /// vocabulary rules bound to the column on `sheet` (or the first sheet).
    pub fn translation_for(&self, attribute: &Attribute, sheet: &str) -> Option<&TranslationList> {
        if let Some(list) = attribute.list.as_deref().and_then(|alias| self.find_list(alias)) {
            return list.has_definitions().then_some(list);
        }
        let rules = self
            .worksheets
            .iter()
            .find(|worksheet| worksheet.sheet_name == sheet)
            .or_else(|| self.worksheets.first())
            .map(|worksheet| worksheet.rules.as_slice())
            .unwrap_or_default();
        rules
            .iter()
            .filter(|rule| rule.is_vocabulary_rule())
            .filter(|rule| rule.column.as_deref() == Some(attribute.column.as_str()))
            .filter_map(|rule| rule.list.as_deref().and_then(|alias| self.find_list(alias)))
            .find(|list| list.has_definitions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(unique_key: &str) -> Entity {
        Entity {
            worksheet: Some("Samples".to_string()),
            unique_key: unique_key.to_string(),
            concept_uri: "http://www.w3.org/2000/01/rdf-schema#Resource".to_string(),
            concept_alias: "Resource".to_string(),
            identifier: None,
            attributes: Vec::new(),
        }
    }

    #[test]
    fn blank_node_key_is_detected() {
        assert_eq!(entity("materialSampleID").key(), EntityKey::Column("materialSampleID"));
        let bnode = entity("eventBNODE");
        assert_eq!(bnode.key(), EntityKey::BlankNode);
        assert_eq!(bnode.key_column(), "event");
    }

    #[test]
    fn hash_keys_are_detected() {
        assert!(entity("tissueHash").is_hash_key());
        assert!(!entity("tissueID").is_hash_key());
    }

    #[test]
    fn composite_sources() {
        let mut ymd = Attribute::new("yearCollected,monthCollected,dayCollected", "urn:eventDate");
        ymd.combine = Some(Combine::Ymd);
        assert_eq!(
            ymd.source(),
            ColumnSource::Ymd {
                year: "yearCollected",
                month: Some("monthCollected"),
                day: Some("dayCollected"),
            }
        );

        let bare = Attribute::new("a,b", "urn:ab");
        assert_eq!(bare.source(), ColumnSource::Unsupported);
    }

    #[test]
    fn translation_requires_defined_by() {
        let validation = Validation {
            worksheets: vec![ValidationSheet {
                sheet_name: "Samples".to_string(),
                rules: vec![Rule {
                    kind: "controlledVocabulary".to_string(),
                    column: Some("basisOfRecord".to_string()),
                    list: Some("basis".to_string()),
                }],
            }],
            lists: vec![TranslationList {
                alias: "basis".to_string(),
                fields: vec![Field {
                    value: "PreservedSpecimen".to_string(),
                    defined_by: Some("http://rs.tdwg.org/dwc/terms/PreservedSpecimen".to_string()),
                }],
            }],
        };
        let attribute = Attribute::new("basisOfRecord", "urn:basisOfRecord");
        let list = validation.translation_for(&attribute, "Samples").unwrap();
        assert_eq!(
            list.defined_by("PreservedSpecimen"),
            Some("http://rs.tdwg.org/dwc/terms/PreservedSpecimen")
        );
        assert!(validation
            .translation_for(&Attribute::new("phylum", "urn:phylum"), "Samples")
            .is_none());
    }
}
