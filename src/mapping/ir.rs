//! Typed mapping description: class maps, property bridges, translation
//! tables and additional property declarations. Text is produced only by
//! [`crate::mapping::render`].

use serde::Serialize;

use crate::identifier::UriPrefix;
use crate::schema::ColumnRef;
use crate::snapshot::DataStorage;

/// Name of the additional property declaring `owl:DatatypeProperty`.
pub const DATATYPE_PROPERTY_DECL: &str = "owldatatypeproperty";
/// Name of the additional property declaring `owl:ObjectProperty`.
pub const OBJECT_PROPERTY_DECL: &str = "owlobjectproperty";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingDescription {
    pub storage: DataStorage,
    pub class_maps: Vec<ClassMap>,
    pub property_bridges: Vec<PropertyBridge>,
    pub translation_tables: Vec<TranslationTable>,
    pub additional_properties: Vec<AdditionalProperty>,
    pub notes: Vec<CompileNote>,
}

impl MappingDescription {
    pub fn class_map(&self, name: &str) -> Option<&ClassMap> {
        self.class_maps.iter().find(|class_map| class_map.name == name)
    }

    pub fn bridges_of<'a>(&'a self, class_map: &'a str) -> impl Iterator<Item = &'a PropertyBridge> {
        self.property_bridges
            .iter()
            .filter(move |bridge| bridge.belongs_to == class_map)
    }

    pub fn translation_table(&self, name: &str) -> Option<&TranslationTable> {
        self.translation_tables.iter().find(|table| table.name == name)
    }

    pub fn additional_property(&self, name: &str) -> Option<&AdditionalProperty> {
        self.additional_properties
            .iter()
            .find(|property| property.name == name)
    }

    /// Configuration errors, as opposed to partial-presence skips.
    pub fn errors(&self) -> impl Iterator<Item = &CompileNote> {
        self.notes.iter().filter(|note| note.reason.is_error())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    pub name: String,
    pub table: String,
    pub class: String,
    pub identity: Identity,
    pub conditions: Vec<Condition>,
}

/// How the subject of a class map row is formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    UriPattern { prefix: UriPrefix, column: ColumnRef },
    BlankNode { columns: Vec<ColumnRef> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    NonEmpty(ColumnRef),
}

impl Condition {
    pub fn column(&self) -> &ColumnRef {
        match self {
            Condition::NonEmpty(column) => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyBridge {
    pub name: String,
    pub belongs_to: String,
    pub property: String,
    pub value: BridgeValue,
    pub conditions: Vec<Condition>,
    /// Datatype IRI of literal values.
    pub datatype: Option<String>,
    /// Names of the additional properties declared on this bridge's property.
    pub definitions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeValue {
    Column(ColumnRef),
    /// Literal translated into a resource through a translation table.
    Translated { column: ColumnRef, table: String },
    Joined {
        columns: Vec<ColumnRef>,
        delimiter: String,
    },
    PartialDate {
        year: ColumnRef,
        month: Option<ColumnRef>,
        day: Option<ColumnRef>,
    },
    /// Reference to the subject of another class map on the same row.
    Resource { class_map: String, identity: Identity },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTable {
    pub name: String,
    /// `(database value, resource IRI)` pairs in list order.
    pub entries: Vec<(String, String)>,
}

impl TranslationTable {
    pub fn translate(&self, value: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(database, _)| database == value)
            .map(|(_, resource)| resource.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalProperty {
    pub name: String,
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileNote {
    /// Class map or bridge the note is about.
    pub subject: String,
    pub reason: NoteReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteReason {
    ColumnAbsent { column: String },
    PartialComposite { missing: Vec<String> },
    NotDisplayed,
    EntityNotMaterialized,
    RelationEndpointMissing { entity: String },
    ConfigError { message: String },
}

impl NoteReason {
    pub fn is_error(&self) -> bool {
        matches!(self, NoteReason::ConfigError { .. })
    }
}

/// Restrict a generated name to characters valid in a prefixed local name.
pub fn local_name(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
