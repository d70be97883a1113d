//! The forward mapping: a typed description compiled from a [`Mapping`] and the
//! known columns of a dataset version, rendered to D2RQ text on demand.
//!
//! [`Mapping`]: crate::schema::Mapping

pub mod compile;
pub mod ir;
pub mod render;

pub use compile::MappingCompiler;
pub use ir::{
    AdditionalProperty, BridgeValue, ClassMap, CompileNote, Condition, Identity,
    MappingDescription, NoteReason, PropertyBridge, TranslationTable, local_name,
};
pub use render::render;
