//! Per-identifier attachments (biological sequences) that follow identifiers
//! from one dataset graph to the next.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{FimsError, FimsResult};
use crate::identifier::{IdentifierTable, UriPrefix, decode_local_id, encode_local_id};
use crate::query::{CarryoverUpdate, CountQuery};
use crate::rdf::{Term, Triple, TripleSet};
use crate::schema::{Entity, Mapping};
use crate::triplestore::{GraphCounts, Triplestore};
use crate::vocab::SEQUENCE;

/// Copies every `(?s predicate ?o)` of `previous` into `new` where `?s` is
/// typed `type_guard` in `new`. Identifiers missing from `new` lose their
/// attachment.
pub fn copy_attachment<S: Triplestore + ?Sized>(
    store: &S,
    previous: &str,
    new: &str,
    predicate: &str,
    type_guard: &str,
) -> FimsResult<()> {
    store.update(&CarryoverUpdate {
        previous: previous.to_string(),
        new: new.to_string(),
        predicate: predicate.to_string(),
        type_guard: type_guard.to_string(),
    })?;
    info!(%previous, %new, %predicate, "carried attachments forward");
    Ok(())
}

/// Distinct typed resources and resources carrying `attachment`, per graph.
pub fn count_attachments<S: Triplestore + ?Sized>(
    store: &S,
    graphs: &[String],
    type_class: &str,
    attachment: &str,
) -> FimsResult<BTreeMap<String, GraphCounts>> {
    store.count(&CountQuery {
        graphs: graphs.to_vec(),
        type_class: type_class.to_string(),
        attachment: attachment.to_string(),
    })
}

/// The entity owning the `urn:sequence` attribute.
pub fn sequence_root(mapping: &Mapping) -> Option<&Entity> {
    mapping.entity_with_attribute_uri(SEQUENCE)
}

fn require_root(mapping: &Mapping) -> FimsResult<&Entity> {
    sequence_root(mapping).ok_or_else(|| FimsError::MissingSequenceRoot(SEQUENCE.to_string()))
}

fn root_prefix<'a>(entity: &Entity, identifiers: &'a IdentifierTable) -> FimsResult<&'a UriPrefix> {
    identifiers
        .get(&entity.concept_alias)
        .ok_or_else(|| FimsError::UnknownEntity(entity.concept_alias.clone()))
}

/// Sequence carryover between two dataset graphs. Returns `false` without
/// touching the store when the mapping has no sequence root.
pub fn carry_sequences<S: Triplestore + ?Sized>(
    store: &S,
    mapping: &Mapping,
    previous: &str,
    new: &str,
) -> FimsResult<bool> {
    let Some(root) = sequence_root(mapping) else {
        debug!("mapping has no sequence root, nothing to carry over");
        return Ok(false);
    };
    copy_attachment(store, previous, new, SEQUENCE, &root.concept_uri)?;
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaSequence {
    pub local_id: String,
    pub sequence: String,
}

/// Parses FASTA text. The identifier is the first word of each header; the
/// sequence lines that follow are concatenated.
pub fn parse_fasta(text: &str) -> FimsResult<Vec<FastaSequence>> {
    let mut sequences: Vec<FastaSequence> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let local_id = header.split_whitespace().next().ok_or_else(|| {
                FimsError::FastaParse(format!("line {}: header without identifier", idx + 1))
            })?;
            if sequences.iter().any(|sequence| sequence.local_id == local_id) {
                return Err(FimsError::FastaParse(format!(
                    "line {}: duplicate identifier {local_id}",
                    idx + 1
                )));
            }
            sequences.push(FastaSequence {
                local_id: local_id.to_string(),
                sequence: String::new(),
            });
            continue;
        }
        let current = sequences.last_mut().ok_or_else(|| {
            FimsError::FastaParse(format!("line {}: sequence before first header", idx + 1))
        })?;
        current.sequence.extend(line.chars().filter(|ch| !ch.is_whitespace()));
    }
    if sequences.is_empty() {
        return Err(FimsError::NoFastaData);
    }
    Ok(sequences)
}

/// Triples attaching each sequence to its root resource.
pub fn fasta_triples(prefix: &UriPrefix, sequences: &[FastaSequence]) -> TripleSet {
    sequences
        .iter()
        .map(|sequence| {
            Triple::new(
                Term::iri(format!("{prefix}{}", encode_local_id(&sequence.local_id))),
                SEQUENCE,
                Term::literal(sequence.sequence.as_str()),
            )
        })
        .collect()
}

pub fn upload_fasta<S: Triplestore + ?Sized>(
    store: &S,
    mapping: &Mapping,
    identifiers: &IdentifierTable,
    graph: &str,
    sequences: &[FastaSequence],
) -> FimsResult<()> {
    if sequences.is_empty() {
        return Err(FimsError::NoFastaData);
    }
    let root = require_root(mapping)?;
    let prefix = root_prefix(root, identifiers)?;
    store.append(graph, &fasta_triples(prefix, sequences).to_ntriples()?)?;
    info!(%graph, sequences = sequences.len(), "attached sequences");
    Ok(())
}

/// Local identifiers of the sequence root resources in `graph`.
pub fn fetch_ids<S: Triplestore + ?Sized>(
    store: &S,
    mapping: &Mapping,
    identifiers: &IdentifierTable,
    graph: Option<&str>,
) -> FimsResult<Vec<String>> {
    let root = require_root(mapping)?;
    let prefix = root_prefix(root, identifiers)?;
    let Some(graph) = graph else {
        return Ok(Vec::new());
    };
    Ok(store
        .typed_subjects(graph, &root.concept_uri)?
        .iter()
        .filter_map(|iri| prefix.local_id(iri))
        .map(decode_local_id)
        .collect())
}
