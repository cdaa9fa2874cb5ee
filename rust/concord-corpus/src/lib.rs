//! Corpus collaborator contracts consumed by the result key engine.
//!
//! This crate defines the interfaces the key engine relies on without owning:
//! the schema registry, locale-aware collation, term tables with precomputed
//! sort ranks, batched forward-index retrieval, and segment-aware stored
//! document values. The [`mem`] module ships a complete in-memory corpus
//! implementing all of them, which the engine's tests (and small tools) run
//! against.

pub mod collation;
pub mod corpus;
pub mod docvalues;
pub mod forward;
pub mod mem;
pub mod schema;
pub mod terms;

/// Global document identifier within a corpus.
pub type DocId = u32;

pub use collation::{Collator, Sensitivity, create_collator};
pub use corpus::Corpus;
pub use docvalues::{DocValues, SegmentMap, SegmentValues, SegmentedDocValues};
pub use forward::ForwardIndex;
pub use schema::{AnnotatedField, CorpusSchema, MetadataField, SchemaBuilder};
pub use terms::{NO_TERM, TermId, Terms};
