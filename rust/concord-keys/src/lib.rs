//! The result key engine: pluggable, composable sort/group criteria over
//! corpus search results.
//!
//! # Overview
//!
//! Search produces hits (matched token spans), per-document aggregates, and
//! groups of either. A *key* computes, for each result, an immutable
//! [`value::Value`] with a total, collation-aware order; that value drives
//! sorting and grouping. Keys come in three kinds, one per result shape:
//!
//! - [`hit_key::HitKey`] for positions in a hit list,
//! - [`doc_key::DocKey`] for per-document aggregates,
//! - [`group_key::GroupKey`] for groups.
//!
//! Keys are plain immutable specifications; `bind` attaches one to a result
//! set and performs all batched retrieval up front (stored values per
//! document, forward-index context windows with precomputed sort ranks).
//! The bound evaluator compares by plain integer/rank reads, so an external
//! sort (partitioned or parallel) sees a strict weak ordering with no
//! hidden work.
//!
//! Every key serializes to a compact string usable as an external parameter
//! (`-decade,year`, `wordleft,lemma,i`, parenthesized `-(...)` compounds)
//! and parses back; see [`serialize`] for the grammar.

pub mod context;
pub mod doc_key;
pub mod group_key;
pub mod hit_key;
pub mod results;
pub mod serialize;
pub mod value;

pub use context::{Anchor, ContextPart};
pub use doc_key::{BoundDocKey, DocKey};
pub use group_key::GroupKey;
pub use hit_key::{BoundHitKey, HitKey};
pub use results::{
    DocGroup, DocGroups, DocResult, DocResults, GroupHandle, Hit, HitGroup, HitGroups, Hits,
    MatchInfo,
};
pub use serialize::ParseMode;
pub use value::{Decade, Value};

#[cfg(test)]
mod tests;
