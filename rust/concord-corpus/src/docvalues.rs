//! Segment-aware stored document values.
//!
//! Stored metadata lives in per-segment columnar files; a global document id
//! must be resolved to a segment plus a segment-local id before reading. The
//! resolution table is a sorted array of segment base offsets searched with
//! binary search; the key engine never sees segment internals.
//!
//! Per-segment cursors are positional and not safe for concurrent reads, so
//! [`SegmentedDocValues`] guards each one with a `Mutex` and locks around
//! every read. The readers themselves stay cheap: one lock, one positional
//! read.

use std::sync::Mutex;

use concord_common::{Result, error::Error};

use crate::DocId;

/// Stored per-document values of one metadata field.
pub trait DocValues: Send + Sync {
    /// The metadata field this reader serves.
    fn field(&self) -> &str;

    /// All stored values of the field for a document, in storage order.
    /// A document without the field yields an empty vector.
    fn values(&self, doc: DocId) -> Result<Vec<String>>;

    /// Convenience accessor for the first stored value.
    fn first_value(&self, doc: DocId) -> Result<Option<String>> {
        Ok(self.values(doc)?.into_iter().next())
    }
}

/// Maps a global document id to `(segment ordinal, segment-local id)`.
///
/// Built from the ascending base offset of each segment; resolution is a
/// binary search over that array.
#[derive(Debug, Clone)]
pub struct SegmentMap {
    bases: Vec<DocId>,
}

impl SegmentMap {
    /// `bases[i]` is the global id of the first document in segment `i`.
    /// The array must start at 0 and be strictly ascending.
    pub fn new(bases: Vec<DocId>) -> Result<SegmentMap> {
        concord_common::verify_arg!(bases, !bases.is_empty() && bases[0] == 0);
        concord_common::verify_arg!(bases, bases.windows(2).all(|w| w[0] < w[1]));
        Ok(SegmentMap { bases })
    }

    pub fn segment_count(&self) -> usize {
        self.bases.len()
    }

    /// Resolves a global doc id to its segment and local id.
    #[inline]
    pub fn locate(&self, doc: DocId) -> (usize, DocId) {
        let seg = self.bases.partition_point(|&base| base <= doc) - 1;
        (seg, doc - self.bases[seg])
    }

    /// The global id of the first document in a segment.
    pub fn base(&self, segment: usize) -> DocId {
        self.bases[segment]
    }
}

/// A positional cursor into one segment's stored values for one field.
///
/// Not safe for concurrent use; [`SegmentedDocValues`] serializes access.
pub trait SegmentValues: Send {
    fn read(&mut self, local_doc: DocId) -> Result<Vec<String>>;
}

/// [`DocValues`] implementation stitching per-segment cursors together behind
/// the segment map.
pub struct SegmentedDocValues {
    field: String,
    map: SegmentMap,
    segments: Vec<Mutex<Box<dyn SegmentValues>>>,
}

impl SegmentedDocValues {
    pub fn new(
        field: impl Into<String>,
        map: SegmentMap,
        segments: Vec<Box<dyn SegmentValues>>,
    ) -> Result<SegmentedDocValues> {
        let field = field.into();
        if segments.len() != map.segment_count() {
            return Err(Error::invalid_arg(
                "segments",
                format!(
                    "{} cursors for {} segments of field '{field}'",
                    segments.len(),
                    map.segment_count()
                ),
            ));
        }
        Ok(SegmentedDocValues {
            field,
            map,
            segments: segments.into_iter().map(Mutex::new).collect(),
        })
    }

    pub fn segment_map(&self) -> &SegmentMap {
        &self.map
    }
}

impl DocValues for SegmentedDocValues {
    fn field(&self) -> &str {
        &self.field
    }

    fn values(&self, doc: DocId) -> Result<Vec<String>> {
        let (segment, local) = self.map.locate(doc);
        let mut cursor = self.segments[segment].lock().unwrap();
        cursor.read(local)
    }
}
