//! Forward index contract: batched token-id window retrieval.

use concord_common::Result;

use crate::DocId;
use crate::terms::{TermId, Terms};

/// Columnar store mapping (document, token position) to term id for one
/// annotation.
///
/// Retrieval is batched per document: one call returns every requested window
/// of that document. Implementations clamp each requested range to the
/// document's token bounds and return only the in-bounds tokens; padding the
/// result out to a fixed window length (with [`crate::NO_TERM`]) is the
/// caller's concern, since only the caller knows which side of the window was
/// cut off.
pub trait ForwardIndex: Send + Sync {
    /// The annotation this index stores.
    fn annotation(&self) -> &str;

    /// The term table shared by all documents of this index.
    fn terms(&self) -> &dyn Terms;

    fn doc_count(&self) -> usize;

    /// Token length of a document.
    fn doc_length(&self, doc: DocId) -> Result<usize>;

    /// Retrieves `starts.len()` windows from one document. `starts[i]..ends[i]`
    /// is the requested half-open token range of window `i`; ranges may extend
    /// past either document edge (including negative starts) and are clamped.
    fn retrieve(&self, doc: DocId, starts: &[i64], ends: &[i64]) -> Result<Vec<Vec<TermId>>>;
}
