//! The capability bundle the result key engine works against.

use std::sync::Arc;

use concord_common::Result;

use crate::collation::{Collator, Sensitivity};
use crate::docvalues::DocValues;
use crate::forward::ForwardIndex;
use crate::schema::CorpusSchema;

/// One opened corpus: schema plus per-annotation and per-field readers.
///
/// All accessors hand out shared, thread-safe handles; the engine resolves
/// them once per bind and never touches storage internals.
pub trait Corpus: Send + Sync {
    fn schema(&self) -> &CorpusSchema;

    fn doc_count(&self) -> usize;

    /// The forward index of one annotation of an annotated field.
    fn forward_index(&self, field: &str, annotation: &str) -> Result<Arc<dyn ForwardIndex>>;

    /// The stored-value reader of a metadata field.
    fn doc_values(&self, field: &str) -> Result<Arc<dyn DocValues>>;

    /// A collator for the given sensitivity. Implementations may cache these.
    fn collator(&self, sensitivity: Sensitivity) -> Arc<dyn Collator>;
}
