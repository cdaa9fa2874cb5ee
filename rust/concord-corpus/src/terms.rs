//! Term table contract: term id to rank, text, and back.

use crate::collation::Sensitivity;

/// Identifier of a term within one annotation's term table.
pub type TermId = i32;

/// Reserved identifier for "no term here" (a context position outside the
/// document, or an unindexed token). Always negative.
pub const NO_TERM: TermId = -1;

/// Rank assigned to [`NO_TERM`], placing it after every real term in the
/// forward sort order.
pub const NO_TERM_RANK: i32 = i32::MAX;

/// A per-annotation term table with precomputed, sensitivity-aware sort
/// ranks.
///
/// Ranks stand in for collated comparisons: two terms order under a
/// sensitivity exactly as their ranks order numerically, and terms that fold
/// together under the sensitivity share one rank. Rank computation happens
/// when the table is built; the key engine only ever compares integers.
pub trait Terms: Send + Sync {
    /// Number of distinct terms in the table.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sort rank of a valid term under the given sensitivity.
    ///
    /// Callers pass real term ids only; use [`Terms::sort_position`] when the
    /// id may be [`NO_TERM`].
    fn rank(&self, term: TermId, sensitivity: Sensitivity) -> i32;

    /// The display text of a term, or `None` for [`NO_TERM`] / out-of-range
    /// ids.
    fn text(&self, term: TermId) -> Option<&str>;

    /// Resolves text back to a term id, or [`NO_TERM`] when absent. Matching
    /// is exact (sensitive); serialized values store the indexed text.
    fn id_of(&self, text: &str) -> TermId;

    /// Like [`Terms::rank`], but maps [`NO_TERM`] (and any negative id) to
    /// [`NO_TERM_RANK`] so missing context sorts last in forward order.
    #[inline]
    fn sort_position(&self, term: TermId, sensitivity: Sensitivity) -> i32 {
        if term < 0 {
            NO_TERM_RANK
        } else {
            self.rank(term, sensitivity)
        }
    }
}
