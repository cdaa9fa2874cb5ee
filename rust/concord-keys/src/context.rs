//! Context retrieval: batched, document-grouped fetch of token-id windows
//! around hits, with rank precomputation.
//!
//! All context-based hit keys share one fetch algorithm:
//!
//! 1. The hit list is walked once in ascending document order; hits of the
//!    same document are batched into a single forward-index `retrieve` call
//!    with parallel start/end offset arrays.
//! 2. Windows anchored backward (before-hit, match-end) are reversed into
//!    window order (first offset first) and flagged as display-reversed so
//!    rendering can restore reading order.
//! 3. Sort ranks are computed for every fetched term id at fetch time; the
//!    compare path only ever touches the rank array.
//! 4. Positions outside the document (or outside the match, for confined
//!    windows) pad the window out to its fixed length with `NO_TERM`, which
//!    ranks after every real term.
//!
//! Fetched windows are cached on the owning result set keyed by
//! [`ContextSlot`], so key copies bound to the same results share one fetch.
//! The cache is explicitly disposable.

use std::sync::Arc;
use std::sync::Mutex;

use ahash::AHashMap;

use concord_common::{Result, error::Error};
use concord_corpus::{NO_TERM, Sensitivity, TermId};

use crate::results::Hits;

/// Anchor point of a context window relative to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Tokens before the match, moving away from it (code `L`).
    Before,
    /// Match tokens from the first one forward (code `H`).
    MatchStart,
    /// Match tokens from the last one backward (code `E`).
    MatchEnd,
    /// Tokens after the match, moving away from it (code `R`).
    After,
}

impl Anchor {
    const fn code(&self) -> char {
        match self {
            Anchor::Before => 'L',
            Anchor::MatchStart => 'H',
            Anchor::MatchEnd => 'E',
            Anchor::After => 'R',
        }
    }

    /// Backward anchors walk against reading order; their windows are
    /// reversed after retrieval and render reversed.
    pub const fn is_backward(&self) -> bool {
        matches!(self, Anchor::Before | Anchor::MatchEnd)
    }

    /// Match anchors never read outside the match span.
    pub const fn is_confined(&self) -> bool {
        matches!(self, Anchor::MatchStart | Anchor::MatchEnd)
    }
}

/// One window specification: anchor, 0-based first offset, and an optional
/// requested length (`None` = to the edge of the region).
///
/// Parses from and serializes to the compact form `L`, `L2`, `L1-3`, `R2-`;
/// multiple windows join with `;`. Descending ranges are rejected rather
/// than given an inferred meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextPart {
    anchor: Anchor,
    first: u32,
    length: Option<u32>,
}

impl ContextPart {
    pub fn new(anchor: Anchor, first: u32, length: Option<u32>) -> ContextPart {
        ContextPart {
            anchor,
            first,
            length,
        }
    }

    /// The full region at an anchor: `L`/`H`/`E`/`R` with no offsets.
    pub fn whole(anchor: Anchor) -> ContextPart {
        ContextPart::new(anchor, 0, None)
    }

    /// A fixed-size window starting at the anchor: offsets `1..=n`.
    pub fn first_n(anchor: Anchor, n: u32) -> ContextPart {
        ContextPart::new(anchor, 0, Some(n))
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn requested_length(&self) -> Option<u32> {
        self.length
    }

    /// Parses a single window, e.g. `"L1-3"`. Malformed numbers fall back to
    /// the whole-region default; a zero index or descending range is an
    /// error.
    pub fn parse(spec: &str) -> Result<ContextPart> {
        let mut chars = spec.chars();
        let anchor = match chars.next() {
            Some('L') | Some('l') => Anchor::Before,
            Some('H') | Some('h') => Anchor::MatchStart,
            Some('E') | Some('e') => Anchor::MatchEnd,
            Some('R') | Some('r') => Anchor::After,
            _ => {
                return Err(Error::invalid_arg(
                    "window",
                    format!("window must start with one of L, H, E, R: '{spec}'"),
                ));
            }
        };
        let rest = chars.as_str();
        if rest.is_empty() {
            return Ok(ContextPart::whole(anchor));
        }
        let (first_text, last_text) = match rest.split_once('-') {
            Some((first, last)) => (first, Some(last)),
            None => (rest, None),
        };
        let first = match first_text.parse::<u32>() {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                return Err(Error::invalid_arg(
                    "window",
                    format!("window offsets are 1-based: '{spec}'"),
                ));
            }
            Err(_) => {
                log::warn!("malformed window offset in '{spec}', using the whole region");
                return Ok(ContextPart::whole(anchor));
            }
        };
        let length = match last_text {
            // Single offset: a one-token window.
            None => Some(1),
            // Open range "n-": from the offset to the edge of the region.
            Some("") => None,
            Some(last) => match last.parse::<u32>() {
                Ok(m) if m >= first => Some(m - first + 1),
                Ok(_) => {
                    return Err(Error::invalid_arg(
                        "window",
                        format!("descending window range not supported: '{spec}'"),
                    ));
                }
                Err(_) => {
                    log::warn!("malformed window length in '{spec}', extending to the region edge");
                    None
                }
            },
        };
        Ok(ContextPart {
            anchor,
            first: first - 1,
            length,
        })
    }

    /// Parses a `;`-joined multi-window spec.
    pub fn parse_windows(spec: &str) -> Result<Vec<ContextPart>> {
        let parts = spec
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ContextPart::parse)
            .collect::<Result<Vec<_>>>()?;
        concord_common::verify_arg!(windows, !parts.is_empty());
        Ok(parts)
    }

    /// The window length actually fetched: the requested length clamped to
    /// what remains of the region budget past the first offset.
    pub fn resolved_length(
        &self,
        default_context_size: usize,
        max_match_length: usize,
    ) -> usize {
        let budget = if self.anchor.is_confined() {
            max_match_length
        } else {
            default_context_size
        };
        let available = budget.saturating_sub(self.first as usize);
        match self.length {
            Some(n) => (n as usize).min(available),
            None => available,
        }
    }

    /// True when this window's values render back-to-front.
    pub fn display_reversed(&self) -> bool {
        self.anchor.is_backward()
    }
}

impl std::fmt::Display for ContextPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.anchor.code())?;
        match (self.first, self.length) {
            (0, None) => Ok(()),
            (first, None) => write!(f, "{}-", first + 1),
            (first, Some(1)) => write!(f, "{}", first + 1),
            (first, Some(n)) => write!(f, "{}-{}", first + 1, first + n),
        }
    }
}

/// Identifies one fetched window set within a result set: target field,
/// annotation, sensitivity, and window geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextSlot {
    pub field: String,
    pub annotation: String,
    pub sensitivity: Sensitivity,
    pub part: ContextPart,
}

/// The fetched windows of one [`ContextSlot`]: flat parallel term-id and
/// rank arrays, `window_len` entries per hit. Reads are lock-free.
pub struct ContextSet {
    window_len: usize,
    terms: Vec<TermId>,
    ranks: Vec<i32>,
    display_reversed: bool,
}

impl ContextSet {
    pub fn hit_count(&self) -> usize {
        if self.window_len == 0 {
            0
        } else {
            self.terms.len() / self.window_len
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn is_display_reversed(&self) -> bool {
        self.display_reversed
    }

    #[inline]
    pub fn terms_of(&self, hit: usize) -> &[TermId] {
        &self.terms[hit * self.window_len..(hit + 1) * self.window_len]
    }

    #[inline]
    pub fn ranks_of(&self, hit: usize) -> &[i32] {
        &self.ranks[hit * self.window_len..(hit + 1) * self.window_len]
    }
}

/// Per-result-set context cache. Population is a single critical section per
/// slot; once a slot is filled, readers share the `Arc` without locking.
#[derive(Default)]
pub struct ContextStore {
    slots: Mutex<AHashMap<ContextSlot, Arc<ContextSet>>>,
}

impl ContextStore {
    pub fn new() -> ContextStore {
        ContextStore::default()
    }

    /// Returns the cached window set for `slot`, fetching it on first use.
    /// Concurrent callers serialize on the store lock.
    pub fn fetch(&self, hits: &Hits, slot: &ContextSlot) -> Result<Arc<ContextSet>> {
        let mut slots = self.slots.lock().unwrap();
        if let Some(set) = slots.get(slot) {
            return Ok(set.clone());
        }
        let set = Arc::new(fetch_context_set(hits, slot)?);
        slots.insert(slot.clone(), set.clone());
        Ok(set)
    }

    /// Drops every cached window set. Evaluators already bound keep their
    /// shared handles alive until they are dropped too.
    pub fn dispose(&self) {
        self.slots.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }
}

/// Resolves the match boundaries of `hit` within `target_field` of a
/// parallel corpus: the union of match-info spans and relation endpoints
/// located in that field, falling back to the primitive hit span.
fn foreign_bounds(hit: &crate::results::Hit, target_field: &str) -> (u32, u32) {
    use crate::results::MatchInfo;

    let mut start = u32::MAX;
    let mut end = 0u32;
    let mut found = false;
    for info in &hit.matches {
        match info {
            MatchInfo::Span {
                field: Some(field),
                start: s,
                end: e,
                ..
            } if field == target_field => {
                start = start.min(*s);
                end = end.max(*e);
                found = true;
            }
            MatchInfo::Relation {
                target_field: Some(field),
                target_start,
                target_end,
                ..
            } if field == target_field => {
                start = start.min(*target_start);
                end = end.max(*target_end);
                found = true;
            }
            _ => {}
        }
    }
    if found { (start, end) } else { (hit.start, hit.end) }
}

/// Token range of one hit's window, possibly extending past the document
/// edges (retrieval clamps; padding restores the fixed window length).
fn window_range(part: &ContextPart, window_len: usize, start: u32, end: u32) -> (i64, i64) {
    let s = start as i64;
    let e = end as i64;
    let f = part.first() as i64;
    let n = window_len as i64;
    match part.anchor() {
        Anchor::After => (e + f, e + f + n),
        Anchor::Before => (s - f - n, s - f),
        Anchor::MatchStart => ((s + f).min(e), (s + f + n).min(e)),
        Anchor::MatchEnd => ((e - f - n).max(s), (e - f).max(s)),
    }
}

/// Fetches one slot's windows for every hit: the single-pass, per-document
/// batched walk described in the module docs.
///
/// The hit list must be in ascending document order; that is the caller's
/// contract, and violating it would silently split batches, so it is
/// asserted.
fn fetch_context_set(hits: &Hits, slot: &ContextSlot) -> Result<ContextSet> {
    assert!(
        hits.is_ascending_by_doc(),
        "context retrieval requires hits in ascending document order"
    );

    let corpus = hits.corpus();
    let schema = corpus.schema();
    let window_len = slot
        .part
        .resolved_length(schema.default_context_size(), schema.max_match_length());
    let backward = slot.part.anchor().is_backward();
    let foreign = slot.field != hits.field();
    let forward_index = corpus.forward_index(&slot.field, &slot.annotation)?;
    let terms = forward_index.terms();

    let mut term_ids: Vec<TermId> = Vec::with_capacity(hits.len() * window_len);
    let mut ranks: Vec<i32> = Vec::with_capacity(hits.len() * window_len);

    let mut index = 0;
    while index < hits.len() {
        hits.abort().check("context retrieval")?;

        let doc = hits.get(index).doc;
        let mut batch_end = index + 1;
        while batch_end < hits.len() && hits.get(batch_end).doc == doc {
            batch_end += 1;
        }

        let mut starts = Vec::with_capacity(batch_end - index);
        let mut ends = Vec::with_capacity(batch_end - index);
        for i in index..batch_end {
            let hit = hits.get(i);
            let (hit_start, hit_end) = if foreign {
                foreign_bounds(hit, &slot.field)
            } else {
                (hit.start, hit.end)
            };
            let (start, end) = window_range(&slot.part, window_len, hit_start, hit_end);
            starts.push(start);
            ends.push(end);
        }

        let windows = forward_index.retrieve(doc, &starts, &ends)?;
        for mut window in windows {
            if backward {
                window.reverse();
            }
            window.resize(window_len, NO_TERM);
            for &term in &window {
                ranks.push(terms.sort_position(term, slot.sensitivity));
            }
            term_ids.extend_from_slice(&window);
        }

        index = batch_end;
    }

    Ok(ContextSet {
        window_len,
        terms: term_ids,
        ranks,
        display_reversed: backward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_regions() {
        for (spec, anchor) in [
            ("L", Anchor::Before),
            ("H", Anchor::MatchStart),
            ("E", Anchor::MatchEnd),
            ("R", Anchor::After),
        ] {
            let part = ContextPart::parse(spec).unwrap();
            assert_eq!(part.anchor(), anchor);
            assert_eq!(part.first(), 0);
            assert_eq!(part.requested_length(), None);
        }
    }

    #[test]
    fn parse_offsets_and_ranges() {
        let single = ContextPart::parse("L2").unwrap();
        assert_eq!(single.first(), 1);
        assert_eq!(single.requested_length(), Some(1));

        let range = ContextPart::parse("R1-3").unwrap();
        assert_eq!(range.first(), 0);
        assert_eq!(range.requested_length(), Some(3));

        let open = ContextPart::parse("H2-").unwrap();
        assert_eq!(open.first(), 1);
        assert_eq!(open.requested_length(), None);
    }

    #[test]
    fn parse_rejects_undocumented_geometry() {
        assert!(ContextPart::parse("L3-1").is_err());
        assert!(ContextPart::parse("L0").is_err());
        assert!(ContextPart::parse("X2").is_err());
        assert!(ContextPart::parse("").is_err());
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let part = ContextPart::parse("Lfoo").unwrap();
        assert_eq!(part, ContextPart::whole(Anchor::Before));

        let part = ContextPart::parse("L2-bar").unwrap();
        assert_eq!(part.first(), 1);
        assert_eq!(part.requested_length(), None);
    }

    #[test]
    fn display_round_trips() {
        for spec in ["L", "L2", "L1-3", "H2-", "E1", "R4-9"] {
            let part = ContextPart::parse(spec).unwrap();
            assert_eq!(part.to_string(), spec);
            assert_eq!(ContextPart::parse(&part.to_string()).unwrap(), part);
        }
    }

    #[test]
    fn multi_window_spec() {
        let parts = ContextPart::parse_windows("L1-2; R1-2").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].anchor(), Anchor::Before);
        assert_eq!(parts[1].anchor(), Anchor::After);
        assert!(ContextPart::parse_windows("; ;").is_err());
    }

    #[test]
    fn length_resolution_clamps_to_region_budget() {
        let before = ContextPart::parse("L1-8").unwrap();
        assert_eq!(before.resolved_length(5, 10), 5);

        let offset = ContextPart::parse("L4-20").unwrap();
        assert_eq!(offset.resolved_length(5, 10), 2);

        let hit = ContextPart::parse("H").unwrap();
        assert_eq!(hit.resolved_length(5, 10), 10);

        let past_budget = ContextPart::parse("R9-12").unwrap();
        assert_eq!(past_budget.resolved_length(5, 10), 0);
    }

    #[test]
    fn window_ranges_per_anchor() {
        // Hit spans tokens [10, 13).
        let before = ContextPart::parse("L1-2").unwrap();
        assert_eq!(window_range(&before, 2, 10, 13), (8, 10));

        let after = ContextPart::parse("R1-2").unwrap();
        assert_eq!(window_range(&after, 2, 10, 13), (13, 15));

        let match_start = ContextPart::parse("H1-5").unwrap();
        assert_eq!(window_range(&match_start, 5, 10, 13), (10, 13));

        let match_end = ContextPart::parse("E1-2").unwrap();
        assert_eq!(window_range(&match_end, 2, 10, 13), (11, 13));

        // Window ranges may extend past the document start; retrieval clamps.
        let deep_before = ContextPart::parse("L1-3").unwrap();
        assert_eq!(window_range(&deep_before, 3, 1, 2), (-2, 1));
    }
}
