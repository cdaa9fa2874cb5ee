//! Result models the keys operate on: hit lists, per-document aggregates,
//! and groups of either.

use std::sync::Arc;

use ahash::AHashMap;

use concord_common::{AbortFlag, Result};
use concord_corpus::{Corpus, DocId};

use crate::context::{ContextSet, ContextSlot, ContextStore};
use crate::doc_key::DocKey;
use crate::group_key::GroupKey;
use crate::hit_key::HitKey;
use crate::value::Value;

/// Match information attached to a hit: named captured spans and relations,
/// possibly located in another annotated field of a parallel corpus
/// (`field`/`target_field` of `None` means the searched field itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchInfo {
    Span {
        name: String,
        field: Option<String>,
        start: u32,
        end: u32,
        attributes: Vec<(String, String)>,
    },
    Relation {
        name: String,
        target_field: Option<String>,
        source_start: u32,
        source_end: u32,
        target_start: u32,
        target_end: u32,
    },
}

/// A single located match: a token span within one document, identified by
/// its position in a result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub doc: DocId,
    pub start: u32,
    pub end: u32,
    pub matches: Vec<MatchInfo>,
}

impl Hit {
    pub fn new(doc: DocId, start: u32, end: u32) -> Hit {
        Hit {
            doc,
            start,
            end,
            matches: Vec::new(),
        }
    }

    pub fn with_matches(mut self, matches: Vec<MatchInfo>) -> Hit {
        self.matches = matches;
        self
    }

    /// The attribute of a named captured span, if the hit carries it.
    pub fn span_attribute(&self, span: &str, attribute: &str) -> Option<&str> {
        self.matches.iter().find_map(|info| match info {
            MatchInfo::Span {
                name, attributes, ..
            } if name == span => attributes
                .iter()
                .find(|(key, _)| key == attribute)
                .map(|(_, value)| value.as_str()),
            _ => None,
        })
    }
}

/// A list of hits from one search over one annotated field, together with
/// the per-result-set context cache and abort flag.
pub struct Hits {
    corpus: Arc<dyn Corpus>,
    field: String,
    hits: Vec<Hit>,
    abort: AbortFlag,
    contexts: ContextStore,
}

impl Hits {
    pub fn new(corpus: Arc<dyn Corpus>, field: impl Into<String>, hits: Vec<Hit>) -> Result<Hits> {
        let field = field.into();
        corpus.schema().require_annotated_field(&field)?;
        Ok(Hits {
            corpus,
            field,
            hits,
            abort: AbortFlag::new(),
            contexts: ContextStore::new(),
        })
    }

    /// Attaches a shared abort flag checked during context retrieval.
    pub fn with_abort(mut self, abort: AbortFlag) -> Hits {
        self.abort = abort;
        self
    }

    pub fn corpus(&self) -> &Arc<dyn Corpus> {
        &self.corpus
    }

    /// The annotated field that was searched.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn abort(&self) -> &AbortFlag {
        &self.abort
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Hit {
        &self.hits[index]
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hit> {
        self.hits.iter()
    }

    pub fn is_ascending_by_doc(&self) -> bool {
        self.hits.windows(2).all(|w| w[0].doc <= w[1].doc)
    }

    /// A copy ordered by (document, start, end), the order context
    /// retrieval requires. The copy starts with an empty context cache.
    pub fn with_ascending_doc_order(&self) -> Hits {
        let mut hits = self.hits.clone();
        hits.sort_by(|a, b| (a.doc, a.start, a.end).cmp(&(b.doc, b.start, b.end)));
        self.copy_with_hits(hits)
    }

    pub(crate) fn copy_with_hits(&self, hits: Vec<Hit>) -> Hits {
        Hits {
            corpus: self.corpus.clone(),
            field: self.field.clone(),
            hits,
            abort: self.abort.clone(),
            contexts: ContextStore::new(),
        }
    }

    pub(crate) fn fetch_context(&self, slot: &ContextSlot) -> Result<Arc<ContextSet>> {
        self.contexts.fetch(self, slot)
    }

    /// Clears the context cache. Bound evaluators keep their shared window
    /// sets alive until dropped.
    pub fn dispose_contexts(&self) {
        self.contexts.dispose()
    }

    /// Returns a copy sorted by `key`. When the key needs context and the
    /// hits are not in ascending document order, sorting happens on an
    /// ascending copy (positional keys then refer to positions in that
    /// copy).
    pub fn sorted_by(&self, key: &HitKey) -> Result<Hits> {
        let ordered;
        let source = if key.needs_context() && !self.is_ascending_by_doc() {
            ordered = self.with_ascending_doc_order();
            &ordered
        } else {
            self
        };
        let bound = key.bind(source)?;
        let mut order: Vec<usize> = (0..source.len()).collect();
        order.sort_by(|&a, &b| bound.compare(a, b));
        let hits = order.iter().map(|&i| source.get(i).clone()).collect();
        Ok(source.copy_with_hits(hits))
    }

    /// Groups hits by the value `key` computes for each of them. Groups come
    /// out in first-occurrence order; sort them with a [`GroupKey`].
    pub fn group_by(&self, key: &HitKey) -> Result<HitGroups> {
        let ordered;
        let source = if key.needs_context() && !self.is_ascending_by_doc() {
            ordered = self.with_ascending_doc_order();
            &ordered
        } else {
            self
        };
        let bound = key.bind(source)?;
        let mut index: AHashMap<Value, usize> = AHashMap::new();
        let mut groups: Vec<HitGroup> = Vec::new();
        for i in 0..source.len() {
            let value = bound.value(i);
            let slot = match index.get(&value) {
                Some(&slot) => slot,
                None => {
                    groups.push(HitGroup {
                        identity: value.clone(),
                        hits: Vec::new(),
                    });
                    index.insert(value, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot].hits.push(source.get(i).clone());
        }
        Ok(HitGroups {
            corpus: self.corpus.clone(),
            field: self.field.clone(),
            groups,
        })
    }
}

/// Per-document aggregate of a hit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocResult {
    pub doc: DocId,
    pub hit_count: u64,
}

/// Per-document aggregates, ascending by document id.
pub struct DocResults {
    corpus: Arc<dyn Corpus>,
    field: String,
    results: Vec<DocResult>,
}

impl DocResults {
    pub fn new(
        corpus: Arc<dyn Corpus>,
        field: impl Into<String>,
        results: Vec<DocResult>,
    ) -> Result<DocResults> {
        let field = field.into();
        corpus.schema().require_annotated_field(&field)?;
        Ok(DocResults {
            corpus,
            field,
            results,
        })
    }

    /// Aggregates a hit list into per-document results, ascending by doc id.
    pub fn from_hits(hits: &Hits) -> DocResults {
        let mut counts: AHashMap<DocId, u64> = AHashMap::new();
        for hit in hits.iter() {
            *counts.entry(hit.doc).or_insert(0) += 1;
        }
        let mut results: Vec<DocResult> = counts
            .into_iter()
            .map(|(doc, hit_count)| DocResult { doc, hit_count })
            .collect();
        results.sort_unstable_by_key(|r| r.doc);
        DocResults {
            corpus: hits.corpus().clone(),
            field: hits.field().to_string(),
            results,
        }
    }

    pub fn corpus(&self) -> &Arc<dyn Corpus> {
        &self.corpus
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &DocResult {
        &self.results[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocResult> {
        self.results.iter()
    }

    pub fn sorted_by(&self, key: &DocKey) -> Result<DocResults> {
        let bound = key.bind(self)?;
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| bound.compare(a, b));
        Ok(DocResults {
            corpus: self.corpus.clone(),
            field: self.field.clone(),
            results: order.iter().map(|&i| self.results[i].clone()).collect(),
        })
    }

    pub fn group_by(&self, key: &DocKey) -> Result<DocGroups> {
        let bound = key.bind(self)?;
        let mut index: AHashMap<Value, usize> = AHashMap::new();
        let mut groups: Vec<DocGroup> = Vec::new();
        for i in 0..self.len() {
            let value = bound.value(i);
            let slot = match index.get(&value) {
                Some(&slot) => slot,
                None => {
                    groups.push(DocGroup {
                        identity: value.clone(),
                        docs: Vec::new(),
                    });
                    index.insert(value, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot].docs.push(self.results[i].clone());
        }
        Ok(DocGroups {
            corpus: self.corpus.clone(),
            field: self.field.clone(),
            groups,
        })
    }
}

/// Common surface of a group for group-level keys.
pub trait GroupHandle {
    fn identity(&self) -> &Value;
    fn size(&self) -> u64;
}

/// A group of hits sharing one key value.
#[derive(Clone)]
pub struct HitGroup {
    identity: Value,
    hits: Vec<Hit>,
}

impl HitGroup {
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }
}

impl GroupHandle for HitGroup {
    fn identity(&self) -> &Value {
        &self.identity
    }

    fn size(&self) -> u64 {
        self.hits.len() as u64
    }
}

pub struct HitGroups {
    corpus: Arc<dyn Corpus>,
    field: String,
    groups: Vec<HitGroup>,
}

impl HitGroups {
    pub fn corpus(&self) -> &Arc<dyn Corpus> {
        &self.corpus
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> &HitGroup {
        &self.groups[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HitGroup> {
        self.groups.iter()
    }

    pub fn sorted_by(&self, key: &GroupKey) -> HitGroups {
        let mut groups = self.groups.clone();
        groups.sort_by(|a, b| key.compare(a, b));
        HitGroups {
            corpus: self.corpus.clone(),
            field: self.field.clone(),
            groups,
        }
    }
}

/// A group of per-document results sharing one key value.
#[derive(Clone)]
pub struct DocGroup {
    identity: Value,
    docs: Vec<DocResult>,
}

impl DocGroup {
    pub fn docs(&self) -> &[DocResult] {
        &self.docs
    }
}

impl GroupHandle for DocGroup {
    fn identity(&self) -> &Value {
        &self.identity
    }

    fn size(&self) -> u64 {
        self.docs.len() as u64
    }
}

pub struct DocGroups {
    corpus: Arc<dyn Corpus>,
    field: String,
    groups: Vec<DocGroup>,
}

impl DocGroups {
    pub fn corpus(&self) -> &Arc<dyn Corpus> {
        &self.corpus
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> &DocGroup {
        &self.groups[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocGroup> {
        self.groups.iter()
    }

    pub fn sorted_by(&self, key: &GroupKey) -> DocGroups {
        let mut groups = self.groups.clone();
        groups.sort_by(|a, b| key.compare(a, b));
        DocGroups {
            corpus: self.corpus.clone(),
            field: self.field.clone(),
            groups,
        }
    }
}
