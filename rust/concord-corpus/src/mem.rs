//! In-memory corpus: a complete implementation of every collaborator
//! contract, used by the key engine's tests and by small tools.
//!
//! Documents are ingested through [`MemCorpusBuilder`] in global doc-id
//! order, optionally split into segments to exercise the segment-resolution
//! path. Building the corpus constructs one term table per annotation stream
//! with sort ranks precomputed for every sensitivity, so rank lookups at
//! sort time are plain array reads.

use std::sync::Arc;

use ahash::AHashMap;

use concord_common::{Result, error::Error};

use crate::DocId;
use crate::collation::{Collator, Sensitivity, create_collator};
use crate::corpus::Corpus;
use crate::docvalues::{DocValues, SegmentMap, SegmentValues, SegmentedDocValues};
use crate::forward::ForwardIndex;
use crate::schema::CorpusSchema;
use crate::terms::{NO_TERM, TermId, Terms};

const SENSITIVITIES: [Sensitivity; 4] = [
    Sensitivity::Sensitive,
    Sensitivity::Insensitive,
    Sensitivity::CaseInsensitive,
    Sensitivity::DiacriticsInsensitive,
];

fn sensitivity_slot(sensitivity: Sensitivity) -> usize {
    match sensitivity {
        Sensitivity::Sensitive => 0,
        Sensitivity::Insensitive => 1,
        Sensitivity::CaseInsensitive => 2,
        Sensitivity::DiacriticsInsensitive => 3,
    }
}

/// Term table over one annotation stream.
///
/// Terms keep their first-occurrence ids; ranks are equivalence-class indices
/// under each sensitivity's collation, so terms that fold together share a
/// rank.
pub struct MemTerms {
    texts: Vec<String>,
    by_text: AHashMap<String, TermId>,
    ranks: [Vec<i32>; 4],
}

impl MemTerms {
    fn build(texts: Vec<String>) -> MemTerms {
        let mut by_text = AHashMap::with_capacity(texts.len());
        for (id, text) in texts.iter().enumerate() {
            by_text.insert(text.clone(), id as TermId);
        }
        let ranks = SENSITIVITIES.map(|sensitivity| {
            let collator = create_collator(sensitivity);
            let keys: Vec<String> = texts.iter().map(|t| collator.sort_key(t)).collect();
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            sorted.dedup();
            keys.iter()
                .map(|k| sorted.binary_search(k).unwrap() as i32)
                .collect()
        });
        MemTerms {
            texts,
            by_text,
            ranks,
        }
    }
}

impl Terms for MemTerms {
    fn len(&self) -> usize {
        self.texts.len()
    }

    fn rank(&self, term: TermId, sensitivity: Sensitivity) -> i32 {
        self.ranks[sensitivity_slot(sensitivity)][term as usize]
    }

    fn text(&self, term: TermId) -> Option<&str> {
        if term < 0 {
            return None;
        }
        self.texts.get(term as usize).map(|s| s.as_str())
    }

    fn id_of(&self, text: &str) -> TermId {
        self.by_text.get(text).copied().unwrap_or(NO_TERM)
    }
}

/// Forward index over one annotation stream: per-document term-id rows.
pub struct MemForwardIndex {
    annotation: String,
    terms: Arc<MemTerms>,
    docs: Vec<Vec<TermId>>,
}

impl ForwardIndex for MemForwardIndex {
    fn annotation(&self) -> &str {
        &self.annotation
    }

    fn terms(&self) -> &dyn Terms {
        &*self.terms
    }

    fn doc_count(&self) -> usize {
        self.docs.len()
    }

    fn doc_length(&self, doc: DocId) -> Result<usize> {
        self.docs
            .get(doc as usize)
            .map(|t| t.len())
            .ok_or_else(|| Error::not_found("document", doc.to_string()))
    }

    fn retrieve(&self, doc: DocId, starts: &[i64], ends: &[i64]) -> Result<Vec<Vec<TermId>>> {
        concord_common::verify_arg!(ends, starts.len() == ends.len());
        let tokens = self
            .docs
            .get(doc as usize)
            .ok_or_else(|| Error::not_found("document", doc.to_string()))?;
        let len = tokens.len() as i64;
        let mut windows = Vec::with_capacity(starts.len());
        for (&start, &end) in starts.iter().zip(ends) {
            let start = start.clamp(0, len);
            let end = end.clamp(start, len);
            windows.push(tokens[start as usize..end as usize].to_vec());
        }
        Ok(windows)
    }
}

struct MemSegmentValues {
    rows: Vec<Vec<String>>,
}

impl SegmentValues for MemSegmentValues {
    fn read(&mut self, local_doc: DocId) -> Result<Vec<String>> {
        Ok(self
            .rows
            .get(local_doc as usize)
            .cloned()
            .unwrap_or_default())
    }
}

/// A fully built in-memory corpus.
pub struct MemCorpus {
    schema: CorpusSchema,
    doc_count: usize,
    forward: AHashMap<(String, String), Arc<MemForwardIndex>>,
    values: AHashMap<String, Arc<SegmentedDocValues>>,
    collators: [Arc<dyn Collator>; 4],
}

impl MemCorpus {
    pub fn builder(schema: CorpusSchema) -> MemCorpusBuilder {
        MemCorpusBuilder::new(schema)
    }
}

impl Corpus for MemCorpus {
    fn schema(&self) -> &CorpusSchema {
        &self.schema
    }

    fn doc_count(&self) -> usize {
        self.doc_count
    }

    fn forward_index(&self, field: &str, annotation: &str) -> Result<Arc<dyn ForwardIndex>> {
        self.forward
            .get(&(field.to_string(), annotation.to_string()))
            .map(|fi| fi.clone() as Arc<dyn ForwardIndex>)
            .ok_or_else(|| Error::not_found("forward index", format!("{field}/{annotation}")))
    }

    fn doc_values(&self, field: &str) -> Result<Arc<dyn DocValues>> {
        self.values
            .get(field)
            .map(|dv| dv.clone() as Arc<dyn DocValues>)
            .ok_or_else(|| Error::not_found("metadata field", field))
    }

    fn collator(&self, sensitivity: Sensitivity) -> Arc<dyn Collator> {
        self.collators[sensitivity_slot(sensitivity)].clone()
    }
}

/// Ingests documents in global id order and builds a [`MemCorpus`].
pub struct MemCorpusBuilder {
    schema: CorpusSchema,
    segment_bases: Vec<DocId>,
    doc_count: usize,
    tokens: AHashMap<(String, String), Vec<Vec<String>>>,
    metadata: AHashMap<String, Vec<Vec<String>>>,
}

impl MemCorpusBuilder {
    pub fn new(schema: CorpusSchema) -> MemCorpusBuilder {
        MemCorpusBuilder {
            schema,
            segment_bases: vec![0],
            doc_count: 0,
            tokens: AHashMap::new(),
            metadata: AHashMap::new(),
        }
    }

    /// Starts a new storage segment; subsequent documents land in it. A call
    /// before any document was added to the current segment is a no-op.
    pub fn begin_segment(&mut self) {
        let next = self.doc_count as DocId;
        if *self.segment_bases.last().unwrap() != next {
            self.segment_bases.push(next);
        }
    }

    pub fn add_document(&mut self) -> DocBuilder<'_> {
        DocBuilder {
            builder: self,
            tokens: AHashMap::new(),
            metadata: AHashMap::new(),
        }
    }

    pub fn build(self) -> Result<Arc<MemCorpus>> {
        let mut forward = AHashMap::new();
        for field in self.schema.annotated_fields() {
            for annotation in field.annotations() {
                let key = (field.name().to_string(), annotation.name().to_string());
                let mut docs: Vec<Vec<String>> =
                    self.tokens.get(&key).cloned().unwrap_or_default();
                docs.resize(self.doc_count, Vec::new());

                let mut texts = Vec::new();
                let mut seen: AHashMap<String, TermId> = AHashMap::new();
                let mut rows = Vec::with_capacity(docs.len());
                for doc in &docs {
                    let mut row = Vec::with_capacity(doc.len());
                    for token in doc {
                        let id = match seen.get(token) {
                            Some(&id) => id,
                            None => {
                                let id = texts.len() as TermId;
                                texts.push(token.clone());
                                seen.insert(token.clone(), id);
                                id
                            }
                        };
                        row.push(id);
                    }
                    rows.push(row);
                }
                forward.insert(
                    key.clone(),
                    Arc::new(MemForwardIndex {
                        annotation: annotation.name().to_string(),
                        terms: Arc::new(MemTerms::build(texts)),
                        docs: rows,
                    }),
                );
            }
        }

        let map = SegmentMap::new(self.segment_bases.clone())?;
        let mut values = AHashMap::new();
        for field in self.schema.metadata_fields() {
            let mut rows: Vec<Vec<String>> =
                self.metadata.get(field.name()).cloned().unwrap_or_default();
            rows.resize(self.doc_count, Vec::new());
            let mut segments: Vec<Box<dyn SegmentValues>> = Vec::new();
            for (i, &base) in self.segment_bases.iter().enumerate() {
                let end = self
                    .segment_bases
                    .get(i + 1)
                    .map(|&b| b as usize)
                    .unwrap_or(self.doc_count);
                segments.push(Box::new(MemSegmentValues {
                    rows: rows[base as usize..end].to_vec(),
                }));
            }
            values.insert(
                field.name().to_string(),
                Arc::new(SegmentedDocValues::new(field.name(), map.clone(), segments)?),
            );
        }

        let collators = SENSITIVITIES.map(|s| Arc::from(create_collator(s)));
        Ok(Arc::new(MemCorpus {
            schema: self.schema,
            doc_count: self.doc_count,
            forward,
            values,
            collators,
        }))
    }
}

/// One document under construction.
pub struct DocBuilder<'a> {
    builder: &'a mut MemCorpusBuilder,
    tokens: AHashMap<(String, String), Vec<String>>,
    metadata: AHashMap<String, Vec<String>>,
}

impl DocBuilder<'_> {
    /// Sets the token stream of one annotation of an annotated field.
    pub fn tokens<S: Into<String>>(
        mut self,
        field: &str,
        annotation: &str,
        tokens: impl IntoIterator<Item = S>,
    ) -> Self {
        self.tokens.insert(
            (field.to_string(), annotation.to_string()),
            tokens.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Sets the stored values of a metadata field.
    pub fn metadata<S: Into<String>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.metadata.insert(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Validates field references against the schema and appends the
    /// document.
    pub fn finish(self) -> Result<DocId> {
        let schema = &self.builder.schema;
        for (field, annotation) in self.tokens.keys() {
            schema
                .require_annotated_field(field)?
                .require_annotation(annotation)?;
        }
        for field in self.metadata.keys() {
            schema.require_metadata_field(field)?;
        }

        let doc = self.builder.doc_count as DocId;
        for (key, toks) in self.tokens {
            let column = self.builder.tokens.entry(key).or_default();
            column.resize(doc as usize, Vec::new());
            column.push(toks);
        }
        for (field, vals) in self.metadata {
            let column = self.builder.metadata.entry(field).or_default();
            column.resize(doc as usize, Vec::new());
            column.push(vals);
        }
        self.builder.doc_count += 1;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> CorpusSchema {
        CorpusSchema::builder()
            .annotated_field("contents", ["word", "lemma"])
            .metadata_field("title", false)
            .metadata_field("year", true)
            .build()
            .unwrap()
    }

    fn small_corpus() -> Arc<MemCorpus> {
        let mut b = MemCorpus::builder(schema());
        b.add_document()
            .tokens("contents", "word", ["The", "quick", "fox"])
            .metadata("title", ["Foxes"])
            .metadata("year", ["1987"])
            .finish()
            .unwrap();
        b.begin_segment();
        b.add_document()
            .tokens("contents", "word", ["the", "lazy", "dog"])
            .metadata("title", ["Dogs"])
            .finish()
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn forward_index_round_trip() {
        let corpus = small_corpus();
        let fi = corpus.forward_index("contents", "word").unwrap();
        assert_eq!(fi.doc_count(), 2);
        assert_eq!(fi.doc_length(0).unwrap(), 3);

        let windows = fi.retrieve(0, &[0, 1], &[3, 2]).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].len(), 3);
        assert_eq!(fi.terms().text(windows[1][0]).unwrap(), "quick");
    }

    #[test]
    fn retrieve_clamps_to_document_bounds() {
        let corpus = small_corpus();
        let fi = corpus.forward_index("contents", "word").unwrap();
        let windows = fi.retrieve(0, &[-2, 2], &[1, 10]).unwrap();
        assert_eq!(fi.terms().text(windows[0][0]).unwrap(), "The");
        assert_eq!(windows[0].len(), 1);
        assert_eq!(windows[1].len(), 1);
    }

    #[test]
    fn ranks_fold_by_sensitivity() {
        let corpus = small_corpus();
        let fi = corpus.forward_index("contents", "word").unwrap();
        let terms = fi.terms();
        let the_upper = terms.id_of("The");
        let the_lower = terms.id_of("the");
        assert_ne!(the_upper, the_lower);
        assert_eq!(
            terms.rank(the_upper, Sensitivity::Insensitive),
            terms.rank(the_lower, Sensitivity::Insensitive)
        );
        assert_ne!(
            terms.rank(the_upper, Sensitivity::Sensitive),
            terms.rank(the_lower, Sensitivity::Sensitive)
        );
    }

    #[test]
    fn rank_order_matches_collation_order() {
        let corpus = small_corpus();
        let fi = corpus.forward_index("contents", "word").unwrap();
        let terms = fi.terms();
        let collator = corpus.collator(Sensitivity::Insensitive);
        let dog = terms.id_of("dog");
        let fox = terms.id_of("fox");
        assert_eq!(
            collator.compare("dog", "fox"),
            terms
                .rank(dog, Sensitivity::Insensitive)
                .cmp(&terms.rank(fox, Sensitivity::Insensitive))
        );
    }

    #[test]
    fn metadata_spans_segments() {
        let corpus = small_corpus();
        let titles = corpus.doc_values("title").unwrap();
        assert_eq!(titles.first_value(0).unwrap().unwrap(), "Foxes");
        assert_eq!(titles.first_value(1).unwrap().unwrap(), "Dogs");

        let years = corpus.doc_values("year").unwrap();
        assert_eq!(years.first_value(0).unwrap().unwrap(), "1987");
        assert!(years.first_value(1).unwrap().is_none());
    }

    #[test]
    fn unknown_streams_are_not_found() {
        let corpus = small_corpus();
        assert!(corpus.forward_index("contents", "pos").is_err());
        assert!(corpus.forward_index("body", "word").is_err());
        assert!(corpus.doc_values("author").is_err());
    }

    #[test]
    fn doc_builder_rejects_unknown_fields() {
        let mut b = MemCorpus::builder(schema());
        assert!(
            b.add_document()
                .tokens("body", "word", ["x"])
                .finish()
                .is_err()
        );
        assert!(b.add_document().metadata("author", ["y"]).finish().is_err());
    }
}
