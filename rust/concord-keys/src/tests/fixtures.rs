//! Shared test corpus: two segments, a parallel annotated field, numeric and
//! free-text metadata, one document with an unparseable year.

use std::sync::Arc;

use concord_corpus::{Corpus, CorpusSchema, mem::MemCorpus};

use crate::results::{Hit, Hits};

pub fn schema() -> CorpusSchema {
    CorpusSchema::builder()
        .annotated_field("contents", ["word", "lemma"])
        .annotated_field("contents-de", ["word"])
        .metadata_field("title", false)
        .metadata_field("author", false)
        .metadata_field("year", true)
        .metadata_field("weird,field", false)
        .build()
        .unwrap()
}

/// Four documents:
///
/// - doc 0 (`1984`): "The quick brown fox jumps over the lazy dog", with a
///   German parallel version.
/// - doc 1 (`1989`): "the cat sat on the mat"
/// - doc 2 (`1991`, second segment): "dogs chase cats"
/// - doc 3 (year "someday", unparseable): "years go by"
pub fn corpus() -> Arc<MemCorpus> {
    let mut builder = MemCorpus::builder(schema());
    builder
        .add_document()
        .tokens(
            "contents",
            "word",
            ["The", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog"],
        )
        .tokens(
            "contents",
            "lemma",
            ["the", "quick", "brown", "fox", "jump", "over", "the", "lazy", "dog"],
        )
        .tokens(
            "contents-de",
            "word",
            ["Der", "schnelle", "braune", "Fuchs", "springt"],
        )
        .metadata("title", ["Foxes"])
        .metadata("author", ["Jansen, A.", "de Vries, B."])
        .metadata("year", ["1984"])
        .finish()
        .unwrap();
    builder
        .add_document()
        .tokens("contents", "word", ["the", "cat", "sat", "on", "the", "mat"])
        .tokens("contents", "lemma", ["the", "cat", "sit", "on", "the", "mat"])
        .metadata("title", ["Cats"])
        .metadata("year", ["1989"])
        .finish()
        .unwrap();
    builder.begin_segment();
    builder
        .add_document()
        .tokens("contents", "word", ["dogs", "chase", "cats"])
        .tokens("contents", "lemma", ["dog", "chase", "cat"])
        .metadata("title", ["Dogs"])
        .metadata("year", ["1991"])
        .finish()
        .unwrap();
    builder
        .add_document()
        .tokens("contents", "word", ["years", "go", "by"])
        .tokens("contents", "lemma", ["year", "go", "by"])
        .metadata("title", ["Mystery"])
        .metadata("year", ["someday"])
        .finish()
        .unwrap();
    builder.build().unwrap()
}

/// Hits over the `contents` field from `(doc, start, end)` triples.
pub fn hits_over(corpus: &Arc<MemCorpus>, spans: &[(u32, u32, u32)]) -> Hits {
    raw_hits(
        corpus,
        spans
            .iter()
            .map(|&(doc, start, end)| Hit::new(doc, start, end))
            .collect(),
    )
}

/// Hits over the `contents` field from prebuilt [`Hit`] values (e.g. with
/// match information attached).
pub fn raw_hits(corpus: &Arc<MemCorpus>, hits: Vec<Hit>) -> Hits {
    let shared: Arc<dyn Corpus> = corpus.clone();
    Hits::new(shared, "contents", hits).unwrap()
}
