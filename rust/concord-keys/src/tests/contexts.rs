use std::cmp::Ordering;

use concord_common::AbortFlag;
use concord_corpus::Sensitivity;

use super::fixtures;
use crate::hit_key::HitKey;
use crate::results::MatchInfo;
use crate::value::Value;

#[test]
fn word_before_at_document_start_sorts_last() {
    let corpus = fixtures::corpus();
    // Hit 0 starts document 0; hit 1 ("cat" in doc 1) has "the" before it.
    let hits = fixtures::hits_over(&corpus, &[(0, 0, 1), (1, 1, 2)]);
    let key = HitKey::word_before("word", Sensitivity::Insensitive);
    let bound = key.bind(&hits).unwrap();

    assert_eq!(bound.compare(0, 1), Ordering::Greater);
    assert_eq!(bound.compare(1, 0), Ordering::Less);

    // Reversed, the no-value sentinel moves to the front.
    let reversed = key.reverse().bind(&hits).unwrap();
    assert_eq!(reversed.compare(0, 1), Ordering::Less);
}

#[test]
fn missing_context_values_are_mutually_equal() {
    let corpus = fixtures::corpus();
    // Three hits at the very start of their documents, one with a left word.
    let hits = fixtures::hits_over(&corpus, &[(0, 0, 1), (1, 0, 1), (1, 1, 2), (2, 0, 1)]);
    let key = HitKey::word_before("word", Sensitivity::Insensitive);
    let bound = key.bind(&hits).unwrap();

    assert_eq!(bound.compare(0, 1), Ordering::Equal);
    assert_eq!(bound.compare(1, 3), Ordering::Equal);
    assert_eq!(bound.value(0), bound.value(3));

    match bound.value(0) {
        Value::ContextWord(word) => {
            assert!(word.is_no_value());
            assert_eq!(word.text(), "");
        }
        other => panic!("expected a context word, got {other:?}"),
    }
}

#[test]
fn before_context_compares_nearest_word_first() {
    let corpus = fixtures::corpus();
    // "fox" has [brown, quick] before it; "dog" has [lazy, the].
    let hits = fixtures::hits_over(&corpus, &[(0, 3, 4), (0, 8, 9)]);
    let key = HitKey::before_context("word", Sensitivity::Insensitive, 2);
    let bound = key.bind(&hits).unwrap();

    assert_eq!(bound.compare(0, 1), Ordering::Less);

    // Values render in reading order even though comparison runs outward.
    let value = bound.value(0);
    assert_eq!(value.to_display_string(), "quick brown");
    match value {
        Value::ContextWords(words) => assert!(words.is_display_reversed()),
        other => panic!("expected context words, got {other:?}"),
    }
}

#[test]
fn short_left_context_pads_with_no_term() {
    let corpus = fixtures::corpus();
    // "quick" has exactly one word before it; ask for three.
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2)]);
    let key = HitKey::before_context("word", Sensitivity::Insensitive, 3);
    let bound = key.bind(&hits).unwrap();

    match bound.value(0) {
        Value::ContextWords(words) => {
            assert_eq!(words.ranks().len(), 3);
            assert_eq!(words.ranks()[1], i32::MAX);
            assert_eq!(words.ranks()[2], i32::MAX);
        }
        other => panic!("expected context words, got {other:?}"),
    }
}

#[test]
fn match_end_window_reads_backward_from_last_token() {
    let corpus = fixtures::corpus();
    // "quick brown" and "lazy dog".
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 3), (0, 7, 9)]);
    let key = HitKey::context_window("word", Sensitivity::Insensitive, "E1").unwrap();
    let bound = key.bind(&hits).unwrap();

    assert_eq!(bound.value(0).to_display_string(), "brown");
    assert_eq!(bound.value(1).to_display_string(), "dog");
}

#[test]
fn multi_window_spec_builds_a_compound() {
    let corpus = fixtures::corpus();
    let hits = fixtures::hits_over(&corpus, &[(0, 3, 4), (1, 1, 2)]);
    let key = HitKey::context_window("word", Sensitivity::Insensitive, "L1;R1").unwrap();
    assert!(key.sub_keys().is_some());
    let bound = key.bind(&hits).unwrap();

    // fox: [brown | jumps], cat: [the | sat].
    assert_eq!(bound.value(0).to_display_string(), "brown / jumps");
    assert_eq!(bound.value(1).to_display_string(), "the / sat");
}

#[test]
fn sensitivity_controls_context_equality() {
    let corpus = fixtures::corpus();
    // "quick" (after "The") and "mat" (after "the").
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2), (1, 5, 6)]);
    let insensitive = HitKey::word_before("word", Sensitivity::Insensitive)
        .bind(&hits)
        .unwrap();
    assert_eq!(insensitive.compare(0, 1), Ordering::Equal);

    let sensitive = HitKey::word_before("word", Sensitivity::Sensitive)
        .bind(&hits)
        .unwrap();
    assert_ne!(sensitive.compare(0, 1), Ordering::Equal);
}

#[test]
fn lemma_annotation_uses_its_own_terms() {
    let corpus = fixtures::corpus();
    // "dog" in doc 0 and "dogs" in doc 2 share the lemma "dog".
    let hits = fixtures::hits_over(&corpus, &[(0, 8, 9), (2, 0, 1)]);

    let by_lemma = HitKey::hit_text("lemma", Sensitivity::Insensitive)
        .bind(&hits)
        .unwrap();
    assert_eq!(by_lemma.compare(0, 1), Ordering::Equal);

    let by_word = HitKey::hit_text("word", Sensitivity::Insensitive)
        .bind(&hits)
        .unwrap();
    assert_ne!(by_word.compare(0, 1), Ordering::Equal);
}

#[test]
fn parallel_corpus_window_follows_match_info() {
    use crate::results::Hit;

    let corpus = fixtures::corpus();
    // The first hit carries alignment info: its counterpart in the German
    // field is "Fuchs" at [3, 4). The second hit has none.
    let aligned = Hit::new(0, 3, 4).with_matches(vec![MatchInfo::Span {
        name: "target".to_string(),
        field: Some("contents-de".to_string()),
        start: 3,
        end: 4,
        attributes: Vec::new(),
    }]);
    let hits = fixtures::raw_hits(&corpus, vec![aligned, Hit::new(0, 1, 2)]);

    let key = HitKey::hit_text("word", Sensitivity::Insensitive)
        .with_target_field("contents-de");
    let bound = key.bind(&hits).unwrap();

    assert_eq!(bound.value(0).to_display_string(), "Fuchs");
    // No alignment info: the primitive span [1, 2) falls back verbatim,
    // reading "schnelle" from the German field.
    assert_eq!(bound.value(1).to_display_string(), "schnelle");
}

#[test]
fn context_cache_is_shared_until_disposed() {
    use std::sync::Arc;

    use crate::context::{Anchor, ContextPart, ContextSlot};

    let corpus = fixtures::corpus();
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2), (1, 1, 2)]);
    let slot = ContextSlot {
        field: "contents".to_string(),
        annotation: "word".to_string(),
        sensitivity: Sensitivity::Insensitive,
        part: ContextPart::first_n(Anchor::Before, 1),
    };

    let first = hits.fetch_context(&slot).unwrap();
    let second = hits.fetch_context(&slot).unwrap();
    assert!(Arc::ptr_eq(&first, &second), "same slot must share one fetch");

    hits.dispose_contexts();
    let refetched = hits.fetch_context(&slot).unwrap();
    assert!(
        !Arc::ptr_eq(&first, &refetched),
        "dispose must drop the cached windows"
    );
}

#[test]
fn abort_interrupts_context_fetch() {
    let corpus = fixtures::corpus();
    let abort = AbortFlag::new();
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2), (1, 1, 2)]).with_abort(abort.clone());
    abort.raise();

    let key = HitKey::hit_text("word", Sensitivity::Insensitive);
    let err = key.bind(&hits).unwrap_err();
    assert!(err.is_interrupted());
}

#[test]
#[should_panic(expected = "ascending document order")]
fn binding_context_out_of_doc_order_is_a_programming_error() {
    let corpus = fixtures::corpus();
    let hits = fixtures::hits_over(&corpus, &[(1, 1, 2), (0, 1, 2)]);
    let _ = HitKey::hit_text("word", Sensitivity::Insensitive).bind(&hits);
}

#[test]
fn sorted_by_recovers_from_unordered_hits() {
    let corpus = fixtures::corpus();
    // Not in ascending document order; sorted_by reorders internally.
    let hits = fixtures::hits_over(&corpus, &[(1, 1, 2), (0, 2, 3)]);
    let key = HitKey::hit_text("word", Sensitivity::Insensitive);
    let sorted = hits.sorted_by(&key).unwrap();
    let starts: Vec<u32> = sorted.iter().map(|h| h.start).collect();
    // brown before cat.
    assert_eq!(starts, vec![2, 1]);
}
