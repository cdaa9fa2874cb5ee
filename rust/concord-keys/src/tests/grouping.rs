use std::sync::Arc;

use concord_corpus::{Corpus, Sensitivity};

use super::fixtures;
use crate::doc_key::DocKey;
use crate::group_key::GroupKey;
use crate::hit_key::HitKey;
use crate::results::{DocResult, DocResults, GroupHandle};
use crate::value::{Decade, Value};

#[test]
fn years_of_one_decade_group_together() {
    let corpus = fixtures::corpus();
    // Docs 0 (1984) and 1 (1989) share the eighties; doc 2 is 1991; doc 3
    // has an unparseable year.
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2), (1, 1, 2), (2, 0, 1), (3, 0, 1)]);
    let groups = hits.group_by(&HitKey::decade("year")).unwrap();
    assert_eq!(groups.len(), 3);

    let sorted = groups.sorted_by(&GroupKey::identity());
    assert_eq!(
        sorted.get(0).identity(),
        &Value::Decade(Decade::from_year(1984))
    );
    assert_eq!(sorted.get(0).size(), 2);
    assert_eq!(
        sorted.get(1).identity(),
        &Value::Decade(Decade::from_year(1991))
    );
    // The unparseable year sorts after all valid decades...
    assert_eq!(sorted.get(2).identity(), &Value::Decade(Decade::UNKNOWN));

    // ...and before them when reversed.
    let reversed = groups.sorted_by(&GroupKey::identity().reverse());
    assert_eq!(reversed.get(0).identity(), &Value::Decade(Decade::UNKNOWN));
}

#[test]
fn composite_doc_key_orders_same_decade_by_size_descending() {
    let corpus: Arc<dyn Corpus> = fixtures::corpus();
    // Each per-document result is a group of hits. Docs 0 and 1 share the
    // eighties with different hit counts; doc 2 lies in the next decade.
    let docs = DocResults::new(
        corpus,
        "contents",
        vec![
            DocResult {
                doc: 0,
                hit_count: 3,
            },
            DocResult {
                doc: 1,
                hit_count: 9,
            },
            DocResult {
                doc: 2,
                hit_count: 5,
            },
        ],
    )
    .unwrap();
    let key = DocKey::multiple(vec![DocKey::decade("year"), DocKey::size().reverse()]).unwrap();
    let sorted = docs.sorted_by(&key).unwrap();
    let order: Vec<u32> = sorted.iter().map(|r| r.doc).collect();
    // Within the shared decade, purely by size descending.
    assert_eq!(order, vec![1, 0, 2]);
}

#[test]
fn composite_group_key_breaks_identity_ties_by_size() {
    let corpus = fixtures::corpus();
    // Grouping hits by left word: "The"/"the" fold into one group of three,
    // the document-start hits into a group of two.
    let hits = fixtures::hits_over(
        &corpus,
        &[(0, 0, 1), (0, 1, 2), (1, 0, 1), (1, 1, 2), (1, 5, 6)],
    );
    let groups = hits
        .group_by(&HitKey::word_before("word", Sensitivity::Insensitive))
        .unwrap();
    assert_eq!(groups.len(), 2);

    let key = GroupKey::multiple(vec![GroupKey::identity(), GroupKey::size().reverse()]).unwrap();
    let sorted = groups.sorted_by(&key);
    // "the" ranks before the no-value sentinel.
    assert_eq!(sorted.get(0).size(), 3);
    assert_eq!(sorted.get(1).size(), 2);
}

#[test]
fn grouping_hits_by_left_word_folds_case() {
    let corpus = fixtures::corpus();
    // "quick" follows "The"; "cat" and "mat" follow "the".
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2), (1, 1, 2), (1, 5, 6)]);
    let groups = hits
        .group_by(&HitKey::word_before("word", Sensitivity::Insensitive))
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups.get(0).size(), 3);

    let sensitive = hits
        .group_by(&HitKey::word_before("word", Sensitivity::Sensitive))
        .unwrap();
    assert_eq!(sensitive.len(), 2);
}

#[test]
fn doc_start_hits_form_one_group() {
    let corpus = fixtures::corpus();
    let hits = fixtures::hits_over(&corpus, &[(0, 0, 1), (1, 0, 1), (1, 1, 2), (2, 0, 1)]);
    let groups = hits
        .group_by(&HitKey::word_before("word", Sensitivity::Insensitive))
        .unwrap();
    // One group for the three document-start hits, one for "cat" after
    // "the".
    assert_eq!(groups.len(), 2);
    let sorted = groups.sorted_by(&GroupKey::size().reverse());
    assert_eq!(sorted.get(0).size(), 3);
}

#[test]
fn group_values_of_compound_keys_nest() {
    let corpus = fixtures::corpus();
    let hits = fixtures::hits_over(&corpus, &[(0, 1, 2), (0, 3, 4)]);
    let key = HitKey::multiple(vec![HitKey::decade("year"), HitKey::doc_id()]).unwrap();
    let groups = hits.group_by(&key).unwrap();
    assert_eq!(groups.len(), 1);
    match groups.get(0).identity() {
        Value::Multiple(values) => {
            assert_eq!(values.len(), 2);
            assert_eq!(values[0], Value::Decade(Decade::from_year(1984)));
            assert_eq!(values[1], Value::Int(0));
        }
        other => panic!("expected a compound value, got {other:?}"),
    }
}

#[test]
fn span_attribute_groups_hits() {
    use crate::results::{Hit, MatchInfo};

    let corpus = fixtures::corpus();
    let tagged = |doc: u32, start: u32, kind: &str| {
        Hit::new(doc, start, start + 1).with_matches(vec![MatchInfo::Span {
            name: "entity".to_string(),
            field: None,
            start,
            end: start + 1,
            attributes: vec![("type".to_string(), kind.to_string())],
        }])
    };
    let hits = fixtures::raw_hits(
        &corpus,
        vec![
            tagged(0, 3, "animal"),
            tagged(0, 8, "animal"),
            tagged(1, 1, "ANIMAL"),
            Hit::new(2, 0, 1),
        ],
    );
    let key = HitKey::span_attribute("entity", "type", Sensitivity::Insensitive);
    let groups = hits.group_by(&key).unwrap();
    // Case folds: "animal"/"ANIMAL" together; the untagged hit gets the
    // empty value.
    assert_eq!(groups.len(), 2);
    let sorted = groups.sorted_by(&GroupKey::size().reverse());
    assert_eq!(sorted.get(0).size(), 3);
}
