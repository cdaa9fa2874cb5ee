//! Document-level sort/group keys, operating on per-document aggregates.

use std::cmp::Ordering;
use std::sync::OnceLock;

use ahash::AHashMap;
use itertools::Itertools;

use concord_common::{Result, error::Error};
use concord_corpus::{Collator, DocValues, Sensitivity};

use crate::results::DocResults;
use crate::serialize::{
    ParseMode, combine_compound, combine_parts, split_compound, split_parts, strip_compound,
};
use crate::value::{Decade, StrValue, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum DocKeyKind {
    /// The document itself, as a document reference.
    Identity,
    /// Number of hits, under its generic group-size name.
    Size,
    /// Number of hits, under its explicit name.
    NumHits,
    /// The numeric document id.
    Id,
    StoredField { field: String },
    /// Token length of an annotated field.
    FieldLength { field: String },
    Decade { field: String },
    Multiple(Vec<DocKey>),
}

/// A sort/group criterion over per-document results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocKey {
    reverse: bool,
    kind: DocKeyKind,
}

impl DocKey {
    fn scalar(kind: DocKeyKind) -> DocKey {
        DocKey {
            reverse: false,
            kind,
        }
    }

    pub fn identity() -> DocKey {
        DocKey::scalar(DocKeyKind::Identity)
    }

    pub fn size() -> DocKey {
        DocKey::scalar(DocKeyKind::Size)
    }

    pub fn num_hits() -> DocKey {
        DocKey::scalar(DocKeyKind::NumHits)
    }

    pub fn id() -> DocKey {
        DocKey::scalar(DocKeyKind::Id)
    }

    pub fn stored_field(field: impl Into<String>) -> DocKey {
        DocKey::scalar(DocKeyKind::StoredField {
            field: field.into(),
        })
    }

    pub fn field_length(field: impl Into<String>) -> DocKey {
        DocKey::scalar(DocKeyKind::FieldLength {
            field: field.into(),
        })
    }

    pub fn decade(field: impl Into<String>) -> DocKey {
        DocKey::scalar(DocKeyKind::Decade {
            field: field.into(),
        })
    }

    pub fn multiple(keys: Vec<DocKey>) -> Result<DocKey> {
        concord_common::verify_arg!(keys, !keys.is_empty());
        Ok(DocKey::scalar(DocKeyKind::Multiple(keys)))
    }

    pub fn reverse(&self) -> DocKey {
        DocKey {
            reverse: !self.reverse,
            kind: self.kind.clone(),
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn sub_keys(&self) -> Option<&[DocKey]> {
        match &self.kind {
            DocKeyKind::Multiple(keys) => Some(keys),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            DocKeyKind::Identity => "document".to_string(),
            DocKeyKind::Size => "group size".to_string(),
            DocKeyKind::NumHits => "number of hits".to_string(),
            DocKeyKind::Id => "document id".to_string(),
            DocKeyKind::StoredField { field } => format!("metadata field {field}"),
            DocKeyKind::FieldLength { field } => format!("token length of {field}"),
            DocKeyKind::Decade { field } => format!("decade of {field}"),
            DocKeyKind::Multiple(keys) => keys.iter().map(|k| k.name()).join(", "),
        }
    }

    pub fn serialize(&self) -> String {
        if let DocKeyKind::Multiple(keys) = &self.kind {
            return combine_compound(keys.iter().map(|k| k.serialize()), self.reverse);
        }
        let dash = if self.reverse { "-" } else { "" };
        let body = match &self.kind {
            DocKeyKind::Identity => "identity".to_string(),
            DocKeyKind::Size => "size".to_string(),
            DocKeyKind::NumHits => "numhits".to_string(),
            DocKeyKind::Id => "id".to_string(),
            DocKeyKind::StoredField { field } => combine_parts(["field", field.as_str()]),
            DocKeyKind::FieldLength { field } => combine_parts(["fieldlen", field.as_str()]),
            DocKeyKind::Decade { field } => combine_parts(["decade", field.as_str()]),
            DocKeyKind::Multiple(_) => unreachable!("compounds serialize via the wrapper"),
        };
        format!("{dash}{body}")
    }

    /// Parses a serialized document key. Unknown tags follow `mode`; known
    /// hit-only tags are always a hard error.
    pub fn parse(spec: &str, mode: ParseMode) -> Result<Option<DocKey>> {
        let spec = spec.trim();
        if let Some((reverse, inner)) = strip_compound(spec) {
            let mut keys = Vec::new();
            for item in split_compound(inner) {
                match DocKey::parse(&item, mode)? {
                    Some(key) => keys.push(key),
                    None => {
                        log::debug!("unrecognized document criterion '{item}' in compound spec");
                        return Ok(None);
                    }
                }
            }
            let key = DocKey::multiple(keys)?;
            return Ok(Some(if reverse { key.reverse() } else { key }));
        }

        let parts = split_parts(spec);
        let mut tag = parts[0].to_ascii_lowercase();
        let reverse = tag.starts_with('-');
        if reverse {
            tag.remove(0);
        }
        let Some(builder) = registry().get(tag.as_str()) else {
            return match mode {
                ParseMode::Lenient => {
                    log::debug!("unrecognized document criterion tag '{tag}'");
                    Ok(None)
                }
                ParseMode::Strict => Err(Error::not_found("document criterion", tag)),
            };
        };
        let key = builder(&parts[1..])?;
        Ok(Some(if reverse { key.reverse() } else { key }))
    }

    /// Binds this key to a result list, precomputing every stored value.
    pub fn bind<'a>(&self, docs: &'a DocResults) -> Result<BoundDocKey<'a>> {
        let corpus = docs.corpus();
        let eval = match &self.kind {
            DocKeyKind::Identity => DocEval::Identity,
            DocKeyKind::Size | DocKeyKind::NumHits => DocEval::HitCounts,
            DocKeyKind::Id => DocEval::Id,
            DocKeyKind::StoredField { field } => {
                let numeric = corpus
                    .schema()
                    .require_metadata_field(field)?
                    .is_numeric();
                let reader = corpus.doc_values(field)?;
                let collator = corpus.collator(Sensitivity::Insensitive);
                let values = docs
                    .iter()
                    .map(|result| stored_value(&*reader, result.doc, numeric, &*collator))
                    .collect::<Result<Vec<_>>>()?;
                DocEval::Precomputed { values }
            }
            DocKeyKind::FieldLength { field } => {
                let annotated = corpus.schema().require_annotated_field(field)?;
                let forward =
                    corpus.forward_index(field, annotated.main_annotation())?;
                let lengths = docs
                    .iter()
                    .map(|result| forward.doc_length(result.doc).map(|len| len as i64))
                    .collect::<Result<Vec<_>>>()?;
                DocEval::Lengths { lengths }
            }
            DocKeyKind::Decade { field } => {
                let reader = corpus.doc_values(field)?;
                let decades = docs
                    .iter()
                    .map(|result| {
                        let text = reader.first_value(result.doc)?.unwrap_or_default();
                        Ok(Decade::parse(&text))
                    })
                    .collect::<Result<Vec<_>>>()?;
                DocEval::Decades { decades }
            }
            DocKeyKind::Multiple(keys) => DocEval::Multiple(
                keys.iter()
                    .map(|key| key.bind(docs))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(BoundDocKey {
            docs,
            reverse: self.reverse,
            eval,
        })
    }
}

fn stored_value(
    reader: &dyn DocValues,
    doc: concord_corpus::DocId,
    numeric: bool,
    collator: &dyn Collator,
) -> Result<Value> {
    if numeric {
        let text = reader.first_value(doc)?.unwrap_or_default();
        let number = text.trim().parse::<i64>().unwrap_or_else(|_| {
            log::warn!(
                "malformed numeric value '{text}' in field '{}', substituting 0",
                reader.field()
            );
            0
        });
        Ok(Value::Int(number))
    } else {
        let joined = reader.values(doc)?.join(" · ");
        Ok(Value::Str(StrValue::new(joined, collator)))
    }
}

enum DocEval<'a> {
    Identity,
    HitCounts,
    Id,
    Precomputed { values: Vec<Value> },
    Lengths { lengths: Vec<i64> },
    Decades { decades: Vec<Decade> },
    Multiple(Vec<BoundDocKey<'a>>),
}

/// A document key bound to one result list; all reads are lock-free.
pub struct BoundDocKey<'a> {
    docs: &'a DocResults,
    reverse: bool,
    eval: DocEval<'a>,
}

impl BoundDocKey<'_> {
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn value(&self, index: usize) -> Value {
        match &self.eval {
            DocEval::Identity => Value::Doc(self.docs.get(index).doc),
            DocEval::HitCounts => Value::Int(self.docs.get(index).hit_count as i64),
            DocEval::Id => Value::Int(self.docs.get(index).doc as i64),
            DocEval::Precomputed { values } => values[index].clone(),
            DocEval::Lengths { lengths } => Value::Int(lengths[index]),
            DocEval::Decades { decades } => Value::Decade(decades[index]),
            DocEval::Multiple(keys) => {
                Value::Multiple(keys.iter().map(|key| key.value(index)).collect())
            }
        }
    }

    #[inline]
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        let (a, b) = if self.reverse { (b, a) } else { (a, b) };
        self.compare_forward(a, b)
    }

    fn compare_forward(&self, a: usize, b: usize) -> Ordering {
        match &self.eval {
            DocEval::Identity | DocEval::Id => {
                self.docs.get(a).doc.cmp(&self.docs.get(b).doc)
            }
            DocEval::HitCounts => self.docs.get(a).hit_count.cmp(&self.docs.get(b).hit_count),
            DocEval::Precomputed { values } => values[a].cmp(&values[b]),
            DocEval::Lengths { lengths } => lengths[a].cmp(&lengths[b]),
            DocEval::Decades { decades } => decades[a].start().cmp(&decades[b].start()),
            DocEval::Multiple(keys) => {
                for key in keys {
                    let ordering = key.compare(a, b);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            }
        }
    }
}

type Builder = fn(&[String]) -> Result<DocKey>;

fn required(params: &[String], index: usize, what: &str) -> Result<String> {
    params
        .get(index)
        .filter(|p| !p.is_empty())
        .cloned()
        .ok_or_else(|| Error::invalid_arg(what, "missing required parameter"))
}

fn registry() -> &'static AHashMap<&'static str, Builder> {
    static REGISTRY: OnceLock<AHashMap<&'static str, Builder>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: AHashMap<&'static str, Builder> = AHashMap::new();
        map.insert("identity", |_| Ok(DocKey::identity()));
        map.insert("size", |_| Ok(DocKey::size()));
        map.insert("numhits", |_| Ok(DocKey::num_hits()));
        map.insert("id", |_| Ok(DocKey::id()));
        map.insert("field", |params| {
            Ok(DocKey::stored_field(required(params, 0, "field")?))
        });
        map.insert("fieldlen", |params| {
            Ok(DocKey::field_length(required(params, 0, "fieldlen")?))
        });
        map.insert("decade", |params| {
            Ok(DocKey::decade(required(params, 0, "decade")?))
        });
        // Hit-level criteria: known, but structurally wrong for documents.
        map.insert("docid", |_| Err(Error::unsupported("document", "docid")));
        map.insert("doc", |_| Err(Error::unsupported("document", "doc")));
        map.insert("hit", |_| Err(Error::unsupported("document", "hit")));
        map.insert("left", |_| Err(Error::unsupported("document", "left")));
        map.insert("right", |_| Err(Error::unsupported("document", "right")));
        map.insert("wordleft", |_| {
            Err(Error::unsupported("document", "wordleft"))
        });
        map.insert("wordright", |_| {
            Err(Error::unsupported("document", "wordright"))
        });
        map.insert("context", |_| Err(Error::unsupported("document", "context")));
        map.insert("hitposition", |_| {
            Err(Error::unsupported("document", "hitposition"))
        });
        map.insert("span-attribute", |_| {
            Err(Error::unsupported("document", "span-attribute"))
        });
        map
    })
}
