//! Hit-level sort/group keys.
//!
//! A [`HitKey`] is an immutable specification: what to compute for a hit,
//! in which direction to compare it. Binding it to a [`Hits`] list with
//! [`HitKey::bind`] performs all batched retrieval up front (stored values
//! per document, context windows with precomputed ranks) and returns a
//! [`BoundHitKey`] whose `value`/`compare` reads are lock-free.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use ahash::AHashMap;
use itertools::Itertools;

use concord_common::{Result, error::Error};
use concord_corpus::{
    Collator, DocId, DocValues, ForwardIndex, Sensitivity,
    schema::{AnnotatedField, CorpusSchema},
};

use crate::context::{Anchor, ContextPart, ContextSet, ContextSlot};
use crate::results::Hits;
use crate::serialize::{
    ParseMode, combine_compound, combine_parts, split_compound, split_parts, strip_compound,
};
use crate::value::{ContextWordValue, ContextWordsValue, Decade, StrValue, Value};

/// How a context key serializes: the compact tags `hit`, `left`, `right`,
/// `wordleft`, `wordright` for the canonical windows, `context` for
/// free-form ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextForm {
    Hit,
    Before,
    After,
    WordBefore,
    WordAfter,
    Window,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContextKey {
    /// Annotated field the window reads from; `None` means the searched
    /// field. A different field makes this a parallel-corpus key whose hit
    /// boundaries come from match information.
    target_field: Option<String>,
    annotation: String,
    sensitivity: Sensitivity,
    part: ContextPart,
    form: ContextForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HitKeyKind {
    Doc,
    DocId,
    HitPosition,
    StoredField {
        field: String,
    },
    Decade {
        field: String,
    },
    Context(ContextKey),
    SpanAttribute {
        span: String,
        attribute: String,
        sensitivity: Sensitivity,
    },
    Multiple(Vec<HitKey>),
}

/// A sort/group criterion over hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitKey {
    reverse: bool,
    kind: HitKeyKind,
}

impl HitKey {
    fn scalar(kind: HitKeyKind) -> HitKey {
        HitKey {
            reverse: false,
            kind,
        }
    }

    /// The hit's document as a document reference.
    pub fn doc() -> HitKey {
        HitKey::scalar(HitKeyKind::Doc)
    }

    /// The hit's document id as a plain number.
    pub fn doc_id() -> HitKey {
        HitKey::scalar(HitKeyKind::DocId)
    }

    /// The hit's position in the result list.
    pub fn hit_position() -> HitKey {
        HitKey::scalar(HitKeyKind::HitPosition)
    }

    /// A stored metadata field of the hit's document.
    pub fn stored_field(field: impl Into<String>) -> HitKey {
        HitKey::scalar(HitKeyKind::StoredField {
            field: field.into(),
        })
    }

    /// The decade bucket of a metadata field of the hit's document.
    pub fn decade(field: impl Into<String>) -> HitKey {
        HitKey::scalar(HitKeyKind::Decade {
            field: field.into(),
        })
    }

    /// The matched tokens themselves.
    pub fn hit_text(annotation: impl Into<String>, sensitivity: Sensitivity) -> HitKey {
        HitKey::context(
            annotation,
            sensitivity,
            ContextPart::whole(Anchor::MatchStart),
            ContextForm::Hit,
        )
    }

    /// `n` tokens before the hit, nearest first.
    pub fn before_context(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        n: u32,
    ) -> HitKey {
        HitKey::context(
            annotation,
            sensitivity,
            ContextPart::first_n(Anchor::Before, n),
            ContextForm::Before,
        )
    }

    /// `n` tokens after the hit.
    pub fn after_context(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        n: u32,
    ) -> HitKey {
        HitKey::context(
            annotation,
            sensitivity,
            ContextPart::first_n(Anchor::After, n),
            ContextForm::After,
        )
    }

    /// The single token before the hit.
    pub fn word_before(annotation: impl Into<String>, sensitivity: Sensitivity) -> HitKey {
        HitKey::context(
            annotation,
            sensitivity,
            ContextPart::first_n(Anchor::Before, 1),
            ContextForm::WordBefore,
        )
    }

    /// The single token after the hit.
    pub fn word_after(annotation: impl Into<String>, sensitivity: Sensitivity) -> HitKey {
        HitKey::context(
            annotation,
            sensitivity,
            ContextPart::first_n(Anchor::After, 1),
            ContextForm::WordAfter,
        )
    }

    /// One free-form window.
    pub fn context_part(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        part: ContextPart,
    ) -> HitKey {
        HitKey::context(annotation, sensitivity, part, ContextForm::Window)
    }

    /// A window spec such as `"L1-3"` or `"L1-2;R1-2"`; several windows
    /// become a compound key, one sub-key per window.
    pub fn context_window(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        windows: &str,
    ) -> Result<HitKey> {
        let annotation = annotation.into();
        let mut keys: Vec<HitKey> = ContextPart::parse_windows(windows)?
            .into_iter()
            .map(|part| HitKey::context_part(annotation.clone(), sensitivity, part))
            .collect();
        if keys.len() == 1 {
            Ok(keys.pop().expect("parse_windows returned one window"))
        } else {
            HitKey::multiple(keys)
        }
    }

    /// An attribute of a named captured span.
    pub fn span_attribute(
        span: impl Into<String>,
        attribute: impl Into<String>,
        sensitivity: Sensitivity,
    ) -> HitKey {
        HitKey::scalar(HitKeyKind::SpanAttribute {
            span: span.into(),
            attribute: attribute.into(),
            sensitivity,
        })
    }

    /// A compound key; sub-key order is tie-break precedence.
    pub fn multiple(keys: Vec<HitKey>) -> Result<HitKey> {
        concord_common::verify_arg!(keys, !keys.is_empty());
        Ok(HitKey::scalar(HitKeyKind::Multiple(keys)))
    }

    fn context(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        part: ContextPart,
        form: ContextForm,
    ) -> HitKey {
        HitKey::scalar(HitKeyKind::Context(ContextKey {
            target_field: None,
            annotation: annotation.into(),
            sensitivity,
            part,
            form,
        }))
    }

    /// Redirects context windows to another annotated field of a parallel
    /// corpus. No effect on non-context keys; recurses into compounds.
    pub fn with_target_field(mut self, field: impl Into<String>) -> HitKey {
        let field = field.into();
        match &mut self.kind {
            HitKeyKind::Context(ck) => ck.target_field = Some(field),
            HitKeyKind::Multiple(keys) => {
                let redirected = std::mem::take(keys)
                    .into_iter()
                    .map(|k| k.with_target_field(field.clone()))
                    .collect();
                *keys = redirected;
            }
            _ => {}
        }
        self
    }

    /// A copy comparing in the opposite direction.
    pub fn reverse(&self) -> HitKey {
        HitKey {
            reverse: !self.reverse,
            kind: self.kind.clone(),
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Sub-keys of a compound, `None` for scalars.
    pub fn sub_keys(&self) -> Option<&[HitKey]> {
        match &self.kind {
            HitKeyKind::Multiple(keys) => Some(keys),
            _ => None,
        }
    }

    /// Whether binding fetches forward-index context.
    pub fn needs_context(&self) -> bool {
        match &self.kind {
            HitKeyKind::Context(_) => true,
            HitKeyKind::Multiple(keys) => keys.iter().any(|k| k.needs_context()),
            _ => false,
        }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            HitKeyKind::Doc => "document".to_string(),
            HitKeyKind::DocId => "document id".to_string(),
            HitKeyKind::HitPosition => "hit position".to_string(),
            HitKeyKind::StoredField { field } => format!("metadata field {field}"),
            HitKeyKind::Decade { field } => format!("decade of {field}"),
            HitKeyKind::Context(ck) => match ck.form {
                ContextForm::Hit => format!("hit text: {}", ck.annotation),
                ContextForm::Before => format!("context before: {}", ck.annotation),
                ContextForm::After => format!("context after: {}", ck.annotation),
                ContextForm::WordBefore => format!("word before: {}", ck.annotation),
                ContextForm::WordAfter => format!("word after: {}", ck.annotation),
                ContextForm::Window => format!("context {}: {}", ck.part, ck.annotation),
            },
            HitKeyKind::SpanAttribute {
                span, attribute, ..
            } => format!("span attribute {span}.{attribute}"),
            HitKeyKind::Multiple(keys) => keys.iter().map(|k| k.name()).join(", "),
        }
    }

    /// Serializes to the key grammar; see the crate docs for the tag set.
    pub fn serialize(&self) -> String {
        if let HitKeyKind::Multiple(keys) = &self.kind {
            return combine_compound(keys.iter().map(|k| k.serialize()), self.reverse);
        }
        let dash = if self.reverse { "-" } else { "" };
        format!("{dash}{}", self.serialize_scalar())
    }

    fn serialize_scalar(&self) -> String {
        match &self.kind {
            HitKeyKind::Doc => "doc".to_string(),
            HitKeyKind::DocId => "docid".to_string(),
            HitKeyKind::HitPosition => "hitposition".to_string(),
            HitKeyKind::StoredField { field } => combine_parts(["field", field.as_str()]),
            HitKeyKind::Decade { field } => combine_parts(["decade", field.as_str()]),
            HitKeyKind::SpanAttribute {
                span,
                attribute,
                sensitivity,
            } => combine_parts([
                "span-attribute",
                span.as_str(),
                attribute.as_str(),
                sensitivity.code(),
            ]),
            HitKeyKind::Context(ck) => {
                let tag = match ck.form {
                    ContextForm::Hit => "hit",
                    ContextForm::Before => "left",
                    ContextForm::After => "right",
                    ContextForm::WordBefore => "wordleft",
                    ContextForm::WordAfter => "wordright",
                    ContextForm::Window => "context",
                };
                let mut parts = vec![
                    tag.to_string(),
                    ck.annotation.clone(),
                    ck.sensitivity.code().to_string(),
                ];
                match ck.form {
                    ContextForm::Before | ContextForm::After => {
                        parts.push(ck.part.requested_length().unwrap_or(1).to_string());
                    }
                    ContextForm::Window => parts.push(ck.part.to_string()),
                    _ => {}
                }
                if let Some(field) = &ck.target_field {
                    parts.push(field.clone());
                }
                combine_parts(parts)
            }
            HitKeyKind::Multiple(_) => unreachable!("compounds serialize via the wrapper"),
        }
    }

    /// Parses a serialized hit key. `field` is the searched annotated field,
    /// used to resolve blank annotation names. Unknown tags follow `mode`;
    /// tags that exist but apply to document results only are always a hard
    /// error.
    pub fn parse(
        schema: &CorpusSchema,
        field: &str,
        spec: &str,
        mode: ParseMode,
    ) -> Result<Option<HitKey>> {
        let field = schema.require_annotated_field(field)?;
        let ctx = ParseCtx { schema, field };
        HitKey::parse_with(&ctx, spec.trim(), mode)
    }

    fn parse_with(ctx: &ParseCtx<'_>, spec: &str, mode: ParseMode) -> Result<Option<HitKey>> {
        if let Some((reverse, inner)) = strip_compound(spec) {
            let mut keys = Vec::new();
            for item in split_compound(inner) {
                match HitKey::parse_with(ctx, &item, mode)? {
                    Some(key) => keys.push(key),
                    None => {
                        log::debug!("unrecognized hit criterion '{item}' in compound spec");
                        return Ok(None);
                    }
                }
            }
            let key = HitKey::multiple(keys)?;
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
                    log::debug!("unrecognized hit criterion tag '{tag}'");
                    Ok(None)
                }
                ParseMode::Strict => Err(Error::not_found("hit criterion", tag)),
            };
        };
        let key = builder(ctx, &parts[1..])?;
        Ok(Some(if reverse { key.reverse() } else { key }))
    }

    /// Binds this key to a hit list, fetching everything its comparisons
    /// need. Context keys require `hits` in ascending document order.
    pub fn bind<'a>(&self, hits: &'a Hits) -> Result<BoundHitKey<'a>> {
        let eval = match &self.kind {
            HitKeyKind::Doc => HitEval::Doc,
            HitKeyKind::DocId => HitEval::DocId,
            HitKeyKind::HitPosition => HitEval::HitPosition,
            HitKeyKind::StoredField { field } => {
                let corpus = hits.corpus();
                let numeric = corpus
                    .schema()
                    .require_metadata_field(field)?
                    .is_numeric();
                let reader = corpus.doc_values(field)?;
                let collator = corpus.collator(Sensitivity::Insensitive);
                let mut memo: AHashMap<DocId, Value> = AHashMap::new();
                let mut values = Vec::with_capacity(hits.len());
                for hit in hits.iter() {
                    let value = match memo.get(&hit.doc) {
                        Some(value) => value.clone(),
                        None => {
                            let value = stored_field_value(&*reader, hit.doc, numeric, &*collator)?;
                            memo.insert(hit.doc, value.clone());
                            value
                        }
                    };
                    values.push(value);
                }
                HitEval::Precomputed { values }
            }
            HitKeyKind::Decade { field } => {
                let reader = hits.corpus().doc_values(field)?;
                let mut memo: AHashMap<DocId, Decade> = AHashMap::new();
                let mut decades = Vec::with_capacity(hits.len());
                for hit in hits.iter() {
                    let decade = match memo.get(&hit.doc) {
                        Some(&decade) => decade,
                        None => {
                            let text = reader.first_value(hit.doc)?.unwrap_or_default();
                            let decade = Decade::parse(&text);
                            memo.insert(hit.doc, decade);
                            decade
                        }
                    };
                    decades.push(decade);
                }
                HitEval::Decades { decades }
            }
            HitKeyKind::Context(ck) => {
                let slot = ContextSlot {
                    field: ck
                        .target_field
                        .clone()
                        .unwrap_or_else(|| hits.field().to_string()),
                    annotation: ck.annotation.clone(),
                    sensitivity: ck.sensitivity,
                    part: ck.part.clone(),
                };
                let context = hits.fetch_context(&slot)?;
                let forward = hits.corpus().forward_index(&slot.field, &slot.annotation)?;
                HitEval::Context {
                    context,
                    forward,
                    annotation: ck.annotation.clone(),
                    sensitivity: ck.sensitivity,
                }
            }
            HitKeyKind::SpanAttribute {
                span,
                attribute,
                sensitivity,
            } => {
                let collator = hits.corpus().collator(*sensitivity);
                let values = hits
                    .iter()
                    .map(|hit| {
                        let text = hit.span_attribute(span, attribute).unwrap_or_default();
                        Value::Str(StrValue::new(text, &*collator))
                    })
                    .collect();
                HitEval::Precomputed { values }
            }
            HitKeyKind::Multiple(keys) => HitEval::Multiple(
                keys.iter()
                    .map(|key| key.bind(hits))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(BoundHitKey {
            hits,
            reverse: self.reverse,
            eval,
        })
    }
}

/// Joins a document's stored values into one collated value, or parses the
/// first value as an integer for numeric fields.
fn stored_field_value(
    reader: &dyn DocValues,
    doc: DocId,
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

enum HitEval<'a> {
    Doc,
    DocId,
    HitPosition,
    Precomputed {
        values: Vec<Value>,
    },
    Decades {
        decades: Vec<Decade>,
    },
    Context {
        context: Arc<ContextSet>,
        forward: Arc<dyn ForwardIndex>,
        annotation: String,
        sensitivity: Sensitivity,
    },
    Multiple(Vec<BoundHitKey<'a>>),
}

/// A hit key bound to one hit list; all reads are lock-free.
pub struct BoundHitKey<'a> {
    hits: &'a Hits,
    reverse: bool,
    eval: HitEval<'a>,
}

impl BoundHitKey<'_> {
    pub fn hits(&self) -> &Hits {
        self.hits
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// The key value of the hit at `index`.
    pub fn value(&self, index: usize) -> Value {
        match &self.eval {
            HitEval::Doc => Value::Doc(self.hits.get(index).doc),
            HitEval::DocId => Value::Int(self.hits.get(index).doc as i64),
            HitEval::HitPosition => Value::Int(index as i64),
            HitEval::Precomputed { values } => values[index].clone(),
            HitEval::Decades { decades } => Value::Decade(decades[index]),
            HitEval::Context {
                context,
                forward,
                annotation,
                sensitivity,
            } => {
                let terms = forward.terms();
                let ids = context.terms_of(index);
                if context.window_len() == 1 {
                    Value::ContextWord(ContextWordValue::new(
                        annotation.clone(),
                        *sensitivity,
                        ids[0],
                        terms,
                    ))
                } else {
                    Value::ContextWords(ContextWordsValue::new(
                        annotation.clone(),
                        *sensitivity,
                        ids.to_vec(),
                        terms,
                        context.is_display_reversed(),
                    ))
                }
            }
            HitEval::Multiple(keys) => {
                Value::Multiple(keys.iter().map(|key| key.value(index)).collect())
            }
        }
    }

    /// Compares the hits at two positions. A strict weak ordering; context
    /// and numeric variants compare without building values.
    #[inline]
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        let (a, b) = if self.reverse { (b, a) } else { (a, b) };
        self.compare_forward(a, b)
    }

    fn compare_forward(&self, a: usize, b: usize) -> Ordering {
        match &self.eval {
            HitEval::Doc | HitEval::DocId => {
                self.hits.get(a).doc.cmp(&self.hits.get(b).doc)
            }
            HitEval::HitPosition => a.cmp(&b),
            HitEval::Precomputed { values } => values[a].cmp(&values[b]),
            HitEval::Decades { decades } => decades[a].start().cmp(&decades[b].start()),
            HitEval::Context { context, .. } => context.ranks_of(a).cmp(context.ranks_of(b)),
            HitEval::Multiple(keys) => {
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

struct ParseCtx<'a> {
    schema: &'a CorpusSchema,
    field: &'a AnnotatedField,
}

impl ParseCtx<'_> {
    fn annotation(&self, params: &[String], index: usize) -> String {
        match params.get(index).map(|p| p.as_str()) {
            Some("") | None => self.field.main_annotation().to_string(),
            Some(name) => name.to_string(),
        }
    }

    fn sensitivity(&self, params: &[String], index: usize) -> Result<Sensitivity> {
        match params.get(index).map(|p| p.as_str()) {
            Some("") | None => Ok(Sensitivity::Sensitive),
            Some(code) => Sensitivity::from_code(code),
        }
    }

    fn target_field(&self, params: &[String], index: usize) -> Option<String> {
        params.get(index).filter(|p| !p.is_empty()).cloned()
    }

    fn required(&self, params: &[String], index: usize, what: &str) -> Result<String> {
        params
            .get(index)
            .filter(|p| !p.is_empty())
            .cloned()
            .ok_or_else(|| Error::invalid_arg(what, "missing required parameter"))
    }

    /// Context-size parameter; malformed or missing falls back to the
    /// schema's default context size.
    fn count(&self, params: &[String], index: usize) -> u32 {
        let fallback = self.schema.default_context_size() as u32;
        match params.get(index).map(|p| p.as_str()) {
            Some("") | None => fallback,
            Some(text) => text.parse::<u32>().ok().filter(|&n| n > 0).unwrap_or_else(|| {
                log::warn!("malformed context size '{text}', using default {fallback}");
                fallback
            }),
        }
    }

    fn with_target(&self, key: HitKey, target: Option<String>) -> HitKey {
        match target {
            Some(field) => key.with_target_field(field),
            None => key,
        }
    }
}

type Builder = fn(&ParseCtx<'_>, &[String]) -> Result<HitKey>;

/// Tag registry, populated once at first use.
fn registry() -> &'static AHashMap<&'static str, Builder> {
    static REGISTRY: OnceLock<AHashMap<&'static str, Builder>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: AHashMap<&'static str, Builder> = AHashMap::new();
        map.insert("doc", |_, _| Ok(HitKey::doc()));
        map.insert("docid", |_, _| Ok(HitKey::doc_id()));
        map.insert("hitposition", |_, _| Ok(HitKey::hit_position()));
        map.insert("field", |ctx, params| {
            Ok(HitKey::stored_field(ctx.required(params, 0, "field")?))
        });
        map.insert("decade", |ctx, params| {
            Ok(HitKey::decade(ctx.required(params, 0, "decade")?))
        });
        map.insert("hit", |ctx, params| {
            let key = HitKey::hit_text(ctx.annotation(params, 0), ctx.sensitivity(params, 1)?);
            Ok(ctx.with_target(key, ctx.target_field(params, 2)))
        });
        map.insert("left", |ctx, params| {
            let key = HitKey::before_context(
                ctx.annotation(params, 0),
                ctx.sensitivity(params, 1)?,
                ctx.count(params, 2),
            );
            Ok(ctx.with_target(key, ctx.target_field(params, 3)))
        });
        map.insert("right", |ctx, params| {
            let key = HitKey::after_context(
                ctx.annotation(params, 0),
                ctx.sensitivity(params, 1)?,
                ctx.count(params, 2),
            );
            Ok(ctx.with_target(key, ctx.target_field(params, 3)))
        });
        map.insert("wordleft", |ctx, params| {
            let key = HitKey::word_before(ctx.annotation(params, 0), ctx.sensitivity(params, 1)?);
            Ok(ctx.with_target(key, ctx.target_field(params, 2)))
        });
        map.insert("wordright", |ctx, params| {
            let key = HitKey::word_after(ctx.annotation(params, 0), ctx.sensitivity(params, 1)?);
            Ok(ctx.with_target(key, ctx.target_field(params, 2)))
        });
        map.insert("context", |ctx, params| {
            let windows = match params.get(2).map(|p| p.as_str()) {
                Some("") | None => "H",
                Some(spec) => spec,
            };
            let key = HitKey::context_window(
                ctx.annotation(params, 0),
                ctx.sensitivity(params, 1)?,
                windows,
            )?;
            Ok(ctx.with_target(key, ctx.target_field(params, 3)))
        });
        map.insert("span-attribute", |ctx, params| {
            Ok(HitKey::span_attribute(
                ctx.required(params, 0, "span-attribute")?,
                ctx.required(params, 1, "span-attribute")?,
                ctx.sensitivity(params, 2)?,
            ))
        });
        // Document-level criteria: known, but structurally wrong for hits.
        map.insert("identity", |_, _| Err(Error::unsupported("hit", "identity")));
        map.insert("size", |_, _| Err(Error::unsupported("hit", "size")));
        map.insert("numhits", |_, _| Err(Error::unsupported("hit", "numhits")));
        map.insert("fieldlen", |_, _| Err(Error::unsupported("hit", "fieldlen")));
        map.insert("id", |_, _| Err(Error::unsupported("hit", "id")));
        map
    })
}
