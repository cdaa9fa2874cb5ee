//! Computed key values: immutable, totally ordered, hashable, serializable.
//!
//! A [`Value`] is what a bound key produces for one result. Ordering is the
//! load-bearing contract: it is total (also across variants, see
//! [`Value::cmp`]), consistent with equality and hashing, and never invokes
//! a collator at compare time: string values carry a precomputed collation
//! key, context values carry precomputed term ranks.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use concord_common::{Result, error::Error};
use concord_corpus::{Collator, Corpus, DocId, Sensitivity, TermId, Terms};

use crate::serialize::{combine_compound, combine_parts, is_compound, split_compound, split_parts, strip_compound};

/// A collated string: the raw text plus its collation key. Ordering,
/// equality, and hashing all use the key, so texts that fold together under
/// the collator's sensitivity are the same value.
#[derive(Debug, Clone)]
pub struct StrValue {
    text: String,
    key: String,
}

impl StrValue {
    pub fn new(text: impl Into<String>, collator: &dyn Collator) -> StrValue {
        let text = text.into();
        let key = collator.sort_key(&text);
        StrValue { text, key }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A year bucket: always a multiple of ten, or [`Decade::UNKNOWN`] for years
/// that could not be parsed. Unknown sorts after every valid decade in
/// forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decade(i64);

impl Decade {
    pub const UNKNOWN: Decade = Decade(i64::MAX);

    /// Buckets a year by rounding down to the nearest multiple of ten.
    pub fn from_year(year: i64) -> Decade {
        Decade(year - year.rem_euclid(10))
    }

    /// Parses a year string; anything unparseable becomes [`Decade::UNKNOWN`].
    pub fn parse(text: &str) -> Decade {
        match text.trim().parse::<i64>() {
            Ok(year) => Decade::from_year(year),
            Err(_) => Decade::UNKNOWN,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Decade::UNKNOWN
    }

    /// First year of the bucket. Meaningless for [`Decade::UNKNOWN`].
    pub fn start(&self) -> i64 {
        self.0
    }

    fn sort_value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Decade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown")
        } else {
            write!(f, "{}-{}", self.0, self.0 + 9)
        }
    }
}

/// One context token: term id plus its precomputed rank under a sensitivity.
/// A negative term id means "no value" and ranks after every real term.
#[derive(Debug, Clone)]
pub struct ContextWordValue {
    pub(crate) annotation: String,
    pub(crate) sensitivity: Sensitivity,
    pub(crate) term: TermId,
    pub(crate) rank: i32,
    pub(crate) text: String,
}

impl ContextWordValue {
    pub fn new(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        term: TermId,
        terms: &dyn Terms,
    ) -> ContextWordValue {
        ContextWordValue {
            annotation: annotation.into(),
            sensitivity,
            term,
            rank: terms.sort_position(term, sensitivity),
            text: terms.text(term).unwrap_or_default().to_string(),
        }
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_no_value(&self) -> bool {
        self.term < 0
    }
}

/// A window of context tokens: parallel term-id and rank arrays plus a
/// display-reversal flag. Comparison always follows array order; the flag
/// only changes how the window renders.
#[derive(Debug, Clone)]
pub struct ContextWordsValue {
    pub(crate) annotation: String,
    pub(crate) sensitivity: Sensitivity,
    pub(crate) terms: Vec<TermId>,
    pub(crate) ranks: Vec<i32>,
    pub(crate) texts: Vec<String>,
    pub(crate) display_reversed: bool,
}

impl ContextWordsValue {
    pub fn new(
        annotation: impl Into<String>,
        sensitivity: Sensitivity,
        term_ids: Vec<TermId>,
        terms: &dyn Terms,
        display_reversed: bool,
    ) -> ContextWordsValue {
        let ranks = term_ids
            .iter()
            .map(|&t| terms.sort_position(t, sensitivity))
            .collect();
        let texts = term_ids
            .iter()
            .map(|&t| terms.text(t).unwrap_or_default().to_string())
            .collect();
        ContextWordsValue {
            annotation: annotation.into(),
            sensitivity,
            terms: term_ids,
            ranks,
            texts,
            display_reversed,
        }
    }

    pub fn ranks(&self) -> &[i32] {
        &self.ranks
    }

    pub fn is_display_reversed(&self) -> bool {
        self.display_reversed
    }
}

/// A computed key value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Str(StrValue),
    Decade(Decade),
    Doc(DocId),
    ContextWord(ContextWordValue),
    ContextWords(ContextWordsValue),
    Multiple(Vec<Value>),
}

/// Comparison classes; variants of different classes order by class. `Int`
/// and `Decade` share the numeric class, `ContextWord` and `ContextWords`
/// share the rank class, so the unified variants stay mutually comparable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
enum ValueClass {
    Numeric,
    Str,
    Doc,
    Ranks,
    Multiple,
}

impl Value {
    pub fn int(n: i64) -> Value {
        Value::Int(n)
    }

    pub fn str(text: impl Into<String>, collator: &dyn Collator) -> Value {
        Value::Str(StrValue::new(text, collator))
    }

    pub fn decade(decade: Decade) -> Value {
        Value::Decade(decade)
    }

    pub fn doc(doc: DocId) -> Value {
        Value::Doc(doc)
    }

    fn class(&self) -> ValueClass {
        match self {
            Value::Int(_) | Value::Decade(_) => ValueClass::Numeric,
            Value::Str(_) => ValueClass::Str,
            Value::Doc(_) => ValueClass::Doc,
            Value::ContextWord(_) | Value::ContextWords(_) => ValueClass::Ranks,
            Value::Multiple(_) => ValueClass::Multiple,
        }
    }

    fn as_numeric(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Decade(d) => Some(d.sort_value()),
            _ => None,
        }
    }

    fn rank_slice(&self) -> Option<&[i32]> {
        match self {
            Value::ContextWord(cw) => Some(std::slice::from_ref(&cw.rank)),
            Value::ContextWords(cws) => Some(&cws.ranks),
            _ => None,
        }
    }

    /// Human-readable rendering: decades as ranges, context windows in
    /// reading order, compounds joined with " / ".
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Str(s) => s.text().to_string(),
            Value::Decade(d) => d.to_string(),
            Value::Doc(doc) => format!("doc {doc}"),
            Value::ContextWord(cw) => cw.text.clone(),
            Value::ContextWords(cws) => {
                // Padding positions ("no term") do not render.
                let mut words: Vec<&str> = cws
                    .terms
                    .iter()
                    .zip(&cws.texts)
                    .filter(|(&term, _)| term >= 0)
                    .map(|(_, text)| text.as_str())
                    .collect();
                if cws.display_reversed {
                    words.reverse();
                }
                words.join(" ")
            }
            Value::Multiple(values) => values
                .iter()
                .map(|v| v.to_display_string())
                .collect::<Vec<_>>()
                .join(" / "),
        }
    }

    /// Serializes to the value grammar (`int,5`, `str,title`, `dec,1980`,
    /// `doc,42`, `cws,word,i,the`, parenthesized compounds).
    pub fn serialize(&self) -> String {
        match self {
            Value::Int(n) => combine_parts(["int", n.to_string().as_str()]),
            Value::Str(s) => combine_parts(["str", s.text()]),
            Value::Decade(d) => {
                if d.is_unknown() {
                    combine_parts(["dec", "unknown"])
                } else {
                    combine_parts(["dec", d.start().to_string().as_str()])
                }
            }
            Value::Doc(doc) => combine_parts(["doc", doc.to_string().as_str()]),
            Value::ContextWord(cw) => combine_parts([
                "cws",
                cw.annotation.as_str(),
                cw.sensitivity.code(),
                cw.text.as_str(),
            ]),
            Value::ContextWords(cws) => {
                let tag = if cws.display_reversed { "cwsr" } else { "cws" };
                let mut parts = vec![
                    tag.to_string(),
                    cws.annotation.clone(),
                    cws.sensitivity.code().to_string(),
                ];
                parts.extend(cws.texts.iter().cloned());
                combine_parts(parts)
            }
            Value::Multiple(values) => {
                combine_compound(values.iter().map(|v| v.serialize()), false)
            }
        }
    }

    /// Parses the value grammar back into a value. `field` is the searched
    /// annotated field, used to resolve context-word annotations and blank
    /// annotation names.
    pub fn deserialize(corpus: &dyn Corpus, field: &str, spec: &str) -> Result<Value> {
        if is_compound(spec) {
            let (_, inner) = strip_compound(spec).expect("checked by is_compound");
            let values = split_compound(inner)
                .iter()
                .map(|item| Value::deserialize(corpus, field, item))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::Multiple(values));
        }
        let parts = split_parts(spec);
        let tag = parts[0].as_str();
        let params = &parts[1..];
        match tag {
            "int" => Ok(Value::Int(parse_i64_or_default(params.first(), "int"))),
            "str" => {
                let text = params.first().cloned().unwrap_or_default();
                let collator = corpus.collator(Sensitivity::Insensitive);
                Ok(Value::Str(StrValue::new(text, &*collator)))
            }
            "dec" => {
                let param = params.first().map(|s| s.as_str()).unwrap_or("unknown");
                if param == "unknown" {
                    Ok(Value::Decade(Decade::UNKNOWN))
                } else {
                    Ok(Value::Decade(Decade::parse(param)))
                }
            }
            "doc" => Ok(Value::Doc(parse_i64_or_default(params.first(), "doc") as DocId)),
            "cws" | "cwsr" => {
                let schema = corpus.schema();
                let searched = schema.require_annotated_field(field)?;
                let annotation = match params.first().map(|s| s.as_str()) {
                    Some("") | None => searched.main_annotation().to_string(),
                    Some(name) => name.to_string(),
                };
                let sensitivity = params
                    .get(1)
                    .map(|code| Sensitivity::from_code(code))
                    .transpose()?
                    .unwrap_or(Sensitivity::Sensitive);
                let fi = corpus.forward_index(field, &annotation)?;
                let terms = fi.terms();
                let ids: Vec<TermId> = params
                    .iter()
                    .skip(2)
                    .map(|text| terms.id_of(text))
                    .collect();
                if tag == "cws" && ids.len() == 1 {
                    Ok(Value::ContextWord(ContextWordValue::new(
                        annotation,
                        sensitivity,
                        ids[0],
                        terms,
                    )))
                } else {
                    Ok(Value::ContextWords(ContextWordsValue::new(
                        annotation,
                        sensitivity,
                        ids,
                        terms,
                        tag == "cwsr",
                    )))
                }
            }
            _ => Err(Error::invalid_arg(
                "value",
                format!("unrecognized value tag: {tag}"),
            )),
        }
    }
}

/// Malformed numbers fall back to 0 rather than failing the whole spec.
fn parse_i64_or_default(part: Option<&String>, what: &str) -> i64 {
    let text = part.map(|s| s.as_str()).unwrap_or("");
    match text.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            log::warn!("malformed {what} value '{text}', substituting 0");
            0
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        let (lc, rc) = (self.class(), other.class());
        if lc != rc {
            return lc.cmp(&rc);
        }
        match lc {
            ValueClass::Numeric => self.as_numeric().cmp(&other.as_numeric()),
            ValueClass::Str => {
                let (Value::Str(l), Value::Str(r)) = (self, other) else {
                    unreachable!()
                };
                l.key().cmp(r.key())
            }
            ValueClass::Doc => {
                let (Value::Doc(l), Value::Doc(r)) = (self, other) else {
                    unreachable!()
                };
                l.cmp(r)
            }
            ValueClass::Ranks => self.rank_slice().cmp(&other.rank_slice()),
            ValueClass::Multiple => {
                let (Value::Multiple(l), Value::Multiple(r)) = (self, other) else {
                    unreachable!()
                };
                for (lv, rv) in l.iter().zip(r.iter()) {
                    match lv.cmp(rv) {
                        Ordering::Equal => continue,
                        non_eq => return non_eq,
                    }
                }
                // Equal common prefix: the shorter list sorts first.
                l.len().cmp(&r.len())
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with Eq: hash only what cmp observes.
        state.write_u8(self.class() as u8);
        match self {
            Value::Int(_) | Value::Decade(_) => {
                self.as_numeric().unwrap_or_default().hash(state);
            }
            Value::Str(s) => s.key().hash(state),
            Value::Doc(doc) => doc.hash(state),
            Value::ContextWord(_) | Value::ContextWords(_) => {
                self.rank_slice().unwrap_or_default().hash(state);
            }
            Value::Multiple(values) => {
                for value in values {
                    value.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_corpus::create_collator;

    fn str_value(text: &str, sensitivity: Sensitivity) -> Value {
        let collator = create_collator(sensitivity);
        Value::str(text, &*collator)
    }

    #[test]
    fn decade_buckets_and_display() {
        assert_eq!(Decade::from_year(1980), Decade::from_year(1989));
        assert_ne!(Decade::from_year(1979), Decade::from_year(1980));
        assert_eq!(Decade::from_year(1987).start(), 1980);
        assert_eq!(Decade::from_year(-5).start(), -10);
        assert_eq!(Decade::from_year(1987).to_string(), "1980-1989");
        assert_eq!(Decade::UNKNOWN.to_string(), "unknown");
        assert_eq!(Decade::parse(" 1984 ").start(), 1980);
        assert!(Decade::parse("sixteen-twelve").is_unknown());
    }

    #[test]
    fn unknown_decade_sorts_after_valid_ones() {
        let mut decades = vec![
            Value::Decade(Decade::UNKNOWN),
            Value::Decade(Decade::from_year(1990)),
            Value::Decade(Decade::from_year(1910)),
        ];
        decades.sort();
        assert_eq!(
            decades.pop().unwrap(),
            Value::Decade(Decade::UNKNOWN),
        );
    }

    #[test]
    fn strings_compare_by_collation_key() {
        let a = str_value("Grüße", Sensitivity::Insensitive);
        let b = str_value("grusse", Sensitivity::Insensitive);
        assert_eq!(a, b);

        let sensitive_a = str_value("Grüße", Sensitivity::Sensitive);
        let sensitive_b = str_value("grusse", Sensitivity::Sensitive);
        assert_ne!(sensitive_a, sensitive_b);
    }

    #[test]
    fn int_and_decade_share_numeric_order() {
        assert_eq!(Value::Int(1980), Value::Decade(Decade::from_year(1985)));
        assert!(Value::Int(1970) < Value::Decade(Decade::from_year(1985)));
        assert!(Value::Decade(Decade::UNKNOWN) > Value::Int(i64::MAX - 1));
    }

    #[test]
    fn multiple_prefix_rule() {
        let short = Value::Multiple(vec![Value::Int(1), Value::Int(2)]);
        let long = Value::Multiple(vec![Value::Int(1), Value::Int(2), Value::Int(0)]);
        assert!(short < long);

        let diverging = Value::Multiple(vec![Value::Int(1), Value::Int(3)]);
        assert!(short < diverging);
    }

    #[test]
    fn ordering_laws_on_random_numeric_values() {
        let mut values = Vec::new();
        for _ in 0..24 {
            values.push(Value::Int(fastrand::i64(-50..50)));
            values.push(Value::Decade(Decade::from_year(fastrand::i64(1900..2030))));
        }
        for a in &values {
            for b in &values {
                // Antisymmetry.
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                assert_eq!(a == b, a.cmp(b) == Ordering::Equal);
                for c in &values {
                    // Transitivity of <=.
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                }
            }
        }
    }

    #[test]
    fn scalar_value_grammar_round_trips() {
        assert_eq!(Value::Int(42).serialize(), "int,42");
        assert_eq!(Value::Doc(7).serialize(), "doc,7");
        assert_eq!(Value::Decade(Decade::from_year(1984)).serialize(), "dec,1980");
        assert_eq!(Value::Decade(Decade::UNKNOWN).serialize(), "dec,unknown");

        let s = str_value("a,b(c)", Sensitivity::Insensitive);
        assert_eq!(s.serialize(), "str,a$cb$oc$p");
    }

    #[test]
    fn compound_value_serialization() {
        let v = Value::Multiple(vec![Value::Int(1), Value::Decade(Decade::UNKNOWN)]);
        assert_eq!(v.serialize(), "(int$c1,dec$cunknown)");
    }
}
