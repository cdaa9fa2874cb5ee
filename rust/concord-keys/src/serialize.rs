//! The compact textual grammar shared by key specs and values.
//!
//! Scalar form: `[-]<tag>[,<param>]*` with `$`-escaping for characters that
//! collide with the grammar (`$`, `,`, `(`, `)`), so field names and stored
//! text survive a round trip. Compound form: `(<item>,<item>,...)`, reversed
//! as `-(...)`; each item is itself an escaped serialized key, which keeps
//! the item separator unambiguous even though scalar specs contain commas of
//! their own.

/// How a parse entry point treats unknown tags: forward-compatible skipping
/// for externally supplied specs, hard failure for programmatic construction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ParseMode {
    /// Unknown tags yield `Ok(None)`.
    Lenient,
    /// Unknown tags yield a `NotFound` error.
    Strict,
}

const PART_SEPARATOR: char = ',';
const ESCAPE: char = '$';

/// Escapes one grammar part so it can carry arbitrary text.
pub fn escape_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            ESCAPE => out.push_str("$d"),
            PART_SEPARATOR => out.push_str("$c"),
            '(' => out.push_str("$o"),
            ')' => out.push_str("$p"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`escape_part`]. Unknown escape pairs pass through verbatim.
pub fn unescape_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut chars = part.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('d') => out.push(ESCAPE),
            Some('c') => out.push(PART_SEPARATOR),
            Some('o') => out.push('('),
            Some('p') => out.push(')'),
            Some(other) => {
                out.push(ESCAPE);
                out.push(other);
            }
            None => out.push(ESCAPE),
        }
    }
    out
}

/// Joins already-unescaped parts into one scalar spec.
pub fn combine_parts<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        if !out.is_empty() {
            out.push(PART_SEPARATOR);
        }
        out.push_str(&escape_part(part.as_ref()));
    }
    out
}

/// Splits a scalar spec into unescaped parts.
pub fn split_parts(spec: &str) -> Vec<String> {
    spec.split(PART_SEPARATOR).map(|p| unescape_part(p)).collect()
}

/// True if the spec uses the parenthesized compound form (possibly reversed).
pub fn is_compound(spec: &str) -> bool {
    (spec.starts_with('(') || spec.starts_with("-(")) && spec.ends_with(')')
}

/// Strips the compound wrapper, returning the reversal marker and the inner
/// item list. `None` when the spec is not compound.
pub fn strip_compound(spec: &str) -> Option<(bool, &str)> {
    if let Some(inner) = spec.strip_prefix("-(").and_then(|s| s.strip_suffix(')')) {
        Some((true, inner))
    } else if let Some(inner) = spec.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some((false, inner))
    } else {
        None
    }
}

/// Splits the inner item list of a compound and undoes the per-item escaping,
/// yielding each item's own serialized form.
pub fn split_compound(inner: &str) -> Vec<String> {
    inner
        .split(PART_SEPARATOR)
        .map(|item| unescape_part(item))
        .collect()
}

/// Wraps serialized items in the compound form, escaping each item so its
/// own commas and parentheses do not collide with the wrapper.
pub fn combine_compound<I>(items: I, reverse: bool) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = String::from(if reverse { "-(" } else { "(" });
    let mut first = true;
    for item in items {
        if !first {
            out.push(PART_SEPARATOR);
        }
        out.push_str(&escape_part(item.as_ref()));
        first = false;
    }
    out.push(')');
    out
}
