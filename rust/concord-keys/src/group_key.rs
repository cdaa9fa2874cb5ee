//! Group-level sort keys: order groups of hits or documents by their
//! identity value or their size.
//!
//! Group keys carry no per-result-set state, so there is no bind step; they
//! compare any [`GroupHandle`] directly.

use std::cmp::Ordering;

use itertools::Itertools;

use concord_common::{Result, error::Error};

use crate::results::GroupHandle;
use crate::serialize::{
    ParseMode, combine_compound, split_compound, split_parts, strip_compound,
};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKeyKind {
    Identity,
    Size,
    Multiple(Vec<GroupKey>),
}

/// A sort criterion over groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    reverse: bool,
    kind: GroupKeyKind,
}

/// Tags that name hit- or document-level criteria; they exist, but cannot
/// apply to a group.
const NON_GROUP_TAGS: &[&str] = &[
    "numhits",
    "fieldlen",
    "field",
    "decade",
    "id",
    "docid",
    "doc",
    "hit",
    "left",
    "right",
    "wordleft",
    "wordright",
    "context",
    "hitposition",
    "span-attribute",
];

impl GroupKey {
    fn scalar(kind: GroupKeyKind) -> GroupKey {
        GroupKey {
            reverse: false,
            kind,
        }
    }

    /// The value the group was formed on.
    pub fn identity() -> GroupKey {
        GroupKey::scalar(GroupKeyKind::Identity)
    }

    /// The number of results in the group.
    pub fn size() -> GroupKey {
        GroupKey::scalar(GroupKeyKind::Size)
    }

    pub fn multiple(keys: Vec<GroupKey>) -> Result<GroupKey> {
        concord_common::verify_arg!(keys, !keys.is_empty());
        Ok(GroupKey::scalar(GroupKeyKind::Multiple(keys)))
    }

    pub fn reverse(&self) -> GroupKey {
        GroupKey {
            reverse: !self.reverse,
            kind: self.kind.clone(),
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn sub_keys(&self) -> Option<&[GroupKey]> {
        match &self.kind {
            GroupKeyKind::Multiple(keys) => Some(keys),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            GroupKeyKind::Identity => "group identity".to_string(),
            GroupKeyKind::Size => "group size".to_string(),
            GroupKeyKind::Multiple(keys) => keys.iter().map(|k| k.name()).join(", "),
        }
    }

    pub fn serialize(&self) -> String {
        match &self.kind {
            GroupKeyKind::Multiple(keys) => {
                combine_compound(keys.iter().map(|k| k.serialize()), self.reverse)
            }
            GroupKeyKind::Identity | GroupKeyKind::Size => {
                let dash = if self.reverse { "-" } else { "" };
                let tag = if self.kind == GroupKeyKind::Identity {
                    "identity"
                } else {
                    "size"
                };
                format!("{dash}{tag}")
            }
        }
    }

    pub fn parse(spec: &str, mode: ParseMode) -> Result<Option<GroupKey>> {
        let spec = spec.trim();
        if let Some((reverse, inner)) = strip_compound(spec) {
            let mut keys = Vec::new();
            for item in split_compound(inner) {
                match GroupKey::parse(&item, mode)? {
                    Some(key) => keys.push(key),
                    None => {
                        log::debug!("unrecognized group criterion '{item}' in compound spec");
                        return Ok(None);
                    }
                }
            }
            let key = GroupKey::multiple(keys)?;
            return Ok(Some(if reverse { key.reverse() } else { key }));
        }

        let parts = split_parts(spec);
        let mut tag = parts[0].to_ascii_lowercase();
        let reverse = tag.starts_with('-');
        if reverse {
            tag.remove(0);
        }
        let key = match tag.as_str() {
            "identity" => GroupKey::identity(),
            "size" => GroupKey::size(),
            other if NON_GROUP_TAGS.contains(&other) => {
                return Err(Error::unsupported("group", other));
            }
            other => {
                return match mode {
                    ParseMode::Lenient => {
                        log::debug!("unrecognized group criterion tag '{other}'");
                        Ok(None)
                    }
                    ParseMode::Strict => Err(Error::not_found("group criterion", other)),
                };
            }
        };
        Ok(Some(if reverse { key.reverse() } else { key }))
    }

    /// The key value of one group.
    pub fn value<G: GroupHandle>(&self, group: &G) -> Value {
        match &self.kind {
            GroupKeyKind::Identity => group.identity().clone(),
            GroupKeyKind::Size => Value::Int(group.size() as i64),
            GroupKeyKind::Multiple(keys) => {
                Value::Multiple(keys.iter().map(|k| k.value(group)).collect())
            }
        }
    }

    /// Compares two groups. A strict weak ordering.
    pub fn compare<G: GroupHandle>(&self, a: &G, b: &G) -> Ordering {
        let (a, b) = if self.reverse { (b, a) } else { (a, b) };
        match &self.kind {
            GroupKeyKind::Identity => a.identity().cmp(b.identity()),
            GroupKeyKind::Size => a.size().cmp(&b.size()),
            GroupKeyKind::Multiple(keys) => {
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

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGroup {
        identity: Value,
        size: u64,
    }

    impl GroupHandle for TestGroup {
        fn identity(&self) -> &Value {
            &self.identity
        }

        fn size(&self) -> u64 {
            self.size
        }
    }

    fn group(identity: i64, size: u64) -> TestGroup {
        TestGroup {
            identity: Value::Int(identity),
            size,
        }
    }

    #[test]
    fn identity_then_size_tie_break() {
        let key = GroupKey::multiple(vec![GroupKey::identity(), GroupKey::size().reverse()])
            .unwrap();
        let a = group(10, 3);
        let b = group(10, 8);
        let c = group(5, 1);

        // Identity differs: it decides.
        assert_eq!(key.compare(&c, &a), Ordering::Less);
        // Identity ties: larger group first because size is reversed.
        assert_eq!(key.compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn reverse_round_trip() {
        let key = GroupKey::size();
        let twice = key.reverse().reverse();
        let a = group(0, 2);
        let b = group(0, 9);
        assert_eq!(key.compare(&a, &b), twice.compare(&a, &b));
    }

    #[test]
    fn serialization_round_trip() {
        for spec in ["identity", "-size", "(identity,-size)", "-(size,identity)"] {
            let key = GroupKey::parse(spec, ParseMode::Strict).unwrap().unwrap();
            assert_eq!(key.serialize(), spec);
        }
    }

    #[test]
    fn non_group_tags_are_unsupported() {
        let err = GroupKey::parse("decade,year", ParseMode::Lenient).unwrap_err();
        assert!(matches!(
            err.kind(),
            concord_common::error::ErrorKind::Unsupported { .. }
        ));

        assert!(GroupKey::parse("madeup", ParseMode::Lenient).unwrap().is_none());
        assert!(GroupKey::parse("madeup", ParseMode::Strict).is_err());
    }
}
