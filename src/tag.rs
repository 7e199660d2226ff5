// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! Canonical tag sets used to key aggregated counts.

use std::fmt::Write as _;

/// A single `name`/`value` tag pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A canonical, sorted list of [`Tag`]s. Tags are sorted lexicographically by
/// name then value; inserting two tags with the same name is rejected to
/// preserve the "no duplicate names" invariant from the data model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Insert a tag, keeping the set sorted. Returns `false` and leaves the
    /// set unchanged if a tag with the same name is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.tags.iter().any(|t| t.name == name) {
            return false;
        }
        let tag = Tag::new(name, value);
        let pos = self
            .tags
            .binary_search_by(|t| (t.name.as_str(), t.value.as_str()).cmp(&(tag.name.as_str(), tag.value.as_str())))
            .unwrap_or_else(|p| p);
        self.tags.insert(pos, tag);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Render the tag set as `name1:value1,name2:value2,...` in sorted order,
    /// the canonical representation used inside aggregation keys.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}:{}", tag.name, tag.value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sorted_by_name_then_value() {
        let mut tags = TagSet::new();
        tags.insert("service", "A1");
        tags.insert("env", "prod");
        tags.insert("resource", "resource1");
        assert_eq!(tags.render(), "env:prod,resource:resource1,service:A1");
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut tags = TagSet::new();
        assert!(tags.insert("env", "prod"));
        assert!(!tags.insert("env", "staging"));
        assert_eq!(tags.render(), "env:prod");
    }

    #[test]
    fn empty_set_renders_empty_string() {
        assert_eq!(TagSet::new().render(), "");
    }

    #[test]
    fn insertion_order_does_not_affect_canonical_rendering() {
        let mut a = TagSet::new();
        a.insert("service", "A1");
        a.insert("env", "prod");
        a.insert("resource", "resource1");

        let mut b = TagSet::new();
        b.insert("resource", "resource1");
        b.insert("env", "prod");
        b.insert("service", "A1");

        assert_eq!(a.render(), b.render());
    }
}
