// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! Canonical aggregation keys, counts, and the per-interval bucket that
//! accumulates them.
//!
//! Grounded on `datadog-trace-stats`'s `GroupedStats`/`StatsBucket` shape:
//! an entry-or-default accumulation into a map keyed by aggregation key, a
//! bucket that owns its `start` and the map, `flush` that drains it. That
//! crate keys by a struct (`OwnedAggregationKey`); this one keys by the
//! canonical string `spec.md` §4.1 specifies instead.

use hashbrown::HashMap;

use crate::tag::TagSet;

pub const MEASURE_HITS: &str = "hits";
pub const MEASURE_ERRORS: &str = "errors";
pub const MEASURE_DURATION: &str = "duration";

/// Build the canonical aggregation key `"<name>|<measure>|<rendered tags>"`.
pub fn build_key(name: &str, measure: &str, rendered_tags: &str) -> String {
    let mut key = String::with_capacity(name.len() + measure.len() + rendered_tags.len() + 2);
    key.push_str(name);
    key.push('|');
    key.push_str(measure);
    key.push('|');
    key.push_str(rendered_tags);
    key
}

/// Build the canonical aggregation key for a sublayer measure: the base key
/// plus a comma and an extra tag, or a bare trailing colon when
/// `extra_tag` is `None` (the `_sublayers.span_count` case).
pub fn build_sublayer_key(
    name: &str,
    measure: &str,
    rendered_tags: &str,
    extra_tag: Option<(&str, &str)>,
) -> String {
    let mut key = build_key(name, measure, rendered_tags);
    key.push(',');
    match extra_tag {
        Some((tag_name, tag_value)) => {
            key.push_str(tag_name);
            key.push(':');
            key.push_str(tag_value);
        }
        None => key.push(':'),
    }
    key
}

/// One accumulated count within a [`Bucket`]: a single aggregation-key
/// group, identified by its canonical `key`.
#[derive(Debug, Clone)]
pub struct Count {
    pub key: String,
    pub name: String,
    pub measure: String,
    pub tags: TagSet,
    /// The extra sublayer tag (e.g. `sublayer_service:A1`), if this count
    /// belongs to a sublayer measure. `None` for hits/errors/duration and
    /// for `_sublayers.span_count`.
    pub extra_tag: Option<(String, String)>,
    pub top_level: bool,
    pub value: f64,
}

/// A single time-bucketed collection of [`Count`]s, keyed by canonical
/// aggregation key.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub start: i64,
    pub duration: i64,
    counts: HashMap<String, Count>,
}

impl Bucket {
    pub fn new(start: i64, duration: i64) -> Self {
        Self {
            start,
            duration,
            counts: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> impl Iterator<Item = &Count> {
        self.counts.values()
    }

    pub fn get(&self, key: &str) -> Option<&Count> {
        self.counts.get(key)
    }

    /// Accumulate `delta` into the count identified by `key`, creating it
    /// with `value: 0.0` first if absent. Passing `delta: None` ensures the
    /// count exists (e.g. a non-erroring hit still needs an `errors` entry
    /// at zero) without changing its value.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        key: &str,
        name: &str,
        measure: &str,
        tags: &TagSet,
        extra_tag: Option<(&str, &str)>,
        top_level: bool,
        delta: Option<f64>,
    ) {
        let count = self.counts.entry_ref(key).or_insert_with(|| Count {
            key: key.to_string(),
            name: name.to_string(),
            measure: measure.to_string(),
            tags: tags.clone(),
            extra_tag: extra_tag.map(|(n, v)| (n.to_string(), v.to_string())),
            top_level,
            value: 0.0,
        });
        debug_assert_eq!(count.key, key, "aggregation key collision on a mismatched Count");
        if let Some(delta) = delta {
            count.value += delta;
        }
    }
}
