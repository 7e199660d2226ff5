// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! Per-top-level-subtree duration/count decomposition.
//!
//! Uses the same adjacency-map technique as
//! [`crate::weighted_trace::compute_top_level`]: one pass builds an index,
//! a second walks it.

use std::collections::HashMap;

use crate::weighted_trace::WeightedSpan;

/// Which sublayer measure a [`SublayerValue`] belongs to. The wire name of
/// each variant is also its `Measure` in the aggregation key grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SublayerMetric {
    DurationByService,
    DurationByType,
    SpanCount,
}

impl SublayerMetric {
    pub fn measure_name(self) -> &'static str {
        match self {
            Self::DurationByService => "_sublayers.duration.by_service",
            Self::DurationByType => "_sublayers.duration.by_type",
            Self::SpanCount => "_sublayers.span_count",
        }
    }

    /// The extra tag appended to the aggregation key for this measure, if
    /// any. `SpanCount` appends no named tag, which is what produces the
    /// trailing empty tag in its canonical key.
    pub fn extra_tag_name(self) -> Option<&'static str> {
        match self {
            Self::DurationByService => Some("sublayer_service"),
            Self::DurationByType => Some("sublayer_type"),
            Self::SpanCount => None,
        }
    }
}

/// One decomposed value: a measure, the tag value it's broken down by (empty
/// for `SpanCount`), and the accumulated value.
#[derive(Debug, Clone, PartialEq)]
pub struct SublayerValue {
    pub metric: SublayerMetric,
    pub tag: String,
    pub value: f64,
}

impl SublayerValue {
    pub fn extra_tag(&self) -> Option<(&'static str, &str)> {
        self.metric.extra_tag_name().map(|name| (name, self.tag.as_str()))
    }
}

/// Compute, for every top-level span in `trace`, the sublayer breakdown of
/// its subtree (the span itself plus every descendant down to but excluding
/// any nested top-level span and its own subtree).
///
/// Durations are raw (unweighted) nanoseconds. A subtree containing a single
/// span still produces one `by_service` entry, one `by_type` entry unless
/// its `r#type` is empty, and `span_count == 1.0`.
pub fn compute_sublayers(trace: &[WeightedSpan]) -> HashMap<u64, Vec<SublayerValue>> {
    let index_by_id: HashMap<u64, usize> =
        trace.iter().enumerate().map(|(i, s)| (s.span_id, i)).collect();

    let mut children: HashMap<u64, Vec<usize>> = HashMap::new();
    for (i, span) in trace.iter().enumerate() {
        if index_by_id.contains_key(&span.parent_id) {
            children.entry(span.parent_id).or_default().push(i);
        }
    }

    let mut result = HashMap::new();
    for (root_idx, root) in trace.iter().enumerate() {
        if !root.top_level {
            continue;
        }

        let mut by_service: HashMap<&str, f64> = HashMap::new();
        let mut by_type: HashMap<&str, f64> = HashMap::new();
        let mut span_count = 0.0_f64;

        let mut stack = vec![root_idx];
        while let Some(i) = stack.pop() {
            let span = &trace[i];
            if i != root_idx && span.top_level {
                // A nested top-level span starts its own subtree; don't
                // count it or descend into it from here.
                continue;
            }
            *by_service.entry(span.service.as_str()).or_insert(0.0) += span.duration as f64;
            if !span.r#type.is_empty() {
                *by_type.entry(span.r#type.as_str()).or_insert(0.0) += span.duration as f64;
            }
            span_count += 1.0;
            if let Some(child_idxs) = children.get(&span.span_id) {
                stack.extend(child_idxs.iter().copied());
            }
        }

        let mut values = Vec::with_capacity(by_service.len() + by_type.len() + 1);

        let mut services: Vec<_> = by_service.into_iter().collect();
        services.sort_unstable_by_key(|(name, _)| *name);
        values.extend(services.into_iter().map(|(service, value)| SublayerValue {
            metric: SublayerMetric::DurationByService,
            tag: service.to_string(),
            value,
        }));

        let mut types: Vec<_> = by_type.into_iter().collect();
        types.sort_unstable_by_key(|(name, _)| *name);
        values.extend(types.into_iter().map(|(ty, value)| SublayerValue {
            metric: SublayerMetric::DurationByType,
            tag: ty.to_string(),
            value,
        }));

        values.push(SublayerValue {
            metric: SublayerMetric::SpanCount,
            tag: String::new(),
            value: span_count,
        });

        result.insert(root.span_id, values);
    }
    result
}
