// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! Top-level/measured classification and sampling-weight derivation.
//!
//! Grounded on `datadog_trace_utils::span::trace_utils::compute_top_level_span`:
//! build a `span_id -> index` map once, then classify each span from it.

use std::collections::{HashMap, HashSet};

use crate::error::ConcentratorError;
use crate::span::Span;

/// Tracer metadata key carrying the Datadog "measured" marker.
const MEASURED_KEY: &str = "_dd.measured";
/// Tracer metric key carrying the sampling rate applied to the trace,
/// stashed on the root span.
const SAMPLE_RATE_KEY: &str = "_sample_rate";

/// A span annotated with the classification the concentrator needs:
/// whether it is top-level, whether it is individually measured, and the
/// sampling weight of the trace it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSpan {
    pub span_id: u64,
    pub parent_id: u64,
    pub service: String,
    pub name: String,
    pub resource: String,
    pub r#type: String,
    pub start: i64,
    pub duration: i64,
    pub error: i32,
    pub meta: HashMap<String, String>,
    pub metrics: HashMap<String, f64>,
    pub top_level: bool,
    pub measured: bool,
    pub weight: f64,
}

impl WeightedSpan {
    pub fn is_error(&self) -> bool {
        self.error != 0
    }

    /// Whether this span contributes to stats at all: hits/errors/duration
    /// are only counted for top-level or individually-measured spans.
    pub fn eligible(&self) -> bool {
        self.top_level || self.measured
    }
}

/// Mark each span in `trace` top-level if it has no parent in the trace, or
/// its parent belongs to a different service. Root spans (`parent_id == 0`)
/// are always top-level.
pub fn compute_top_level(trace: &[Span]) -> HashSet<u64> {
    let by_id: HashMap<u64, &Span> = trace.iter().map(|s| (s.span_id, s)).collect();
    let mut top_level = HashSet::with_capacity(trace.len());
    for span in trace {
        let is_top = if span.parent_id == 0 {
            true
        } else {
            match by_id.get(&span.parent_id) {
                Some(parent) => parent.service != span.service,
                None => true,
            }
        };
        if is_top {
            top_level.insert(span.span_id);
        }
    }
    top_level
}

/// Whether a span has been marked "measured" by the tracer, independent of
/// its top-level status.
pub fn is_measured(span: &Span) -> bool {
    span.meta.get(MEASURED_KEY).map(|v| v == "1").unwrap_or(false)
}

/// The root of `trace`: a span whose parent is not present among the other
/// spans. Returns `None` only when every span has a known, in-trace parent
/// (a malformed, cycle-only trace), which `spec.md` treats as "no root".
fn find_root(trace: &[Span]) -> Option<u64> {
    let ids: HashSet<u64> = trace.iter().map(|s| s.span_id).collect();
    trace
        .iter()
        .find(|s| s.parent_id == 0 || !ids.contains(&s.parent_id))
        .map(|s| s.span_id)
}

/// Read the trace-level sampling rate off `root`'s metrics and turn it into
/// a weight. An absent, non-finite, non-positive, or greater-than-one rate
/// falls back to weight `1.0` rather than erroring — this is intentionally
/// lenient, per `spec.md` §4.2.
fn sampling_weight(root: &Span) -> f64 {
    match root.metrics.get(SAMPLE_RATE_KEY) {
        Some(&rate) if rate.is_finite() && rate > 0.0 && rate <= 1.0 => 1.0 / rate,
        _ => 1.0,
    }
}

/// Build the ordered sequence of [`WeightedSpan`]s for `trace`.
///
/// `root_id` lets a caller pass an already-resolved root (the "precomputed
/// root" `spec.md` §4.2 takes as input); when `None`, the root is resolved
/// the same way top-level spans are: no parent in the trace.
///
/// Fails with [`ConcentratorError::EmptyTrace`] if `trace` is empty, or
/// [`ConcentratorError::MissingRoot`] if an explicitly supplied `root_id`
/// does not name a span in `trace`.
pub fn build_weighted_trace(
    trace: Vec<Span>,
    root_id: Option<u64>,
) -> Result<Vec<WeightedSpan>, ConcentratorError> {
    if trace.is_empty() {
        return Err(ConcentratorError::EmptyTrace);
    }

    let resolved_root = match root_id {
        Some(id) => {
            if !trace.iter().any(|s| s.span_id == id) {
                return Err(ConcentratorError::MissingRoot(id));
            }
            id
        }
        // A non-empty trace always has at least one span with no in-trace
        // parent; fall back to the first span only to stay total.
        None => find_root(&trace).unwrap_or(trace[0].span_id),
    };

    let top_level = compute_top_level(&trace);
    let weight = trace
        .iter()
        .find(|s| s.span_id == resolved_root)
        .map(sampling_weight)
        .unwrap_or(1.0);

    Ok(trace
        .into_iter()
        .map(|span| {
            let top = top_level.contains(&span.span_id);
            let measured = is_measured(&span);
            WeightedSpan {
                span_id: span.span_id,
                parent_id: span.parent_id,
                service: span.service,
                name: span.name,
                resource: span.resource,
                r#type: span.r#type,
                start: span.start,
                duration: span.duration,
                error: span.error,
                meta: span.meta,
                metrics: span.metrics,
                top_level: top,
                measured,
                weight,
            }
        })
        .collect())
}
