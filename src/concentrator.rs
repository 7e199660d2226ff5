// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! The bucketed stats aggregator.
//!
//! Grounded directly on `data-pipeline::span_concentrator::SpanConcentrator`:
//! `align_timestamp`, the `oldest_timestamp` floor-merge performed in
//! `add_span`, and the drain/reinsert-if-too-recent `flush` retention
//! algorithm. The `Mutex` wrapping of the mutable state, letting `add` and
//! `flush` both take `&self`, is grounded on how
//! `data-pipeline::stats_exporter::StatsExporter` hands a concentrator to a
//! timer-driven task behind `Arc<Mutex<_>>` — here the lock lives inside the
//! type itself.

use std::collections::HashMap as StdHashMap;
use std::sync::Mutex;

use hashbrown::HashMap;

use crate::aggregation::{build_key, build_sublayer_key, Bucket, MEASURE_DURATION, MEASURE_ERRORS, MEASURE_HITS};
use crate::error::ConcentratorError;
use crate::sublayer::SublayerValue;
use crate::tag::TagSet;
use crate::weighted_trace::WeightedSpan;

/// A trace, already weighted and sublayered, ready to be folded into the
/// concentrator's buckets. Sublayers are keyed by the `span_id` of the
/// top-level span they decompose, standing in for `spec.md`'s
/// `Map<WeightedSpan -> [SublayerValue]>` (a `WeightedSpan` carries no
/// `Hash`/`Eq` of its own, having an embedded `meta`/`metrics` map).
#[derive(Debug, Clone)]
pub struct Input {
    pub env: String,
    pub trace: Vec<WeightedSpan>,
    pub sublayers: StdHashMap<u64, Vec<SublayerValue>>,
}

/// Align `ts` down to the nearest multiple of `bsize`: `ts - (ts mod bsize)`.
fn align_ts(ts: i64, bsize: i64) -> i64 {
    ts - ts.rem_euclid(bsize)
}

struct ConcentratorState {
    buckets: HashMap<i64, Bucket>,
    oldest_ts: i64,
}

/// A streaming, thread-safe aggregator that turns weighted trace spans into
/// fixed-interval time-bucketed stats counts.
///
/// `add`/`flush` both take `&self`: the mutable bucket map and floor
/// timestamp live behind an internal [`Mutex`], so multiple producers can
/// call `add` concurrently from `Arc<Concentrator>` clones while one
/// consumer drives `flush` on a timer — the crate does not spawn that timer
/// itself, ticking is the embedding agent's concern.
pub struct Concentrator {
    bucket_size: i64,
    buffer_len: i64,
    aggregation_tags: Vec<String>,
    state: Mutex<ConcentratorState>,
}

impl Concentrator {
    /// Construct a concentrator bucketing into intervals of `bucket_size`
    /// nanoseconds, tagging every count with `aggregation_tags` read from
    /// each span's `meta` (in addition to the always-present `env`,
    /// `service`, `resource`). `now` seeds the initial floor timestamp at
    /// `alignTs(now, bsize)` — a freshly constructed concentrator accepts
    /// the bucket `now` falls in and merges anything older into it; the
    /// floor only backs off by a further `bufferLen - 1` buckets once
    /// `flush` has run at least once (see `flush` below).
    ///
    /// Fails with [`ConcentratorError::InvalidBucketSize`] if `bucket_size`
    /// is not strictly positive.
    pub fn new(
        aggregation_tags: Vec<String>,
        bucket_size: i64,
        now: i64,
    ) -> Result<Self, ConcentratorError> {
        if bucket_size <= 0 {
            return Err(ConcentratorError::InvalidBucketSize(bucket_size));
        }
        let buffer_len = 2;
        let oldest_ts = align_ts(now, bucket_size);
        Ok(Self {
            bucket_size,
            buffer_len,
            aggregation_tags,
            state: Mutex::new(ConcentratorState {
                buckets: HashMap::new(),
                oldest_ts,
            }),
        })
    }

    pub fn bucket_size(&self) -> i64 {
        self.bucket_size
    }

    /// The current floor timestamp: spans whose bucket would start earlier
    /// than this are merged into the oldest open bucket instead.
    pub fn oldest_ts(&self) -> i64 {
        self.state.lock().unwrap().oldest_ts
    }

    /// Fold one trace's eligible spans into the appropriate buckets.
    ///
    /// A span is eligible only if it is top-level or individually measured;
    /// ineligible spans contribute nothing. `now` is the wall-clock time of
    /// receipt, used only to annotate the `tracing::warn!` emitted when a
    /// span is merged into the floor bucket because it arrived late.
    ///
    /// Fails with [`ConcentratorError::EmptyTrace`] without mutating state
    /// if `input.trace` is empty.
    pub fn add(&self, input: Input, now: i64) -> Result<(), ConcentratorError> {
        if input.trace.is_empty() {
            return Err(ConcentratorError::EmptyTrace);
        }

        let mut state = self.state.lock().unwrap();
        for w in &input.trace {
            if !w.eligible() {
                continue;
            }

            let end = w.start + w.duration;
            let mut bucket_ts = align_ts(end, self.bucket_size);
            if bucket_ts < state.oldest_ts {
                tracing::warn!(
                    span_id = w.span_id,
                    name = %w.name,
                    computed_bucket_ts = bucket_ts,
                    oldest_ts = state.oldest_ts,
                    received_at = now,
                    "late span merged into oldest open bucket"
                );
                bucket_ts = state.oldest_ts;
            }

            let mut tags = TagSet::new();
            tags.insert("env", &input.env);
            tags.insert("service", &w.service);
            tags.insert("resource", &w.resource);
            for tag_name in &self.aggregation_tags {
                if let Some(value) = w.meta.get(tag_name) {
                    tags.insert(tag_name.clone(), value.clone());
                }
            }
            let rendered_tags = tags.render();

            let bucket = state
                .buckets
                .entry(bucket_ts)
                .or_insert_with(|| Bucket::new(bucket_ts, self.bucket_size));

            let hits_key = build_key(&w.name, MEASURE_HITS, &rendered_tags);
            bucket.record(&hits_key, &w.name, MEASURE_HITS, &tags, None, w.top_level, Some(w.weight));

            // Always touch the errors count, even at zero, so every name
            // that has hits also has an errors entry.
            let errors_key = build_key(&w.name, MEASURE_ERRORS, &rendered_tags);
            let errors_delta = if w.is_error() { Some(w.weight) } else { None };
            bucket.record(&errors_key, &w.name, MEASURE_ERRORS, &tags, None, w.top_level, errors_delta);

            let duration_key = build_key(&w.name, MEASURE_DURATION, &rendered_tags);
            bucket.record(
                &duration_key,
                &w.name,
                MEASURE_DURATION,
                &tags,
                None,
                w.top_level,
                Some(w.duration as f64 * w.weight),
            );

            if w.top_level {
                if let Some(values) = input.sublayers.get(&w.span_id) {
                    for sv in values {
                        let measure = sv.metric.measure_name();
                        let extra_tag = sv.extra_tag();
                        let key = build_sublayer_key(&w.name, measure, &rendered_tags, extra_tag);
                        bucket.record(&key, &w.name, measure, &tags, extra_tag, w.top_level, Some(sv.value * w.weight));
                    }
                }
            }
        }

        Ok(())
    }

    /// Drain every bucket whose retention window has closed as of
    /// `flush_time`: `start <= alignTs(flush_time, bsize) - bufferLen *
    /// bsize`. Advances the floor to `alignTs(flush_time, bsize) -
    /// (bufferLen - 1) * bsize`, one bucket less aggressive than the
    /// emission threshold so the most recently closed bucket can still
    /// accept a little more data before the next flush.
    ///
    /// Calling `flush` again with the same or an earlier `flush_time`
    /// returns an empty `Vec`: buckets are removed from internal state as
    /// they are emitted.
    pub fn flush(&self, flush_time: i64) -> Vec<Bucket> {
        let mut state = self.state.lock().unwrap();
        let threshold = align_ts(flush_time, self.bucket_size) - self.buffer_len * self.bucket_size;

        let ready: Vec<i64> = state
            .buckets
            .keys()
            .copied()
            .filter(|&ts| ts <= threshold)
            .collect();

        let mut out = Vec::with_capacity(ready.len());
        for ts in ready {
            if let Some(bucket) = state.buckets.remove(&ts) {
                out.push(bucket);
            }
        }

        state.oldest_ts = align_ts(flush_time, self.bucket_size) - (self.buffer_len - 1) * self.bucket_size;

        tracing::debug!(
            emitted = out.len(),
            remaining = state.buckets.len(),
            oldest_ts = state.oldest_ts,
            "flushed stats buckets"
        );

        out
    }
}
