// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! The span shape this crate consumes.

use std::collections::HashMap;

/// A single span in a trace, trimmed to the fields the stats pipeline reads.
///
/// This is deliberately not generic over a string representation the way
/// `datadog_trace_utils::span::Span<T>` is: this crate has no wire-format
/// decoding concerns of its own, it receives already-decoded spans from its
/// embedding agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Span {
    pub span_id: u64,
    pub parent_id: u64,
    pub service: String,
    pub name: String,
    pub resource: String,
    pub r#type: String,
    /// Start time, Unix nanoseconds.
    pub start: i64,
    /// Duration, nanoseconds.
    pub duration: i64,
    /// Non-zero means the span is in error.
    pub error: i32,
    pub meta: HashMap<String, String>,
    pub metrics: HashMap<String, f64>,
}

impl Span {
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}
