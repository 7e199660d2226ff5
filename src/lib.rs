// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! A streaming aggregator that turns distributed-tracing spans into
//! fixed-interval, time-bucketed stats counts (hits, errors, duration, and
//! sublayer breakdowns), keyed by a canonical tag fingerprint.
//!
//! The crate is deliberately narrow: it owns the bucketing/aggregation
//! state machine and the per-trace preprocessing that feeds it
//! ([`weighted_trace`], [`sublayer`]). Decoding spans off the wire,
//! ticking [`Concentrator::flush`] on a schedule, and exporting the
//! resulting buckets are the embedding agent's concern.
//!
//! ```
//! use datadog_trace_stats_concentrator::{
//!     span::Span, weighted_trace::build_weighted_trace, sublayer::compute_sublayers,
//!     concentrator::{Concentrator, Input},
//! };
//!
//! let span = Span {
//!     span_id: 1,
//!     service: "web".to_string(),
//!     name: "http.request".to_string(),
//!     resource: "GET /".to_string(),
//!     start: 0,
//!     duration: 10_000_000,
//!     ..Default::default()
//! };
//! let trace = build_weighted_trace(vec![span], None).unwrap();
//! let sublayers = compute_sublayers(&trace);
//!
//! let concentrator = Concentrator::new(vec![], 10_000_000_000, 0).unwrap();
//! concentrator
//!     .add(Input { env: "prod".to_string(), trace, sublayers }, 0)
//!     .unwrap();
//! ```

pub mod aggregation;
pub mod concentrator;
pub mod error;
pub mod span;
pub mod sublayer;
pub mod tag;
pub mod weighted_trace;

pub use aggregation::{Bucket, Count};
pub use concentrator::{Concentrator, Input};
pub use error::ConcentratorError;
pub use span::Span;
pub use sublayer::{SublayerMetric, SublayerValue};
pub use tag::{Tag, TagSet};
pub use weighted_trace::WeightedSpan;
