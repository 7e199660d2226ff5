// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
//! Error types surfaced by this crate.

/// Errors that can occur while building a weighted trace or feeding it to a
/// [`crate::concentrator::Concentrator`].
///
/// Late-arriving spans are not an error: they are merged into the oldest
/// open bucket and logged at `warn` level. See `ConcentratorError` callers
/// in [`crate::concentrator`] for that behavior.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum ConcentratorError {
    #[error("trace is empty")]
    EmptyTrace,
    #[error("trace root span (id {0}) not found in trace")]
    MissingRoot(u64),
    #[error("bucket size must be strictly positive, got {0}")]
    InvalidBucketSize(i64),
}
