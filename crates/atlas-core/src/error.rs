// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for edit planning.
//!
//! Every variant is a local, recoverable condition reported to the caller
//! before any mutation happens. A declined confirmation is not an error at
//! all: planners signal it by returning `Ok(None)` ("no command produced").
//! Internal inconsistencies (index desync, command/graph disagreement) are
//! debug assertions, never error values.

use thiserror::Error;

/// Errors returned by edit planners.
#[derive(Debug, Error)]
pub enum EditError {
    /// Caller precondition violated; nothing was attempted.
    #[error("invalid selection: {0}")]
    InvalidSelection(&'static str),
    /// An automatic resolution cannot be determined safely; the caller must
    /// not guess.
    #[error("no unambiguous automatic fix: {0}")]
    AmbiguousFix(&'static str),
    /// The requested edit would break a graph invariant; the whole operation
    /// is aborted, nothing was applied.
    #[error("operation would break graph consistency: {0}")]
    ConsistencyViolation(String),
}
