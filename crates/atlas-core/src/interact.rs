// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collaborator seams supplied by the embedding layer.
//!
//! Planners are pure until command execution; anything interactive is
//! injected through these narrow traits. Calls are synchronous suspension
//! points: the planner blocks until the collaborator answers, and a negative
//! answer is a normal "no command produced" outcome, never an error.

use crate::conflict::{MemberConflictModel, TagMergeModel};

/// Yes/no confirmation supplied by the embedding layer.
pub trait Confirm {
    /// Asks the user to confirm `prompt`. `false` aborts the planning
    /// operation with no mutation.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmation collaborator that accepts everything (headless callers).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmAll;

impl Confirm for ConfirmAll {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Confirmation collaborator that declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAll;

impl Confirm for DeclineAll {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Cooperative cancellation flag checked between per-primitive decisions of
/// long-running reconciliations.
pub trait CancelFlag {
    /// Returns `true` when the operation should stop before its next
    /// decision, leaving the graph untouched.
    fn is_cancelled(&self) -> bool;
}

/// Cancellation flag that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl CancelFlag for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Interactive resolver for merge conflicts.
///
/// The planner populates a conflict model (with default decisions already
/// applied), hands it over, and reads back the finalized decisions. Returning
/// `false` cancels the whole operation. Decisions left undecided after a
/// `true` return are treated as a decline as well; the planner never guesses.
pub trait MergeArbiter {
    /// Resolve tag conflicts in place. `false` cancels the operation.
    fn arbitrate_tags(&self, model: &mut TagMergeModel) -> bool;

    /// Resolve relation-membership conflicts in place. `false` cancels the
    /// operation.
    fn arbitrate_members(&self, model: &mut MemberConflictModel) -> bool;
}

/// Arbiter for unattended runs: decides nothing, cancels nothing.
///
/// With this arbiter, any merge that actually needs a human decision comes
/// back as "no command produced".
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl MergeArbiter for Unattended {
    fn arbitrate_tags(&self, _model: &mut TagMergeModel) -> bool {
        true
    }

    fn arbitrate_members(&self, _model: &mut MemberConflictModel) -> bool {
        true
    }
}
