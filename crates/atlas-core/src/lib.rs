// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! atlas-core: consistent command-based editing of geographic primitive graphs.
//!
//! The crate owns a mutable graph of nodes, ways, and relations that
//! reference one another by identity, and keeps it free of dangling
//! references across arbitrary undoable edits and across merges of two
//! independently edited copies. Algorithms never mutate the graph; they plan
//! commands, and only command execution writes.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod combine;
mod command;
mod conflict;
mod coord;
mod dataset_merge;
mod delete;
mod duplicate;
mod error;
mod graph;
mod history;
mod ident;
mod interact;
mod merge_nodes;
mod primitive;
mod tags;

// Re-exports for stable public API
/// Way combination planning.
pub use combine::combine_ways;
/// Commands: the only sanctioned graph mutations.
pub use command::Command;
/// Conflict decision models shared by node merge and dataset merge.
pub use conflict::{
    MemberConflict, MemberConflictModel, MemberDecision, MergeChoice, TagConflict, TagDecision,
    TagMergeModel,
};
/// Fixed-point geographic coordinates.
pub use coord::{LatLon, NANOS_PER_DEGREE};
/// Dataset merge: reconciliation of two graph copies.
pub use dataset_merge::{merge_graphs, resolve_conflicts, Conflict, ConflictCollection, MergeOutcome};
/// Cascading delete planning.
pub use delete::delete_with_references;
/// Duplicate detection and automatic fixing.
pub use duplicate::{find_duplicates, fix_duplicates, DuplicateConfig, DuplicateGroup, Severity};
/// Error taxonomy for edit planning.
pub use error::EditError;
/// The primitive graph and its canonical content hash.
pub use graph::{Hash, PrimitiveGraph};
/// Undo/redo history and the edit context.
pub use history::{EditContext, History};
/// Primitive identity types.
pub use ident::{LocalIdAllocator, NodeId, PrimitiveId, PrimitiveKind, RelationId, WayId};
/// Collaborator seams supplied by the embedding layer.
pub use interact::{
    CancelFlag, Confirm, ConfirmAll, DeclineAll, MergeArbiter, NeverCancelled, Unattended,
};
/// Node merge planning.
pub use merge_nodes::{merge_nodes, merge_target};
/// Primitive record types.
pub use primitive::{Member, Node, Primitive, PrimitiveData, Relation, Way};
/// Tag maps.
pub use tags::Tags;
