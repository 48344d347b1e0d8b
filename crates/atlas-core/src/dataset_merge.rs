// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dataset merge: reconciling two independently edited copies of the graph.
//!
//! The merge walks every foreign primitive (nodes, then ways, then
//! relations, so references land before their referrers), computes a command
//! for the non-conflicting part, and records a conflict entry for every
//! divergent primitive. Nothing is applied during the walk; the caller
//! pushes the command and resolves the conflicts separately. The walk checks
//! a cooperative cancel flag before every per-primitive decision and leaves
//! the graph untouched when cancelled.
//!
//! Identity rules
//! - Positive ids are shared identity across both copies and are merged by
//!   version: a strictly newer, locally untouched primitive is adopted; a
//!   divergent one becomes a conflict.
//! - Non-positive foreign ids are local to the other copy. They are
//!   renumbered into fresh local ids here and added; local creations never
//!   merge by id.

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::command::Command;
use crate::conflict::MergeChoice;
use crate::error::EditError;
use crate::graph::PrimitiveGraph;
use crate::ident::{NodeId, PrimitiveId, RelationId, WayId};
use crate::interact::CancelFlag;
use crate::primitive::Primitive;

/// One divergent primitive discovered by a dataset merge.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Conflict {
    /// Shared identity of the divergent primitive.
    pub id: PrimitiveId,
    /// Local snapshot at merge time.
    pub mine: Primitive,
    /// Foreign snapshot (references already renumbered into this graph).
    pub theirs: Primitive,
    /// Current decision.
    pub choice: MergeChoice,
}

/// The conflicts produced by one dataset merge.
#[derive(Debug, Clone, Default)]
pub struct ConflictCollection {
    entries: Vec<Conflict>,
}

impl ConflictCollection {
    /// Number of conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no conflict was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The conflict entries, ordered by primitive id.
    #[must_use]
    pub fn entries(&self) -> &[Conflict] {
        &self.entries
    }

    /// Records a decision for the conflict at `index`. Returns `false` when
    /// the index is out of range.
    pub fn decide(&mut self, index: usize, choice: MergeChoice) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.choice = choice;
                true
            }
            None => false,
        }
    }

    /// Holds iff no entry is undecided.
    #[must_use]
    pub fn is_resolved_completely(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.choice != MergeChoice::Undecided)
    }
}

/// Result of a completed (non-cancelled) dataset merge walk.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Atomic command covering the non-conflicting part, when any.
    pub command: Option<Command>,
    /// Divergent primitives awaiting a decision.
    pub conflicts: ConflictCollection,
}

/// Reconciles `theirs` into `mine`, producing a command plus conflicts.
///
/// Returns `None` when `cancel` fired; no command is produced and the graph
/// is untouched.
#[must_use]
pub fn merge_graphs(
    mine: &PrimitiveGraph,
    theirs: &PrimitiveGraph,
    cancel: &dyn CancelFlag,
) -> Option<MergeOutcome> {
    // Renumber every foreign local id up front so references can be mapped
    // regardless of walk order.
    let mut idmap: FxHashMap<PrimitiveId, PrimitiveId> = FxHashMap::default();
    let mut next_local = mine.local_id_watermark();
    let mut renumber = |id: PrimitiveId, map: &mut FxHashMap<PrimitiveId, PrimitiveId>| {
        next_local -= 1;
        map.insert(
            id,
            PrimitiveId {
                kind: id.kind,
                id: next_local,
            },
        );
    };
    for node in theirs.iter_nodes() {
        if node.id.is_new() {
            renumber(node.id.into(), &mut idmap);
        }
    }
    for way in theirs.iter_ways() {
        if way.id.is_new() {
            renumber(way.id.into(), &mut idmap);
        }
    }
    for relation in theirs.iter_relations() {
        if relation.id.is_new() {
            renumber(relation.id.into(), &mut idmap);
        }
    }

    let mut commands = Vec::new();
    let mut conflicts = Vec::new();
    for node in theirs.iter_nodes() {
        if cancel.is_cancelled() {
            debug!("dataset merge cancelled");
            return None;
        }
        let snapshot = remap(Primitive::Node(node.clone()), &idmap);
        reconcile(mine, snapshot, &mut commands, &mut conflicts);
    }
    for way in theirs.iter_ways() {
        if cancel.is_cancelled() {
            debug!("dataset merge cancelled");
            return None;
        }
        let snapshot = remap(Primitive::Way(way.clone()), &idmap);
        reconcile(mine, snapshot, &mut commands, &mut conflicts);
    }
    for relation in theirs.iter_relations() {
        if cancel.is_cancelled() {
            debug!("dataset merge cancelled");
            return None;
        }
        let snapshot = remap(Primitive::Relation(relation.clone()), &idmap);
        reconcile(mine, snapshot, &mut commands, &mut conflicts);
    }

    info!(
        merged = commands.len(),
        conflicts = conflicts.len(),
        "dataset merge walk complete"
    );
    let command = if commands.is_empty() {
        None
    } else {
        Some(Command::sequence(
            format!("merge {} primitives", commands.len()),
            commands,
        ))
    };
    Some(MergeOutcome {
        command,
        conflicts: ConflictCollection { entries: conflicts },
    })
}

/// Rewrites a foreign snapshot's identity and references through the
/// renumbering map.
fn remap(mut snapshot: Primitive, idmap: &FxHashMap<PrimitiveId, PrimitiveId>) -> Primitive {
    let mapped = |id: PrimitiveId| idmap.get(&id).copied().unwrap_or(id);
    match &mut snapshot {
        Primitive::Node(node) => {
            node.id = NodeId(mapped(node.id.into()).id);
        }
        Primitive::Way(way) => {
            way.id = WayId(mapped(way.id.into()).id);
            for node_id in &mut way.nodes {
                *node_id = NodeId(mapped((*node_id).into()).id);
            }
        }
        Primitive::Relation(relation) => {
            relation.id = RelationId(mapped(relation.id.into()).id);
            for member in &mut relation.members {
                member.target = mapped(member.target);
            }
        }
    }
    snapshot
}

fn reconcile(
    mine: &PrimitiveGraph,
    theirs: Primitive,
    commands: &mut Vec<Command>,
    conflicts: &mut Vec<Conflict>,
) {
    let id = theirs.id();
    if id.is_new() {
        // Freshly renumbered local creation from the other copy.
        commands.push(Command::add(theirs));
        return;
    }
    let Some(my) = mine.snapshot(id) else {
        commands.push(Command::add(theirs));
        return;
    };
    if my == theirs {
        return;
    }
    if theirs.data().incomplete {
        // A referenced-but-unloaded stub never overwrites loaded data.
        return;
    }
    if theirs.data().version > my.data().version && !my.data().deleted {
        match Command::change(mine, theirs) {
            Ok(command) => commands.push(command),
            Err(_) => debug_assert!(false, "change target {id} vanished mid-walk"),
        }
        return;
    }
    if theirs.data().version < my.data().version {
        return;
    }
    conflicts.push(Conflict {
        id,
        mine: my,
        theirs,
        choice: MergeChoice::Undecided,
    });
}

/// Builds the command realizing a completely decided conflict collection.
///
/// Keep-mine entries produce nothing; keep-theirs entries replace the local
/// snapshot. Returns `Ok(None)` when every entry keeps the local state.
///
/// # Errors
/// - [`EditError::AmbiguousFix`] when any entry is undecided.
/// - [`EditError::ConsistencyViolation`] when adopting a foreign deletion of
///   a primitive that is still referenced locally.
pub fn resolve_conflicts(
    graph: &PrimitiveGraph,
    conflicts: &ConflictCollection,
) -> Result<Option<Command>, EditError> {
    if !conflicts.is_resolved_completely() {
        return Err(EditError::AmbiguousFix(
            "merge conflicts are not fully decided",
        ));
    }
    let mut commands = Vec::new();
    for entry in conflicts.entries() {
        match entry.choice {
            MergeChoice::KeepMine => {}
            MergeChoice::KeepTheirs => {
                if entry.theirs.data().deleted && graph.referrers(entry.id).next().is_some() {
                    return Err(EditError::ConsistencyViolation(format!(
                        "adopting the deletion of {} would leave dangling references",
                        entry.id
                    )));
                }
                commands.push(Command::change(graph, entry.theirs.clone())?);
            }
            MergeChoice::Undecided => unreachable!("checked above"),
        }
    }
    if commands.is_empty() {
        return Ok(None);
    }
    Ok(Some(Command::sequence(
        format!("resolve {} conflicts", conflicts.len()),
        commands,
    )))
}
