// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Commands: the only sanctioned graph mutations.
//!
//! A command is a canonical, replayable graph edit carrying everything needed
//! for both directions. Planners fully establish feasibility before
//! constructing one; `execute` and `undo` are therefore total and never fail.
//! Applying, undoing, and re-applying a command reaches the exact same graph
//! state.
//!
//! Invariants
//! - `Change` captures the pre-mutation snapshot at construction time and
//!   restores it verbatim on undo.
//! - `Sequence` is the unit of atomicity: sub-commands execute in order and
//!   undo in reverse order, and a partially applied sequence is never
//!   observable from outside.
//! - `Delete` flags, never removes; identity survives for undo. Physical
//!   removal happens only when an `Add` is undone.

use std::collections::BTreeSet;

use crate::error::EditError;
use crate::graph::PrimitiveGraph;
use crate::ident::PrimitiveId;
use crate::primitive::Primitive;

/// An applicable, undoable unit of graph mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Insert a brand-new primitive.
    Add {
        /// The primitive to insert; its id must be unused.
        primitive: Primitive,
    },
    /// Flag-delete a set of primitives.
    Delete {
        /// Ids to flag; all must be present and not yet deleted.
        targets: BTreeSet<PrimitiveId>,
    },
    /// Replace the full snapshot of one primitive.
    Change {
        /// Snapshot captured before the mutation.
        old: Primitive,
        /// Snapshot to install.
        new: Primitive,
    },
    /// An ordered, atomic composite.
    Sequence {
        /// Short human-readable label for history display.
        name: String,
        /// Sub-commands; executed front to back, undone back to front.
        commands: Vec<Command>,
    },
}

impl Command {
    /// Builds an add command for `primitive`.
    #[must_use]
    pub fn add(primitive: Primitive) -> Self {
        Self::Add { primitive }
    }

    /// Builds a delete command for `targets`.
    #[must_use]
    pub fn delete(targets: BTreeSet<PrimitiveId>) -> Self {
        Self::Delete { targets }
    }

    /// Builds a change command, capturing the current snapshot of the target
    /// as the undo state.
    ///
    /// # Errors
    /// Returns [`EditError::ConsistencyViolation`] when the target is not in
    /// the graph.
    pub fn change(graph: &PrimitiveGraph, new: Primitive) -> Result<Self, EditError> {
        let id = new.id();
        let old = graph
            .snapshot(id)
            .ok_or_else(|| EditError::ConsistencyViolation(format!("{id} is not in the graph")))?;
        Ok(Self::Change { old, new })
    }

    /// Builds an atomic composite from `commands`.
    #[must_use]
    pub fn sequence(name: impl Into<String>, commands: Vec<Self>) -> Self {
        Self::Sequence {
            name: name.into(),
            commands,
        }
    }

    /// Applies this command to `graph`.
    pub fn execute(&self, graph: &mut PrimitiveGraph) {
        match self {
            Self::Add { primitive } => graph.insert(primitive.clone()),
            Self::Delete { targets } => graph.set_deleted(targets, true),
            Self::Change { old, new } => {
                let prev = graph.replace(new.clone());
                debug_assert!(
                    prev.as_ref() == Some(old),
                    "change target drifted since command construction: {}",
                    new.id()
                );
            }
            Self::Sequence { commands, .. } => {
                for command in commands {
                    command.execute(graph);
                }
            }
        }
    }

    /// Reverts this command on `graph`, restoring the pre-execute state
    /// exactly.
    pub fn undo(&self, graph: &mut PrimitiveGraph) {
        match self {
            Self::Add { primitive } => {
                let removed = graph.remove(primitive.id());
                debug_assert!(removed.is_some(), "undo of add found nothing to remove");
            }
            Self::Delete { targets } => graph.set_deleted(targets, false),
            Self::Change { old, new } => {
                let prev = graph.replace(old.clone());
                debug_assert!(
                    prev.as_ref() == Some(new),
                    "undo found an unexpected snapshot for {}",
                    old.id()
                );
            }
            Self::Sequence { commands, .. } => {
                for command in commands.iter().rev() {
                    command.undo(graph);
                }
            }
        }
    }

    /// The set of primitive ids this command touches.
    #[must_use]
    pub fn affected(&self) -> BTreeSet<PrimitiveId> {
        match self {
            Self::Add { primitive } => [primitive.id()].into_iter().collect(),
            Self::Delete { targets } => targets.clone(),
            Self::Change { new, .. } => [new.id()].into_iter().collect(),
            Self::Sequence { commands, .. } => {
                commands.iter().flat_map(Self::affected).collect()
            }
        }
    }

    /// Short human-readable description for history display.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Add { primitive } => format!("add {}", primitive.id()),
            Self::Delete { targets } => match targets.len() {
                1 => targets
                    .iter()
                    .next()
                    .map_or_else(String::new, |id| format!("delete {id}")),
                n => format!("delete {n} primitives"),
            },
            Self::Change { new, .. } => format!("change {}", new.id()),
            Self::Sequence { name, .. } => name.clone(),
        }
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLon;
    use crate::ident::{NodeId, WayId};
    use crate::primitive::{Node, Way};

    fn coord(lat: i64, lon: i64) -> LatLon {
        LatLon::from_nanos(lat, lon).unwrap()
    }

    #[test]
    fn apply_undo_apply_reaches_the_same_state() {
        let mut graph = PrimitiveGraph::new();
        graph.insert(Node::new(NodeId(1), coord(1, 1)).into());
        graph.insert(Node::new(NodeId(2), coord(2, 2)).into());
        graph.insert(Way::new(WayId(1), vec![NodeId(1), NodeId(2)]).into());

        let mut tagged = graph.way(WayId(1)).unwrap().clone();
        tagged.data.tags.insert("highway", "path");
        let cmd = Command::change(&graph, tagged.into()).unwrap();

        cmd.execute(&mut graph);
        let once = graph.canonical_hash();
        cmd.undo(&mut graph);
        cmd.execute(&mut graph);
        assert_eq!(graph.canonical_hash(), once);
        assert!(graph.consistency_violations().is_empty());
    }

    #[test]
    fn sequence_undoes_in_reverse_order() {
        let mut graph = PrimitiveGraph::new();
        graph.insert(Node::new(NodeId(1), coord(1, 1)).into());
        graph.insert(Node::new(NodeId(2), coord(2, 2)).into());
        let before = graph.canonical_hash();

        let add_way = Command::add(Way::new(WayId(-1), vec![NodeId(1), NodeId(2)]).into());
        let mut graph_after_add = graph.clone();
        add_way.execute(&mut graph_after_add);
        let delete = Command::delete([WayId(-1).into()].into_iter().collect());
        let seq = Command::sequence("add then delete", vec![add_way, delete]);

        seq.execute(&mut graph);
        seq.undo(&mut graph);
        assert_eq!(graph.canonical_hash(), before);
    }

    #[test]
    fn describe_names_the_target() {
        let cmd = Command::delete([NodeId(7).into()].into_iter().collect());
        assert_eq!(cmd.describe(), "delete n7");
    }
}
