// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Undo/redo history and the edit context.

use tracing::debug;

use crate::command::Command;
use crate::graph::PrimitiveGraph;

/// Two-stack undo/redo history.
///
/// Pushing a new command while the redo stack is non-empty discards the redo
/// branch; history is strictly linear.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Command>,
    redo: Vec<Command>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes `command` on `graph` and records it for undo.
    pub fn add(&mut self, graph: &mut PrimitiveGraph, command: Command) {
        debug!(command = %command, "apply");
        command.execute(graph);
        graph.assert_consistent();
        if !self.redo.is_empty() {
            debug!(discarded = self.redo.len(), "redo branch discarded");
            self.redo.clear();
        }
        self.undo.push(command);
    }

    /// Undoes the most recent command. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(&mut self, graph: &mut PrimitiveGraph) -> bool {
        let Some(command) = self.undo.pop() else {
            return false;
        };
        debug!(command = %command, "undo");
        command.undo(graph);
        graph.assert_consistent();
        self.redo.push(command);
        true
    }

    /// Re-applies the most recently undone command. Returns `false` when the
    /// redo stack is empty.
    pub fn redo(&mut self, graph: &mut PrimitiveGraph) -> bool {
        let Some(command) = self.redo.pop() else {
            return false;
        };
        debug!(command = %command, "redo");
        command.execute(graph);
        graph.assert_consistent();
        self.undo.push(command);
        true
    }

    /// Returns `true` when an undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Returns `true` when a redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Description of the command an undo would revert.
    #[must_use]
    pub fn undo_description(&self) -> Option<String> {
        self.undo.last().map(Command::describe)
    }

    /// Description of the command a redo would re-apply.
    #[must_use]
    pub fn redo_description(&self) -> Option<String> {
        self.redo.last().map(Command::describe)
    }
}

/// The graph plus its history, threaded explicitly through every caller.
///
/// There is deliberately no global instance; everything that edits receives a
/// context.
#[derive(Debug, Default)]
pub struct EditContext {
    /// The primitive graph under edit.
    pub graph: PrimitiveGraph,
    /// Linear undo/redo history over `graph`.
    pub history: History,
}

impl EditContext {
    /// Creates a context over an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context over an existing graph.
    #[must_use]
    pub fn with_graph(graph: PrimitiveGraph) -> Self {
        Self {
            graph,
            history: History::new(),
        }
    }

    /// Executes `command` and records it.
    pub fn apply(&mut self, command: Command) {
        self.history.add(&mut self.graph, command);
    }

    /// Undoes the most recent command.
    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.graph)
    }

    /// Re-applies the most recently undone command.
    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLon;
    use crate::ident::NodeId;
    use crate::primitive::Node;

    fn node(id: i64) -> Node {
        Node::new(NodeId(id), LatLon::from_nanos(id, id).unwrap())
    }

    #[test]
    fn new_command_discards_redo_branch() {
        let mut ctx = EditContext::new();
        ctx.apply(Command::add(node(-1).into()));
        ctx.apply(Command::add(node(-2).into()));
        assert!(ctx.undo());
        assert!(ctx.history.can_redo());

        ctx.apply(Command::add(node(-3).into()));
        assert!(!ctx.history.can_redo());
        assert!(ctx.graph.node(NodeId(-3)).is_some());
        assert!(ctx.graph.node(NodeId(-2)).is_none());
    }

    #[test]
    fn undo_redo_round_trip_restores_state() {
        let mut ctx = EditContext::new();
        ctx.apply(Command::add(node(-1).into()));
        let after = ctx.graph.canonical_hash();
        assert!(ctx.undo());
        assert!(ctx.redo());
        assert_eq!(ctx.graph.canonical_hash(), after);
    }

    #[test]
    fn undo_on_empty_history_is_a_no_op() {
        let mut ctx = EditContext::new();
        assert!(!ctx.undo());
        assert!(!ctx.redo());
    }
}
