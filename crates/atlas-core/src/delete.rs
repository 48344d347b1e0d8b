// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cascading delete planning.
//!
//! Computes the full consistent deletion closure for a selection and builds
//! one atomic command for it, or produces nothing at all. The graph is never
//! touched during planning; every confirmation happens before the command
//! exists.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::command::Command;
use crate::error::EditError;
use crate::graph::PrimitiveGraph;
use crate::ident::{PrimitiveId, PrimitiveKind, RelationId, WayId};
use crate::interact::Confirm;

/// Plans the deletion of `selection` plus everything that must go with it.
///
/// With `also_delete_nodes` set, untagged nodes of selected ways whose every
/// referrer is inside the selection join the deletion set. Ways left with
/// fewer than 2 distinct nodes cascade into the deletion set themselves, and
/// their referrers are processed like any other doomed primitive. Every
/// relation that would lose a member is confirmed individually; a single
/// decline aborts the whole operation.
///
/// Returns `Ok(None)` when the selection is empty or a confirmation was
/// declined; the graph is guaranteed untouched in that case.
///
/// # Errors
/// Returns [`EditError::InvalidSelection`] when the selection references
/// missing or already deleted primitives.
pub fn delete_with_references(
    graph: &PrimitiveGraph,
    selection: &BTreeSet<PrimitiveId>,
    also_delete_nodes: bool,
    confirm: &dyn Confirm,
) -> Result<Option<Command>, EditError> {
    if selection.is_empty() {
        return Ok(None);
    }
    for id in selection {
        match graph.snapshot(*id) {
            None => {
                return Err(EditError::InvalidSelection(
                    "selection references a primitive that is not in the graph",
                ))
            }
            Some(p) if p.data().deleted => {
                return Err(EditError::InvalidSelection(
                    "selection contains an already deleted primitive",
                ))
            }
            Some(_) => {}
        }
    }

    let mut doomed: BTreeSet<PrimitiveId> = selection.clone();
    if also_delete_nodes {
        collect_orphaned_nodes(graph, selection, &mut doomed);
    }

    if !confirm.confirm(&format!("delete {} primitives", doomed.len())) {
        debug!(count = doomed.len(), "deletion declined");
        return Ok(None);
    }

    // Walk referrers of everything doomed. Ways that would collapse below 2
    // distinct nodes join the closure and are walked in turn; every relation
    // membership loss needs its own confirmation.
    let mut queue: VecDeque<PrimitiveId> = doomed.iter().copied().collect();
    let mut asked: FxHashSet<(RelationId, PrimitiveId)> = FxHashSet::default();
    while let Some(target) = queue.pop_front() {
        let referrers: Vec<PrimitiveId> = graph.referrers(target).collect();
        for referrer in referrers {
            if doomed.contains(&referrer) {
                continue;
            }
            match referrer.kind {
                PrimitiveKind::Way => {
                    let Some(way) = graph.way(WayId(referrer.id)) else {
                        continue;
                    };
                    let remaining: BTreeSet<_> = way
                        .nodes
                        .iter()
                        .filter(|n| !doomed.contains(&(**n).into()))
                        .collect();
                    if remaining.len() < 2 {
                        doomed.insert(referrer);
                        queue.push_back(referrer);
                    }
                }
                PrimitiveKind::Relation => {
                    let relation = RelationId(referrer.id);
                    if asked.insert((relation, target))
                        && !confirm.confirm(&format!("remove {target} from {relation}?"))
                    {
                        debug!(%relation, %target, "membership removal declined");
                        return Ok(None);
                    }
                }
                PrimitiveKind::Node => debug_assert!(false, "a node cannot be a referrer"),
            }
        }
    }

    debug!(
        selected = selection.len(),
        closure = doomed.len(),
        "deletion closure computed"
    );
    Ok(Some(build_commands(graph, &doomed)?))
}

/// Untagged nodes of selected ways with no referrer outside the selection.
fn collect_orphaned_nodes(
    graph: &PrimitiveGraph,
    selection: &BTreeSet<PrimitiveId>,
    doomed: &mut BTreeSet<PrimitiveId>,
) {
    for id in selection {
        let Some(way_id) = id.as_way() else {
            continue;
        };
        let Some(way) = graph.way(way_id) else {
            continue;
        };
        for node_id in &way.nodes {
            let pid: PrimitiveId = (*node_id).into();
            if doomed.contains(&pid) {
                continue;
            }
            let Some(node) = graph.node(*node_id) else {
                continue;
            };
            if !node.data.tags.is_empty() || node.data.deleted {
                continue;
            }
            if graph.referrers(pid).all(|r| selection.contains(&r)) {
                doomed.insert(pid);
            }
        }
    }
}

fn build_commands(
    graph: &PrimitiveGraph,
    doomed: &BTreeSet<PrimitiveId>,
) -> Result<Command, EditError> {
    // Surviving referrers, gathered through the index so the change set is
    // exactly the affected ones.
    let mut touched_ways: BTreeSet<WayId> = BTreeSet::new();
    let mut touched_relations: BTreeSet<RelationId> = BTreeSet::new();
    for id in doomed {
        for referrer in graph.referrers(*id) {
            if doomed.contains(&referrer) {
                continue;
            }
            match referrer.kind {
                PrimitiveKind::Way => {
                    touched_ways.insert(WayId(referrer.id));
                }
                PrimitiveKind::Relation => {
                    touched_relations.insert(RelationId(referrer.id));
                }
                PrimitiveKind::Node => {}
            }
        }
    }

    let mut commands = Vec::new();
    for way_id in touched_ways {
        let Some(way) = graph.way(way_id) else {
            continue;
        };
        let mut changed = way.clone();
        changed.nodes.retain(|n| !doomed.contains(&(*n).into()));
        commands.push(Command::change(graph, changed.into())?);
    }
    for relation_id in touched_relations {
        let Some(relation) = graph.relation(relation_id) else {
            continue;
        };
        let mut changed = relation.clone();
        changed.members.retain(|m| !doomed.contains(&m.target));
        commands.push(Command::change(graph, changed.into())?);
    }
    commands.push(Command::delete(doomed.clone()));
    Ok(Command::sequence(
        format!("delete {} primitives", doomed.len()),
        commands,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLon;
    use crate::ident::NodeId;
    use crate::interact::ConfirmAll;
    use crate::primitive::{Node, Way};

    fn line_graph() -> PrimitiveGraph {
        let mut graph = PrimitiveGraph::new();
        for id in 1..=3 {
            graph.insert(Node::new(NodeId(id), LatLon::from_nanos(id, id).unwrap()).into());
        }
        graph.insert(Way::new(WayId(1), vec![NodeId(1), NodeId(2), NodeId(3)]).into());
        graph
    }

    #[test]
    fn empty_selection_produces_no_command() {
        let graph = line_graph();
        let cmd =
            delete_with_references(&graph, &BTreeSet::new(), false, &ConfirmAll).unwrap();
        assert!(cmd.is_none());
    }

    #[test]
    fn deleting_a_whole_way_can_take_its_orphan_nodes() {
        let mut ctx = crate::history::EditContext::with_graph(line_graph());
        let selection: BTreeSet<PrimitiveId> = [WayId(1).into()].into_iter().collect();
        let cmd = delete_with_references(&ctx.graph, &selection, true, &ConfirmAll)
            .unwrap()
            .unwrap();
        ctx.apply(cmd);
        assert!(ctx.graph.way(WayId(1)).unwrap().data.deleted);
        for id in 1..=3 {
            assert!(ctx.graph.node(NodeId(id)).unwrap().data.deleted);
        }
        assert!(ctx.graph.consistency_violations().is_empty());
    }

    #[test]
    fn tagged_nodes_survive_their_way() {
        let mut graph = line_graph();
        let mut tagged = graph.node(NodeId(2)).unwrap().clone();
        tagged.data.tags.insert("highway", "crossing");
        graph.replace(tagged.into());

        let mut ctx = crate::history::EditContext::with_graph(graph);
        let selection: BTreeSet<PrimitiveId> = [WayId(1).into()].into_iter().collect();
        let cmd = delete_with_references(&ctx.graph, &selection, true, &ConfirmAll)
            .unwrap()
            .unwrap();
        ctx.apply(cmd);
        assert!(!ctx.graph.node(NodeId(2)).unwrap().data.deleted);
        assert!(ctx.graph.node(NodeId(1)).unwrap().data.deleted);
    }
}
