// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node merge planning.
//!
//! Collapses a set of nodes into one surviving target, redirecting every way
//! and relation reference, merging tags, and deleting the sources, all in one
//! atomic command.

use std::collections::BTreeSet;

use tracing::debug;

use crate::command::Command;
use crate::conflict::{MemberConflictModel, TagMergeModel};
use crate::error::EditError;
use crate::graph::PrimitiveGraph;
use crate::ident::{NodeId, PrimitiveId, WayId};
use crate::interact::MergeArbiter;

/// Picks the merge survivor.
///
/// The lowest positive id wins; synchronized identity is never thrown away
/// when it can be kept. Among purely local candidates the greatest id wins,
/// which is the oldest locally created node (local ids are allocated
/// downward).
#[must_use]
pub fn merge_target(selection: &BTreeSet<NodeId>) -> Option<NodeId> {
    selection
        .iter()
        .filter(|id| !id.is_new())
        .min()
        .or_else(|| selection.iter().max())
        .copied()
}

/// Plans the merge of `selection` into a single node.
///
/// Tag differences across the sources and ambiguous relation memberships are
/// put to `arbiter`; an unresolved or cancelled arbitration yields
/// `Ok(None)` with the graph untouched.
///
/// # Errors
/// - [`EditError::InvalidSelection`] for fewer than two nodes, or missing,
///   deleted, or incomplete ones.
/// - [`EditError::ConsistencyViolation`] when the merge would collapse a way
///   that a relation still references.
pub fn merge_nodes(
    graph: &PrimitiveGraph,
    selection: &BTreeSet<NodeId>,
    arbiter: &dyn MergeArbiter,
) -> Result<Option<Command>, EditError> {
    if selection.len() < 2 {
        return Err(EditError::InvalidSelection(
            "node merge needs at least two nodes",
        ));
    }
    for id in selection {
        match graph.node(*id) {
            None => {
                return Err(EditError::InvalidSelection(
                    "selection references a node that is not in the graph",
                ))
            }
            Some(n) if n.data.deleted => {
                return Err(EditError::InvalidSelection(
                    "selection contains a deleted node",
                ))
            }
            Some(n) if n.data.incomplete => {
                return Err(EditError::InvalidSelection(
                    "selection contains an incomplete node",
                ))
            }
            Some(_) => {}
        }
    }

    let Some(target) = merge_target(selection) else {
        return Err(EditError::InvalidSelection("node merge needs a target"));
    };
    let sources: BTreeSet<NodeId> = selection.iter().filter(|id| **id != target).copied().collect();
    let source_pids: BTreeSet<PrimitiveId> = sources.iter().map(|id| (*id).into()).collect();

    // Tag union across the whole merge set, sources and target alike.
    let mut tag_model = TagMergeModel::build(
        selection
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|n| &n.data.tags),
    );
    if tag_model.has_conflicts() {
        if !arbiter.arbitrate_tags(&mut tag_model) {
            debug!("tag arbitration cancelled");
            return Ok(None);
        }
        if !tag_model.is_resolved_completely() {
            debug!("tag conflicts left undecided");
            return Ok(None);
        }
    }
    let Some(merged_tags) = tag_model.resolved_tags() else {
        return Ok(None);
    };

    // Memberships of the sources. A single slot defaults to keep; anything
    // richer goes through the default heuristic and then the arbiter.
    let mut member_model = MemberConflictModel::build(graph, &source_pids);
    if !member_model.is_empty() {
        member_model.apply_default_decisions();
        if !member_model.is_resolved_completely() {
            if !arbiter.arbitrate_members(&mut member_model) {
                debug!("membership arbitration cancelled");
                return Ok(None);
            }
            if !member_model.is_resolved_completely() {
                debug!("membership conflicts left undecided");
                return Ok(None);
            }
        }
    }

    let mut commands = Vec::new();
    let mut doomed: BTreeSet<PrimitiveId> = source_pids.clone();

    let Some(target_node) = graph.node(target) else {
        return Err(EditError::InvalidSelection(
            "selection references a node that is not in the graph",
        ));
    };
    if target_node.data.tags != merged_tags {
        let mut changed = target_node.clone();
        changed.data.tags = merged_tags;
        commands.push(Command::change(graph, changed.into())?);
    }

    // Redirect way node lists, collapsing the consecutive duplicates the
    // substitution introduces.
    let mut touched_ways: BTreeSet<WayId> = BTreeSet::new();
    for source in &source_pids {
        touched_ways.extend(graph.referrers(*source).filter_map(PrimitiveId::as_way));
    }
    for way_id in touched_ways {
        let Some(way) = graph.way(way_id) else {
            continue;
        };
        let mut new_nodes: Vec<NodeId> = Vec::with_capacity(way.nodes.len());
        for node_id in &way.nodes {
            let mapped = if sources.contains(node_id) { target } else { *node_id };
            if new_nodes.last() == Some(&mapped) {
                continue;
            }
            new_nodes.push(mapped);
        }
        let distinct: BTreeSet<NodeId> = new_nodes.iter().copied().collect();
        if distinct.len() < 2 {
            if graph.relation_referrers(way_id.into()).next().is_some() {
                return Err(EditError::ConsistencyViolation(format!(
                    "merging would delete {way_id}, which a relation still references"
                )));
            }
            doomed.insert(way_id.into());
        } else {
            let mut changed = way.clone();
            changed.nodes = new_nodes;
            commands.push(Command::change(graph, changed.into())?);
        }
    }

    commands.extend(member_model.build_resolution(graph, target.into())?);
    commands.push(Command::delete(doomed));

    debug!(target = %target, sources = sources.len(), "node merge planned");
    Ok(Some(Command::sequence(
        format!("merge {} nodes into {target}", selection.len()),
        commands,
    )))
}
