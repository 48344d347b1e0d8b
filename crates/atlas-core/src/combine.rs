// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Way combination planning.
//!
//! Stitches two or more ways into a single connected path. A
//! direction-preserving pass runs first; only when it cannot consume every
//! edge does a direction-agnostic pass run, and accepting that result
//! requires explicit confirmation because some source ways end up reversed.

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::command::Command;
use crate::conflict::TagMergeModel;
use crate::error::EditError;
use crate::graph::PrimitiveGraph;
use crate::ident::{NodeId, PrimitiveId, RelationId, WayId};
use crate::interact::{Confirm, MergeArbiter};
use crate::primitive::Member;

/// Plans the combination of `selection` into the first selected way.
///
/// Returns `Ok(None)` when the reversal confirmation or a tag arbitration is
/// declined.
///
/// # Errors
/// - [`EditError::InvalidSelection`] for fewer than two ways, repeated,
///   missing, deleted, or incomplete ways, ways with fewer than two nodes,
///   or a selection whose edges do not form a single connected path.
pub fn combine_ways(
    graph: &PrimitiveGraph,
    selection: &[WayId],
    confirm: &dyn Confirm,
    arbiter: &dyn MergeArbiter,
) -> Result<Option<Command>, EditError> {
    if selection.len() < 2 {
        return Err(EditError::InvalidSelection(
            "way combination needs at least two ways",
        ));
    }
    let distinct: BTreeSet<WayId> = selection.iter().copied().collect();
    if distinct.len() != selection.len() {
        return Err(EditError::InvalidSelection(
            "selection lists the same way twice",
        ));
    }
    for id in selection {
        match graph.way(*id) {
            None => {
                return Err(EditError::InvalidSelection(
                    "selection references a way that is not in the graph",
                ))
            }
            Some(w) if w.data.deleted => {
                return Err(EditError::InvalidSelection(
                    "selection contains a deleted way",
                ))
            }
            Some(w) if w.data.incomplete => {
                return Err(EditError::InvalidSelection(
                    "selection contains an incomplete way",
                ))
            }
            Some(w) if w.nodes.len() < 2 => {
                return Err(EditError::InvalidSelection(
                    "selection contains a way under construction",
                ))
            }
            Some(_) => {}
        }
    }

    // Consecutive node pairs, in selection order.
    let mut directed: Vec<(NodeId, NodeId)> = Vec::new();
    for id in selection {
        let Some(way) = graph.way(*id) else {
            continue;
        };
        for pair in way.nodes.windows(2) {
            directed.push((pair[0], pair[1]));
        }
    }

    let nodes = match stitch(directed.clone(), false) {
        Some(chain) => chain,
        None => {
            // Direction-agnostic retry over canonicalized, deduplicated
            // undirected edges.
            let undirected: BTreeSet<(NodeId, NodeId)> = directed
                .into_iter()
                .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
                .collect();
            let Some(chain) = stitch(undirected.into_iter().collect(), true) else {
                return Err(EditError::InvalidSelection(
                    "could not combine: the selected ways do not form a single connected path",
                ));
            };
            if !confirm.confirm("some of the combined ways will be reversed; continue?") {
                debug!("reversal declined");
                return Ok(None);
            }
            chain
        }
    };

    // Tag union across all sources, arbitration as in node merge.
    let mut tag_model = TagMergeModel::build(
        selection
            .iter()
            .filter_map(|id| graph.way(*id))
            .map(|w| &w.data.tags),
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

    let survivor = selection[0];
    let survivor_pid: PrimitiveId = survivor.into();
    let removed: BTreeSet<PrimitiveId> =
        selection[1..].iter().map(|id| (*id).into()).collect();

    let mut commands = Vec::new();
    let Some(survivor_way) = graph.way(survivor) else {
        return Err(EditError::InvalidSelection(
            "selection references a way that is not in the graph",
        ));
    };
    let mut changed = survivor_way.clone();
    changed.nodes = nodes;
    changed.data.tags = merged_tags;
    commands.push(Command::change(graph, changed.into())?);

    // Memberships of removed ways move over to the survivor; a membership
    // the survivor already holds under the same role is dropped instead of
    // duplicated.
    let mut relations: BTreeSet<RelationId> = BTreeSet::new();
    for id in &removed {
        relations.extend(graph.relation_referrers(*id));
    }
    for relation_id in relations {
        let Some(relation) = graph.relation(relation_id) else {
            continue;
        };
        let mut survivor_roles: BTreeSet<String> = relation
            .members
            .iter()
            .filter(|m| m.target == survivor_pid)
            .map(|m| m.role.clone())
            .collect();
        let mut members: Vec<Member> = Vec::with_capacity(relation.members.len());
        for member in &relation.members {
            if removed.contains(&member.target) {
                if survivor_roles.contains(&member.role) {
                    continue;
                }
                survivor_roles.insert(member.role.clone());
                members.push(Member::new(member.role.clone(), survivor_pid));
            } else {
                members.push(member.clone());
            }
        }
        if members != relation.members {
            let mut changed = relation.clone();
            changed.members = members;
            commands.push(Command::change(graph, changed.into())?);
        }
    }

    commands.push(Command::delete(removed));
    debug!(survivor = %survivor, sources = selection.len() - 1, "way combination planned");
    Ok(Some(Command::sequence(
        format!("combine {} ways into {survivor}", selection.len()),
        commands,
    )))
}

/// Greedily stitches `edges` into one chain.
///
/// The chain is seeded with the first edge; every round scans the remaining
/// edges for one that attaches to either end and consumes it. With
/// `ignore_direction` an edge may attach flipped. Returns `None` when a round
/// consumes nothing while edges remain, or when there are no edges at all.
fn stitch(mut edges: Vec<(NodeId, NodeId)>, ignore_direction: bool) -> Option<Vec<NodeId>> {
    if edges.is_empty() {
        return None;
    }
    let (seed_from, seed_to) = edges.remove(0);
    let mut chain: VecDeque<NodeId> = VecDeque::from([seed_from, seed_to]);
    while !edges.is_empty() {
        let mut progressed = false;
        let mut i = 0;
        while i < edges.len() {
            let (a, b) = edges[i];
            let Some(&back) = chain.back() else {
                return None;
            };
            let Some(&front) = chain.front() else {
                return None;
            };
            if a == back {
                chain.push_back(b);
            } else if b == front {
                chain.push_front(a);
            } else if ignore_direction && b == back {
                chain.push_back(a);
            } else if ignore_direction && a == front {
                chain.push_front(b);
            } else {
                i += 1;
                continue;
            }
            edges.remove(i);
            progressed = true;
        }
        if !progressed {
            return None;
        }
    }
    Some(chain.into_iter().collect())
}
