// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Duplicate detection and automatic fixing.
//!
//! Ways are canonicalized to their coordinate sequence: closed ways are
//! rotated to start at the lowest-identity node so cyclic rotations compare
//! equal, and ways without direction-significant tags collapse with their
//! reversed twins onto whichever orientation was registered first during the
//! scan. Relations are canonicalized to their member sequence. All canonical
//! forms are BLAKE3 digests over fixed-width little-endian byte streams.

use std::collections::{BTreeMap, BTreeSet};

use blake3::Hasher;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::command::Command;
use crate::error::EditError;
use crate::graph::{Hash, PrimitiveGraph};
use crate::ident::{PrimitiveId, RelationId, WayId};
use crate::primitive::{Member, Relation, Way};

/// Tunable key sets for the scan.
#[derive(Debug, Clone)]
pub struct DuplicateConfig {
    /// Bookkeeping keys ignored when comparing tag sets.
    pub discardable_keys: BTreeSet<String>,
    /// Keys that make a way's direction significant, disabling reverse
    /// orientation folding.
    pub directional_keys: BTreeSet<String>,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            discardable_keys: ["created_by", "converted_by", "current_id", "odbl"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            directional_keys: ["oneway", "direction", "incline"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// How serious a duplicate group is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Structurally identical primitives; safe-to-fix candidates.
    Error,
    /// Same geometry with diverging interesting tags; needs a human look.
    Warning,
}

/// A group of mutually duplicate primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DuplicateGroup {
    /// Group severity.
    pub severity: Severity,
    /// Members in ascending id order.
    pub members: Vec<PrimitiveId>,
    /// Canonical digest the members share.
    pub digest: Hash,
}

/// Scans the graph for duplicate ways and relations.
///
/// Output is deterministic for a given graph: running the scan twice on an
/// unchanged graph reports identical groups.
#[must_use]
pub fn find_duplicates(graph: &PrimitiveGraph, config: &DuplicateConfig) -> Vec<DuplicateGroup> {
    let mut geometry: BTreeMap<Hash, Vec<(WayId, Hash)>> = BTreeMap::new();
    let mut registered: FxHashSet<Hash> = FxHashSet::default();

    for way in graph.iter_ways() {
        if way.data.deleted || way.data.incomplete || way.nodes.len() < 2 {
            continue;
        }
        let Some(forward) = canonical_coords(graph, way) else {
            continue;
        };
        let forward_digest = coords_digest(&forward);
        let directional = way
            .data
            .tags
            .keys()
            .any(|k| config.directional_keys.contains(k));
        let digest = if directional || registered.contains(&forward_digest) {
            forward_digest
        } else {
            let reverse_digest = coords_digest(&reversed_coords(&forward, way.is_closed()));
            if registered.contains(&reverse_digest) {
                reverse_digest
            } else {
                registered.insert(forward_digest);
                forward_digest
            }
        };
        let tag_digest = tags_digest(way, config);
        geometry.entry(digest).or_default().push((way.id, tag_digest));
    }

    let mut groups = Vec::new();
    for (digest, bucket) in &geometry {
        if bucket.len() < 2 {
            continue;
        }
        // Exact duplicates: same geometry and same interesting tags.
        let mut by_tags: BTreeMap<Hash, Vec<WayId>> = BTreeMap::new();
        for (way_id, tag_digest) in bucket {
            by_tags.entry(*tag_digest).or_default().push(*way_id);
        }
        for (tag_digest, ways) in &by_tags {
            if ways.len() < 2 {
                continue;
            }
            debug!(
                digest = %hex::encode(&digest[..8]),
                count = ways.len(),
                "exact duplicate ways"
            );
            groups.push(DuplicateGroup {
                severity: Severity::Error,
                members: ways.iter().map(|w| (*w).into()).collect(),
                digest: combine_digests(digest, tag_digest),
            });
        }
        // Same geometry under diverging interesting tags is only worth a
        // warning; identical-tag buckets are already errors above.
        if by_tags.len() > 1 {
            groups.push(DuplicateGroup {
                severity: Severity::Warning,
                members: bucket.iter().map(|(w, _)| (*w).into()).collect(),
                digest: *digest,
            });
        }
    }

    let mut relations: BTreeMap<Hash, Vec<RelationId>> = BTreeMap::new();
    for relation in graph.iter_relations() {
        if relation.data.deleted || relation.data.incomplete {
            continue;
        }
        relations
            .entry(relation_digest(relation, config))
            .or_default()
            .push(relation.id);
    }
    for (digest, bucket) in &relations {
        if bucket.len() < 2 {
            continue;
        }
        groups.push(DuplicateGroup {
            severity: Severity::Error,
            members: bucket.iter().map(|r| (*r).into()).collect(),
            digest: *digest,
        });
    }
    groups
}

/// Derives the safe auto-fix for one duplicate group.
///
/// The member with the lowest positive id survives (lowest id when none is
/// synchronized); relation references to the removed members are rewritten to
/// the survivor and the rest are deleted.
///
/// # Errors
/// - [`EditError::InvalidSelection`] for groups of fewer than two members or
///   members missing from the graph.
/// - [`EditError::AmbiguousFix`] when more than one member is referenced by a
///   relation; which survivor those relations should point at cannot be
///   decided automatically.
pub fn fix_duplicates(
    graph: &PrimitiveGraph,
    group: &DuplicateGroup,
) -> Result<Option<Command>, EditError> {
    if group.members.len() < 2 {
        return Err(EditError::InvalidSelection(
            "a duplicate group needs at least two members",
        ));
    }
    for id in &group.members {
        match graph.snapshot(*id) {
            None => {
                return Err(EditError::InvalidSelection(
                    "duplicate group references a primitive that is not in the graph",
                ))
            }
            Some(p) if p.data().deleted => {
                return Err(EditError::InvalidSelection(
                    "duplicate group contains a deleted primitive",
                ))
            }
            Some(_) => {}
        }
    }

    let referenced: Vec<PrimitiveId> = group
        .members
        .iter()
        .filter(|id| graph.relation_referrers(**id).next().is_some())
        .copied()
        .collect();
    if referenced.len() > 1 {
        return Err(EditError::AmbiguousFix(
            "more than one duplicate is referenced by a relation",
        ));
    }

    let survivor = group
        .members
        .iter()
        .filter(|id| !id.is_new())
        .min()
        .or_else(|| group.members.iter().min())
        .copied()
        .ok_or(EditError::InvalidSelection("empty duplicate group"))?;
    let removed: BTreeSet<PrimitiveId> = group
        .members
        .iter()
        .filter(|id| **id != survivor)
        .copied()
        .collect();

    let mut commands = Vec::new();
    let mut relations: BTreeSet<RelationId> = BTreeSet::new();
    for id in &removed {
        relations.extend(graph.relation_referrers(*id));
    }
    for relation_id in relations {
        let Some(relation) = graph.relation(relation_id) else {
            continue;
        };
        let members: Vec<Member> = relation
            .members
            .iter()
            .map(|m| {
                if removed.contains(&m.target) {
                    Member::new(m.role.clone(), survivor)
                } else {
                    m.clone()
                }
            })
            .collect();
        if members != relation.members {
            let mut changed = relation.clone();
            changed.members = members;
            commands.push(Command::change(graph, changed.into())?);
        }
    }
    commands.push(Command::delete(removed.clone()));
    Ok(Some(Command::sequence(
        format!("remove {} duplicates of {survivor}", removed.len()),
        commands,
    )))
}

/// The way's coordinate sequence in canonical rotation.
///
/// Closed ways drop the closing repeat and rotate to start at the lowest
/// node id. Returns `None` when any node lacks a coordinate.
fn canonical_coords(graph: &PrimitiveGraph, way: &Way) -> Option<Vec<crate::coord::LatLon>> {
    if way.is_closed() {
        let open = &way.nodes[..way.nodes.len() - 1];
        let pivot = open
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map(|(i, _)| i)?;
        open[pivot..]
            .iter()
            .chain(&open[..pivot])
            .map(|id| graph.node_coord(*id))
            .collect()
    } else {
        way.nodes.iter().map(|id| graph.node_coord(*id)).collect()
    }
}

/// The reverse traversal of a canonical sequence.
///
/// A ring keeps its rotation anchor in front; only the travel order behind
/// it flips. Open ways reverse outright.
fn reversed_coords(coords: &[crate::coord::LatLon], closed: bool) -> Vec<crate::coord::LatLon> {
    if closed {
        coords
            .first()
            .into_iter()
            .chain(coords[1..].iter().rev())
            .copied()
            .collect()
    } else {
        coords.iter().rev().copied().collect()
    }
}

fn coords_digest(coords: &[crate::coord::LatLon]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"ATLAS_DUP_GEOM_V1\0");
    hasher.update(&(coords.len() as u64).to_le_bytes());
    for coord in coords {
        hasher.update(&coord.to_bytes());
    }
    *hasher.finalize().as_bytes()
}

fn tags_digest(way: &Way, config: &DuplicateConfig) -> Hash {
    let mut bytes = Vec::new();
    way.data
        .tags
        .without_keys(&config.discardable_keys)
        .write_canonical_bytes(&mut bytes);
    let mut hasher = Hasher::new();
    hasher.update(b"ATLAS_DUP_TAGS_V1\0");
    hasher.update(&bytes);
    *hasher.finalize().as_bytes()
}

fn relation_digest(relation: &Relation, config: &DuplicateConfig) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"ATLAS_DUP_REL_V1\0");
    hasher.update(&(relation.members.len() as u64).to_le_bytes());
    for member in &relation.members {
        hasher.update(&[member.target.kind.code()]);
        hasher.update(&member.target.id.to_le_bytes());
        hasher.update(&(member.role.len() as u64).to_le_bytes());
        hasher.update(member.role.as_bytes());
    }
    let mut bytes = Vec::new();
    relation
        .data
        .tags
        .without_keys(&config.discardable_keys)
        .write_canonical_bytes(&mut bytes);
    hasher.update(&bytes);
    *hasher.finalize().as_bytes()
}

fn combine_digests(a: &Hash, b: &Hash) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(a);
    hasher.update(b);
    *hasher.finalize().as_bytes()
}
