// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory primitive graph: id-indexed arenas plus a back-reference index.
//!
//! The graph exclusively owns every primitive. All lookups go through typed
//! ids; the back-reference index answers "who references X" and is maintained
//! incrementally on every structural write so it always equals the forward
//! reference closure of the non-deleted primitives.
//!
//! Only commands write to the graph. Algorithms read it, build commands, and
//! hand them to the history; see [`crate::command`].

use std::collections::{BTreeMap, BTreeSet};

use blake3::Hasher;

use crate::coord::LatLon;
use crate::ident::{LocalIdAllocator, NodeId, PrimitiveId, PrimitiveKind, RelationId, WayId};
use crate::primitive::{Node, Primitive, Relation, Way};

/// Canonical 256-bit content hash.
pub type Hash = [u8; 32];

/// The primitive arena and its derived back-reference index.
///
/// Storage is `BTreeMap` throughout: every iteration a caller can observe is
/// in ascending id order, and two graphs with equal content hash equally.
///
/// The graph itself is not serializable; the serialization boundary reads
/// the primitive collections through the iterators and rebuilds a graph by
/// inserting.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveGraph {
    nodes: BTreeMap<NodeId, Node>,
    ways: BTreeMap<WayId, Way>,
    relations: BTreeMap<RelationId, Relation>,
    /// Derived index: target id to the set of non-deleted referrers.
    ///
    /// Never authoritative; buckets are dropped when they empty out, and the
    /// consistency check compares against a from-scratch rebuild.
    referrers: BTreeMap<PrimitiveId, BTreeSet<PrimitiveId>>,
    local_ids: LocalIdAllocator,
}

impl PrimitiveGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh local node id.
    pub fn allocate_node_id(&mut self) -> NodeId {
        NodeId(self.local_ids.allocate())
    }

    /// Allocates a fresh local way id.
    pub fn allocate_way_id(&mut self) -> WayId {
        WayId(self.local_ids.allocate())
    }

    /// Allocates a fresh local relation id.
    pub fn allocate_relation_id(&mut self) -> RelationId {
        RelationId(self.local_ids.allocate())
    }

    /// Lowest local id handed out or observed so far.
    ///
    /// Planners that must reserve ids without mutating the graph (dataset
    /// merge renumbering) count downward from here; the allocator observes
    /// the ids when the planned command finally inserts them.
    #[must_use]
    pub const fn local_id_watermark(&self) -> i64 {
        self.local_ids.watermark()
    }

    /// Returns `true` when a primitive with `id` is present (deleted or not).
    #[must_use]
    pub fn contains(&self, id: PrimitiveId) -> bool {
        match id.kind {
            PrimitiveKind::Node => self.nodes.contains_key(&NodeId(id.id)),
            PrimitiveKind::Way => self.ways.contains_key(&WayId(id.id)),
            PrimitiveKind::Relation => self.relations.contains_key(&RelationId(id.id)),
        }
    }

    /// Returns a shared reference to a node when it exists.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Returns a shared reference to a way when it exists.
    #[must_use]
    pub fn way(&self, id: WayId) -> Option<&Way> {
        self.ways.get(&id)
    }

    /// Returns a shared reference to a relation when it exists.
    #[must_use]
    pub fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(&id)
    }

    /// Returns an owned snapshot of the primitive with `id`.
    ///
    /// Change commands capture their pre-mutation state through this call.
    #[must_use]
    pub fn snapshot(&self, id: PrimitiveId) -> Option<Primitive> {
        match id.kind {
            PrimitiveKind::Node => self.nodes.get(&NodeId(id.id)).cloned().map(Primitive::Node),
            PrimitiveKind::Way => self.ways.get(&WayId(id.id)).cloned().map(Primitive::Way),
            PrimitiveKind::Relation => self
                .relations
                .get(&RelationId(id.id))
                .cloned()
                .map(Primitive::Relation),
        }
    }

    /// Convenience: the coordinate of a node, when present and complete.
    #[must_use]
    pub fn node_coord(&self, id: NodeId) -> Option<LatLon> {
        self.nodes.get(&id).and_then(|n| n.coord)
    }

    /// Iterate over all nodes in ascending id order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterate over all ways in ascending id order.
    pub fn iter_ways(&self) -> impl Iterator<Item = &Way> {
        self.ways.values()
    }

    /// Iterate over all relations in ascending id order.
    pub fn iter_relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Number of nodes (including deleted ones).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of ways (including deleted ones).
    #[must_use]
    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    /// Number of relations (including deleted ones).
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// All non-deleted ways and relations directly referencing `id`, in
    /// ascending id order.
    pub fn referrers(&self, id: PrimitiveId) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.referrers.get(&id).into_iter().flatten().copied()
    }

    /// The relations among the referrers of `id`.
    pub fn relation_referrers(&self, id: PrimitiveId) -> impl Iterator<Item = RelationId> + '_ {
        self.referrers(id).filter_map(PrimitiveId::as_relation)
    }

    /// Inserts a primitive.
    ///
    /// The id must not be present yet; commands establish that before they
    /// are constructed, so a collision here is a programming error.
    pub fn insert(&mut self, primitive: Primitive) {
        let id = primitive.id();
        debug_assert!(!self.contains(id), "insert would overwrite {id}");
        self.local_ids.observe(id.id);
        if !primitive.data().deleted {
            self.index_references(id, &primitive, true);
        }
        self.store(primitive);
    }

    /// Replaces the full snapshot of an existing primitive, returning the
    /// previous snapshot.
    ///
    /// Returns `None` (and changes nothing) when no primitive with that id
    /// exists; commands never construct a replace for a missing target.
    pub fn replace(&mut self, primitive: Primitive) -> Option<Primitive> {
        let id = primitive.id();
        let old = self.snapshot(id)?;
        if !old.data().deleted {
            self.index_references(id, &old, false);
        }
        if !primitive.data().deleted {
            self.index_references(id, &primitive, true);
        }
        self.store(primitive);
        Some(old)
    }

    /// Physically removes a primitive, returning its final snapshot.
    ///
    /// Only the undo of an add command does this; flag-deletion is
    /// [`Self::set_deleted`].
    pub fn remove(&mut self, id: PrimitiveId) -> Option<Primitive> {
        let old = self.snapshot(id)?;
        if !old.data().deleted {
            self.index_references(id, &old, false);
        }
        match id.kind {
            PrimitiveKind::Node => {
                self.nodes.remove(&NodeId(id.id));
            }
            PrimitiveKind::Way => {
                self.ways.remove(&WayId(id.id));
            }
            PrimitiveKind::Relation => {
                self.relations.remove(&RelationId(id.id));
            }
        }
        Some(old)
    }

    /// Sets or clears the deleted flag on every primitive in `targets`.
    ///
    /// Deleted primitives drop out of the back-reference index; undeleting
    /// re-registers their forward references.
    pub fn set_deleted(&mut self, targets: &BTreeSet<PrimitiveId>, deleted: bool) {
        for id in targets {
            let Some(mut snapshot) = self.snapshot(*id) else {
                debug_assert!(false, "set_deleted on missing primitive {id}");
                continue;
            };
            if snapshot.data().deleted == deleted {
                debug_assert!(false, "set_deleted is not a toggle: {id} already {deleted}");
                continue;
            }
            if deleted {
                self.index_references(*id, &snapshot, false);
            } else {
                self.index_references(*id, &snapshot, true);
            }
            snapshot.data_mut().deleted = deleted;
            self.store(snapshot);
        }
    }

    fn store(&mut self, primitive: Primitive) {
        match primitive {
            Primitive::Node(n) => {
                self.nodes.insert(n.id, n);
            }
            Primitive::Way(w) => {
                self.ways.insert(w.id, w);
            }
            Primitive::Relation(r) => {
                self.relations.insert(r.id, r);
            }
        }
    }

    fn index_references(&mut self, referrer: PrimitiveId, primitive: &Primitive, add: bool) {
        for target in primitive.references() {
            if add {
                self.referrers.entry(target).or_default().insert(referrer);
            } else if let Some(bucket) = self.referrers.get_mut(&target) {
                bucket.remove(&referrer);
                if bucket.is_empty() {
                    self.referrers.remove(&target);
                }
            }
        }
    }

    /// Computes a canonical hash of the entire graph state.
    ///
    /// The traversal is strictly deterministic: a fixed header, then per kind
    /// a u64 LE count followed by every primitive's canonical bytes in
    /// ascending id order. Atomicity tests compare this digest before and
    /// after a declined operation.
    #[must_use]
    pub fn canonical_hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(b"ATLAS_GRAPH_V1\0");
        let mut buf = Vec::new();

        hasher.update(&(self.nodes.len() as u64).to_le_bytes());
        for node in self.nodes.values() {
            buf.clear();
            write_node_bytes(node, &mut buf);
            hasher.update(&buf);
        }
        hasher.update(&(self.ways.len() as u64).to_le_bytes());
        for way in self.ways.values() {
            buf.clear();
            write_way_bytes(way, &mut buf);
            hasher.update(&buf);
        }
        hasher.update(&(self.relations.len() as u64).to_le_bytes());
        for relation in self.relations.values() {
            buf.clear();
            write_relation_bytes(relation, &mut buf);
            hasher.update(&buf);
        }
        *hasher.finalize().as_bytes()
    }

    /// Lists every referential-integrity violation in the current state.
    ///
    /// Empty after every correctly applied command. A non-empty result is a
    /// programming error in a command or algorithm, not a user-recoverable
    /// condition; [`Self::assert_consistent`] turns it into a debug
    /// assertion.
    #[must_use]
    pub fn consistency_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for way in self.ways.values() {
            if way.data.deleted || way.data.incomplete {
                continue;
            }
            if !way.nodes.is_empty() && way.distinct_node_count() < 2 {
                violations.push(format!("{} has fewer than 2 distinct nodes", way.id));
            }
            for node_id in &way.nodes {
                match self.nodes.get(node_id) {
                    None => violations.push(format!("{} references missing {node_id}", way.id)),
                    Some(n) if n.data.deleted => {
                        violations.push(format!("{} references deleted {node_id}", way.id));
                    }
                    Some(_) => {}
                }
            }
        }
        for relation in self.relations.values() {
            if relation.data.deleted || relation.data.incomplete {
                continue;
            }
            for member in &relation.members {
                match self.snapshot(member.target) {
                    None => violations.push(format!(
                        "{} references missing {}",
                        relation.id, member.target
                    )),
                    Some(p) if p.data().deleted => violations.push(format!(
                        "{} references deleted {}",
                        relation.id, member.target
                    )),
                    Some(_) => {}
                }
            }
        }
        self.check_index(&mut violations);
        violations
    }

    /// Debug-asserts that the graph is internally consistent.
    pub fn assert_consistent(&self) {
        if cfg!(debug_assertions) {
            let violations = self.consistency_violations();
            debug_assert!(
                violations.is_empty(),
                "graph consistency violated: {violations:?}"
            );
        }
    }

    /// Compares the incremental back-reference index against a from-scratch
    /// rebuild. Any difference is index-maintenance desync.
    fn check_index(&self, violations: &mut Vec<String>) {
        let mut rebuilt: BTreeMap<PrimitiveId, BTreeSet<PrimitiveId>> = BTreeMap::new();
        for way in self.ways.values() {
            if way.data.deleted {
                continue;
            }
            for node_id in &way.nodes {
                rebuilt
                    .entry((*node_id).into())
                    .or_default()
                    .insert(way.id.into());
            }
        }
        for relation in self.relations.values() {
            if relation.data.deleted {
                continue;
            }
            for member in &relation.members {
                rebuilt
                    .entry(member.target)
                    .or_default()
                    .insert(relation.id.into());
            }
        }
        if rebuilt != self.referrers {
            violations.push("back-reference index desynced from forward references".to_owned());
        }
    }
}

fn write_common_bytes(id: i64, data: &crate::primitive::PrimitiveData, out: &mut Vec<u8>) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&data.version.to_le_bytes());
    let flags = u8::from(data.deleted) | (u8::from(data.incomplete) << 1);
    out.push(flags);
    data.tags.write_canonical_bytes(out);
}

fn write_node_bytes(node: &Node, out: &mut Vec<u8>) {
    out.extend_from_slice(b"N\0");
    write_common_bytes(node.id.value(), &node.data, out);
    match node.coord {
        Some(coord) => {
            out.push(1);
            out.extend_from_slice(&coord.to_bytes());
        }
        None => out.push(0),
    }
}

fn write_way_bytes(way: &Way, out: &mut Vec<u8>) {
    out.extend_from_slice(b"W\0");
    write_common_bytes(way.id.value(), &way.data, out);
    out.extend_from_slice(&(way.nodes.len() as u64).to_le_bytes());
    for node_id in &way.nodes {
        out.extend_from_slice(&node_id.value().to_le_bytes());
    }
}

fn write_relation_bytes(relation: &Relation, out: &mut Vec<u8>) {
    out.extend_from_slice(b"R\0");
    write_common_bytes(relation.id.value(), &relation.data, out);
    out.extend_from_slice(&(relation.members.len() as u64).to_le_bytes());
    for member in &relation.members {
        out.push(member.target.kind.code());
        out.extend_from_slice(&member.target.id.to_le_bytes());
        out.extend_from_slice(&(member.role.len() as u64).to_le_bytes());
        out.extend_from_slice(member.role.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Member;

    fn coord(lat: i64, lon: i64) -> LatLon {
        LatLon::from_nanos(lat, lon).unwrap()
    }

    fn small_graph() -> PrimitiveGraph {
        let mut graph = PrimitiveGraph::new();
        graph.insert(Node::new(NodeId(1), coord(10, 10)).into());
        graph.insert(Node::new(NodeId(2), coord(20, 20)).into());
        graph.insert(Node::new(NodeId(3), coord(30, 30)).into());
        graph.insert(Way::new(WayId(1), vec![NodeId(1), NodeId(2), NodeId(3)]).into());
        graph.insert(
            Relation::new(RelationId(1), vec![Member::new("via", WayId(1))]).into(),
        );
        graph
    }

    #[test]
    fn referrers_track_inserts_and_replaces() {
        let mut graph = small_graph();
        let way_id: PrimitiveId = WayId(1).into();
        assert_eq!(
            graph.referrers(NodeId(2).into()).collect::<Vec<_>>(),
            vec![way_id]
        );

        let mut shorter = graph.way(WayId(1)).unwrap().clone();
        shorter.nodes = vec![NodeId(1), NodeId(3)];
        graph.replace(shorter.into());
        assert_eq!(graph.referrers(NodeId(2).into()).count(), 0);
        assert!(graph.consistency_violations().is_empty());
    }

    #[test]
    fn deleted_primitives_drop_out_of_the_index() {
        let mut graph = small_graph();
        let targets: BTreeSet<PrimitiveId> = [RelationId(1).into()].into_iter().collect();
        graph.set_deleted(&targets, true);
        assert_eq!(graph.referrers(WayId(1).into()).count(), 0);
        graph.set_deleted(&targets, false);
        assert_eq!(graph.referrers(WayId(1).into()).count(), 1);
        assert!(graph.consistency_violations().is_empty());
    }

    #[test]
    fn canonical_hash_is_content_addressed() {
        let a = small_graph();
        let b = small_graph();
        assert_eq!(a.canonical_hash(), b.canonical_hash());

        let mut c = small_graph();
        let mut node = c.node(NodeId(1)).unwrap().clone();
        node.data.tags.insert("name", "start");
        c.replace(node.into());
        assert_ne!(a.canonical_hash(), c.canonical_hash());
    }

    #[test]
    fn violations_surface_dangling_way_nodes() {
        let mut graph = small_graph();
        let mut way = graph.way(WayId(1)).unwrap().clone();
        way.nodes.push(NodeId(99));
        graph.replace(way.into());
        let violations = graph.consistency_violations();
        assert!(violations.iter().any(|v| v.contains("missing n99")));
    }
}
