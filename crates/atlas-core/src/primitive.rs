// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Primitive record types: nodes, ways, relations.
//!
//! Records are plain data. References between primitives are typed id values
//! resolved against the owning [`crate::PrimitiveGraph`], never pointers, so
//! a stale reference is a detectable failed lookup instead of a dangling
//! pointer.

use crate::coord::LatLon;
use crate::ident::{NodeId, PrimitiveId, PrimitiveKind, RelationId, WayId};
use crate::tags::Tags;

/// Attributes shared by every primitive kind.
///
/// Invariants
/// - `version` is the remote authority's version counter; local edits leave
///   it untouched. It only moves when a dataset merge adopts a newer remote
///   snapshot.
/// - `deleted` primitives stay in the graph so undo can resurrect them with
///   identical identity.
/// - `incomplete` marks a primitive that is referenced but not locally
///   loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimitiveData {
    /// Remote version counter (0 for never-synchronized primitives).
    pub version: u32,
    /// Flag-delete marker; flagged primitives are invisible to algorithms.
    pub deleted: bool,
    /// Referenced but not locally loaded.
    pub incomplete: bool,
    /// Tag map.
    pub tags: Tags,
}

/// A point primitive.
///
/// Invariant: `coord` is `None` iff the node is incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Identity of this node.
    pub id: NodeId,
    /// Shared primitive attributes.
    pub data: PrimitiveData,
    /// Coordinate; absent only for incomplete nodes.
    pub coord: Option<LatLon>,
}

impl Node {
    /// Creates a complete node at `coord` with empty tags.
    #[must_use]
    pub fn new(id: NodeId, coord: LatLon) -> Self {
        Self {
            id,
            data: PrimitiveData::default(),
            coord: Some(coord),
        }
    }
}

/// A polyline primitive: an ordered sequence of node references.
///
/// Invariants
/// - A non-deleted, non-incomplete way has either zero nodes (still under
///   construction) or at least 2 distinct node references.
/// - The way does not own its nodes; entries are back-references resolved
///   through the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Way {
    /// Identity of this way.
    pub id: WayId,
    /// Shared primitive attributes.
    pub data: PrimitiveData,
    /// Ordered node references.
    pub nodes: Vec<NodeId>,
}

impl Way {
    /// Creates a way over `nodes` with empty tags.
    #[must_use]
    pub fn new(id: WayId, nodes: Vec<NodeId>) -> Self {
        Self {
            id,
            data: PrimitiveData::default(),
            nodes,
        }
    }

    /// Number of distinct node references.
    #[must_use]
    pub fn distinct_node_count(&self) -> usize {
        let mut seen: Vec<NodeId> = self.nodes.clone();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Returns `true` when the way is explicitly closed (first node equals
    /// last node and the way has at least 3 entries).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.nodes.len() >= 3 && self.nodes.first() == self.nodes.last()
    }
}

/// One member slot of a relation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    /// Role string (may be empty).
    pub role: String,
    /// Referenced primitive of any kind, including another relation.
    pub target: PrimitiveId,
}

impl Member {
    /// Creates a member with `role` referencing `target`.
    #[must_use]
    pub fn new(role: impl Into<String>, target: impl Into<PrimitiveId>) -> Self {
        Self {
            role: role.into(),
            target: target.into(),
        }
    }
}

/// A relation primitive: an ordered sequence of role-tagged members.
///
/// Invariant: a member whose target is absent from the graph marks the
/// relation incomplete; a complete, non-deleted relation resolves every
/// member.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    /// Identity of this relation.
    pub id: RelationId,
    /// Shared primitive attributes.
    pub data: PrimitiveData,
    /// Ordered members.
    pub members: Vec<Member>,
}

impl Relation {
    /// Creates a relation over `members` with empty tags.
    #[must_use]
    pub fn new(id: RelationId, members: Vec<Member>) -> Self {
        Self {
            id,
            data: PrimitiveData::default(),
            members,
        }
    }
}

/// A full primitive snapshot.
///
/// This is the unit of mutation: change commands carry a complete before and
/// after snapshot and swap them into the graph wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Primitive {
    /// Node snapshot.
    Node(Node),
    /// Way snapshot.
    Way(Way),
    /// Relation snapshot.
    Relation(Relation),
}

impl Primitive {
    /// Identity of the snapshotted primitive.
    #[must_use]
    pub fn id(&self) -> PrimitiveId {
        match self {
            Self::Node(n) => n.id.into(),
            Self::Way(w) => w.id.into(),
            Self::Relation(r) => r.id.into(),
        }
    }

    /// Kind discriminator.
    #[must_use]
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Node(_) => PrimitiveKind::Node,
            Self::Way(_) => PrimitiveKind::Way,
            Self::Relation(_) => PrimitiveKind::Relation,
        }
    }

    /// Shared attributes.
    #[must_use]
    pub fn data(&self) -> &PrimitiveData {
        match self {
            Self::Node(n) => &n.data,
            Self::Way(w) => &w.data,
            Self::Relation(r) => &r.data,
        }
    }

    /// Shared attributes, mutable.
    pub fn data_mut(&mut self) -> &mut PrimitiveData {
        match self {
            Self::Node(n) => &mut n.data,
            Self::Way(w) => &mut w.data,
            Self::Relation(r) => &mut r.data,
        }
    }

    /// Every primitive this snapshot references, in list order.
    ///
    /// Nodes reference nothing; ways reference their nodes; relations
    /// reference their member targets.
    #[must_use]
    pub fn references(&self) -> Vec<PrimitiveId> {
        match self {
            Self::Node(_) => Vec::new(),
            Self::Way(w) => w.nodes.iter().map(|n| (*n).into()).collect(),
            Self::Relation(r) => r.members.iter().map(|m| m.target).collect(),
        }
    }
}

impl From<Node> for Primitive {
    fn from(n: Node) -> Self {
        Self::Node(n)
    }
}

impl From<Way> for Primitive {
    fn from(w: Way) -> Self {
        Self::Way(w)
    }
}

impl From<Relation> for Primitive {
    fn from(r: Relation) -> Self {
        Self::Relation(r)
    }
}
