// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Primitive identity types.
//!
//! Every primitive is addressed by `(kind, numeric id)`. Positive ids are
//! assigned by the remote authority; ids at or below zero belong to
//! locally-created primitives that have never been synchronized. Zero is
//! reserved as invalid and never allocated.

/// The three primitive kinds stored in a [`crate::PrimitiveGraph`].
///
/// Ordering is significant: nodes sort before ways, ways before relations.
/// Walks that must see references before referrers (dataset merge, canonical
/// hashing) rely on this order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    /// A point with a coordinate.
    Node,
    /// An ordered polyline of node references.
    Way,
    /// An ordered group of (role, primitive) members.
    Relation,
}

impl PrimitiveKind {
    /// One-letter prefix used when rendering ids (`n`, `w`, `r`).
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    /// Stable one-byte discriminator for canonical byte streams.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Node => b'n',
            Self::Way => b'w',
            Self::Relation => b'r',
        }
    }
}

/// Strongly typed identifier for a node.
///
/// A dedicated wrapper prevents accidental mixing of node, way, and relation
/// identifiers in node lists and member targets.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub i64);

/// Strongly typed identifier for a way.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WayId(pub i64);

/// Strongly typed identifier for a relation.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelationId(pub i64);

macro_rules! impl_typed_id {
    ($ty:ident, $kind:expr) => {
        impl $ty {
            /// Returns the raw numeric id.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }

            /// Returns `true` when this id was allocated locally and has
            /// never been assigned by the remote authority.
            #[must_use]
            pub const fn is_new(self) -> bool {
                self.0 <= 0
            }

            /// Widens this id into a kind-tagged [`PrimitiveId`].
            #[must_use]
            pub const fn as_primitive(self) -> PrimitiveId {
                PrimitiveId {
                    kind: $kind,
                    id: self.0,
                }
            }
        }

        impl From<$ty> for PrimitiveId {
            fn from(id: $ty) -> Self {
                id.as_primitive()
            }
        }

        impl core::fmt::Display for $ty {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}{}", $kind.letter(), self.0)
            }
        }
    };
}

impl_typed_id!(NodeId, PrimitiveKind::Node);
impl_typed_id!(WayId, PrimitiveKind::Way);
impl_typed_id!(RelationId, PrimitiveKind::Relation);

/// Kind-tagged primitive identity.
///
/// This is the key type of the graph arena and of the back-reference index.
/// Ordering is `(kind, id)`, so mixed-kind sets iterate nodes, then ways,
/// then relations, each in ascending id order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimitiveId {
    /// Primitive kind discriminator.
    pub kind: PrimitiveKind,
    /// Raw numeric id (positive once synchronized, non-positive while local).
    pub id: i64,
}

impl PrimitiveId {
    /// Returns `true` when this id was allocated locally.
    #[must_use]
    pub const fn is_new(self) -> bool {
        self.id <= 0
    }

    /// Narrows to a [`NodeId`] when the kind matches.
    #[must_use]
    pub const fn as_node(self) -> Option<NodeId> {
        match self.kind {
            PrimitiveKind::Node => Some(NodeId(self.id)),
            _ => None,
        }
    }

    /// Narrows to a [`WayId`] when the kind matches.
    #[must_use]
    pub const fn as_way(self) -> Option<WayId> {
        match self.kind {
            PrimitiveKind::Way => Some(WayId(self.id)),
            _ => None,
        }
    }

    /// Narrows to a [`RelationId`] when the kind matches.
    #[must_use]
    pub const fn as_relation(self) -> Option<RelationId> {
        match self.kind {
            PrimitiveKind::Relation => Some(RelationId(self.id)),
            _ => None,
        }
    }
}

impl core::fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.id)
    }
}

/// Allocator for local (non-positive) ids.
///
/// Ids count downward from `-1`. Zero is reserved as invalid. The allocator
/// also observes ids inserted from outside (dataset merge renumbering) so a
/// later allocation never collides with an id it has already seen.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalIdAllocator {
    lowest: i64,
}

impl LocalIdAllocator {
    /// Creates an allocator that starts handing out `-1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused local id.
    pub fn allocate(&mut self) -> i64 {
        self.lowest -= 1;
        self.lowest
    }

    /// Records an externally chosen local id so it is never handed out again.
    ///
    /// Positive ids are ignored; they live in a disjoint range.
    pub fn observe(&mut self, id: i64) {
        if id <= 0 {
            self.lowest = self.lowest.min(id);
        }
    }

    /// Lowest id observed or allocated so far (0 when untouched).
    #[must_use]
    pub const fn watermark(&self) -> i64 {
        self.lowest
    }
}
