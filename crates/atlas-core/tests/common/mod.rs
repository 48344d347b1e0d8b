// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::cell::RefCell;

use atlas_core::{
    Confirm, LatLon, Member, MemberConflictModel, MergeArbiter, Node, NodeId, PrimitiveGraph,
    Relation, RelationId, TagDecision, TagMergeModel, Tags, Way, WayId,
};

/// Coordinate helper on a small integer grid.
pub fn coord(lat: i64, lon: i64) -> LatLon {
    LatLon::from_nanos(lat, lon).expect("grid coordinate in range")
}

/// A complete node at a grid coordinate.
pub fn node(id: i64, lat: i64, lon: i64) -> Node {
    Node::new(NodeId(id), coord(lat, lon))
}

/// A node carrying tags.
pub fn tagged_node(id: i64, lat: i64, lon: i64, tags: &[(&str, &str)]) -> Node {
    let mut n = node(id, lat, lon);
    n.data.tags = tags.iter().copied().collect::<Tags>();
    n
}

/// A way over the given node ids.
pub fn way(id: i64, nodes: &[i64]) -> Way {
    Way::new(WayId(id), nodes.iter().map(|n| NodeId(*n)).collect())
}

/// A way carrying tags.
pub fn tagged_way(id: i64, nodes: &[i64], tags: &[(&str, &str)]) -> Way {
    let mut w = way(id, nodes);
    w.data.tags = tags.iter().copied().collect::<Tags>();
    w
}

/// A relation over `(role, node id)` members.
pub fn node_relation(id: i64, members: &[(&str, i64)]) -> Relation {
    Relation::new(
        RelationId(id),
        members
            .iter()
            .map(|(role, n)| Member::new(*role, NodeId(*n)))
            .collect(),
    )
}

/// A relation over `(role, way id)` members.
pub fn way_relation(id: i64, members: &[(&str, i64)]) -> Relation {
    Relation::new(
        RelationId(id),
        members
            .iter()
            .map(|(role, w)| Member::new(*role, WayId(*w)))
            .collect(),
    )
}

/// A graph with `count` nodes on the diagonal and one way through them.
pub fn line_graph(count: i64) -> PrimitiveGraph {
    let mut graph = PrimitiveGraph::new();
    for id in 1..=count {
        graph.insert(node(id, id * 100, id * 100).into());
    }
    graph.insert(way(1, &(1..=count).collect::<Vec<_>>()).into());
    graph
}

/// Confirmation collaborator that records every prompt and answers from a
/// script (missing entries default to yes).
#[derive(Debug, Default)]
pub struct RecordingConfirm {
    pub prompts: RefCell<Vec<String>>,
    pub answers: RefCell<Vec<bool>>,
}

impl RecordingConfirm {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            prompts: RefCell::new(Vec::new()),
            answers: RefCell::new(answers.to_vec()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Confirm for RecordingConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_owned());
        let mut answers = self.answers.borrow_mut();
        if answers.is_empty() {
            true
        } else {
            answers.remove(0)
        }
    }
}

/// Arbiter that resolves every tag conflict to a fixed value and keeps every
/// membership slot.
#[derive(Debug)]
pub struct KeepValueArbiter {
    pub value: String,
}

impl KeepValueArbiter {
    pub fn keeping(value: &str) -> Self {
        Self {
            value: value.to_owned(),
        }
    }
}

impl MergeArbiter for KeepValueArbiter {
    fn arbitrate_tags(&self, model: &mut TagMergeModel) -> bool {
        let keys: Vec<String> = model.conflicts().iter().map(|c| c.key.clone()).collect();
        for key in keys {
            model.decide(&key, TagDecision::Keep(self.value.clone()));
        }
        true
    }

    fn arbitrate_members(&self, model: &mut MemberConflictModel) -> bool {
        for entry in model.entries_mut() {
            entry.decision = atlas_core::MemberDecision::Keep;
        }
        true
    }
}
