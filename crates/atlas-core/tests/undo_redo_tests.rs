// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use proptest::prelude::*;
use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};

use atlas_core::{Command, EditContext, LatLon, Node, NodeId, PrimitiveGraph, Way, WayId};

mod common;
use common::{node, way};

/// A tiny command script generated from integers: each step either adds a
/// node, retags an existing node, or flag-deletes one.
#[derive(Debug, Clone)]
enum Step {
    AddNode { lat: i64, lon: i64 },
    Retag { slot: usize, value: u32 },
    DeleteNode { slot: usize },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0i64..1000, 0i64..1000).prop_map(|(lat, lon)| Step::AddNode { lat, lon }),
        (0usize..8, any::<u32>()).prop_map(|(slot, value)| Step::Retag { slot, value }),
        (0usize..8).prop_map(|slot| Step::DeleteNode { slot }),
    ]
}

/// Turns a step into a command against the current graph, skipping steps that
/// would violate a planner precondition (retagging a deleted node, deleting
/// twice).
fn plan(graph: &mut PrimitiveGraph, step: &Step) -> Option<Command> {
    match step {
        Step::AddNode { lat, lon } => {
            let id = graph.allocate_node_id();
            let coord = LatLon::from_nanos(*lat, *lon)?;
            Some(Command::add(Node::new(id, coord).into()))
        }
        Step::Retag { slot, value } => {
            let node = graph
                .iter_nodes()
                .filter(|n| !n.data.deleted)
                .nth(*slot)?
                .clone();
            let mut changed = node;
            changed.data.tags.insert("ref", value.to_string());
            Command::change(graph, changed.into()).ok()
        }
        Step::DeleteNode { slot } => {
            let candidates: Vec<NodeId> = graph
                .iter_nodes()
                .filter(|n| !n.data.deleted)
                .filter(|n| graph.referrers(n.id.into()).next().is_none())
                .map(|n| n.id)
                .collect();
            if candidates.is_empty() {
                return None;
            }
            let id = candidates[slot % candidates.len()];
            Some(Command::delete([id.into()].into_iter().collect()))
        }
    }
}

#[test]
fn random_scripts_round_trip_through_full_undo_and_redo() {
    const SEED_BYTES: [u8; 32] = [
        0x5a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0,
    ];
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);

    let scripts = prop::collection::vec(step_strategy(), 1..24);
    runner
        .run(&scripts, |steps| {
            let mut ctx = EditContext::new();
            ctx.graph.insert(node(1, 100, 100).into());
            ctx.graph.insert(node(2, 200, 200).into());
            ctx.graph.insert(way(1, &[1, 2]).into());
            let initial = ctx.graph.canonical_hash();

            let mut checkpoints = Vec::new();
            for step in &steps {
                let Some(command) = plan(&mut ctx.graph, step) else {
                    continue;
                };
                ctx.apply(command);
                prop_assert!(ctx.graph.consistency_violations().is_empty());
                checkpoints.push(ctx.graph.canonical_hash());
            }
            let final_hash = ctx.graph.canonical_hash();

            // Unwind completely, then replay completely.
            while ctx.undo() {}
            prop_assert_eq!(ctx.graph.canonical_hash(), initial);
            while ctx.redo() {}
            prop_assert_eq!(ctx.graph.canonical_hash(), final_hash);

            // Every intermediate state is reachable again by stepwise undo.
            for expected in checkpoints.iter().rev() {
                prop_assert_eq!(&ctx.graph.canonical_hash(), expected);
                ctx.undo();
            }
            Ok(())
        })
        .expect("undo/redo property should hold");
}

#[test]
fn apply_undo_apply_equals_single_apply() {
    let mut graph = PrimitiveGraph::new();
    graph.insert(node(1, 100, 100).into());
    graph.insert(node(2, 200, 200).into());
    graph.insert(node(3, 300, 300).into());

    let add = Command::add(Way::new(WayId(-1), vec![NodeId(1), NodeId(2), NodeId(3)]).into());
    let mut reference = graph.clone();
    add.execute(&mut reference);

    add.execute(&mut graph);
    add.undo(&mut graph);
    add.execute(&mut graph);
    assert_eq!(graph.canonical_hash(), reference.canonical_hash());
}

#[test]
fn interleaved_history_stays_consistent() {
    let mut ctx = EditContext::new();
    ctx.apply(Command::add(node(-1, 100, 100).into()));
    ctx.apply(Command::add(node(-2, 200, 200).into()));
    ctx.apply(Command::add(
        Way::new(WayId(-3), vec![NodeId(-1), NodeId(-2)]).into(),
    ));
    assert!(ctx.undo());
    assert!(ctx.redo());
    assert!(ctx.undo());
    assert!(ctx.undo());
    assert!(ctx.graph.node(NodeId(-2)).is_none());
    assert!(ctx.graph.node(NodeId(-1)).is_some());
    assert!(ctx.graph.consistency_violations().is_empty());
}
