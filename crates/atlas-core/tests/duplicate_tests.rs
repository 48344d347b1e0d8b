// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use atlas_core::{
    find_duplicates, fix_duplicates, DuplicateConfig, EditContext, EditError, PrimitiveGraph,
    RelationId, Severity, WayId,
};

mod common;
use common::{node, tagged_way, way, way_relation};

/// Two parallel node chains on the same coordinates.
fn twin_chain_graph() -> PrimitiveGraph {
    let mut graph = PrimitiveGraph::new();
    for id in 1..=3 {
        graph.insert(node(id, id * 100, id * 100).into());
        graph.insert(node(id + 10, id * 100, id * 100).into());
    }
    graph
}

#[test]
fn reversed_twin_lands_in_one_bucket_only() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("highway", "path")]).into());
    // Same coordinates, opposite travel order, same tags.
    graph.insert(tagged_way(2, &[13, 12, 11], &[("highway", "path")]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].severity, Severity::Error);
    assert_eq!(groups[0].members, vec![WayId(1).into(), WayId(2).into()]);
}

#[test]
fn directional_tags_keep_orientations_apart() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("oneway", "yes")]).into());
    graph.insert(tagged_way(2, &[13, 12, 11], &[("oneway", "yes")]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert!(groups.is_empty());
}

#[test]
fn scans_are_idempotent() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("highway", "path")]).into());
    graph.insert(tagged_way(2, &[11, 12, 13], &[("highway", "path")]).into());
    graph.insert(tagged_way(3, &[1, 2], &[("name", "spur")]).into());

    let config = DuplicateConfig::default();
    let first = find_duplicates(&graph, &config);
    let second = find_duplicates(&graph, &config);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn discardable_keys_do_not_block_exact_duplicates() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("name", "A"), ("created_by", "tool-x")]).into());
    graph.insert(tagged_way(2, &[11, 12, 13], &[("name", "A")]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].severity, Severity::Error);
}

#[test]
fn interesting_tag_differences_downgrade_to_a_warning() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("name", "A")]).into());
    graph.insert(tagged_way(2, &[11, 12, 13], &[("name", "B")]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].severity, Severity::Warning);
    assert_eq!(groups[0].members.len(), 2);
}

#[test]
fn rotated_rings_are_exact_duplicates() {
    let mut graph = PrimitiveGraph::new();
    for id in 1..=4 {
        graph.insert(node(id, id * 100, (5 - id) * 100).into());
        graph.insert(node(id + 10, id * 100, (5 - id) * 100).into());
    }
    graph.insert(way(1, &[1, 2, 3, 4, 1]).into());
    graph.insert(way(2, &[13, 14, 11, 12, 13]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].severity, Severity::Error);
}

#[test]
fn identical_relations_are_detected() {
    let mut graph = twin_chain_graph();
    graph.insert(way(1, &[1, 2, 3]).into());
    graph.insert(way_relation(1, &[("route", 1)]).into());
    graph.insert(way_relation(2, &[("route", 1)]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].members,
        vec![RelationId(1).into(), RelationId(2).into()]
    );
}

#[test]
fn fix_keeps_the_lowest_positive_id_and_rewrites_relations() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(4, &[1, 2, 3], &[("highway", "path")]).into());
    graph.insert(tagged_way(2, &[11, 12, 13], &[("highway", "path")]).into());
    graph.insert(way_relation(1, &[("route", 4)]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    assert_eq!(groups.len(), 1);
    let command = fix_duplicates(&graph, &groups[0]).unwrap().unwrap();

    let mut ctx = EditContext::with_graph(graph);
    ctx.apply(command);
    assert!(!ctx.graph.way(WayId(2)).unwrap().data.deleted);
    assert!(ctx.graph.way(WayId(4)).unwrap().data.deleted);
    let relation = ctx.graph.relation(RelationId(1)).unwrap();
    assert_eq!(relation.members[0].target, WayId(2).into());
    assert!(ctx.graph.consistency_violations().is_empty());
}

#[test]
fn two_referenced_duplicates_are_not_automatically_fixable() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("highway", "path")]).into());
    graph.insert(tagged_way(2, &[11, 12, 13], &[("highway", "path")]).into());
    graph.insert(way_relation(1, &[("route", 1)]).into());
    graph.insert(way_relation(2, &[("route", 2)]).into());

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    let way_group = groups
        .iter()
        .find(|g| g.members.contains(&WayId(1).into()))
        .unwrap();
    let result = fix_duplicates(&graph, way_group);
    assert!(matches!(result, Err(EditError::AmbiguousFix(_))));
}

#[test]
fn fix_round_trips_through_undo() {
    let mut graph = twin_chain_graph();
    graph.insert(tagged_way(1, &[1, 2, 3], &[("highway", "path")]).into());
    graph.insert(tagged_way(2, &[11, 12, 13], &[("highway", "path")]).into());
    let before = graph.canonical_hash();

    let groups = find_duplicates(&graph, &DuplicateConfig::default());
    let command = fix_duplicates(&graph, &groups[0]).unwrap().unwrap();
    let mut ctx = EditContext::with_graph(graph);
    ctx.apply(command);
    assert!(ctx.graph.way(WayId(2)).unwrap().data.deleted);

    assert!(ctx.undo());
    assert_eq!(ctx.graph.canonical_hash(), before);
}
