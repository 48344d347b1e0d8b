// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Conflict decision models.
//!
//! A conflict model tracks one decision per conflicting field and knows
//! whether every decision has been made. Planners populate a model, apply
//! default decisions where the outcome is forced, hand the rest to a
//! [`crate::interact::MergeArbiter`], and only build commands once the model
//! is completely resolved.

use std::collections::BTreeSet;

use crate::command::Command;
use crate::error::EditError;
use crate::graph::PrimitiveGraph;
use crate::ident::{PrimitiveId, RelationId};
use crate::primitive::Member;
use crate::tags::Tags;

/// Decision state for a whole-primitive conflict in a dataset merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MergeChoice {
    /// No decision yet.
    Undecided,
    /// Keep the local snapshot.
    KeepMine,
    /// Adopt the foreign snapshot.
    KeepTheirs,
}

/// Decision state for one relation-membership slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberDecision {
    /// No decision yet.
    Undecided,
    /// Keep the slot, rewritten to the merge target.
    Keep,
    /// Drop the slot.
    Remove,
}

/// Decision state for one conflicting tag key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagDecision {
    /// No decision yet.
    Undecided,
    /// Keep this value for the key.
    Keep(String),
    /// Drop the key entirely.
    Drop,
}

/// One conflicting tag key with the candidate values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagConflict {
    /// The conflicting key.
    pub key: String,
    /// Distinct candidate values in first-seen order. Contains an explicit
    /// empty string when some source lacked the key, so a UI can offer
    /// dropping it.
    pub values: Vec<String>,
    /// Current decision.
    pub decision: TagDecision,
}

/// Union of tag maps with per-key conflict tracking.
#[derive(Debug, Clone, Default)]
pub struct TagMergeModel {
    merged: Tags,
    conflicts: Vec<TagConflict>,
}

impl TagMergeModel {
    /// Builds the union of `sources`.
    ///
    /// A key with exactly one distinct non-empty value lands in the merged
    /// map directly; a key with more than one becomes a [`TagConflict`].
    #[must_use]
    pub fn build<'a>(sources: impl Iterator<Item = &'a Tags> + Clone) -> Self {
        let keys: BTreeSet<&str> = sources.clone().flat_map(Tags::keys).collect();
        let mut merged = Tags::new();
        let mut conflicts = Vec::new();
        for key in keys {
            let mut values: Vec<&str> = Vec::new();
            let mut missing_somewhere = false;
            for tags in sources.clone() {
                match tags.get(key) {
                    Some(v) => {
                        if !v.is_empty() && !values.contains(&v) {
                            values.push(v);
                        }
                    }
                    None => missing_somewhere = true,
                }
            }
            match values.as_slice() {
                [] => {}
                [single] => {
                    merged.insert(key, *single);
                }
                _ => {
                    let mut candidates: Vec<String> =
                        values.iter().map(|v| (*v).to_owned()).collect();
                    if missing_somewhere {
                        candidates.push(String::new());
                    }
                    conflicts.push(TagConflict {
                        key: key.to_owned(),
                        values: candidates,
                        decision: TagDecision::Undecided,
                    });
                }
            }
        }
        Self { merged, conflicts }
    }

    /// Returns `true` when at least one key is conflicting.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// The tracked conflicts, in ascending key order.
    #[must_use]
    pub fn conflicts(&self) -> &[TagConflict] {
        &self.conflicts
    }

    /// Records a decision for `key`. Returns `false` for an untracked key.
    pub fn decide(&mut self, key: &str, decision: TagDecision) -> bool {
        match self.conflicts.iter_mut().find(|c| c.key == key) {
            Some(conflict) => {
                conflict.decision = decision;
                true
            }
            None => false,
        }
    }

    /// Holds iff no tracked conflict is undecided.
    #[must_use]
    pub fn is_resolved_completely(&self) -> bool {
        self.conflicts
            .iter()
            .all(|c| c.decision != TagDecision::Undecided)
    }

    /// The final tag map; `None` while any conflict is undecided.
    #[must_use]
    pub fn resolved_tags(&self) -> Option<Tags> {
        let mut tags = self.merged.clone();
        for conflict in &self.conflicts {
            match &conflict.decision {
                TagDecision::Undecided => return None,
                TagDecision::Keep(value) => {
                    tags.insert(conflict.key.clone(), value.clone());
                }
                TagDecision::Drop => {}
            }
        }
        Some(tags)
    }
}

/// One relation-membership slot whose target is being merged away.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberConflict {
    /// The relation owning the slot.
    pub relation: RelationId,
    /// Position of the slot in the relation's member list.
    pub index: usize,
    /// Role of the slot; an arbiter may rewrite it.
    pub role: String,
    /// The primitive the slot currently references.
    pub original: PrimitiveId,
    /// Current decision.
    pub decision: MemberDecision,
}

/// All relation-membership slots affected by merging a set of primitives.
#[derive(Debug, Clone, Default)]
pub struct MemberConflictModel {
    entries: Vec<MemberConflict>,
}

impl MemberConflictModel {
    /// Collects every membership slot referencing one of `originals`.
    ///
    /// Entries are ordered by (relation, position), so walks over the model
    /// are deterministic.
    #[must_use]
    pub fn build(graph: &PrimitiveGraph, originals: &BTreeSet<PrimitiveId>) -> Self {
        let mut relations: BTreeSet<RelationId> = BTreeSet::new();
        for original in originals {
            relations.extend(graph.relation_referrers(*original));
        }
        let mut entries = Vec::new();
        for relation_id in relations {
            let Some(relation) = graph.relation(relation_id) else {
                continue;
            };
            for (index, member) in relation.members.iter().enumerate() {
                if originals.contains(&member.target) {
                    entries.push(MemberConflict {
                        relation: relation_id,
                        index,
                        role: member.role.clone(),
                        original: member.target,
                        decision: MemberDecision::Undecided,
                    });
                }
            }
        }
        Self { entries }
    }

    /// Number of tracked slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no slot is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The tracked slots.
    #[must_use]
    pub fn entries(&self) -> &[MemberConflict] {
        &self.entries
    }

    /// The tracked slots, mutable (for arbiters).
    pub fn entries_mut(&mut self) -> &mut [MemberConflict] {
        &mut self.entries
    }

    /// Applies the forced default decisions.
    ///
    /// With every tracked slot referencing the same single primitive there is
    /// nothing to choose between: everything is kept. Otherwise, per
    /// relation, a run of slots sharing one role at contiguous positions is a
    /// duplicated adjacent membership: the first is kept and the rest
    /// removed. Every other constellation stays undecided.
    pub fn apply_default_decisions(&mut self) {
        let originals: BTreeSet<PrimitiveId> = self.entries.iter().map(|e| e.original).collect();
        if originals.len() <= 1 {
            for entry in &mut self.entries {
                entry.decision = MemberDecision::Keep;
            }
            return;
        }
        let relations: BTreeSet<RelationId> = self.entries.iter().map(|e| e.relation).collect();
        for relation in relations {
            let indices: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.relation == relation)
                .map(|(i, _)| i)
                .collect();
            let same_role = indices
                .windows(2)
                .all(|w| self.entries[w[0]].role == self.entries[w[1]].role);
            let contiguous = indices
                .windows(2)
                .all(|w| self.entries[w[1]].index == self.entries[w[0]].index + 1);
            if same_role && contiguous {
                for (nth, i) in indices.into_iter().enumerate() {
                    self.entries[i].decision = if nth == 0 {
                        MemberDecision::Keep
                    } else {
                        MemberDecision::Remove
                    };
                }
            }
        }
    }

    /// Holds iff no tracked slot is undecided.
    #[must_use]
    pub fn is_resolved_completely(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.decision != MemberDecision::Undecided)
    }

    /// Builds the change commands that realize the resolved decisions,
    /// rewriting kept slots to `target`.
    ///
    /// Slots without a tracked decision pass through unchanged; a relation
    /// yields a command only when its member list actually changes.
    ///
    /// # Errors
    /// Returns [`EditError::AmbiguousFix`] when the model is not completely
    /// resolved.
    pub fn build_resolution(
        &self,
        graph: &PrimitiveGraph,
        target: PrimitiveId,
    ) -> Result<Vec<Command>, EditError> {
        if !self.is_resolved_completely() {
            return Err(EditError::AmbiguousFix(
                "relation membership conflicts are not fully decided",
            ));
        }
        let relations: BTreeSet<RelationId> = self.entries.iter().map(|e| e.relation).collect();
        let mut commands = Vec::new();
        for relation_id in relations {
            let Some(relation) = graph.relation(relation_id) else {
                continue;
            };
            let mut members: Vec<Member> = Vec::with_capacity(relation.members.len());
            for (index, member) in relation.members.iter().enumerate() {
                let tracked = self
                    .entries
                    .iter()
                    .find(|e| e.relation == relation_id && e.index == index);
                match tracked {
                    None => members.push(member.clone()),
                    Some(entry) => match entry.decision {
                        MemberDecision::Keep => {
                            members.push(Member::new(entry.role.clone(), target));
                        }
                        MemberDecision::Remove => {}
                        MemberDecision::Undecided => unreachable!("checked above"),
                    },
                }
            }
            if members != relation.members {
                let mut changed = relation.clone();
                changed.members = members;
                commands.push(Command::change(graph, changed.into())?);
            }
        }
        Ok(commands)
    }
}
