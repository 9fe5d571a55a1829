//! Turns scored duplicate edges into [`DuplicateGroup`]s.
//!
//! Groups are connected components, not cliques: two records that each match
//! a third one end up together even when they do not match each other.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DuplicateGroup, MediaMetadata};

/// A pair that scored at or above the threshold. Indexes point into the
/// slice handed to [`assemble_groups`].
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub left: usize,
    pub right: usize,
    pub score: f64,
    pub matched_attributes: Vec<String>,
}

/// Ordering rules for picking a group's canonical member. The lowest id is
/// always applied last so the choice is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalCriterion {
    HighestConfidence,
    LargestFileSize,
    MostComplete,
    LowestId,
}

impl CanonicalCriterion {
    pub fn default_order() -> Vec<CanonicalCriterion> {
        vec![
            CanonicalCriterion::HighestConfidence,
            CanonicalCriterion::LargestFileSize,
            CanonicalCriterion::LowestId,
        ]
    }

    /// `Less` when `a` is the better canonical candidate.
    fn compare(&self, a: &MediaMetadata, b: &MediaMetadata) -> Ordering {
        match self {
            CanonicalCriterion::HighestConfidence => b.confidence.total_cmp(&a.confidence),
            CanonicalCriterion::LargestFileSize => {
                b.file_size.unwrap_or(0).cmp(&a.file_size.unwrap_or(0))
            }
            CanonicalCriterion::MostComplete => b.completeness().cmp(&a.completeness()),
            CanonicalCriterion::LowestId => a.id.cmp(&b.id),
        }
    }
}

pub fn choose_canonical<'a>(
    members: &[&'a MediaMetadata],
    order: &[CanonicalCriterion],
) -> Option<&'a MediaMetadata> {
    members.iter().copied().min_by(|a, b| {
        order
            .iter()
            .chain(std::iter::once(&CanonicalCriterion::LowestId))
            .map(|criterion| criterion.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Builds one group per connected component of two or more records.
pub fn assemble_groups(
    items: &[&MediaMetadata],
    edges: &[Edge],
    order: &[CanonicalCriterion],
) -> Vec<DuplicateGroup> {
    let mut dsu = DisjointSet::new(items.len());
    for edge in edges {
        dsu.union(edge.left, edge.right);
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for edge in edges {
        for idx in [edge.left, edge.right] {
            let root = dsu.find(idx);
            let members = components.entry(root).or_default();
            if !members.contains(&idx) {
                members.push(idx);
            }
        }
    }

    let mut edges_by_root: BTreeMap<usize, Vec<&Edge>> = BTreeMap::new();
    for edge in edges {
        edges_by_root.entry(dsu.find(edge.left)).or_default().push(edge);
    }

    let detected_at = Utc::now();
    let mut groups: Vec<DuplicateGroup> = components
        .into_iter()
        .filter(|(_, indexes)| indexes.len() > 1)
        .filter_map(|(root, indexes)| {
            let mut members: Vec<&MediaMetadata> = indexes.iter().map(|&idx| items[idx]).collect();
            members.sort_by(|a, b| a.id.cmp(&b.id));

            let canonical = choose_canonical(&members, order)?;
            let component_edges = edges_by_root.get(&root).map(Vec::as_slice).unwrap_or_default();
            let average_similarity = if component_edges.is_empty() {
                0.0
            } else {
                component_edges.iter().map(|e| e.score).sum::<f64>() / component_edges.len() as f64
            };
            let match_types: BTreeSet<&str> = component_edges
                .iter()
                .flat_map(|e| e.matched_attributes.iter().map(String::as_str))
                .collect();

            Some(DuplicateGroup {
                id: Uuid::new_v4().to_string(),
                media_type: canonical.media_type,
                canonical_member: canonical.clone(),
                average_similarity,
                file_count: members.len(),
                total_size: members.iter().filter_map(|m| m.file_size).sum(),
                match_types: match_types.into_iter().map(str::to_string).collect(),
                members: members.into_iter().cloned().collect(),
                detected_at,
            })
        })
        .collect();

    sort_groups_deterministically(&mut groups);
    groups
}

fn sort_groups_deterministically(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        a.media_type
            .cmp(&b.media_type)
            .then_with(|| a.canonical_member.id.cmp(&b.canonical_member.id))
    });
}

#[derive(Debug, Clone)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    pub(crate) fn union(&mut self, left: usize, right: usize) {
        let left_root = self.find(left);
        let right_root = self.find(right);
        if left_root == right_root {
            return;
        }

        match self.rank[left_root].cmp(&self.rank[right_root]) {
            Ordering::Less => self.parent[left_root] = right_root,
            Ordering::Greater => self.parent[right_root] = left_root,
            Ordering::Equal => {
                self.parent[right_root] = left_root;
                self.rank[left_root] += 1;
            }
        }
    }
}
