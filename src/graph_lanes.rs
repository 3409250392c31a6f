use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::graph::{CommitNode, GraphPayload, HeadsMap, NormalizedGraph, normalize_payload};
use crate::graph_edges::{GraphEdge, GraphMetrics, route_graph_edges};
use crate::lane_color::{default_palette, lane_color};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    #[serde(flatten)]
    pub commit: CommitNode,
    pub row: usize,
    pub lane: usize,
    pub primary_branch_label: String,
    pub color: String,
}

impl LayoutNode {
    pub fn hash(&self) -> &str {
        &self.commit.hash
    }
}

/// Result of the lane pass, before colours and edges are attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneAssignment {
    /// Lane per node, indexed by row.
    pub lanes: Vec<usize>,
    pub lane_count: usize,
    pub lane_branches: BTreeMap<usize, String>,
}

#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub palette: Vec<String>,
    pub metrics: GraphMetrics,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            metrics: GraphMetrics::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLayout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<GraphEdge>,
    pub lane_count: usize,
    pub lane_branches: BTreeMap<usize, String>,
    pub current_branch: String,
    #[serde(skip)]
    pub heads: HeadsMap,
    #[serde(skip)]
    row_by_hash: BTreeMap<String, usize>,
}

impl GraphLayout {
    pub fn row_of(&self, hash: &str) -> Option<usize> {
        self.row_by_hash.get(hash).copied()
    }

    pub fn node(&self, hash: &str) -> Option<&LayoutNode> {
        self.row_of(hash).map(|row| &self.nodes[row])
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.row_by_hash.contains_key(hash)
    }

    /// Full hash for an exact hash or an unambiguous prefix.
    pub fn resolve_hash(&self, prefix: &str) -> Option<&str> {
        if let Some((hash, _)) = self.row_by_hash.get_key_value(prefix) {
            return Some(hash.as_str());
        }
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .row_by_hash
            .range(prefix.to_string()..)
            .map(|(hash, _)| hash.as_str())
            .take_while(|hash| hash.starts_with(prefix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub fn build_graph_layout(payload: GraphPayload, options: &LayoutOptions) -> GraphLayout {
    let graph = normalize_payload(payload);
    layout_normalized_graph(&graph, options)
}

pub fn layout_normalized_graph(graph: &NormalizedGraph, options: &LayoutOptions) -> GraphLayout {
    let assignment = assign_graph_lanes(graph);

    let nodes = graph
        .nodes()
        .iter()
        .zip(assignment.lanes.iter().copied())
        .enumerate()
        .map(|(row, (commit, lane))| LayoutNode {
            commit: commit.clone(),
            row,
            lane,
            primary_branch_label: commit.primary_branch_label().to_string(),
            color: lane_color(lane, &options.palette).to_string(),
        })
        .collect::<Vec<_>>();

    let row_by_hash = nodes
        .iter()
        .map(|node| (node.commit.hash.clone(), node.row))
        .collect::<BTreeMap<_, _>>();
    let edges = route_graph_edges(&nodes, &row_by_hash, &options.metrics);

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        lanes = assignment.lane_count,
        "built commit graph layout"
    );

    GraphLayout {
        nodes,
        edges,
        lane_count: assignment.lane_count,
        lane_branches: assignment.lane_branches,
        current_branch: graph.current_branch().to_string(),
        heads: graph.heads().clone(),
        row_by_hash,
    }
}

/// Seeded multi-source BFS over parent edges.
///
/// Heads are seeded in enumeration order and the queue is FIFO with a shared
/// visited set, so when two histories converge the ancestor keeps the lane of
/// whichever head reached it first. Primary parents inherit the child's lane;
/// secondary parents get a fresh lane unless they already own one. Nodes the
/// traversal never reaches inherit their primary parent's lane, else lane 0.
pub fn assign_graph_lanes(graph: &NormalizedGraph) -> LaneAssignment {
    if graph.is_empty() {
        return LaneAssignment::default();
    }

    let mut hash_to_lane = BTreeMap::<String, usize>::new();
    let mut lane_branches = BTreeMap::<usize, String>::new();
    let mut next_lane = 0usize;

    for (branch, hash) in graph.heads().iter() {
        if hash_to_lane.contains_key(hash) {
            continue;
        }
        hash_to_lane.insert(hash.to_string(), next_lane);
        lane_branches.insert(next_lane, branch.to_string());
        next_lane += 1;
    }
    if next_lane == 0 {
        next_lane = 1;
    }

    let mut visited = BTreeSet::<String>::new();
    let mut queue = VecDeque::<(String, usize)>::new();
    for (_, hash) in graph.heads().iter() {
        if !visited.insert(hash.to_string()) {
            continue;
        }
        let lane = hash_to_lane[hash];
        queue.push_back((hash.to_string(), lane));
    }

    while let Some((hash, lane)) = queue.pop_front() {
        hash_to_lane.insert(hash.clone(), lane);
        let Some(node) = graph.get(hash.as_str()) else {
            continue;
        };
        let Some(primary) = node.primary_parent() else {
            continue;
        };

        if visited.insert(primary.to_string()) {
            hash_to_lane.insert(primary.to_string(), lane);
            queue.push_back((primary.to_string(), lane));
        }

        for parent in node.secondary_parents() {
            if !visited.insert(parent.to_string()) {
                continue;
            }
            let parent_lane = match hash_to_lane.get(parent) {
                Some(existing) => *existing,
                None => {
                    let fresh = next_lane;
                    next_lane += 1;
                    hash_to_lane.insert(parent.to_string(), fresh);
                    fresh
                }
            };
            queue.push_back((parent.to_string(), parent_lane));
        }
    }

    let mut lanes = Vec::with_capacity(graph.len());
    for node in graph.nodes() {
        let lane = match hash_to_lane.get(node.hash.as_str()) {
            Some(lane) => *lane,
            None => {
                let inherited = node
                    .primary_parent()
                    .and_then(|parent| hash_to_lane.get(parent).copied())
                    .unwrap_or(0);
                hash_to_lane.insert(node.hash.clone(), inherited);
                inherited
            }
        };
        lanes.push(lane);
    }

    let lane_count = lanes
        .iter()
        .map(|lane| lane.saturating_add(1))
        .max()
        .unwrap_or(0)
        .max(next_lane);

    LaneAssignment {
        lanes,
        lane_count,
        lane_branches,
    }
}
