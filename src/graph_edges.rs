use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph_lanes::LayoutNode;

const MAINLINE_CONTROL_X: f32 = 0.5;
const MAINLINE_CONTROL_Y: f32 = 0.2;
const MERGE_CONTROL_X: f32 = 0.6;
const MERGE_CONTROL_Y: f32 = 0.3;

pub const MAINLINE_STYLE: EdgeStyle = EdgeStyle {
    stroke_width: 1.5,
    opacity: 0.6,
    dashed: false,
};
pub const MAINLINE_CURVE_STYLE: EdgeStyle = EdgeStyle {
    dashed: true,
    ..MAINLINE_STYLE
};
pub const MERGE_STYLE: EdgeStyle = EdgeStyle {
    stroke_width: 2.5,
    opacity: 0.9,
    dashed: false,
};

/// Pixel metrics used to place lanes and rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphMetrics {
    pub lane_width: f32,
    pub row_height: f32,
}

impl Default for GraphMetrics {
    fn default() -> Self {
        Self {
            lane_width: 16.0,
            row_height: 28.0,
        }
    }
}

impl GraphMetrics {
    pub fn point(&self, lane: usize, row: usize) -> Point {
        Point {
            x: lane as f32 * self.lane_width + self.lane_width / 2.0,
            y: row as f32 * self.row_height + self.row_height / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Mainline,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub stroke_width: f32,
    pub opacity: f32,
    pub dashed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EdgePath {
    Straight {
        start: Point,
        end: Point,
    },
    /// Cubic Bézier from `start` to `end`.
    Curve {
        start: Point,
        control_start: Point,
        control_end: Point,
        end: Point,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub from_lane: usize,
    pub from_row: usize,
    pub to_lane: usize,
    pub to_row: usize,
    pub path: EdgePath,
    pub style: EdgeStyle,
}

/// Mainline edges go to `parents[0]`; merge edges go to `other_parent`.
/// Either is skipped when its target is not part of the layout.
pub fn route_graph_edges(
    nodes: &[LayoutNode],
    row_by_hash: &BTreeMap<String, usize>,
    metrics: &GraphMetrics,
) -> Vec<GraphEdge> {
    let mut edges = Vec::new();

    for node in nodes {
        if let Some(target) = node
            .commit
            .primary_parent()
            .and_then(|parent| row_by_hash.get(parent))
            .map(|row| &nodes[*row])
        {
            edges.push(mainline_edge(node, target, metrics));
        }

        if let Some(target) = node
            .commit
            .other_parent
            .as_deref()
            .and_then(|parent| row_by_hash.get(parent))
            .map(|row| &nodes[*row])
        {
            edges.push(merge_edge(node, target, metrics));
        }
    }

    edges
}

pub fn mainline_edge(from: &LayoutNode, to: &LayoutNode, metrics: &GraphMetrics) -> GraphEdge {
    let start = metrics.point(from.lane, from.row);
    let end = metrics.point(to.lane, to.row);
    let (path, style) = if from.lane == to.lane {
        (EdgePath::Straight { start, end }, MAINLINE_STYLE)
    } else {
        (
            curve(start, end, MAINLINE_CONTROL_X, MAINLINE_CONTROL_Y),
            MAINLINE_CURVE_STYLE,
        )
    };
    edge_between(from, to, EdgeKind::Mainline, path, style)
}

pub fn merge_edge(from: &LayoutNode, to: &LayoutNode, metrics: &GraphMetrics) -> GraphEdge {
    let start = metrics.point(from.lane, from.row);
    let end = metrics.point(to.lane, to.row);
    let path = curve(start, end, MERGE_CONTROL_X, MERGE_CONTROL_Y);
    edge_between(from, to, EdgeKind::Merge, path, MERGE_STYLE)
}

fn edge_between(
    from: &LayoutNode,
    to: &LayoutNode,
    kind: EdgeKind,
    path: EdgePath,
    style: EdgeStyle,
) -> GraphEdge {
    GraphEdge {
        from: from.commit.hash.clone(),
        to: to.commit.hash.clone(),
        kind,
        from_lane: from.lane,
        from_row: from.row,
        to_lane: to.lane,
        to_row: to.row,
        path,
        style,
    }
}

fn curve(start: Point, end: Point, fraction_x: f32, fraction_y: f32) -> EdgePath {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    EdgePath::Curve {
        start,
        control_start: Point {
            x: start.x + dx * fraction_x,
            y: start.y + dy * fraction_y,
        },
        control_end: Point {
            x: end.x - dx * fraction_x,
            y: end.y - dy * fraction_y,
        },
        end,
    }
}
