pub mod config;
pub mod detail_panel;
pub mod file_tree;
pub mod git;
pub mod graph;
pub mod graph_edges;
pub mod graph_lanes;
pub mod lane_color;
pub mod service;
pub mod session;
pub mod state;
