//! Render-shaped graph types. Node ids are UUID strings generated at
//! normalization time; edge ids follow the `xy-edge__<src>-b_<tgt>-a`
//! convention so identical logical graphs produce recognizable edge ids.

use crate::types::Tag;
use serde::{Deserialize, Serialize};

/// Fixed node kind understood by the front-end renderer.
pub const NODE_KIND_TECHNIQUE: &str = "technique";
/// Fixed edge kind understood by the front-end renderer.
pub const EDGE_KIND_NOTE: &str = "note";
/// Connection anchor on the source side of every edge (bottom of the node).
pub const SOURCE_HANDLE: &str = "b";
/// Connection anchor on the target side of every edge (top of the node).
pub const TARGET_HANDLE: &str = "a";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Technique payload carried on a rendered node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNodeData {
    pub technique_id: i64,
    pub name: String,
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Placeholder origin; layout is applied client-side.
    pub position: Position,
    pub data: FlowNodeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdgeData {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle")]
    pub source_handle: String,
    #[serde(rename = "targetHandle")]
    pub target_handle: String,
    pub data: FlowEdgeData,
}

/// The externally addressable graph returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    pub name: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// Deterministic edge id derived from the (new) endpoint ids plus the fixed
/// directional handles.
pub fn flow_edge_id(source: &str, target: &str) -> String {
    format!(
        "xy-edge__{}-{}_{}-{}",
        source, SOURCE_HANDLE, target, TARGET_HANDLE
    )
}
