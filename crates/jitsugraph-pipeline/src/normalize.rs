//! Identity normalization: replace run-local integer node ids with globally
//! unique UUID strings while preserving topology, and reshape the graph for
//! the front-end renderer. The `old id -> new id` mapping is scoped to one
//! call and returned alongside the new graph.

use jitsugraph_core::{
    flow, FlowEdge, FlowEdgeData, FlowGraph, FlowNode, FlowNodeData, Graph, JitsuGraphError,
    Position, Result, Technique,
};
use std::collections::HashMap;
use uuid::Uuid;

pub fn normalize_graph(
    graph: &Graph,
    catalog: &[Technique],
) -> Result<(HashMap<i64, String>, FlowGraph)> {
    let techniques: HashMap<i64, &Technique> = catalog.iter().map(|t| (t.id, t)).collect();

    let mut id_map = HashMap::with_capacity(graph.nodes.len());
    let mut nodes = Vec::with_capacity(graph.nodes.len());

    for node in &graph.nodes {
        let technique = techniques.get(&node.technique_id).ok_or_else(|| {
            JitsuGraphError::Shape(format!(
                "node {} references technique {} absent from the catalog",
                node.id, node.technique_id
            ))
        })?;

        let new_id = Uuid::new_v4().to_string();
        id_map.insert(node.id, new_id.clone());

        nodes.push(FlowNode {
            id: new_id,
            kind: flow::NODE_KIND_TECHNIQUE.to_string(),
            position: Position { x: 0.0, y: 0.0 },
            data: FlowNodeData {
                technique_id: technique.id,
                name: technique.name.clone(),
                tags: technique.tags.clone(),
                category_id: technique.category_id,
            },
        });
    }

    let mut edges = Vec::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        // A lookup miss means an upstream invariant violation; it must fail
        // the call rather than silently drop the edge.
        let source = id_map.get(&edge.source_id).ok_or_else(|| {
            JitsuGraphError::Shape(format!(
                "edge {} references missing source node {}",
                edge.id, edge.source_id
            ))
        })?;
        let target = id_map.get(&edge.target_id).ok_or_else(|| {
            JitsuGraphError::Shape(format!(
                "edge {} references missing target node {}",
                edge.id, edge.target_id
            ))
        })?;

        edges.push(FlowEdge {
            id: flow::flow_edge_id(source, target),
            kind: flow::EDGE_KIND_NOTE.to_string(),
            source: source.clone(),
            target: target.clone(),
            source_handle: flow::SOURCE_HANDLE.to_string(),
            target_handle: flow::TARGET_HANDLE.to_string(),
            data: FlowEdgeData {
                note: edge.note.clone(),
            },
        });
    }

    let flow_graph = FlowGraph {
        name: graph.name.clone(),
        nodes,
        edges,
    };
    Ok((id_map, flow_graph))
}
