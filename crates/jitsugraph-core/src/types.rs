use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A technique category tag. Equality is by id; the name is display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tag {}

impl std::hash::Hash for Tag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// One entry of the fixed technique vocabulary. Loaded once per pipeline run
/// and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technique {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// A graph node. `id` is unique within one graph; `technique_id` references
/// the catalog supplied to synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub technique_id: i64,
}

/// A directed edge between two node ids of the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// The internal directed graph produced by synthesis. Node order is
/// generation order and carries no meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn node_ids(&self) -> HashSet<i64> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// True when every edge endpoint resolves to a node in this graph.
    pub fn is_referentially_closed(&self) -> bool {
        let ids = self.node_ids();
        self.edges
            .iter()
            .all(|e| ids.contains(&e.source_id) && ids.contains(&e.target_id))
    }

    /// True when node ids and edge ids are each pairwise distinct.
    pub fn has_unique_ids(&self) -> bool {
        let mut node_ids = HashSet::new();
        if !self.nodes.iter().all(|n| node_ids.insert(n.id)) {
            return false;
        }
        let mut edge_ids = HashSet::new();
        self.edges.iter().all(|e| edge_ids.insert(e.id))
    }

    /// Technique ids referenced by nodes that are absent from `catalog`.
    pub fn unknown_techniques(&self, catalog: &[Technique]) -> Vec<i64> {
        let known: HashSet<i64> = catalog.iter().map(|t| t.id).collect();
        let mut missing: Vec<i64> = self
            .nodes
            .iter()
            .map(|n| n.technique_id)
            .filter(|id| !known.contains(id))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Node ids with no incoming edge.
    pub fn root_ids(&self) -> Vec<i64> {
        let targets: HashSet<i64> = self.edges.iter().map(|e| e.target_id).collect();
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| !targets.contains(id))
            .collect()
    }

    /// Same node set (by technique) and same edge links, ignoring names and
    /// notes. Used to verify that refinement only touched cosmetic fields.
    pub fn same_topology(&self, other: &Graph) -> bool {
        let nodes_a: HashSet<(i64, i64)> =
            self.nodes.iter().map(|n| (n.id, n.technique_id)).collect();
        let nodes_b: HashSet<(i64, i64)> =
            other.nodes.iter().map(|n| (n.id, n.technique_id)).collect();
        if nodes_a != nodes_b {
            return false;
        }
        let links_a: HashSet<(i64, i64)> = self
            .edges
            .iter()
            .map(|e| (e.source_id, e.target_id))
            .collect();
        let links_b: HashSet<(i64, i64)> = other
            .edges
            .iter()
            .map(|e| (e.source_id, e.target_id))
            .collect();
        links_a == links_b
    }
}

/// An intermediate named sequence of steps, extracted from a grounded
/// paragraph and consumed immediately by graph synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub steps: Vec<String>,
}

/// A reference document returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDoc {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Metadata for a tutorial video backing one or more reference documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub uploaded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_graph() -> Graph {
        Graph {
            name: "test".to_string(),
            nodes: vec![
                Node {
                    id: 1,
                    technique_id: 9,
                },
                Node {
                    id: 2,
                    technique_id: 20,
                },
            ],
            edges: vec![Edge {
                id: 1,
                source_id: 1,
                target_id: 2,
                note: Some("shrimp to half guard".to_string()),
            }],
        }
    }

    #[test]
    fn referential_closure_detects_dangling_edge() {
        let mut graph = two_node_graph();
        assert!(graph.is_referentially_closed());

        graph.edges.push(Edge {
            id: 2,
            source_id: 2,
            target_id: 99,
            note: None,
        });
        assert!(!graph.is_referentially_closed());
    }

    #[test]
    fn duplicate_node_ids_are_detected() {
        let mut graph = two_node_graph();
        assert!(graph.has_unique_ids());

        graph.nodes.push(Node {
            id: 1,
            technique_id: 5,
        });
        assert!(!graph.has_unique_ids());
    }

    #[test]
    fn unknown_techniques_reports_missing_catalog_entries() {
        let graph = two_node_graph();
        let catalog = vec![Technique {
            id: 9,
            name: "Shrimp".to_string(),
            description: "Hip escape".to_string(),
            tags: vec![],
            category_id: None,
        }];
        assert_eq!(graph.unknown_techniques(&catalog), vec![20]);
    }

    #[test]
    fn root_ids_are_nodes_without_incoming_edges() {
        let graph = two_node_graph();
        assert_eq!(graph.root_ids(), vec![1]);
    }

    #[test]
    fn same_topology_ignores_notes_and_name() {
        let graph = two_node_graph();
        let mut refined = graph.clone();
        refined.name = "Side Control Escape".to_string();
        refined.edges[0].note = Some("frame, shrimp, recover half guard".to_string());
        assert!(graph.same_topology(&refined));

        refined.edges[0].target_id = 1;
        assert!(!graph.same_topology(&refined));
    }

    #[test]
    fn tags_compare_by_id() {
        let a = Tag {
            id: 3,
            name: "top".to_string(),
        };
        let b = Tag {
            id: 3,
            name: "Top Position".to_string(),
        };
        assert_eq!(a, b);
    }
}
