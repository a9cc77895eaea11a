use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Id of the placeholder node a blank canvas starts with.
pub const SEED_NODE_ID: &str = "start-node";

pub const DEFAULT_NODE_KIND: &str = "architectureNode";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Default size for a node that carries only a label.
    pub const COMPACT: Size = Size {
        width: 180.0,
        height: 60.0,
    };
    /// Default size for a node with a description, large enough for the text.
    pub const DETAILED: Size = Size {
        width: 240.0,
        height: 160.0,
    };
    pub const SEED: Size = Size {
        width: 180.0,
        height: 50.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::COMPACT
    }
}

/// Connection point on one of the four sides of a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
}

impl Anchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::Top => "top",
            Anchor::Bottom => "bottom",
            Anchor::Left => "left",
            Anchor::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
}

fn default_kind() -> String {
    DEFAULT_NODE_KIND.to_string()
}

impl Node {
    /// The placeholder node shown on a canvas nobody has drawn on yet.
    pub fn seed() -> Self {
        Node {
            id: SEED_NODE_ID.to_string(),
            kind: "input".to_string(),
            label: "Start designing...".to_string(),
            description: None,
            position: Position::new(250.0, 5.0),
            size: Size::SEED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default = "default_source_anchor")]
    pub source_anchor: Anchor,
    #[serde(default = "default_target_anchor")]
    pub target_anchor: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub fn default_source_anchor() -> Anchor {
    Anchor::Right
}

pub fn default_target_anchor() -> Anchor {
    Anchor::Left
}

/// A canvas: flat node and edge lists, edges refer to nodes by id only.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node id must not be empty")]
    EmptyNodeId,
    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),
    #[error("duplicate edge id '{0}'")]
    DuplicateEdgeId(String),
    #[error("edge '{edge}' references missing node '{missing}'")]
    EdgeReferencesMissingNode { edge: String, missing: String },
    #[error("node '{0}' not found")]
    NodeNotFound(String),
}

impl Graph {
    /// A blank canvas holding only the placeholder seed node.
    pub fn seeded() -> Self {
        Graph {
            nodes: vec![Node::seed()],
            edges: vec![],
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// True while the canvas holds nothing but the placeholder.
    pub fn is_seed_only(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].id == SEED_NODE_ID
    }

    /// Check identity and reference invariants. Pure; reports the first violation.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(GraphError::EmptyNodeId);
            }
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut edge_ids = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphError::DuplicateEdgeId(edge.id.clone()));
            }
            for endpoint in [&edge.source_id, &edge.target_id] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphError::EdgeReferencesMissingNode {
                        edge: edge.id.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply an explicit user move/resize. Geometry never changes any other way
    /// outside an authorized merge.
    pub fn set_geometry(
        &mut self,
        id: &str,
        position: Option<Position>,
        size: Option<Size>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        if let Some(p) = position {
            node.position = p;
        }
        if let Some(s) = size {
            node.size = s;
        }
        Ok(())
    }
}

/// Generate an edge ID from source and target node IDs.
pub fn make_edge_id(source: &str, target: &str) -> String {
    format!("edge-{}-{}", source, target)
}
