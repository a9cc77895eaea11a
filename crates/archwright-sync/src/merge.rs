//! Reconciles a regenerated canvas proposal against the previous canvas.
//!
//! The model sends the whole canvas every turn. To a user watching, the
//! canvas must still grow additively: existing nodes keep their id and
//! geometry, new nodes get sensible sizes and free grid slots, the seed
//! placeholder disappears on first content, and broken edges are dropped
//! instead of failing the turn.

use std::collections::HashSet;
use std::fmt;

use archwright_core::{
    default_source_anchor, default_target_anchor, make_edge_id, Edge, Graph, GraphError, Node,
    Position, Size, DEFAULT_NODE_KIND, SEED_NODE_ID,
};
use tracing::{debug, warn};

use crate::payload::{PartialGraph, ProposedEdge, ProposedNode};

/// Geometry deltas at or below this are treated as the same value.
const GEOMETRY_EPSILON: f64 = 0.5;

const GRID_COLUMNS: usize = 4;
const GRID_X_STEP: f64 = 250.0;
const GRID_Y_STEP: f64 = 220.0;
const GRID_ORIGIN: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// The user asked for this turn to move or resize nodes.
    pub allow_geometry_change: bool,
}

impl MergeOptions {
    pub fn geometry_authorized() -> Self {
        Self {
            allow_geometry_change: true,
        }
    }
}

/// Non-fatal findings reported alongside a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDiagnostic {
    /// An edge endpoint did not resolve to a node of the merged canvas.
    DroppedEdge { edge_id: String, missing: String },
    DuplicateEdge { edge_id: String },
    /// The proposal moved or resized a node without the user asking for it.
    GeometryIgnored { node_id: String },
    SeedEvicted,
}

impl fmt::Display for MergeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeDiagnostic::DroppedEdge { edge_id, missing } => {
                write!(f, "dropped edge '{edge_id}': node '{missing}' does not exist")
            }
            MergeDiagnostic::DuplicateEdge { edge_id } => {
                write!(f, "dropped duplicate edge '{edge_id}'")
            }
            MergeDiagnostic::GeometryIgnored { node_id } => {
                write!(f, "kept user geometry of node '{node_id}'")
            }
            MergeDiagnostic::SeedEvicted => f.write_str("removed the starting placeholder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("merged canvas violates graph invariants: {0}")]
    InvariantViolation(#[from] GraphError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub graph: Graph,
    pub diagnostics: Vec<MergeDiagnostic>,
}

/// Merge `proposed` into `previous`. On error the caller keeps `previous`.
pub fn merge(
    previous: &Graph,
    proposed: &PartialGraph,
    options: MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let mut diagnostics = Vec::new();

    let mut nodes = match &proposed.nodes {
        None => previous.nodes.clone(),
        Some(list) => merge_nodes(previous, list, options, &mut diagnostics),
    };

    if previous.contains_node(SEED_NODE_ID) && nodes.iter().any(|n| n.id != SEED_NODE_ID) {
        let before = nodes.len();
        nodes.retain(|n| n.id != SEED_NODE_ID);
        if nodes.len() != before {
            diagnostics.push(MergeDiagnostic::SeedEvicted);
        }
    }

    let edges = match &proposed.edges {
        None => filter_edges(previous.edges.clone(), &nodes, &mut diagnostics),
        Some(list) => filter_edges(to_edges(list), &nodes, &mut diagnostics),
    };

    let graph = Graph { nodes, edges };
    graph.validate()?;

    for d in &diagnostics {
        match d {
            MergeDiagnostic::DroppedEdge { .. } | MergeDiagnostic::DuplicateEdge { .. } => {
                warn!(diagnostic = %d, "merge diagnostic")
            }
            _ => debug!(diagnostic = %d, "merge diagnostic"),
        }
    }
    Ok(MergeOutcome { graph, diagnostics })
}

fn merge_nodes(
    previous: &Graph,
    proposed: &[ProposedNode],
    options: MergeOptions,
    diagnostics: &mut Vec<MergeDiagnostic>,
) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(proposed.len());
    let mut unplaced = Vec::new();

    for p in proposed {
        match previous.node(&p.id) {
            Some(prev) => nodes.push(reconcile(prev, p, options, diagnostics)),
            None => {
                let (node, needs_slot) = create(p);
                if needs_slot {
                    unplaced.push(nodes.len());
                }
                nodes.push(node);
            }
        }
    }

    for idx in unplaced {
        nodes[idx].position = free_grid_slot(&nodes, idx);
    }
    nodes
}

/// A node present on both sides. Content follows the proposal, geometry
/// stays unless the user authorized a change.
fn reconcile(
    prev: &Node,
    p: &ProposedNode,
    options: MergeOptions,
    diagnostics: &mut Vec<MergeDiagnostic>,
) -> Node {
    let mut node = prev.clone();
    if let Some(kind) = p.kind.as_deref().filter(|k| !k.is_empty()) {
        node.kind = kind.to_string();
    }
    if let Some(label) = p.label() {
        node.label = label.to_string();
    }
    if has_description_key(p) {
        node.description = p.description().map(str::to_string);
    }

    let moved = p
        .position
        .filter(|pos| position_differs(*pos, prev.position));
    let resized = p.size.filter(|size| size_differs(*size, prev.size));
    if options.allow_geometry_change {
        if let Some(pos) = moved {
            node.position = pos;
        }
        if let Some(size) = resized {
            node.size = size;
        }
    } else if moved.is_some() || resized.is_some() {
        diagnostics.push(MergeDiagnostic::GeometryIgnored {
            node_id: prev.id.clone(),
        });
    }
    node
}

fn has_description_key(p: &ProposedNode) -> bool {
    p.description.is_some() || p.data.as_ref().is_some_and(|d| d.description.is_some())
}

/// A node only in the proposal. Returns whether it still needs a grid slot.
fn create(p: &ProposedNode) -> (Node, bool) {
    let description = p.description().map(str::to_string);
    let size = p.size.unwrap_or(if description.is_some() {
        Size::DETAILED
    } else {
        Size::COMPACT
    });
    let position = p.position.filter(|pos| *pos != Position::default());
    let node = Node {
        id: p.id.clone(),
        kind: p
            .kind
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_NODE_KIND.to_string()),
        label: p.label().unwrap_or(&p.id).to_string(),
        description,
        position: position.unwrap_or_default(),
        size,
    };
    (node, position.is_none())
}

fn free_grid_slot(nodes: &[Node], skip: usize) -> Position {
    (0..)
        .map(|slot: usize| {
            Position::new(
                (slot % GRID_COLUMNS) as f64 * GRID_X_STEP + GRID_ORIGIN,
                (slot / GRID_COLUMNS) as f64 * GRID_Y_STEP + GRID_ORIGIN,
            )
        })
        .find(|pos| {
            !nodes
                .iter()
                .enumerate()
                .any(|(i, n)| i != skip && !position_differs(n.position, *pos))
        })
        .unwrap_or_default()
}

fn position_differs(a: Position, b: Position) -> bool {
    (a.x - b.x).abs() > GEOMETRY_EPSILON || (a.y - b.y).abs() > GEOMETRY_EPSILON
}

fn size_differs(a: Size, b: Size) -> bool {
    (a.width - b.width).abs() > GEOMETRY_EPSILON || (a.height - b.height).abs() > GEOMETRY_EPSILON
}

fn to_edges(proposed: &[ProposedEdge]) -> Vec<Edge> {
    let mut generated: HashSet<String> = HashSet::new();
    let explicit: HashSet<&str> = proposed
        .iter()
        .filter_map(|e| e.id.as_deref())
        .filter(|id| !id.trim().is_empty())
        .collect();

    proposed
        .iter()
        .map(|p| {
            let id = match p.id.as_deref().filter(|id| !id.trim().is_empty()) {
                Some(id) => id.to_string(),
                None => {
                    let base = make_edge_id(&p.source_id, &p.target_id);
                    let mut id = base.clone();
                    let mut n = 2;
                    while explicit.contains(id.as_str()) || generated.contains(&id) {
                        id = format!("{base}-{n}");
                        n += 1;
                    }
                    generated.insert(id.clone());
                    id
                }
            };
            Edge {
                id,
                source_id: p.source_id.clone(),
                target_id: p.target_id.clone(),
                source_anchor: p.source_anchor.unwrap_or_else(default_source_anchor),
                target_anchor: p.target_anchor.unwrap_or_else(default_target_anchor),
                label: p.label.clone().filter(|l| !l.is_empty()),
            }
        })
        .collect()
}

fn filter_edges(
    edges: Vec<Edge>,
    nodes: &[Node],
    diagnostics: &mut Vec<MergeDiagnostic>,
) -> Vec<Edge> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(edges.len());

    for edge in edges {
        let missing = [&edge.source_id, &edge.target_id]
            .into_iter()
            .find(|endpoint| !ids.contains(endpoint.as_str()));
        if let Some(missing) = missing {
            diagnostics.push(MergeDiagnostic::DroppedEdge {
                edge_id: edge.id.clone(),
                missing: missing.clone(),
            });
            continue;
        }
        if !seen.insert(edge.id.clone()) {
            diagnostics.push(MergeDiagnostic::DuplicateEdge { edge_id: edge.id });
            continue;
        }
        kept.push(edge);
    }
    kept
}
