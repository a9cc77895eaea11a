//! Starter canvases and the guided sandbox tasks offered on a fresh project.

use crate::graph::{Anchor, Edge, Graph, Node, Position, Size, DEFAULT_NODE_KIND};

pub const GREETING: &str =
    "Hello! I'm your architecture assistant. What project are we designing today?";
pub const NEW_PROJECT_GREETING: &str = "Starting a new project! What are we building?";
pub const BLANK_CANVAS_SUGGESTION: &str = "Start from a blank canvas";

#[derive(Debug, Clone)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub graph: Graph,
}

#[derive(Debug, Clone)]
pub struct SandboxTask {
    pub id: &'static str,
    pub name: &'static str,
    pub start_message: &'static str,
    pub initial_graph: Graph,
}

fn detailed(id: &str, label: &str, description: &str, x: f64, y: f64) -> Node {
    Node {
        id: id.to_string(),
        kind: DEFAULT_NODE_KIND.to_string(),
        label: label.to_string(),
        description: Some(description.to_string()),
        position: Position::new(x, y),
        size: Size::DETAILED,
    }
}

fn link(id: &str, source: &str, target: &str, anchors: (Anchor, Anchor), label: &str) -> Edge {
    Edge {
        id: id.to_string(),
        source_id: source.to_string(),
        target_id: target.to_string(),
        source_anchor: anchors.0,
        target_anchor: anchors.1,
        label: Some(label.to_string()),
    }
}

pub fn blog_template() -> Template {
    Template {
        id: "blog",
        name: "Blog",
        graph: Graph {
            nodes: vec![
                detailed(
                    "blog-node-1",
                    "Frontend (React)",
                    "Client application that renders posts and comments.",
                    100.0,
                    100.0,
                ),
                detailed(
                    "blog-node-2",
                    "Backend (Node.js)",
                    "Server managing posts and users and exposing the API.",
                    450.0,
                    100.0,
                ),
                detailed(
                    "blog-node-3",
                    "Database (PostgreSQL)",
                    "Stores posts, users and comments.",
                    450.0,
                    350.0,
                ),
            ],
            edges: vec![
                link(
                    "e-blog-1-2",
                    "blog-node-1",
                    "blog-node-2",
                    (Anchor::Right, Anchor::Left),
                    "REST API",
                ),
                link(
                    "e-blog-2-3",
                    "blog-node-2",
                    "blog-node-3",
                    (Anchor::Bottom, Anchor::Top),
                    "SQL Queries",
                ),
            ],
        },
    }
}

pub fn templates() -> Vec<Template> {
    vec![blog_template()]
}

pub fn find_template(id: &str) -> Option<Template> {
    templates().into_iter().find(|t| t.id == id)
}

pub fn sandbox_tasks() -> Vec<SandboxTask> {
    vec![
        SandboxTask {
            id: "task-crm",
            name: "Design a simple CRM",
            start_message: "Great! Let's design a simple CRM. First, which core entities will the \
system have? For example \"Clients\", \"Deals\", \"Tasks\"...",
            initial_graph: Graph::default(),
        },
        SandboxTask {
            id: "task-platform",
            name: "Build a course platform",
            start_message: "Good task! A course platform. Let's pin down the key components. We \
will surely need \"Users\", \"Courses\" and \"Lessons\". Agreed?",
            initial_graph: Graph::default(),
        },
        SandboxTask {
            id: "task-marketplace",
            name: "Design a marketplace architecture",
            start_message: "Interesting project! A marketplace. We'll need to think about a \
product catalog, a cart, an order system and a payment gateway. Where do we start?",
            initial_graph: Graph::default(),
        },
    ]
}

pub fn find_sandbox_task(id: &str) -> Option<SandboxTask> {
    sandbox_tasks().into_iter().find(|t| t.id == id)
}

/// Suggestions shown before the user has said anything.
pub fn initial_suggestions() -> Vec<String> {
    sandbox_tasks()
        .iter()
        .map(|t| t.name.to_string())
        .chain(std::iter::once(BLANK_CANVAS_SUGGESTION.to_string()))
        .collect()
}
