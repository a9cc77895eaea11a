use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::templates::{self, SandboxTask, Template};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message. Turn lists are append-only; order is display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// The persisted state of a project canvas at one revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSnapshot {
    pub project_id: String,
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub graph: Graph,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl DiagramSnapshot {
    /// A blank project: seeded canvas, greeting, sandbox suggestions.
    pub fn blank(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            revision: 0,
            created_at: Utc::now(),
            graph: Graph::seeded(),
            turns: vec![ConversationTurn::assistant(templates::GREETING)],
            suggestions: templates::initial_suggestions(),
        }
    }

    pub fn from_template(project_id: impl Into<String>, template: &Template) -> Self {
        Self {
            project_id: project_id.into(),
            revision: 0,
            created_at: Utc::now(),
            graph: template.graph.clone(),
            turns: vec![ConversationTurn::assistant(templates::NEW_PROJECT_GREETING)],
            suggestions: vec![],
        }
    }

    pub fn from_sandbox_task(project_id: impl Into<String>, task: &SandboxTask) -> Self {
        let graph = if task.initial_graph.nodes.is_empty() {
            Graph::seeded()
        } else {
            task.initial_graph.clone()
        };
        Self {
            project_id: project_id.into(),
            revision: 0,
            created_at: Utc::now(),
            graph,
            turns: vec![ConversationTurn::assistant(task.start_message)],
            suggestions: vec![],
        }
    }

    pub fn has_user_turns(&self) -> bool {
        self.turns.iter().any(|t| t.role == Role::User)
    }

    /// Stamp this state as the next revision.
    pub fn bump_revision(&mut self) {
        self.revision += 1;
        self.created_at = Utc::now();
    }
}
