//! Typed view of the structured block a model reply carries.
//!
//! The parser hands over raw JSON; this module decides whether it is a
//! project-canvas payload or a lesson payload and rejects anything else.
//! Every key is optional: an absent graph key means "leave that graph as it
//! is", an absent `suggestions` key means "no suggestions".

use archwright_core::{Anchor, Graph, Position, Size};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    Project,
    Lesson,
}

impl PayloadMode {
    fn recognized_keys(self) -> &'static [&'static str] {
        match self {
            PayloadMode::Project => &["nodes", "edges", "suggestions"],
            PayloadMode::Lesson => &[
                "lessonNodes",
                "lessonEdges",
                "clarificationNodes",
                "clarificationEdges",
                "suggestions",
                "stepCompleted",
            ],
        }
    }
}

impl std::fmt::Display for PayloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PayloadMode::Project => "project",
            PayloadMode::Lesson => "lesson",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("structured block is not a JSON object")]
    NotAnObject,
    #[error("{mode} payload has none of the expected keys (found: {})", .found.join(", "))]
    UnrecognizedKeys { mode: PayloadMode, found: Vec<String> },
    #[error("{mode} payload has the wrong shape: {source}")]
    Shape {
        mode: PayloadMode,
        #[source]
        source: serde_json::Error,
    },
}

/// Older canvas format nested label and description under `data`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LegacyNodeData {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "implementation")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProposedNode {
    pub id: String,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, alias = "implementation", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, alias = "style", skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing)]
    #[schemars(skip)]
    pub data: Option<LegacyNodeData>,
}

impl ProposedNode {
    pub fn label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.label.as_deref()))
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.description.as_deref()))
            .filter(|d| !d.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "source")]
    pub source_id: String,
    #[serde(alias = "target")]
    pub target_id: String,
    #[serde(default, alias = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub source_anchor: Option<Anchor>,
    #[serde(default, alias = "targetHandle", skip_serializing_if = "Option::is_none")]
    pub target_anchor: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A proposed canvas. `None` means the key was absent: keep what is there.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartialGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<ProposedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<ProposedEdge>>,
}

impl PartialGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_none() && self.edges.is_none()
    }
}

impl From<&Graph> for PartialGraph {
    fn from(graph: &Graph) -> Self {
        PartialGraph {
            nodes: Some(
                graph
                    .nodes
                    .iter()
                    .map(|n| ProposedNode {
                        id: n.id.clone(),
                        kind: Some(n.kind.clone()),
                        label: Some(n.label.clone()),
                        description: n.description.clone(),
                        position: Some(n.position),
                        size: Some(n.size),
                        data: None,
                    })
                    .collect(),
            ),
            edges: Some(
                graph
                    .edges
                    .iter()
                    .map(|e| ProposedEdge {
                        id: Some(e.id.clone()),
                        source_id: e.source_id.clone(),
                        target_id: e.target_id.clone(),
                        source_anchor: Some(e.source_anchor),
                        target_anchor: Some(e.target_anchor),
                        label: e.label.clone(),
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    #[serde(flatten)]
    pub graph: PartialGraph,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_nodes: Option<Vec<ProposedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_edges: Option<Vec<ProposedEdge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_nodes: Option<Vec<ProposedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_edges: Option<Vec<ProposedEdge>>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Set to true only once the learner has mastered this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_completed: Option<bool>,
}

impl LessonPayload {
    pub fn lesson(&self) -> PartialGraph {
        PartialGraph {
            nodes: self.lesson_nodes.clone(),
            edges: self.lesson_edges.clone(),
        }
    }

    pub fn clarification(&self) -> PartialGraph {
        PartialGraph {
            nodes: self.clarification_nodes.clone(),
            edges: self.clarification_edges.clone(),
        }
    }

    pub fn completes_step(&self) -> bool {
        self.step_completed == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Project(ProjectPayload),
    Lesson(LessonPayload),
}

impl Payload {
    /// Validate a raw structured block against the shape `mode` expects.
    pub fn from_value(mode: PayloadMode, value: Value) -> Result<Payload, PayloadError> {
        let object = value.as_object().ok_or(PayloadError::NotAnObject)?;
        let recognized = mode.recognized_keys();
        if !object.is_empty() && !object.keys().any(|k| recognized.contains(&k.as_str())) {
            return Err(PayloadError::UnrecognizedKeys {
                mode,
                found: object.keys().cloned().collect(),
            });
        }

        let shape = |source| PayloadError::Shape { mode, source };
        match mode {
            PayloadMode::Project => serde_json::from_value(value)
                .map(Payload::Project)
                .map_err(shape),
            PayloadMode::Lesson => serde_json::from_value(value)
                .map(Payload::Lesson)
                .map_err(shape),
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Payload::Project(p) => &p.suggestions,
            Payload::Lesson(p) => &p.suggestions,
        }
    }
}

/// JSON schema of the payload a mode expects, embedded in system prompts.
pub fn payload_schema(mode: PayloadMode) -> String {
    let schema = match mode {
        PayloadMode::Project => schemars::schema_for!(ProjectPayload),
        PayloadMode::Lesson => schemars::schema_for!(LessonPayload),
    };
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
