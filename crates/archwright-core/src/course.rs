use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::snapshot::ConversationTurn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CourseStatus {
    Drafting,
    Approved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct PlanStep {
    /// Hierarchical label such as "1.2". Advisory only; array order is the order.
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub topic: String,
    pub knowledge_base_id: String,
    pub status: CourseStatus,
    #[serde(default)]
    pub plan: Vec<PlanStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_progress_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn new(topic: impl Into<String>, knowledge_base_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            knowledge_base_id: knowledge_base_id.into(),
            status: CourseStatus::Drafting,
            plan: vec![],
            course_progress_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

/// A user's run through an approved course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub status: ProgressStatus,
    /// Step progress ids in plan order.
    pub step_progress_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Locked,
    Unlocked,
    Completed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Locked => "locked",
            StepStatus::Unlocked => "unlocked",
            StepStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("step '{step}' cannot unlock: predecessor '{predecessor}' is {status}")]
    PredecessorIncomplete {
        step: String,
        predecessor: String,
        status: &'static str,
    },
    #[error("step '{step}' is {status}, expected {expected}")]
    WrongStatus {
        step: String,
        status: &'static str,
        expected: &'static str,
    },
}

/// Per-step state: status, the two lesson canvases and the step's transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub id: String,
    pub course_progress_id: String,
    pub step_id: String,
    pub title: String,
    pub index: usize,
    pub status: StepStatus,
    #[serde(default)]
    pub lesson_graph: Graph,
    #[serde(default)]
    pub clarification_graph: Graph,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl StepProgress {
    pub fn new(course_progress_id: &str, index: usize, step: &PlanStep) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            course_progress_id: course_progress_id.to_string(),
            step_id: step.id.clone(),
            title: step.title.clone(),
            index,
            status: if index == 0 {
                StepStatus::Unlocked
            } else {
                StepStatus::Locked
            },
            lesson_graph: Graph::default(),
            clarification_graph: Graph::default(),
            turns: vec![],
            suggestions: vec![],
            updated_at: Utc::now(),
        }
    }

    /// `locked -> unlocked`. The first step has no predecessor; every other
    /// step needs its predecessor completed.
    pub fn unlock(&mut self, predecessor: Option<&StepProgress>) -> Result<(), TransitionError> {
        if self.status != StepStatus::Locked {
            return Err(TransitionError::WrongStatus {
                step: self.step_id.clone(),
                status: self.status.as_str(),
                expected: StepStatus::Locked.as_str(),
            });
        }
        if let Some(prev) = predecessor {
            if prev.status != StepStatus::Completed {
                return Err(TransitionError::PredecessorIncomplete {
                    step: self.step_id.clone(),
                    predecessor: prev.step_id.clone(),
                    status: prev.status.as_str(),
                });
            }
        }
        self.status = StepStatus::Unlocked;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `unlocked -> completed`.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        if self.status != StepStatus::Unlocked {
            return Err(TransitionError::WrongStatus {
                step: self.step_id.clone(),
                status: self.status.as_str(),
                expected: StepStatus::Unlocked.as_str(),
            });
        }
        self.status = StepStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }
}
