//! One conversation scope: a canvas, its transcript and the turn loop that
//! keeps them in sync with the model.

use std::sync::Arc;

use archwright_core::store::{keys, read_json, write_json};
use archwright_core::templates::{find_sandbox_task, find_template};
use archwright_core::{
    BlobStore, ConversationTurn, DiagramSnapshot, Graph, GraphError, StepProgress, StepStatus,
    StoreError, TransitionError,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::{CollaboratorError, ModelClient, ModelRequest};
use crate::merge::{merge, MergeDiagnostic, MergeOptions};
use crate::parse::parse_reply;
use crate::payload::{PartialGraph, Payload, PayloadMode};
use crate::prompt;
use crate::retrieval::Retriever;

/// Shown when the model answered with a payload and no prose.
pub const FALLBACK_REPLY: &str = "The architecture has been updated.";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("a reply is already in progress for this conversation")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
    #[error("step '{0}' is locked")]
    StepLocked(String),
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("unknown template or task '{0}'")]
    UnknownTemplate(String),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Which canvas of a scope an update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphSlot {
    Project,
    Lesson,
    Clarification,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagramUpdate {
    /// The payload did not mention this canvas.
    Unchanged,
    Updated { diagnostics: Vec<MergeDiagnostic> },
    /// The proposal could not be merged; the canvas kept its previous state.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphUpdate {
    pub slot: GraphSlot,
    pub outcome: DiagramUpdate,
}

/// What applying a payload did to a canvas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    pub updates: Vec<GraphUpdate>,
    /// The step moved to `completed` on this turn.
    pub step_completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceOutcome {
    pub display_text: String,
    pub suggestions: Vec<String>,
    pub updates: Vec<GraphUpdate>,
    pub step_completed: bool,
    /// A `json` block was present but unusable.
    pub malformed: bool,
}

impl AdvanceOutcome {
    pub fn diagram(&self, slot: GraphSlot) -> Option<&DiagramUpdate> {
        self.updates
            .iter()
            .find(|u| u.slot == slot)
            .map(|u| &u.outcome)
    }
}

/// A persisted state a conversation can drive.
pub trait Canvas: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const MODE: PayloadMode;

    fn turns(&self) -> &[ConversationTurn];

    fn push_turn(&mut self, turn: ConversationTurn);

    fn system_prompt(&self) -> String;

    /// The canvas as the model sees it in the CURRENT ARCHITECTURE header.
    fn render(&self) -> String;

    fn apply(&mut self, payload: &Payload, options: MergeOptions) -> Applied;

    fn set_suggestions(&mut self, suggestions: Vec<String>);

    fn retrieval_topic(&self, user_text: &str) -> String {
        user_text.to_string()
    }

    fn check_accepts_messages(&self) -> Result<(), SyncError> {
        Ok(())
    }

    fn store_key(&self) -> String;

    /// Where the append-only copy of this state goes, if the scope keeps one.
    fn history_key(&self) -> Option<String> {
        None
    }

    /// Stamp a new persisted version.
    fn touch(&mut self);
}

fn merge_slot(
    slot: GraphSlot,
    graph: &mut Graph,
    proposed: &PartialGraph,
    options: MergeOptions,
) -> GraphUpdate {
    let outcome = if proposed.is_empty() {
        DiagramUpdate::Unchanged
    } else {
        match merge(graph, proposed, options) {
            Ok(merged) => {
                *graph = merged.graph;
                DiagramUpdate::Updated {
                    diagnostics: merged.diagnostics,
                }
            }
            Err(e) => {
                warn!(?slot, error = %e, "proposal rejected, canvas unchanged");
                DiagramUpdate::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    };
    GraphUpdate { slot, outcome }
}

fn render_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

impl Canvas for DiagramSnapshot {
    const MODE: PayloadMode = PayloadMode::Project;

    fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    fn push_turn(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    fn system_prompt(&self) -> String {
        prompt::project_system_prompt()
    }

    fn render(&self) -> String {
        render_json(&self.graph)
    }

    fn apply(&mut self, payload: &Payload, options: MergeOptions) -> Applied {
        let Payload::Project(p) = payload else {
            return Applied::default();
        };
        Applied {
            updates: vec![merge_slot(GraphSlot::Project, &mut self.graph, &p.graph, options)],
            step_completed: false,
        }
    }

    fn set_suggestions(&mut self, suggestions: Vec<String>) {
        self.suggestions = suggestions;
    }

    fn store_key(&self) -> String {
        keys::project(&self.project_id)
    }

    fn history_key(&self) -> Option<String> {
        Some(keys::project_revision(&self.project_id, self.revision))
    }

    fn touch(&mut self) {
        self.bump_revision();
    }
}

impl Canvas for StepProgress {
    const MODE: PayloadMode = PayloadMode::Lesson;

    fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    fn push_turn(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    fn system_prompt(&self) -> String {
        prompt::lesson_system_prompt(&self.title)
    }

    fn render(&self) -> String {
        render_json(&serde_json::json!({
            "step": self.title,
            "lessonNodes": self.lesson_graph.nodes,
            "lessonEdges": self.lesson_graph.edges,
            "clarificationNodes": self.clarification_graph.nodes,
            "clarificationEdges": self.clarification_graph.edges,
        }))
    }

    fn apply(&mut self, payload: &Payload, options: MergeOptions) -> Applied {
        let Payload::Lesson(p) = payload else {
            return Applied::default();
        };
        let updates = vec![
            merge_slot(GraphSlot::Lesson, &mut self.lesson_graph, &p.lesson(), options),
            merge_slot(
                GraphSlot::Clarification,
                &mut self.clarification_graph,
                &p.clarification(),
                options,
            ),
        ];
        // Completion is decided by the flag alone; canvas outcomes don't gate it.
        let step_completed =
            p.completes_step() && self.status == StepStatus::Unlocked && self.complete().is_ok();
        Applied {
            updates,
            step_completed,
        }
    }

    fn set_suggestions(&mut self, suggestions: Vec<String>) {
        self.suggestions = suggestions;
    }

    fn retrieval_topic(&self, user_text: &str) -> String {
        format!("{} {}", self.title, user_text)
    }

    fn check_accepts_messages(&self) -> Result<(), SyncError> {
        if self.status == StepStatus::Locked {
            return Err(SyncError::StepLocked(self.step_id.clone()));
        }
        Ok(())
    }

    fn store_key(&self) -> String {
        keys::step(&self.id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The external services a conversation talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn ModelClient>,
    pub store: Arc<dyn BlobStore>,
    pub retriever: Arc<dyn Retriever>,
}

/// Knowledge base that grounds a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalScope {
    pub knowledge_base_id: String,
    pub k: usize,
}

/// One scope's turn loop. At most one `advance` or `edit` runs at a time;
/// a second concurrent call gets `SyncError::Busy`.
pub struct Conversation<C: Canvas> {
    state: Mutex<C>,
    collaborators: Collaborators,
    retrieval: Option<RetrievalScope>,
}

impl<C: Canvas> Conversation<C> {
    pub fn new(state: C, collaborators: Collaborators) -> Self {
        Self {
            state: Mutex::new(state),
            collaborators,
            retrieval: None,
        }
    }

    pub fn with_retrieval(mut self, scope: RetrievalScope) -> Self {
        self.retrieval = Some(scope);
        self
    }

    /// Open a persisted scope.
    pub async fn load(key: &str, collaborators: Collaborators) -> Result<Self, SyncError> {
        let state: C = read_json(collaborators.store.as_ref(), key)
            .await?
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        Ok(Self::new(state, collaborators))
    }

    /// A copy of the current committed state.
    pub async fn current(&self) -> C {
        self.state.lock().await.clone()
    }

    pub async fn advance(&self, user_text: &str) -> Result<AdvanceOutcome, SyncError> {
        self.advance_with(user_text, MergeOptions::default()).await
    }

    /// Run one turn. On any error the committed state is untouched and
    /// nothing is persisted.
    pub async fn advance_with(
        &self,
        user_text: &str,
        options: MergeOptions,
    ) -> Result<AdvanceOutcome, SyncError> {
        let mut state = self.state.try_lock().map_err(|_| SyncError::Busy)?;
        let text = user_text.trim();
        if text.is_empty() {
            return Err(SyncError::EmptyMessage);
        }
        state.check_accepts_messages()?;

        let mut next = state.clone();
        let history = prompt::shape_history(next.turns());
        next.push_turn(ConversationTurn::user(text));

        let fragments = match &self.retrieval {
            Some(scope) => {
                self.collaborators
                    .retriever
                    .query(&scope.knowledge_base_id, &next.retrieval_topic(text), scope.k)
                    .await?
            }
            None => vec![],
        };

        let request = ModelRequest {
            system: next.system_prompt(),
            history,
            message: prompt::outbound_message(&state.render(), &fragments, text),
        };
        let raw = self.collaborators.model.reply(&request).await?;
        debug!(chars = raw.len(), fragments = fragments.len(), "model reply received");

        let parsed = parse_reply(&raw);
        let had_block = parsed.payload.is_some();
        let payload = parsed
            .payload
            .and_then(|value| match Payload::from_value(C::MODE, value) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(error = %e, "ignoring structured block");
                    None
                }
            });
        let malformed = parsed.malformed || (had_block && payload.is_none());

        let applied = payload
            .as_ref()
            .map(|p| next.apply(p, options))
            .unwrap_or_default();
        let suggestions = payload
            .as_ref()
            .map(|p| p.suggestions().to_vec())
            .unwrap_or_default();
        next.set_suggestions(suggestions.clone());

        let display_text = if parsed.display_text.is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            parsed.display_text
        };
        next.push_turn(ConversationTurn::assistant(display_text.clone()));
        next.touch();

        self.persist(&next).await?;
        *state = next;

        Ok(AdvanceOutcome {
            display_text,
            suggestions,
            updates: applied.updates,
            step_completed: applied.step_completed,
            malformed,
        })
    }

    /// Apply a direct user change (move, resize) and persist it.
    pub async fn edit<F>(&self, change: F) -> Result<C, SyncError>
    where
        F: FnOnce(&mut C) -> Result<(), SyncError>,
    {
        let mut state = self.state.try_lock().map_err(|_| SyncError::Busy)?;
        let mut next = state.clone();
        change(&mut next)?;
        next.touch();
        self.persist(&next).await?;
        *state = next.clone();
        Ok(next)
    }

    async fn persist(&self, state: &C) -> Result<(), SyncError> {
        let store = self.collaborators.store.as_ref();
        let key = state.store_key();
        write_json(store, &key, state).await?;
        info!(key = %key, "snapshot persisted");

        if let Some(history) = state.history_key() {
            if let Err(e) = write_json(store, &history, state).await {
                warn!(key = %history, error = %e, "history copy not written");
            }
        }
        Ok(())
    }
}

impl Conversation<DiagramSnapshot> {
    /// Load a project, or create it (blank, from a template or a sandbox task).
    pub async fn open_project(
        project_id: &str,
        starter: Option<&str>,
        collaborators: Collaborators,
    ) -> Result<Self, SyncError> {
        let key = keys::project(project_id);
        if let Some(existing) = read_json::<DiagramSnapshot>(collaborators.store.as_ref(), &key).await? {
            debug!(project = project_id, revision = existing.revision, "project loaded");
            return Ok(Self::new(existing, collaborators));
        }

        let snapshot = match starter {
            None => DiagramSnapshot::blank(project_id),
            Some(id) => {
                if let Some(template) = find_template(id) {
                    DiagramSnapshot::from_template(project_id, &template)
                } else if let Some(task) = find_sandbox_task(id) {
                    DiagramSnapshot::from_sandbox_task(project_id, &task)
                } else {
                    return Err(SyncError::UnknownTemplate(id.to_string()));
                }
            }
        };
        let conversation = Self::new(snapshot, collaborators);
        {
            let state = conversation.state.lock().await;
            conversation.persist(&state).await?;
        }
        info!(project = project_id, "project created");
        Ok(conversation)
    }

    /// Move or resize one node of the project canvas.
    pub async fn set_geometry(
        &self,
        node_id: &str,
        position: Option<archwright_core::Position>,
        size: Option<archwright_core::Size>,
    ) -> Result<DiagramSnapshot, SyncError> {
        self.edit(|s| Ok(s.graph.set_geometry(node_id, position, size)?))
            .await
    }
}

/// Every persisted revision of a project, oldest first.
pub async fn load_history(
    store: &dyn BlobStore,
    project_id: &str,
) -> Result<Vec<DiagramSnapshot>, StoreError> {
    let mut out = Vec::new();
    for key in store.list_keys(&keys::project_history(project_id)).await? {
        if let Some(snapshot) = read_json::<DiagramSnapshot>(store, &key).await? {
            out.push(snapshot);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        collaborators, FailingRetriever, FlakyStore, GatedModel, ScriptedModel, StaticRetriever,
    };
    use archwright_core::{MemoryBlobStore, Position, Role, SEED_NODE_ID};

    const TWO_NODES: &str = "I added an API and a database.\n```json\n{\"nodes\":[{\"id\":\"api\",\"label\":\"API\"},{\"id\":\"db\",\"label\":\"DB\",\"description\":\"Postgres\"}],\"edges\":[{\"source\":\"api\",\"target\":\"db\"}],\"suggestions\":[\"Add a cache\"]}\n```";

    async fn project(model: ScriptedModel) -> (Conversation<DiagramSnapshot>, Collaborators) {
        let c = collaborators(model);
        let conversation = Conversation::open_project("p1", None, c.clone()).await.unwrap();
        (conversation, c)
    }

    #[tokio::test]
    async fn first_turn_replaces_seed_and_persists_one_revision() {
        let model = ScriptedModel::new(vec![TWO_NODES.into()]);
        let (conversation, c) = project(model.clone()).await;

        let out = conversation.advance("Design a blog backend").await.unwrap();
        assert_eq!(out.display_text, "I added an API and a database.");
        assert_eq!(out.suggestions, vec!["Add a cache"]);
        assert!(matches!(
            out.diagram(GraphSlot::Project),
            Some(DiagramUpdate::Updated { .. })
        ));

        let state = conversation.current().await;
        assert!(!state.graph.contains_node(SEED_NODE_ID));
        assert_eq!(state.graph.edges[0].id, "edge-api-db");
        assert_eq!(state.graph.node("db").unwrap().size, archwright_core::Size::DETAILED);
        assert_eq!(state.revision, 1);
        let roles: Vec<_> = state.turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);

        let stored: DiagramSnapshot = read_json(c.store.as_ref(), &keys::project("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, state);
        let history = load_history(c.store.as_ref(), "p1").await.unwrap();
        assert_eq!(history.iter().map(|s| s.revision).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn request_carries_canvas_and_shaped_history() {
        let model = ScriptedModel::new(vec![TWO_NODES.into(), "Sure.".into()]);
        let (conversation, _) = project(model.clone()).await;
        conversation.advance("first").await.unwrap();
        conversation.advance("second").await.unwrap();

        let sent = model.requests().await;
        assert!(sent[0].history.is_empty());
        assert!(sent[0].message.starts_with("CURRENT ARCHITECTURE:"));
        assert!(sent[0].message.contains(SEED_NODE_ID));
        assert!(sent[0].message.ends_with("USER REQUEST:\nfirst"));
        assert!(sent[0].system.contains("CANVAS RULES"));

        let texts: Vec<_> = sent[1].history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "I added an API and a database."]);
        assert!(sent[1].message.contains("\"api\""));
    }

    #[tokio::test]
    async fn plain_text_reply_leaves_canvas_alone() {
        let model = ScriptedModel::new(vec!["What scale do you expect?".into()]);
        let (conversation, _) = project(model).await;
        let before = conversation.current().await.graph;
        let out = conversation.advance("hi").await.unwrap();
        assert_eq!(out.display_text, "What scale do you expect?");
        assert!(out.updates.is_empty());
        assert!(out.suggestions.is_empty());
        assert!(!out.malformed);
        assert_eq!(conversation.current().await.graph, before);
    }

    #[tokio::test]
    async fn payload_only_reply_gets_fallback_text() {
        let model = ScriptedModel::new(vec!["```json\n{\"nodes\":[{\"id\":\"web\"}]}\n```".into()]);
        let (conversation, _) = project(model).await;
        let out = conversation.advance("add a web tier").await.unwrap();
        assert_eq!(out.display_text, FALLBACK_REPLY);
        let state = conversation.current().await;
        assert_eq!(state.turns.last().unwrap().text, FALLBACK_REPLY);
        assert_eq!(state.graph.node("web").unwrap().label, "web");
    }

    #[tokio::test]
    async fn malformed_or_foreign_blocks_are_shown_not_applied() {
        let broken = "Updated!\n```json\n{\"nodes\": [\n```";
        let foreign = "Here.\n```json\n{\"lessonNodes\": []}\n```";
        let model = ScriptedModel::new(vec![broken.into(), foreign.into()]);
        let (conversation, _) = project(model).await;

        let out = conversation.advance("one").await.unwrap();
        assert!(out.malformed);
        assert_eq!(out.display_text, broken);
        assert!(conversation.current().await.graph.is_seed_only());

        let out = conversation.advance("two").await.unwrap();
        assert!(out.malformed);
        assert_eq!(out.display_text, "Here.");
        assert!(conversation.current().await.graph.is_seed_only());
    }

    #[tokio::test]
    async fn rejected_merge_still_records_the_turn() {
        let dup = "Oops.\n```json\n{\"nodes\":[{\"id\":\"x\"},{\"id\":\"x\"}],\"suggestions\":[\"retry\"]}\n```";
        let (conversation, _) = project(ScriptedModel::new(vec![dup.into()])).await;
        let out = conversation.advance("go").await.unwrap();
        assert!(matches!(
            out.diagram(GraphSlot::Project),
            Some(DiagramUpdate::Rejected { .. })
        ));
        assert_eq!(out.suggestions, vec!["retry"]);
        let state = conversation.current().await;
        assert!(state.graph.is_seed_only());
        assert_eq!(state.turns.len(), 3);
        assert_eq!(state.revision, 1);
    }

    #[tokio::test]
    async fn model_failure_changes_nothing() {
        let model = ScriptedModel::with_results(vec![Err(CollaboratorError::model("timeout"))]);
        let (conversation, c) = project(model).await;
        let before = conversation.current().await;
        let err = conversation.advance("hello").await.unwrap_err();
        assert!(matches!(err, SyncError::Collaborator(_)));
        assert_eq!(conversation.current().await, before);
        let stored: DiagramSnapshot = read_json(c.store.as_ref(), &keys::project("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, before);
    }

    #[tokio::test]
    async fn retrieval_failure_changes_nothing() {
        let model = ScriptedModel::new(vec![TWO_NODES.into()]);
        let mut c = collaborators(model.clone());
        c.retriever = Arc::new(FailingRetriever);
        let opened = Conversation::open_project("p1", None, c.clone()).await.unwrap();
        let before = opened.current().await;
        let conversation = Conversation::new(before.clone(), c.clone()).with_retrieval(RetrievalScope {
            knowledge_base_id: "systems".into(),
            k: 4,
        });

        let err = conversation.advance("design a shop").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Collaborator(CollaboratorError::Unavailable { collaborator: "retrieval", .. })
        ));
        assert!(model.requests().await.is_empty());
        assert_eq!(conversation.current().await, before);
        let stored: DiagramSnapshot = read_json(c.store.as_ref(), &keys::project("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, before);
        assert_eq!(load_history(c.store.as_ref(), "p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_changes_nothing() {
        let inner = Arc::new(MemoryBlobStore::new());
        let store = Arc::new(FlakyStore::new(inner));
        let mut c = collaborators(ScriptedModel::new(vec![TWO_NODES.into()]));
        c.store = store.clone() as Arc<dyn BlobStore>;
        let conversation = Conversation::open_project("p1", None, c).await.unwrap();
        let before = conversation.current().await;

        store.fail_writes_with_prefix("project/p1").await;
        let err = conversation.advance("go").await.unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
        assert_eq!(conversation.current().await, before);
    }

    #[tokio::test]
    async fn blank_message_is_refused() {
        let (conversation, _) = project(ScriptedModel::new(vec![])).await;
        assert!(matches!(
            conversation.advance("   ").await.unwrap_err(),
            SyncError::EmptyMessage
        ));
    }

    #[tokio::test]
    async fn concurrent_advance_is_busy() {
        let gated = Arc::new(GatedModel::new("ok"));
        let c = Collaborators {
            model: gated.clone(),
            store: Arc::new(MemoryBlobStore::new()),
            retriever: Arc::new(StaticRetriever::default()),
        };
        let conversation = Arc::new(Conversation::open_project("p1", None, c).await.unwrap());

        let first = tokio::spawn({
            let conversation = Arc::clone(&conversation);
            async move { conversation.advance("one").await }
        });
        gated.entered.notified().await;

        assert!(matches!(
            conversation.advance("two").await.unwrap_err(),
            SyncError::Busy
        ));
        assert!(matches!(
            conversation.set_geometry("start-node", None, None).await.unwrap_err(),
            SyncError::Busy
        ));

        gated.release.notify_one();
        let out = first.await.unwrap().unwrap();
        assert_eq!(out.display_text, "ok");
        assert_eq!(conversation.current().await.turns.len(), 3);
    }

    #[tokio::test]
    async fn geometry_edit_is_persisted_and_survives_later_turns() {
        let model = ScriptedModel::new(vec![
            TWO_NODES.into(),
            "Renamed.\n```json\n{\"nodes\":[{\"id\":\"api\",\"label\":\"Gateway\",\"position\":{\"x\":0,\"y\":0}},{\"id\":\"db\"}]}\n```".into(),
        ]);
        let (conversation, _) = project(model).await;
        conversation.advance("start").await.unwrap();

        let moved = conversation
            .set_geometry("api", Some(Position::new(700.0, 40.0)), None)
            .await
            .unwrap();
        assert_eq!(moved.revision, 2);

        conversation.advance("rename the api").await.unwrap();
        let api = conversation.current().await.graph.node("api").cloned().unwrap();
        assert_eq!(api.label, "Gateway");
        assert_eq!(api.position, Position::new(700.0, 40.0));

        assert!(matches!(
            conversation.set_geometry("ghost", None, None).await.unwrap_err(),
            SyncError::Graph(GraphError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn projects_open_from_templates_and_reload() {
        let c = collaborators(ScriptedModel::new(vec![]));
        let blog = Conversation::open_project("b", Some("blog"), c.clone()).await.unwrap();
        assert_eq!(blog.current().await.graph.nodes.len(), 3);

        let crm = Conversation::open_project("t", Some("task-crm"), c.clone()).await.unwrap();
        let crm = crm.current().await;
        assert!(crm.graph.is_seed_only());
        assert!(crm.turns[0].text.contains("CRM"));

        let fresh = Conversation::open_project("n", None, c.clone()).await.unwrap();
        assert_eq!(fresh.current().await.suggestions.len(), 4);

        let reopened = Conversation::open_project("b", Some("task-crm"), c.clone()).await.unwrap();
        assert_eq!(reopened.current().await.graph.nodes.len(), 3);

        assert!(matches!(
            Conversation::open_project("x", Some("nope"), c).await.err(),
            Some(SyncError::UnknownTemplate(_))
        ));
    }
}
