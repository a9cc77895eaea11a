//! Course lifecycle: drafting a plan, approving it into per-step progress,
//! and gating each step on its predecessor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use archwright_core::store::{keys, read_json, write_json};
use archwright_core::{
    Course, CourseProgress, CourseStatus, PlanStep, ProgressStatus, StepProgress, StepStatus,
    StoreError, TransitionError,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::conversation::{
    AdvanceOutcome, Collaborators, Conversation, RetrievalScope, SyncError,
};
use crate::engine::{CollaboratorError, ModelRequest};
use crate::merge::MergeOptions;
use crate::parse::{parse_plan, PlanParseError};
use crate::prompt;

/// Fragments retrieved to draft a plan.
pub const PLAN_FRAGMENTS: usize = 10;

/// Fragments retrieved per lesson turn.
pub const LESSON_FRAGMENTS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("course '{0}' is already approved")]
    AlreadyApproved(String),
    #[error("course '{0}' has an empty plan")]
    EmptyPlan(String),
    #[error("approval of course '{course}' failed and was rolled back: {source}")]
    ApprovalPartialFailure {
        course: String,
        #[source]
        source: StoreError,
    },
    #[error("course topic is empty")]
    EmptyTopic,
    #[error(transparent)]
    Plan(#[from] PlanParseError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// One row of a progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub step_progress_id: String,
    pub step_id: String,
    pub title: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub progress: CourseProgress,
    pub steps: Vec<StepSummary>,
}

pub struct CourseService {
    collaborators: Collaborators,
    /// Serializes writes to one course record: plan edits and approval.
    course_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Open step conversations, so transitions reach the live state.
    sessions: Mutex<HashMap<String, Arc<Conversation<StepProgress>>>>,
}

impl CourseService {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            course_locks: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create_course(
        &self,
        topic: &str,
        knowledge_base_id: &str,
    ) -> Result<Course, LifecycleError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(LifecycleError::EmptyTopic);
        }
        let course = Course::new(topic, knowledge_base_id);
        self.save_course(&course).await?;
        info!(course = %course.id, topic, "course created");
        Ok(course)
    }

    pub async fn load_course(&self, course_id: &str) -> Result<Course, LifecycleError> {
        let key = keys::course(course_id);
        read_json(self.store(), &key)
            .await?
            .ok_or(LifecycleError::NotFound(key))
    }

    /// Ask the model for a plan grounded in the course's knowledge base.
    /// The course stays in drafting. If it was approved while the model
    /// was answering, the drafted plan is discarded.
    pub async fn draft_plan(&self, course_id: &str) -> Result<Course, LifecycleError> {
        let course = self.drafting_course(course_id).await?;

        let fragments = self
            .collaborators
            .retriever
            .query(&course.knowledge_base_id, &course.topic, PLAN_FRAGMENTS)
            .await?;
        let request = ModelRequest {
            system: prompt::planner_system_prompt().to_string(),
            history: vec![],
            message: prompt::planner_message(&course.topic, &fragments),
        };
        let raw = self.collaborators.model.reply(&request).await?;
        let plan = parse_plan(&raw)?;

        let lock = self.course_lock(course_id).await;
        let _guard = lock.lock().await;
        let mut course = self.drafting_course(course_id).await?;
        course.plan = plan;
        self.save_course(&course).await?;
        info!(course = %course.id, steps = course.plan.len(), "plan drafted");
        Ok(course)
    }

    /// Replace the plan by hand while the course is drafting.
    pub async fn set_plan(
        &self,
        course_id: &str,
        plan: Vec<PlanStep>,
    ) -> Result<Course, LifecycleError> {
        let lock = self.course_lock(course_id).await;
        let _guard = lock.lock().await;
        let mut course = self.drafting_course(course_id).await?;
        let mut seen = HashSet::new();
        for step in &plan {
            if !seen.insert(step.id.as_str()) {
                return Err(PlanParseError::DuplicateStepId(step.id.clone()).into());
            }
        }
        course.plan = plan;
        self.save_course(&course).await?;
        Ok(course)
    }

    /// Freeze the plan and create the learner's progress records.
    /// All or nothing: a failed write removes whatever was written.
    /// A concurrent second approval waits and then sees `AlreadyApproved`.
    pub async fn approve(
        &self,
        course_id: &str,
        user_id: &str,
    ) -> Result<CourseProgress, LifecycleError> {
        let lock = self.course_lock(course_id).await;
        let _guard = lock.lock().await;
        self.approve_exclusive(course_id, user_id).await
    }

    async fn approve_exclusive(
        &self,
        course_id: &str,
        user_id: &str,
    ) -> Result<CourseProgress, LifecycleError> {
        let mut course = self.drafting_course(course_id).await?;
        if course.plan.is_empty() {
            return Err(LifecycleError::EmptyPlan(course_id.to_string()));
        }

        let progress_id = uuid::Uuid::new_v4().to_string();
        let steps: Vec<StepProgress> = course
            .plan
            .iter()
            .enumerate()
            .map(|(i, step)| StepProgress::new(&progress_id, i, step))
            .collect();
        let progress = CourseProgress {
            id: progress_id.clone(),
            course_id: course.id.clone(),
            user_id: user_id.to_string(),
            status: ProgressStatus::InProgress,
            step_progress_ids: steps.iter().map(|s| s.id.clone()).collect(),
            created_at: Utc::now(),
        };
        course.status = CourseStatus::Approved;
        course.course_progress_id = Some(progress_id.clone());

        let mut written: Vec<String> = Vec::with_capacity(steps.len() + 1);
        let outcome = async {
            for step in &steps {
                let key = keys::step(&step.id);
                write_json(self.store(), &key, step).await?;
                written.push(key);
            }
            let key = keys::course_progress(&progress.id);
            write_json(self.store(), &key, &progress).await?;
            written.push(key);
            write_json(self.store(), &keys::course(&course.id), &course).await
        }
        .await;

        if let Err(source) = outcome {
            for key in written.iter().rev() {
                if let Err(e) = self.store().delete_blob(key).await {
                    warn!(key = %key, error = %e, "rollback delete failed");
                }
            }
            warn!(course = course_id, error = %source, "approval rolled back");
            return Err(LifecycleError::ApprovalPartialFailure {
                course: course_id.to_string(),
                source,
            });
        }

        info!(
            course = course_id,
            progress = %progress.id,
            steps = steps.len(),
            "course approved"
        );
        Ok(progress)
    }

    pub async fn load_progress(
        &self,
        course_progress_id: &str,
    ) -> Result<CourseProgress, LifecycleError> {
        let key = keys::course_progress(course_progress_id);
        read_json(self.store(), &key)
            .await?
            .ok_or(LifecycleError::NotFound(key))
    }

    /// Step statuses in plan order.
    pub async fn progress(
        &self,
        course_progress_id: &str,
    ) -> Result<ProgressReport, LifecycleError> {
        let progress = self.load_progress(course_progress_id).await?;
        let mut steps = Vec::with_capacity(progress.step_progress_ids.len());
        for id in &progress.step_progress_ids {
            let step = self.step_state(id).await?;
            steps.push(StepSummary {
                step_progress_id: step.id,
                step_id: step.step_id,
                title: step.title,
                status: step.status,
            });
        }
        Ok(ProgressReport { progress, steps })
    }

    /// Open (or reuse) the lesson conversation of one step.
    pub async fn open_step(&self, step_progress_id: &str) -> Result<StepSession<'_>, LifecycleError> {
        let mut sessions = self.sessions.lock().await;
        // Sessions nobody holds are fully persisted and can be reloaded.
        sessions.retain(|id, c| id == step_progress_id || Arc::strong_count(c) > 1);
        if let Some(conversation) = sessions.get(step_progress_id) {
            return Ok(StepSession {
                service: self,
                conversation: Arc::clone(conversation),
            });
        }

        let conversation =
            Conversation::<StepProgress>::load(&keys::step(step_progress_id), self.collaborators.clone())
                .await
                .map_err(|e| match e {
                    SyncError::NotFound(key) => LifecycleError::NotFound(key),
                    other => other.into(),
                })?;
        let step = conversation.current().await;
        let progress = self.load_progress(&step.course_progress_id).await?;
        let course = self.load_course(&progress.course_id).await?;
        let conversation = Arc::new(conversation.with_retrieval(RetrievalScope {
            knowledge_base_id: course.knowledge_base_id,
            k: LESSON_FRAGMENTS,
        }));
        sessions.insert(step_progress_id.to_string(), Arc::clone(&conversation));
        Ok(StepSession {
            service: self,
            conversation,
        })
    }

    /// Unlock the step after `step_progress_id`, which must be completed.
    /// Completing the last step completes the course progress instead.
    pub async fn unlock_successor(
        &self,
        step_progress_id: &str,
    ) -> Result<Option<StepProgress>, LifecycleError> {
        let step = self.step_state(step_progress_id).await?;
        let mut progress = self.load_progress(&step.course_progress_id).await?;

        match progress.step_progress_ids.get(step.index + 1) {
            Some(next_id) => {
                let next = self
                    .transition_step(next_id, |next| next.unlock(Some(&step)))
                    .await?;
                info!(step = %next.step_id, "step unlocked");
                Ok(Some(next))
            }
            None => {
                if step.status != StepStatus::Completed {
                    return Err(TransitionError::WrongStatus {
                        step: step.step_id.clone(),
                        status: step.status.as_str(),
                        expected: StepStatus::Completed.as_str(),
                    }
                    .into());
                }
                if progress.status != ProgressStatus::Completed {
                    progress.status = ProgressStatus::Completed;
                    write_json(self.store(), &keys::course_progress(&progress.id), &progress)
                        .await?;
                    info!(progress = %progress.id, "course completed");
                }
                Ok(None)
            }
        }
    }

    /// Repair a progress whose successor unlock was interrupted: every step
    /// after a completed one gets unlocked.
    pub async fn reconcile(&self, course_progress_id: &str) -> Result<ProgressReport, LifecycleError> {
        let progress = self.load_progress(course_progress_id).await?;
        for id in &progress.step_progress_ids {
            let step = self.step_state(id).await?;
            if step.status != StepStatus::Completed {
                continue;
            }
            let next_locked = match progress.step_progress_ids.get(step.index + 1) {
                Some(next_id) => self.step_state(next_id).await?.status == StepStatus::Locked,
                None => true,
            };
            if next_locked {
                self.unlock_successor(id).await?;
            }
        }
        self.progress(course_progress_id).await
    }

    async fn step_state(&self, step_progress_id: &str) -> Result<StepProgress, LifecycleError> {
        let session = self.sessions.lock().await.get(step_progress_id).cloned();
        if let Some(conversation) = session {
            return Ok(conversation.current().await);
        }
        let key = keys::step(step_progress_id);
        read_json(self.store(), &key)
            .await?
            .ok_or(LifecycleError::NotFound(key))
    }

    /// Apply a status transition through the open session when there is
    /// one, otherwise directly on the stored blob.
    async fn transition_step<F>(
        &self,
        step_progress_id: &str,
        transition: F,
    ) -> Result<StepProgress, LifecycleError>
    where
        F: FnOnce(&mut StepProgress) -> Result<(), TransitionError>,
    {
        let session = self.sessions.lock().await.get(step_progress_id).cloned();
        if let Some(conversation) = session {
            return Ok(conversation.edit(|s| Ok(transition(s)?)).await?);
        }

        let key = keys::step(step_progress_id);
        let mut step: StepProgress = read_json(self.store(), &key)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(key.clone()))?;
        transition(&mut step)?;
        step.updated_at = Utc::now();
        write_json(self.store(), &key, &step).await?;
        Ok(step)
    }

    async fn course_lock(&self, course_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.course_locks.lock().await;
        Arc::clone(locks.entry(course_id.to_string()).or_default())
    }

    async fn drafting_course(&self, course_id: &str) -> Result<Course, LifecycleError> {
        let course = self.load_course(course_id).await?;
        if course.status == CourseStatus::Approved {
            return Err(LifecycleError::AlreadyApproved(course_id.to_string()));
        }
        Ok(course)
    }

    async fn save_course(&self, course: &Course) -> Result<(), StoreError> {
        write_json(self.store(), &keys::course(&course.id), course).await
    }

    fn store(&self) -> &dyn archwright_core::BlobStore {
        self.collaborators.store.as_ref()
    }
}

/// A learner's chat on one step.
pub struct StepSession<'a> {
    service: &'a CourseService,
    conversation: Arc<Conversation<StepProgress>>,
}

impl StepSession<'_> {
    pub async fn current(&self) -> StepProgress {
        self.conversation.current().await
    }

    pub async fn advance(&self, user_text: &str) -> Result<AdvanceOutcome, LifecycleError> {
        self.advance_with(user_text, MergeOptions::default()).await
    }

    /// Run one lesson turn. A `stepCompleted` reply completes the step and
    /// unlocks the next one.
    pub async fn advance_with(
        &self,
        user_text: &str,
        options: MergeOptions,
    ) -> Result<AdvanceOutcome, LifecycleError> {
        let outcome = self.conversation.advance_with(user_text, options).await?;
        if outcome.step_completed {
            let step = self.conversation.current().await;
            info!(step = %step.step_id, "step completed");
            self.service.unlock_successor(&step.id).await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collaborators, FlakyStore, GatedModel, ScriptedModel, StaticRetriever};
    use archwright_core::{BlobStore, MemoryBlobStore};

    fn plan(n: usize) -> Vec<PlanStep> {
        (1..=n)
            .map(|i| PlanStep {
                id: format!("1.{i}"),
                title: format!("Step {i}"),
            })
            .collect()
    }

    async fn approved(service: &CourseService, steps: usize) -> CourseProgress {
        let course = service.create_course("Caching", "systems").await.unwrap();
        service.set_plan(&course.id, plan(steps)).await.unwrap();
        service.approve(&course.id, "u1").await.unwrap()
    }

    fn statuses(report: &ProgressReport) -> Vec<StepStatus> {
        report.steps.iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn approval_unlocks_only_the_first_step() {
        let service = CourseService::new(collaborators(ScriptedModel::new(vec![])));
        let progress = approved(&service, 3).await;
        let report = service.progress(&progress.id).await.unwrap();
        assert_eq!(
            statuses(&report),
            vec![StepStatus::Unlocked, StepStatus::Locked, StepStatus::Locked]
        );
        assert_eq!(report.steps[1].title, "Step 2");

        let course = service.load_course(&progress.course_id).await.unwrap();
        assert_eq!(course.status, CourseStatus::Approved);
        assert_eq!(course.course_progress_id.as_deref(), Some(progress.id.as_str()));
    }

    #[tokio::test]
    async fn approving_twice_or_empty_is_refused() {
        let service = CourseService::new(collaborators(ScriptedModel::new(vec![])));
        let progress = approved(&service, 1).await;
        let err = service.approve(&progress.course_id, "u1").await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyApproved(_)));

        let empty = service.create_course("Queues", "systems").await.unwrap();
        let err = service.approve(&empty.id, "u1").await.unwrap_err();
        assert!(matches!(err, LifecycleError::EmptyPlan(_)));

        let err = service.set_plan(&progress.course_id, plan(2)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyApproved(_)));
    }

    #[tokio::test]
    async fn failed_approval_leaves_no_partial_records() {
        let inner = Arc::new(MemoryBlobStore::new());
        let store = Arc::new(FlakyStore::new(inner.clone()));
        let mut c = collaborators(ScriptedModel::new(vec![]));
        c.store = store.clone() as Arc<dyn BlobStore>;
        let service = CourseService::new(c);

        let course = service.create_course("Caching", "systems").await.unwrap();
        service.set_plan(&course.id, plan(2)).await.unwrap();
        let before = inner.keys().await;

        store.fail_writes_with_prefix("course-progress/").await;
        let err = service.approve(&course.id, "u1").await.unwrap_err();
        assert!(matches!(err, LifecycleError::ApprovalPartialFailure { .. }));

        assert_eq!(inner.keys().await, before);
        let course = service.load_course(&course.id).await.unwrap();
        assert_eq!(course.status, CourseStatus::Drafting);
    }

    #[tokio::test]
    async fn plan_drafted_during_approval_is_discarded() {
        let gated = Arc::new(GatedModel::new(
            "```json\n[{\"id\":\"9.9\",\"title\":\"Late plan\"}]\n```",
        ));
        let mut c = collaborators(ScriptedModel::new(vec![]));
        c.model = gated.clone();
        let service = Arc::new(CourseService::new(c));
        let course = service.create_course("Caching", "systems").await.unwrap();
        service.set_plan(&course.id, plan(2)).await.unwrap();

        let drafting = tokio::spawn({
            let service = Arc::clone(&service);
            let id = course.id.clone();
            async move { service.draft_plan(&id).await }
        });
        gated.entered.notified().await;

        let progress = service.approve(&course.id, "u1").await.unwrap();
        gated.release.notify_one();
        let err = drafting.await.unwrap().unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyApproved(_)));

        let stored = service.load_course(&course.id).await.unwrap();
        assert_eq!(stored.status, CourseStatus::Approved);
        assert_eq!(stored.plan, plan(2));
        assert_eq!(stored.course_progress_id.as_deref(), Some(progress.id.as_str()));
        assert!(matches!(
            service.approve(&course.id, "u2").await.unwrap_err(),
            LifecycleError::AlreadyApproved(_)
        ));
    }

    #[tokio::test]
    async fn concurrent_approvals_create_one_progress() {
        let service = Arc::new(CourseService::new(collaborators(ScriptedModel::new(vec![]))));
        let course = service.create_course("Caching", "systems").await.unwrap();
        service.set_plan(&course.id, plan(2)).await.unwrap();

        let attempts: Vec<_> = (0..4)
            .map(|i| {
                let service = Arc::clone(&service);
                let id = course.id.clone();
                tokio::spawn(async move { service.approve(&id, &format!("u{i}")).await })
            })
            .collect();
        let mut approved = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => approved += 1,
                Err(e) => assert!(matches!(e, LifecycleError::AlreadyApproved(_))),
            }
        }
        assert_eq!(approved, 1);
    }

    #[tokio::test]
    async fn released_sessions_are_pruned_and_reload_from_store() {
        let model = ScriptedModel::new(vec!["Noted.".into()]);
        let service = CourseService::new(collaborators(model));
        let progress = approved(&service, 2).await;
        let first = &progress.step_progress_ids[0];

        let session = service.open_step(first).await.unwrap();
        session.advance("hello").await.unwrap();
        drop(session);

        let _second = service.open_step(&progress.step_progress_ids[1]).await.unwrap();
        assert_eq!(service.sessions.lock().await.len(), 1);

        let reopened = service.open_step(first).await.unwrap();
        assert_eq!(reopened.current().await.turns.len(), 2);
    }

    #[tokio::test]
    async fn locked_step_rejects_messages() {
        let service = CourseService::new(collaborators(ScriptedModel::new(vec![])));
        let progress = approved(&service, 2).await;
        let session = service.open_step(&progress.step_progress_ids[1]).await.unwrap();
        let err = session.advance("teach me").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Sync(SyncError::StepLocked(_))));
        assert!(session.current().await.turns.is_empty());
    }

    #[tokio::test]
    async fn step_completion_unlocks_successor_and_finishes_course() {
        let model = ScriptedModel::new(vec![
            "Here is the idea.\n```json\n{\"lessonNodes\":[{\"id\":\"cache\",\"label\":\"Cache\"}],\"suggestions\":[\"Why?\"]}\n```".into(),
            "Well done!\n```json\n{\"stepCompleted\": true}\n```".into(),
            "Last one done.\n```json\n{\"stepCompleted\": true}\n```".into(),
        ]);
        let service = CourseService::new(collaborators(model));
        let progress = approved(&service, 2).await;
        let first = &progress.step_progress_ids[0];
        let second = &progress.step_progress_ids[1];

        let session = service.open_step(first).await.unwrap();
        let out = session.advance("teach me").await.unwrap();
        assert!(!out.step_completed);
        assert_eq!(out.suggestions, vec!["Why?"]);
        assert!(session.current().await.lesson_graph.contains_node("cache"));

        let out = session.advance("a cache keeps hot data close").await.unwrap();
        assert!(out.step_completed);
        let report = service.progress(&progress.id).await.unwrap();
        assert_eq!(statuses(&report), vec![StepStatus::Completed, StepStatus::Unlocked]);

        let next = service.open_step(second).await.unwrap();
        let out = next.advance("ok").await.unwrap();
        assert!(out.step_completed);
        let done = service.load_progress(&progress.id).await.unwrap();
        assert_eq!(done.status, ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn completed_steps_stay_chattable_without_recompleting() {
        let model = ScriptedModel::new(vec![
            "Done.\n```json\n{\"stepCompleted\": true}\n```".into(),
            "Still done.\n```json\n{\"stepCompleted\": true}\n```".into(),
        ]);
        let service = CourseService::new(collaborators(model));
        let progress = approved(&service, 2).await;
        let session = service.open_step(&progress.step_progress_ids[0]).await.unwrap();
        assert!(session.advance("1").await.unwrap().step_completed);
        let again = session.advance("2").await.unwrap();
        assert!(!again.step_completed);
        assert_eq!(session.current().await.turns.len(), 4);
    }

    #[tokio::test]
    async fn unlock_successor_requires_completed_predecessor() {
        let service = CourseService::new(collaborators(ScriptedModel::new(vec![])));
        let progress = approved(&service, 2).await;
        let err = service
            .unlock_successor(&progress.step_progress_ids[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Transition(TransitionError::PredecessorIncomplete { .. })
        ));
    }

    #[tokio::test]
    async fn reconcile_finishes_an_interrupted_unlock() {
        let service = CourseService::new(collaborators(ScriptedModel::new(vec![])));
        let progress = approved(&service, 2).await;
        let first_key = keys::step(&progress.step_progress_ids[0]);
        let mut first: StepProgress = read_json(service.store(), &first_key).await.unwrap().unwrap();
        first.complete().unwrap();
        write_json(service.store(), &first_key, &first).await.unwrap();

        let report = service.reconcile(&progress.id).await.unwrap();
        assert_eq!(statuses(&report), vec![StepStatus::Completed, StepStatus::Unlocked]);
    }

    #[tokio::test]
    async fn draft_plan_uses_knowledge_base_and_parses_reply() {
        let model = ScriptedModel::new(vec![
            "Sure!\n```json\n[{\"id\":\"1.1\",\"title\":\"What is a cache\"},{\"id\":\"1.2\",\"title\":\"Eviction\"}]\n```".into(),
        ]);
        let mut c = collaborators(model.clone());
        c.retriever = Arc::new(StaticRetriever::new(vec!["LRU evicts the oldest entry.".into()]));
        let service = CourseService::new(c);
        let course = service.create_course("Caching", "systems").await.unwrap();

        let drafted = service.draft_plan(&course.id).await.unwrap();
        assert_eq!(drafted.status, CourseStatus::Drafting);
        assert_eq!(drafted.plan.len(), 2);
        assert_eq!(drafted.plan[1].title, "Eviction");

        let sent = model.requests().await;
        assert!(sent[0].message.contains("LRU evicts the oldest entry."));
        assert!(sent[0].history.is_empty());
    }

    #[tokio::test]
    async fn draft_plan_failure_keeps_course_untouched() {
        let model = ScriptedModel::new(vec!["I cannot help with that.".into()]);
        let service = CourseService::new(collaborators(model));
        let course = service.create_course("Caching", "systems").await.unwrap();
        let err = service.draft_plan(&course.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Plan(PlanParseError::NoArray)));
        assert!(service.load_course(&course.id).await.unwrap().plan.is_empty());
    }

    #[tokio::test]
    async fn empty_topic_and_missing_course() {
        let service = CourseService::new(collaborators(ScriptedModel::new(vec![])));
        assert!(matches!(
            service.create_course("  ", "kb").await.unwrap_err(),
            LifecycleError::EmptyTopic
        ));
        assert!(matches!(
            service.load_course("ghost").await.unwrap_err(),
            LifecycleError::NotFound(_)
        ));
        assert!(matches!(
            service.open_step("ghost").await.err(),
            Some(LifecycleError::NotFound(_))
        ));
    }
}
