//! OnboardingStore: local mirror of the onboarding flow with optimistic
//! updates against the backend.
//!
//! Every mutation follows the same shape: snapshot, apply locally,
//! broadcast, call the backend, then reconcile with its answer or restore
//! the snapshot. Mutations are serialized so a rollback never clobbers a
//! concurrent change.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{self, ItemizePrompt};
use super::model::{
    Answer, AnswerRecord, AnswerRequest, DataEntryTask, HouseholdType, OnboardingState,
    OnboardingStatus, Progress, TaskCompleteRequest,
};
use super::questions::QuestionId;
use crate::api::OnboardingApi;
use crate::error::{ApiError, Result, StoreError};
use crate::events::{DEFAULT_BROADCAST_CAPACITY, StoreEvent};
use crate::store::{self, Cache, snapshot_keys};

/// Result of answering a question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub next_question_id: Option<String>,
    /// Tasks generated by this answer (server ids once reconciled).
    pub tasks: Vec<DataEntryTask>,
    /// The same answer was already recorded; no request was sent.
    pub replayed: bool,
}

pub struct OnboardingStore {
    api: Arc<dyn OnboardingApi>,
    cache: Arc<dyn Cache>,
    user_id: String,
    state: RwLock<Option<OnboardingState>>,
    write_lock: Mutex<()>,
    tx: broadcast::Sender<StoreEvent>,
}

impl OnboardingStore {
    pub fn new(
        api: Arc<dyn OnboardingApi>,
        cache: Arc<dyn Cache>,
        user_id: impl Into<String>,
    ) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            api,
            cache,
            user_id: user_id.into(),
            state: RwLock::new(None),
            write_lock: Mutex::new(()),
            tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Load the last persisted state from the local cache. Returns whether
    /// anything was found.
    pub async fn hydrate(&self) -> bool {
        let cached: Option<OnboardingState> = store::load_json(
            self.cache.as_ref(),
            &self.user_id,
            snapshot_keys::ONBOARDING_STATE,
        )
        .await;

        let Some(mut state) = cached else {
            return false;
        };
        // Placeholders never outlive the request that created them.
        state.tasks.retain(|t| !t.pending);
        debug!(step = %state.current_step_id, tasks = state.tasks.len(), "Onboarding hydrated from cache");
        *self.state.write().await = Some(state);
        self.notify().await;
        true
    }

    /// Fetch (or create) the server state and replace the local copy.
    pub async fn start(&self) -> Result<OnboardingState> {
        let _guard = self.write_lock.lock().await;

        let mut state = self.api.get_state().await?;
        for task in &mut state.tasks {
            if task.source_question.is_none() {
                task.source_question = engine::source_question_for(task.entity, &task.category);
            }
        }

        let mut guard = self.state.write().await;
        if let Some(previous) = guard.as_mut() {
            state.answer_tasks = std::mem::take(&mut previous.answer_tasks);
        }
        info!(
            step = %state.current_step_id,
            tasks = state.tasks.len(),
            complete = state.is_complete,
            "Onboarding state loaded"
        );
        *guard = Some(state.clone());
        drop(guard);
        self.notify().await;
        self.persist().await;
        Ok(state)
    }

    // ── Answers ─────────────────────────────────────────────────────

    /// Record an answer and generate its data-entry tasks.
    ///
    /// Re-answering identically is a local no-op that only advances the
    /// step. A changed answer replaces the question's uncompleted tasks.
    pub async fn answer(
        &self,
        question: QuestionId,
        answer: Answer,
        count: Option<u32>,
        counts: Option<BTreeMap<String, u32>>,
    ) -> Result<AnswerOutcome> {
        let record = AnswerRecord::new(answer, count, counts);
        engine::validate_answer(question, &record)?;
        let expected = engine::expand_record(question, &record);

        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await?;

        if let Some(outcome) = self.try_replay(question, &record, expected.len()).await {
            info!(question = %question, "Answer unchanged, skipping request");
            self.notify().await;
            self.persist().await;
            return Ok(outcome);
        }

        // Optimistic phase.
        let superseded: Vec<String> = {
            let mut guard = self.state.write().await;
            let state = guard.as_mut().ok_or(StoreError::NotStarted)?;

            let superseded = state
                .tasks
                .iter()
                .filter(|t| !t.is_completed && !t.pending && t.source_question == Some(question))
                .map(|t| t.id.clone())
                .collect();
            state
                .tasks
                .retain(|t| t.is_completed || t.source_question != Some(question));
            state.tasks.extend(
                expected
                    .into_iter()
                    .map(|t| t.into_placeholder(format!("pending-{}", Uuid::new_v4()), question)),
            );
            state.answers.insert(question.to_string(), record.clone());
            if let Some(next) = engine::next_question(question.as_str()) {
                state.current_step_id = next.to_string();
            }
            state.updated_at = Utc::now();
            superseded
        };
        self.notify().await;

        // Remote phase.
        let request = AnswerRequest {
            question_id: question,
            answer: record.answer.clone(),
            count: record.count,
            counts: record.counts.clone(),
        };
        let response = match self.api.answer(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.roll_back(snapshot, "answer", &e).await;
                return Err(e.into());
            }
        };

        let tasks: Vec<DataEntryTask> = response
            .tasks_generated
            .into_iter()
            .map(|mut t| {
                t.source_question = Some(question);
                t.pending = false;
                t
            })
            .collect();
        {
            let mut guard = self.state.write().await;
            if let Some(state) = guard.as_mut() {
                state
                    .tasks
                    .retain(|t| !(t.pending && t.source_question == Some(question)));
                state.tasks.extend(tasks.iter().cloned());
                state
                    .answer_tasks
                    .insert(question.to_string(), tasks.iter().map(|t| t.id.clone()).collect());
                if let Some(next) = &response.next_question_id {
                    state.current_step_id = next.clone();
                }
                state.updated_at = Utc::now();
            }
        }
        info!(question = %question, tasks = tasks.len(), "Answer reconciled");

        // The server appends on every answer; retire what the new answer replaced.
        for task_id in &superseded {
            if let Err(e) = self.api.skip_task(task_id).await {
                warn!(task_id = %task_id, "Failed to retire superseded task: {}", e);
            }
        }

        self.notify().await;
        self.persist().await;

        Ok(AnswerOutcome {
            next_question_id: response.next_question_id,
            tasks,
            replayed: false,
        })
    }

    /// Identical answer whose tasks still exist: advance locally.
    ///
    /// When the ids generated by the accepted answer are known, all of them
    /// must still be present. Otherwise (state from before they were
    /// tracked) the question must hold at least as many tasks as the answer
    /// expands to; earlier answers may have left completed tasks behind.
    async fn try_replay(
        &self,
        question: QuestionId,
        record: &AnswerRecord,
        expected_tasks: usize,
    ) -> Option<AnswerOutcome> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut()?;
        if state.answers.get(question.as_str()) != Some(record) {
            return None;
        }

        let tasks: Vec<DataEntryTask> = match state.answer_tasks.get(question.as_str()) {
            Some(ids) => {
                let tasks: Vec<DataEntryTask> =
                    ids.iter().filter_map(|id| state.task(id)).cloned().collect();
                if tasks.len() != ids.len() || ids.len() != expected_tasks {
                    return None;
                }
                tasks
            }
            None => {
                let tasks: Vec<DataEntryTask> = state.tasks_from(question).cloned().collect();
                if tasks.len() < expected_tasks {
                    return None;
                }
                tasks
            }
        };

        let next = engine::next_question(question.as_str());
        if let Some(next) = next {
            state.current_step_id = next.to_string();
            state.updated_at = Utc::now();
        }
        Some(AnswerOutcome {
            next_question_id: next.map(|q| q.to_string()),
            tasks,
            replayed: true,
        })
    }

    pub async fn set_household(&self, household_type: HouseholdType) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await?;

        self.mutate(|state| state.household_type = Some(household_type))
            .await?;

        if let Err(e) = self.api.set_household(household_type).await {
            self.roll_back(snapshot, "set_household", &e).await;
            return Err(e.into());
        }
        info!(household = %household_type, "Household type set");
        self.persist().await;
        Ok(())
    }

    // ── Tasks ───────────────────────────────────────────────────────

    /// Fill in a task, creating its asset or liability. Returns the new
    /// entity id.
    pub async fn complete_task(
        &self,
        task_id: &str,
        name: &str,
        value: Decimal,
        interest_rate: Option<Decimal>,
    ) -> Result<String> {
        let request = TaskCompleteRequest {
            task_id: task_id.to_string(),
            name: name.trim().to_string(),
            value,
            interest_rate,
        };
        request.validate()?;

        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await?;
        self.require_task(task_id).await?;

        self.mutate(|state| {
            state.resolve_task(task_id, None);
        })
        .await?;

        let response = match self.api.complete_task(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.roll_back(snapshot, "complete_task", &e).await;
                return Err(e.into());
            }
        };

        self.mutate(|state| {
            state.resolve_task(task_id, Some(response.entity_id.clone()));
        })
        .await?;
        info!(task_id, entity_id = %response.entity_id, "Task completed");
        self.persist().await;
        Ok(response.entity_id)
    }

    /// Mark a task done without creating anything.
    pub async fn skip_task(&self, task_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await?;
        self.require_task(task_id).await?;

        self.mutate(|state| {
            state.resolve_task(task_id, None);
        })
        .await?;

        if let Err(e) = self.api.skip_task(task_id).await {
            self.roll_back(snapshot, "skip_task", &e).await;
            return Err(e.into());
        }
        info!(task_id, "Task skipped");
        self.persist().await;
        Ok(())
    }

    async fn require_task(&self, task_id: &str) -> Result<()> {
        let guard = self.state.read().await;
        match guard.as_ref().and_then(|s| s.task(task_id)) {
            Some(task) if !task.pending => Ok(()),
            _ => Err(StoreError::TaskNotFound {
                id: task_id.to_string(),
            }
            .into()),
        }
    }

    // ── Navigation ──────────────────────────────────────────────────

    pub async fn go_to_step(&self, step: QuestionId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await?;

        self.mutate(|state| state.current_step_id = step.to_string())
            .await?;

        if let Err(e) = self.api.go_to_step(step.as_str()).await {
            self.roll_back(snapshot, "go_to_step", &e).await;
            return Err(e.into());
        }
        debug!(step = %step, "Moved to step");
        self.persist().await;
        Ok(())
    }

    /// Step back one question. Returns the new step, or `None` at the start.
    pub async fn go_back(&self) -> Result<Option<QuestionId>> {
        let current = {
            let guard = self.state.read().await;
            let state = guard.as_ref().ok_or(StoreError::NotStarted)?;
            state.current_step_id.clone()
        };
        match engine::previous_question(&current) {
            Some(previous) => {
                self.go_to_step(previous).await?;
                Ok(Some(previous))
            }
            None => Ok(None),
        }
    }

    /// Finalize onboarding.
    pub async fn complete(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.snapshot().await?;

        self.api.complete().await?;
        self.mutate(|state| state.is_complete = true).await?;
        info!("Onboarding complete");
        self.persist().await;
        Ok(())
    }

    /// Start over. The backend also deletes all assets and liabilities.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.api.reset().await?;
        *self.state.write().await = None;
        store::forget(
            self.cache.as_ref(),
            &self.user_id,
            snapshot_keys::ONBOARDING_STATE,
        )
        .await;
        info!("Onboarding reset");
        self.notify().await;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub async fn state(&self) -> Option<OnboardingState> {
        self.state.read().await.clone()
    }

    pub async fn current_question(&self) -> Option<QuestionId> {
        self.state
            .read()
            .await
            .as_ref()
            .and_then(|s| s.current_question())
    }

    /// Progress computed locally from the current step.
    pub async fn progress(&self) -> Progress {
        let guard = self.state.read().await;
        engine::progress(guard.as_ref().map(|s| s.current_step_id.as_str()))
    }

    /// Uncompleted tasks, in generation order.
    pub async fn pending_tasks(&self) -> Vec<DataEntryTask> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.pending_tasks().cloned().collect())
            .unwrap_or_default()
    }

    /// "How many?" prompts still owed for a draft answer.
    pub fn remaining_itemizations(
        &self,
        question: QuestionId,
        answer: &Answer,
        count: Option<u32>,
        counts: Option<&BTreeMap<String, u32>>,
    ) -> Vec<ItemizePrompt> {
        engine::needs_itemization(question, answer, count, counts)
    }

    /// Whether every generated task has been completed or skipped.
    pub async fn all_tasks_resolved(&self) -> bool {
        self.state
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.tasks.iter().all(|t| t.is_completed))
    }

    /// Server-side progress. Logs a warning if it disagrees with the local step.
    pub async fn fetch_progress(&self) -> Result<Progress> {
        let remote = self.api.get_progress().await?;
        let local = self.progress().await;
        if remote.current_step != local.current_step {
            warn!(
                local = local.current_step,
                remote = remote.current_step,
                "Onboarding progress out of sync with server"
            );
        }
        Ok(remote)
    }

    pub async fn fetch_status(&self) -> Result<OnboardingStatus> {
        Ok(self.api.get_status().await?)
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Clone the current state, failing if onboarding has not started.
    async fn snapshot(&self) -> Result<OnboardingState> {
        self.state
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::NotStarted.into())
    }

    async fn mutate(&self, f: impl FnOnce(&mut OnboardingState)) -> Result<()> {
        {
            let mut guard = self.state.write().await;
            let state = guard.as_mut().ok_or(StoreError::NotStarted)?;
            f(state);
            state.updated_at = Utc::now();
        }
        self.notify().await;
        Ok(())
    }

    async fn roll_back(&self, snapshot: OnboardingState, operation: &str, error: &ApiError) {
        *self.state.write().await = Some(snapshot);
        warn!(operation, error = %error, "Rolled back optimistic onboarding change");
        let _ = self.tx.send(StoreEvent::OnboardingRolledBack {
            operation: operation.to_string(),
            reason: error.to_string(),
        });
    }

    async fn notify(&self) {
        let event = {
            let guard = self.state.read().await;
            StoreEvent::OnboardingChanged {
                current_step_id: guard.as_ref().map(|s| s.current_step_id.clone()),
                pending_tasks: guard.as_ref().map_or(0, |s| s.pending_tasks().count()),
            }
        };
        let _ = self.tx.send(event);
    }

    async fn persist(&self) {
        let guard = self.state.read().await;
        if let Some(state) = guard.as_ref() {
            store::persist_json(
                self.cache.as_ref(),
                &self.user_id,
                snapshot_keys::ONBOARDING_STATE,
                state,
            )
            .await;
        }
    }
}
