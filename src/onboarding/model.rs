//! Onboarding data models: answers, generated tasks and the mirrored state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use super::questions::EntityKind;
use super::questions::QuestionId;

/// Upper bound for any itemization count.
pub const MAX_ITEM_COUNT: u32 = 50;

/// Who the user is tracking finances for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdType {
    Individual,
    Couple,
    Family,
}

impl std::fmt::Display for HouseholdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Couple => write!(f, "couple"),
            Self::Family => write!(f, "family"),
        }
    }
}

/// A question's answer: one option value or a multi-select list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multi(Vec<String>),
}

impl Answer {
    /// Selected option values, in answer order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Answer {
    fn from(v: &str) -> Self {
        Self::Single(v.to_string())
    }
}

impl From<Vec<&str>> for Answer {
    fn from(vs: Vec<&str>) -> Self {
        Self::Multi(vs.into_iter().map(String::from).collect())
    }
}

/// Stored answer payload: the answer plus its itemization counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "StoredAnswer")]
pub struct AnswerRecord {
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<BTreeMap<String, u32>>,
}

impl AnswerRecord {
    pub fn new(answer: Answer, count: Option<u32>, counts: Option<BTreeMap<String, u32>>) -> Self {
        Self {
            answer,
            count,
            counts,
        }
    }

    /// Check counts against the 1..=50 range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(count) = self.count {
            if !(1..=MAX_ITEM_COUNT).contains(&count) {
                return Err(ValidationError::Count);
            }
        }
        if let Some(counts) = &self.counts {
            for (option, count) in counts {
                if !(1..=MAX_ITEM_COUNT).contains(count) {
                    return Err(ValidationError::CountFor {
                        option: option.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Answers arrive either bare or wrapped (`{"answer": .., "count": ..}`).
/// `Bare` goes first: a one-element list must not be read as a positional record.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAnswer {
    Bare(Answer),
    Record {
        answer: Answer,
        #[serde(default)]
        count: Option<u32>,
        #[serde(default)]
        counts: Option<BTreeMap<String, u32>>,
    },
}

impl From<StoredAnswer> for AnswerRecord {
    fn from(raw: StoredAnswer) -> Self {
        match raw {
            StoredAnswer::Record {
                answer,
                count,
                counts,
            } => Self::new(answer, count, counts),
            StoredAnswer::Bare(answer) => Self::new(answer, None, None),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One itemized instance the user must fill in (or skip).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataEntryTask {
    pub id: String,
    #[serde(rename = "type")]
    pub entity: EntityKind,
    pub category: String,
    pub default_name: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Question that generated this task. Local bookkeeping only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_question: Option<QuestionId>,
    /// Optimistic placeholder not yet confirmed by the server.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pending: bool,
}

/// Mirror of the server's onboarding state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingState {
    pub id: String,
    pub current_step_id: String,
    #[serde(default)]
    pub household_type: Option<HouseholdType>,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerRecord>,
    #[serde(default)]
    pub tasks: Vec<DataEntryTask>,
    #[serde(default)]
    pub completed_task_ids: Vec<String>,
    #[serde(default)]
    pub is_complete: bool,
    /// Task ids generated by the latest accepted answer to each question.
    /// Local bookkeeping only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub answer_tasks: BTreeMap<String, Vec<String>>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl OnboardingState {
    /// Current step, if it names a known question.
    pub fn current_question(&self) -> Option<QuestionId> {
        self.current_step_id.parse().ok()
    }

    /// Tasks not yet completed or skipped, in generation order.
    pub fn pending_tasks(&self) -> impl Iterator<Item = &DataEntryTask> {
        self.tasks.iter().filter(|t| !t.is_completed)
    }

    pub fn task(&self, id: &str) -> Option<&DataEntryTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Confirmed tasks attributed to a question, completed or not.
    pub fn tasks_from(&self, question: QuestionId) -> impl Iterator<Item = &DataEntryTask> {
        self.tasks
            .iter()
            .filter(move |t| t.source_question == Some(question) && !t.pending)
    }

    fn task_mut(&mut self, id: &str) -> Option<&mut DataEntryTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Mark a task resolved, optionally linking the created entity.
    /// Returns false if the task is unknown.
    pub fn resolve_task(&mut self, id: &str, entity_id: Option<String>) -> bool {
        let Some(task) = self.task_mut(id) else {
            return false;
        };
        task.is_completed = true;
        if entity_id.is_some() {
            task.entity_id = entity_id;
        }
        if !self.completed_task_ids.iter().any(|c| c == id) {
            self.completed_task_ids.push(id.to_string());
        }
        self.updated_at = Utc::now();
        true
    }
}

/// Step position within the flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub current_step: usize,
    pub total_steps: usize,
    pub percentage: f64,
}

/// Body of `POST /onboarding/answer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<BTreeMap<String, u32>>,
}

/// Response of `POST /onboarding/answer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    #[serde(default)]
    pub next_question_id: Option<String>,
    #[serde(default)]
    pub tasks_generated: Vec<DataEntryTask>,
}

/// Body of `POST /onboarding/task/complete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCompleteRequest {
    pub task_id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub interest_rate: Option<Decimal>,
}

impl TaskCompleteRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if self.value < Decimal::ZERO {
            return Err(ValidationError::Negative { field: "value" });
        }
        validate_interest_rate(self.interest_rate)
    }
}

/// Response of `POST /onboarding/task/complete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCompleteResponse {
    pub status: String,
    pub entity_id: String,
}

/// Response of `GET /onboarding/status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OnboardingStatus {
    pub is_complete: bool,
}

/// Name must be 1..=255 characters.
pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > 255 {
        return Err(ValidationError::Name);
    }
    Ok(())
}

/// Interest rate, when present, must be within 0..=100.
pub(crate) fn validate_interest_rate(rate: Option<Decimal>) -> Result<(), ValidationError> {
    match rate {
        Some(r) if r < Decimal::ZERO || r > Decimal::ONE_HUNDRED => {
            Err(ValidationError::InterestRate)
        }
        _ => Ok(()),
    }
}
