//! Question engine: pure functions over the question table.
//!
//! Nothing here touches the network or the store. The same inputs always
//! produce the same outputs, which lets the store run the engine
//! optimistically and then reconcile with the server's answer.

use std::collections::BTreeMap;

use super::model::{Answer, AnswerRecord, DataEntryTask, Progress};
use super::questions::{EntityKind, ItemizeRule, QuestionId, QuestionKind, itemize_rule};
use crate::error::ValidationError;

/// Step that follows `current`, or `None` after the last step or for an
/// unknown id.
pub fn next_question(current: &str) -> Option<QuestionId> {
    current.parse::<QuestionId>().ok()?.next()
}

/// Step that precedes `current`, or `None` at the first step or for an
/// unknown id.
pub fn previous_question(current: &str) -> Option<QuestionId> {
    current.parse::<QuestionId>().ok()?.previous()
}

/// Position of `current` in the flow.
///
/// With no state the flow has not started: step 0 of 15. Unknown ids count
/// as the first step.
pub fn progress(current: Option<&str>) -> Progress {
    let total = QuestionId::all().len();
    let Some(current) = current else {
        return Progress {
            current_step: 0,
            total_steps: total,
            percentage: 0.0,
        };
    };

    let idx = current
        .parse::<QuestionId>()
        .map(|q| q.index())
        .unwrap_or(0);
    let percentage = if total > 1 {
        idx as f64 / (total - 1) as f64 * 100.0
    } else {
        0.0
    };

    Progress {
        current_step: idx + 1,
        total_steps: total,
        percentage: (percentage * 10.0).round() / 10.0,
    }
}

/// Reject counts outside 1..=50 and options the question does not offer.
pub fn validate_answer(question: QuestionId, record: &AnswerRecord) -> Result<(), ValidationError> {
    record.validate()?;

    let def = question.definition();
    if def.kind == QuestionKind::Info {
        return Ok(());
    }
    for value in record.answer.values() {
        if def.option(value).is_none() {
            return Err(ValidationError::UnknownOption {
                question: question.to_string(),
                option: value.to_string(),
            });
        }
    }
    Ok(())
}

/// A "how many X do you have?" sub-step still owed before submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemizePrompt {
    pub option: String,
    pub rule: &'static ItemizeRule,
}

impl ItemizePrompt {
    pub fn prompt(&self) -> &'static str {
        self.rule.prompt
    }
}

/// Which selected options still need a count.
///
/// A yes/no "yes" without `count` needs one; a multi-select needs one per
/// itemizable option missing from `counts`.
pub fn needs_itemization(
    question: QuestionId,
    answer: &Answer,
    count: Option<u32>,
    counts: Option<&BTreeMap<String, u32>>,
) -> Vec<ItemizePrompt> {
    let def = question.definition();
    let prompt_for = |value: &str| {
        itemize_rule(question, value).map(|rule| ItemizePrompt {
            option: value.to_string(),
            rule,
        })
    };

    match (def.kind, answer) {
        (QuestionKind::YesNo, Answer::Single(value)) if count.is_none() => {
            prompt_for(value).into_iter().collect()
        }
        (QuestionKind::MultiSelect, Answer::Multi(values)) => values
            .iter()
            .filter(|v| counts.is_none_or(|c| !c.contains_key(v.as_str())))
            .filter_map(|v| prompt_for(v))
            .collect(),
        _ => Vec::new(),
    }
}

/// A task the engine predicts the server will generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    pub entity: EntityKind,
    pub category: &'static str,
    pub default_name: String,
}

impl TaskTemplate {
    fn plain(rule: &ItemizeRule) -> Self {
        Self {
            entity: rule.entity,
            category: rule.category,
            default_name: rule.default_name.to_string(),
        }
    }

    fn numbered(rule: &ItemizeRule, n: u32) -> impl Iterator<Item = Self> + '_ {
        (1..=n).map(move |i| Self {
            entity: rule.entity,
            category: rule.category,
            default_name: format!("{} {i}", rule.default_name),
        })
    }

    /// Turn the template into an unconfirmed local task.
    pub fn into_placeholder(self, id: String, source: QuestionId) -> DataEntryTask {
        DataEntryTask {
            id,
            entity: self.entity,
            category: self.category.to_string(),
            default_name: self.default_name,
            is_completed: false,
            entity_id: None,
            source_question: Some(source),
            pending: true,
        }
    }
}

/// Expand an answer into task templates, in answer order then instance order.
///
/// - multi-select with a non-empty `counts`: N numbered tasks per counted
///   option, one plain task per uncounted option;
/// - single answer with `count`: N numbered tasks;
/// - otherwise: one plain task per selected option.
///
/// Options without a rule produce nothing.
pub fn expand_tasks(
    question: QuestionId,
    answer: &Answer,
    count: Option<u32>,
    counts: Option<&BTreeMap<String, u32>>,
) -> Vec<TaskTemplate> {
    let counts = counts.filter(|c| !c.is_empty());

    match (answer, count, counts) {
        (Answer::Multi(values), _, Some(counts)) => values
            .iter()
            .filter_map(|v| itemize_rule(question, v).map(|rule| (v, rule)))
            .flat_map(|(v, rule)| match counts.get(v.as_str()) {
                Some(&n) => TaskTemplate::numbered(rule, n).collect::<Vec<_>>(),
                None => vec![TaskTemplate::plain(rule)],
            })
            .collect(),
        (Answer::Single(value), Some(n), _) => itemize_rule(question, value)
            .map(|rule| TaskTemplate::numbered(rule, n).collect())
            .unwrap_or_default(),
        _ => answer
            .values()
            .into_iter()
            .filter_map(|v| itemize_rule(question, v))
            .map(TaskTemplate::plain)
            .collect(),
    }
}

/// Expand a stored answer record.
pub fn expand_record(question: QuestionId, record: &AnswerRecord) -> Vec<TaskTemplate> {
    expand_tasks(question, &record.answer, record.count, record.counts.as_ref())
}

/// The question whose rules produce tasks of this kind and category.
///
/// Categories are unique per entity kind, so server tasks that arrive
/// without local bookkeeping can still be traced to their question.
pub fn source_question_for(entity: EntityKind, category: &str) -> Option<QuestionId> {
    QuestionId::all().iter().copied().find(|q| {
        q.definition().options.iter().any(|o| {
            o.itemize
                .as_ref()
                .is_some_and(|r| r.entity == entity && r.category == category)
        })
    })
}
