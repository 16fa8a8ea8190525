//! Partial item updates.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Priority, TodoStatus, TrackedItem};
use crate::validate::{validate_deadline, validate_text, validate_urgency};

/// A partial update to a tracked item. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ItemPatch {
    pub text: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub labels: Option<Vec<String>>,
    #[serde(alias = "deadlineISO")]
    pub deadline: Option<String>,
    pub urgency_score: Option<f64>,
    pub line: Option<u32>,
}

/// A patch whose every field has been checked and canonicalized.
#[derive(Debug, Clone, Default)]
pub(crate) struct ValidPatch {
    text: Option<String>,
    status: Option<TodoStatus>,
    priority: Option<Priority>,
    labels: Option<Vec<String>>,
    deadline: Option<String>,
    urgency_score: Option<f64>,
    line: Option<u32>,
}

impl ItemPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check every field; nothing is applied unless all of them pass.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the first bad field.
    pub(crate) fn validate(&self) -> Result<ValidPatch> {
        if self.is_empty() {
            return Err(Error::Validation("edit has no fields to change".into()));
        }

        let text = self
            .text
            .as_deref()
            .map(validate_text)
            .transpose()
            .map_err(Error::Validation)?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<TodoStatus>)
            .transpose()
            .map_err(Error::Validation)?;
        let priority = self
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()
            .map_err(Error::Validation)?;
        let deadline = self
            .deadline
            .as_deref()
            .map(validate_deadline)
            .transpose()
            .map_err(Error::Validation)?;
        let urgency_score = self
            .urgency_score
            .map(validate_urgency)
            .transpose()
            .map_err(Error::Validation)?;
        if self.line == Some(0) {
            return Err(Error::Validation("line must be at least 1".into()));
        }
        let labels = self.labels.as_ref().map(|labels| {
            let mut cleaned: Vec<String> = labels
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            cleaned.dedup();
            cleaned
        });

        Ok(ValidPatch {
            text,
            status,
            priority,
            labels,
            deadline,
            urgency_score,
            line: self.line,
        })
    }
}

impl ValidPatch {
    pub(crate) fn apply_to(self, item: &mut TrackedItem) {
        if let Some(text) = self.text {
            item.text = text;
        }
        if let Some(status) = self.status {
            item.status = status;
            item.extra.remove("autoResolved");
        }
        if let Some(priority) = self.priority {
            item.priority = Some(priority);
        }
        if let Some(labels) = self.labels {
            item.labels = labels;
        }
        if let Some(deadline) = self.deadline {
            item.deadline = Some(deadline);
        }
        if let Some(score) = self.urgency_score {
            item.urgency_score = Some(score);
        }
        if let Some(line) = self.line {
            item.line = line;
        }
    }
}
