use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::Entity;
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub label: String,
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
}

impl Task {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            completed: false,
            due_date: None,
        }
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    /// Open and past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.completed {
            return false;
        }
        self.due_date.is_some_and(|due| due < today)
    }

    /// Open and due today or earlier.
    pub fn is_today(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due <= today)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// `Some(None)` clears the due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn due_date(due_date: Option<NaiveDate>) -> Self {
        Self {
            due_date: Some(due_date),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskToggle {
    Completed,
}

impl Entity for Task {
    type Patch = TaskPatch;
    type Toggle = TaskToggle;

    const KIND: &'static str = "task";
    const COLLECTION: &'static str = "tasks";
    const CACHE_KEY: &'static str = "nook.tasks";

    fn seed() -> Vec<Self> {
        vec![
            Task::new("Welcome to your dashboard"),
            Task::new("Add a quick link to a site you visit daily"),
            Task::new("Check off a habit for today"),
        ]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.label.trim().is_empty() {
            return Err(ValidationError::empty("label"));
        }
        Ok(())
    }

    fn apply(&mut self, patch: &TaskPatch) {
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }

    fn toggle_patch(&self, field: TaskToggle) -> Result<TaskPatch, ValidationError> {
        match field {
            TaskToggle::Completed => Ok(TaskPatch::completed(!self.completed)),
        }
    }
}
