use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, persisted conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub id: Uuid,
    pub name: String,
    pub goal: Option<u32>,
    pub created_at: NaiveDateTime,
}

/// Name and goal of a filter, used both for creation and full-replace edits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterDraft {
    pub name: String,
    pub goal: Option<u32>,
}

impl FilterDraft {
    pub fn new(name: impl Into<String>, goal: Option<u32>) -> Self {
        Self {
            name: name.into(),
            goal,
        }
    }
}
