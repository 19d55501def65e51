//! Todo data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            completed: false,
            created_at: Utc::now(),
        }
    }
}

/// Payload for creating a todo.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTodo {
    pub title: String,
}

impl CreateTodo {
    /// Trimmed title, or an error message when it is blank or too long.
    pub fn validated_title(&self) -> Result<&str, String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("title must not be empty".to_string());
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!("title must be at most {MAX_TITLE_CHARS} characters"));
        }
        Ok(title)
    }
}

pub const MAX_TITLE_CHARS: usize = 500;
