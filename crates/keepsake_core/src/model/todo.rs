//! Wishlist/todo model.

use super::{new_record_id, Collection, Record};
use serde::{Deserialize, Serialize};

/// Fixed set of todo categories offered by the wishlist view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoCategory {
    Travel,
    Food,
    Date,
    Home,
    Gift,
    Other,
}

impl TodoCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Food => "food",
            Self::Date => "date",
            Self::Home => "home",
            Self::Gift => "gift",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "travel" => Some(Self::Travel),
            "food" => Some(Self::Food),
            "date" => Some(Self::Date),
            "home" => Some(Self::Home),
            "gift" => Some(Self::Gift),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TodoCategory>,
}

impl TodoItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            text: text.into(),
            completed: false,
            notes: None,
            category: None,
        }
    }

    pub fn toggle(&mut self) {
        self.completed = !self.completed;
    }
}

impl Record for TodoItem {
    const COLLECTION: Collection = Collection::Todos;

    fn id(&self) -> &str {
        &self.id
    }
}
