use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::mood::Mood;
use crate::models::todo::TodoItem;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DayEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_date: NaiveDate,
    pub mood_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    pub date: NaiveDate,

    pub mood_id: Option<Uuid>,

    #[serde(default)]
    #[validate(length(max = 10000, message = "Description must be under 10000 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEntryRequest {
    pub date: Option<NaiveDate>,

    pub mood_id: Option<Uuid>,

    #[validate(length(max = 10000, message = "Description must be under 10000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Entry as returned to clients: row fields plus the resolved mood and todos.
#[derive(Debug, Serialize)]
pub struct EntryDetail {
    #[serde(flatten)]
    pub entry: DayEntry,
    pub mood: Option<Mood>,
    pub todos: Vec<TodoItem>,
}
