use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TodoItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub day_entry_id: Option<Uuid>,
    pub content: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTodoRequest {
    #[validate(length(min = 1, max = 255, message = "Content must be 1-255 characters"))]
    pub content: String,

    pub day_entry_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTodoRequest {
    #[validate(length(min = 1, max = 255, message = "Content must be 1-255 characters"))]
    pub content: Option<String>,

    pub is_done: Option<bool>,

    pub day_entry_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TodoQuery {
    pub day_entry_id: Option<Uuid>,
}
