use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Shared lookup row referenced by day entries; not owned by any user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mood {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMoodRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    /// Short glyph shown next to the name, typically an emoji.
    #[serde(default)]
    #[validate(length(max = 10, message = "Icon must be at most 10 characters"))]
    pub icon: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMoodRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 10, message = "Icon must be at most 10 characters"))]
    pub icon: Option<String>,
}
