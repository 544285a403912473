use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::mood::{CreateMoodRequest, Mood, UpdateMoodRequest};
use crate::AppState;

/// Anyone can read the catalog, logged in or not.
pub async fn list_moods(State(state): State<AppState>) -> AppResult<Json<Vec<Mood>>> {
    let moods = sqlx::query_as::<_, Mood>("SELECT * FROM moods ORDER BY name ASC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(moods))
}

pub async fn create_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateMoodRequest>,
) -> AppResult<(StatusCode, Json<Mood>)> {
    require_staff(&state.db, auth_user.id).await?;
    body.validate()?;

    let mood = sqlx::query_as::<_, Mood>(
        "INSERT INTO moods (name, icon) VALUES ($1, $2) RETURNING *",
    )
    .bind(&body.name)
    .bind(&body.icon)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(mood)))
}

pub async fn update_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(mood_id): Path<Uuid>,
    Json(body): Json<UpdateMoodRequest>,
) -> AppResult<Json<Mood>> {
    require_staff(&state.db, auth_user.id).await?;
    body.validate()?;

    let mood = sqlx::query_as::<_, Mood>(
        r#"
        UPDATE moods SET
            name = COALESCE($2, name),
            icon = COALESCE($3, icon)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(mood_id)
    .bind(&body.name)
    .bind(&body.icon)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Mood not found".into()))?;

    Ok(Json(mood))
}

pub async fn delete_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(mood_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    require_staff(&state.db, auth_user.id).await?;

    // Entries referencing this mood fall back to NULL via the FK.
    let result = sqlx::query("DELETE FROM moods WHERE id = $1")
        .bind(mood_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Mood not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Catalog writes are for staff accounts only.
async fn require_staff(db: &PgPool, user_id: Uuid) -> AppResult<()> {
    let is_staff = sqlx::query_scalar::<_, bool>("SELECT is_staff FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .unwrap_or(false);

    if !is_staff {
        return Err(AppError::Forbidden);
    }
    Ok(())
}
