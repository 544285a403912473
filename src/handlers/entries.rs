use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::entry::{
    CreateEntryRequest, DayEntry, EntryDetail, EntryQuery, UpdateEntryRequest,
};
use crate::models::mood::Mood;
use crate::models::todo::TodoItem;
use crate::AppState;

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<EntryQuery>,
) -> AppResult<Json<Vec<EntryDetail>>> {
    let start = query
        .start_date
        .unwrap_or_else(|| Utc::now().date_naive() - chrono::Duration::days(30));
    let end = query.end_date.unwrap_or_else(|| Utc::now().date_naive());

    let entries = sqlx::query_as::<_, DayEntry>(
        r#"
        SELECT * FROM day_entries
        WHERE user_id = $1 AND entry_date BETWEEN $2 AND $3
        ORDER BY entry_date DESC, created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .bind(start)
    .bind(end)
    .fetch_all(&state.db)
    .await?;

    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        result.push(load_detail(&state.db, entry).await?);
    }

    Ok(Json(result))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<EntryDetail>> {
    let entry =
        sqlx::query_as::<_, DayEntry>("SELECT * FROM day_entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Entry not found".into()))?;

    Ok(Json(load_detail(&state.db, entry).await?))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateEntryRequest>,
) -> AppResult<(StatusCode, Json<EntryDetail>)> {
    body.validate()?;
    ensure_mood_exists(&state.db, body.mood_id).await?;

    let entry = sqlx::query_as::<_, DayEntry>(
        r#"
        INSERT INTO day_entries (id, user_id, entry_date, mood_id, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.date)
    .bind(body.mood_id)
    .bind(&body.description)
    .fetch_one(&state.db)
    .await?;

    let detail = load_detail(&state.db, entry).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<UpdateEntryRequest>,
) -> AppResult<Json<EntryDetail>> {
    body.validate()?;

    // Verify ownership
    let _existing =
        sqlx::query_as::<_, DayEntry>("SELECT * FROM day_entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Entry not found".into()))?;

    ensure_mood_exists(&state.db, body.mood_id).await?;

    let entry = sqlx::query_as::<_, DayEntry>(
        r#"
        UPDATE day_entries SET
            entry_date = COALESCE($3, entry_date),
            mood_id = COALESCE($4, mood_id),
            description = COALESCE($5, description),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(entry_id)
    .bind(auth_user.id)
    .bind(body.date)
    .bind(body.mood_id)
    .bind(&body.description)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(load_detail(&state.db, entry).await?))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM day_entries WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Entry not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Attach the mood row and the entry's todos for the client.
async fn load_detail(db: &PgPool, entry: DayEntry) -> AppResult<EntryDetail> {
    let mood = match entry.mood_id {
        Some(mood_id) => {
            sqlx::query_as::<_, Mood>("SELECT * FROM moods WHERE id = $1")
                .bind(mood_id)
                .fetch_optional(db)
                .await?
        }
        None => None,
    };

    let todos = sqlx::query_as::<_, TodoItem>(
        "SELECT * FROM todo_items WHERE day_entry_id = $1 ORDER BY created_at ASC",
    )
    .bind(entry.id)
    .fetch_all(db)
    .await?;

    Ok(EntryDetail { entry, mood, todos })
}

pub(crate) async fn ensure_mood_exists(db: &PgPool, mood_id: Option<Uuid>) -> AppResult<()> {
    if let Some(mood_id) = mood_id {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM moods WHERE id = $1")
            .bind(mood_id)
            .fetch_one(db)
            .await?;
        if count == 0 {
            return Err(AppError::field("mood_id", "Mood does not exist."));
        }
    }
    Ok(())
}
