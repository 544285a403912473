use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::todo::{CreateTodoRequest, TodoItem, TodoQuery, UpdateTodoRequest};
use crate::AppState;

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<TodoQuery>,
) -> AppResult<Json<Vec<TodoItem>>> {
    let todos = sqlx::query_as::<_, TodoItem>(
        r#"
        SELECT * FROM todo_items
        WHERE user_id = $1 AND ($2::uuid IS NULL OR day_entry_id = $2)
        ORDER BY created_at ASC
        "#,
    )
    .bind(auth_user.id)
    .bind(query.day_entry_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(todos))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(todo_id): Path<Uuid>,
) -> AppResult<Json<TodoItem>> {
    let todo =
        sqlx::query_as::<_, TodoItem>("SELECT * FROM todo_items WHERE id = $1 AND user_id = $2")
            .bind(todo_id)
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Todo not found".into()))?;

    Ok(Json(todo))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateTodoRequest>,
) -> AppResult<(StatusCode, Json<TodoItem>)> {
    body.validate()?;
    ensure_entry_owned(&state.db, auth_user.id, body.day_entry_id).await?;

    let todo = sqlx::query_as::<_, TodoItem>(
        r#"
        INSERT INTO todo_items (id, user_id, day_entry_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.day_entry_id)
    .bind(&body.content)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(todo_id): Path<Uuid>,
    Json(body): Json<UpdateTodoRequest>,
) -> AppResult<Json<TodoItem>> {
    body.validate()?;

    // Verify ownership
    let _existing =
        sqlx::query_as::<_, TodoItem>("SELECT * FROM todo_items WHERE id = $1 AND user_id = $2")
            .bind(todo_id)
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Todo not found".into()))?;

    ensure_entry_owned(&state.db, auth_user.id, body.day_entry_id).await?;

    let todo = sqlx::query_as::<_, TodoItem>(
        r#"
        UPDATE todo_items SET
            content = COALESCE($3, content),
            is_done = COALESCE($4, is_done),
            day_entry_id = COALESCE($5, day_entry_id),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(todo_id)
    .bind(auth_user.id)
    .bind(&body.content)
    .bind(body.is_done)
    .bind(body.day_entry_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(todo_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM todo_items WHERE id = $1 AND user_id = $2")
        .bind(todo_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Todo not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// A todo may only be attached to one of the caller's own entries.
async fn ensure_entry_owned(
    db: &PgPool,
    user_id: Uuid,
    day_entry_id: Option<Uuid>,
) -> AppResult<()> {
    if let Some(entry_id) = day_entry_id {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM day_entries WHERE id = $1 AND user_id = $2",
        )
        .bind(entry_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        if count == 0 {
            return Err(AppError::field("day_entry_id", "Day entry does not exist."));
        }
    }
    Ok(())
}
