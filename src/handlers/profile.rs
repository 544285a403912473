use axum::{extract::State, http::HeaderMap, http::StatusCode, Extension, Json};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::handlers::auth::request_base_url;
use crate::models::profile::{Profile, ProfileResponse, UpdateProfileRequest, DEFAULT_AVATAR};
use crate::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    headers: HeaderMap,
) -> AppResult<Json<ProfileResponse>> {
    let user = users::find_by_id(&state.db, auth_user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let profile = get_or_create_profile(&state.db, auth_user.id).await?;

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
        profile_picture: picture_url(&headers, &profile.picture_path),
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    body.validate()?;

    let user = if body.username.is_some() || body.email.is_some() {
        users::update_identity(
            &state.db,
            auth_user.id,
            body.username.as_deref(),
            body.email.as_deref(),
        )
        .await?
    } else {
        users::find_by_id(&state.db, auth_user.id)
            .await?
            .ok_or(AppError::Unauthorized)?
    };

    let mut profile = get_or_create_profile(&state.db, auth_user.id).await?;

    if let Some(picture) = &body.profile_picture {
        // Empty string resets to the default avatar.
        let path = if picture.is_empty() {
            DEFAULT_AVATAR
        } else {
            picture.as_str()
        };
        profile = sqlx::query_as::<_, Profile>(
            "UPDATE profiles SET picture_path = $2, updated_at = NOW() WHERE user_id = $1 RETURNING *",
        )
        .bind(auth_user.id)
        .bind(path)
        .fetch_one(&state.db)
        .await?;
    }

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
        profile_picture: picture_url(&headers, &profile.picture_path),
    }))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<StatusCode> {
    users::delete(&state.db, auth_user.id).await?;

    tracing::info!(user_id = %auth_user.id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Profile rows are created on first access, not at registration.
async fn get_or_create_profile(db: &PgPool, user_id: Uuid) -> AppResult<Profile> {
    if let Some(profile) = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
    {
        return Ok(profile);
    }

    // No-op conflict action so a racing insert still returns the row.
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (user_id)
        VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(profile)
}

fn picture_url(headers: &HeaderMap, picture_path: &str) -> String {
    format!("{}/media/{}", request_base_url(headers), picture_path)
}
