use axum::{
    extract::{Path, State},
    http::{header::HOST, HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    jwt::{create_token_pair, verify_token, TokenPair, TokenType},
    middleware::AuthUser,
    password::{hash_password, policy_violations, verify_password},
    tokens::{check_token, make_token, TokenPurpose},
};
use crate::db::users;
use crate::error::{parse_validation_errors, AppError, AppResult, FieldError};
use crate::mail;
use crate::models::user::{PublicUser, User};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendActivationRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmResetRequest {
    pub user_id: Uuid,
    pub token: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let mut fields = match body.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => parse_validation_errors(&errors),
    };
    for message in policy_violations(&body.password) {
        fields.push(FieldError::new("password", message));
    }
    if !fields.is_empty() {
        return Err(AppError::Fields(fields));
    }

    // Pre-check uniqueness so the client sees both collisions in one pass.
    // A racing insert still lands on the table constraints below.
    let mut fields = Vec::new();
    if users::find_by_username(&state.db, &body.username)
        .await?
        .is_some()
    {
        fields.push(FieldError::new(
            "username",
            "A user with that username already exists.",
        ));
    }
    if users::find_by_email(&state.db, &body.email).await?.is_some() {
        fields.push(FieldError::new(
            "email",
            "This email address is already in use.",
        ));
    }
    if !fields.is_empty() {
        return Err(AppError::Fields(fields));
    }

    let password_hash = hash_password(&body.password)?;
    let user = users::create(&state.db, &body.username, &body.email, &password_hash).await?;

    send_activation_email(&state, &headers, &user).await?;

    tracing::info!(user_id = %user.id, "Account registered, activation email sent");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn activate(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(Uuid, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let user = users::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if let Err(reason) = check_token(&user, TokenPurpose::Activation, &token, &state.config) {
        tracing::debug!(user_id = %user.id, ?reason, "Activation token rejected");
        return Err(AppError::InvalidToken);
    }

    users::set_active(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, "Account activated");
    Ok(Json(json!({ "status": "account activated" })))
}

pub async fn resend_activation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ResendActivationRequest>,
) -> AppResult<Json<serde_json::Value>> {
    body.validate()?;

    let user = users::find_by_email(&state.db, &body.email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No user is registered with this email address.".into())
        })?;

    if user.is_active {
        return Err(AppError::Conflict(
            "This account is already activated.".into(),
        ));
    }

    send_activation_email(&state, &headers, &user).await?;

    Ok(Json(json!({ "detail": "Activation link sent." })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    // Limit per submitted username, before touching the database: a burst
    // against one account cannot be dodged by rotating source addresses.
    let key = format!("login:{}", body.username);
    if state
        .rate_limiter
        .check(
            &key,
            state.config.login_rate_limit_max,
            state.config.login_rate_limit_window_secs,
        )
        .await
        .is_err()
    {
        tracing::warn!(username = %body.username, "Login rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    let user = users::find_by_username(&state.db, &body.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    check_credentials(&user, &body.password)?;

    let tokens = create_token_pair(user.id, &user.username, &state.config)?;
    Ok(Json(tokens))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let token_data = verify_token(&body.refresh_token, &state.config)?;

    if token_data.claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized);
    }

    // Stateless rotation, but the account must still exist and be active.
    let user = users::find_by_id(&state.db, token_data.claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !user.is_active {
        return Err(AppError::Unauthorized);
    }

    let tokens = create_token_pair(user.id, &user.username, &state.config)?;
    Ok(Json(tokens))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PasswordResetRequest>,
) -> AppResult<Json<serde_json::Value>> {
    body.validate()?;

    let user = users::find_active_by_email(&state.db, &body.email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("User with this email does not exist or is not active.".into())
        })?;

    let token = make_token(&user, TokenPurpose::PasswordReset, &state.config);
    let link = format!(
        "{}/reset-password/{}/{}",
        request_base_url(&headers),
        user.id,
        token
    );
    state
        .mailer
        .send(
            &user.email,
            mail::RESET_SUBJECT,
            &mail::reset_body(&user.username, &link),
        )
        .await?;

    tracing::info!(user_id = %user.id, "Password reset link sent");
    Ok(Json(json!({ "status": "reset link sent" })))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ConfirmResetRequest>,
) -> AppResult<Json<serde_json::Value>> {
    // Confirmation mismatch wins over everything else, token included.
    if body.new_password != body.new_password_confirm {
        return Err(AppError::field(
            "new_password_confirm",
            "Passwords do not match.",
        ));
    }

    let violations = policy_violations(&body.new_password);
    if !violations.is_empty() {
        return Err(AppError::Fields(
            violations
                .into_iter()
                .map(|m| FieldError::new("new_password", m))
                .collect(),
        ));
    }

    // An unknown user id gets the same opaque answer as a bad token.
    let user = users::find_by_id(&state.db, body.user_id)
        .await?
        .ok_or(AppError::InvalidToken)?;

    if let Err(reason) = check_token(&user, TokenPurpose::PasswordReset, &body.token, &state.config)
    {
        tracing::debug!(user_id = %user.id, ?reason, "Reset token rejected");
        return Err(AppError::InvalidToken);
    }

    let password_hash = hash_password(&body.new_password)?;
    users::update_password_hash(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password reset complete");
    Ok(Json(json!({ "status": "password reset complete" })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user = users::find_by_id(&state.db, auth_user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let old_password_ok = verify_password(&body.old_password, &user.password_hash)?;
    let new_matches_current = verify_password(&body.new_password, &user.password_hash)?;
    let fields = change_password_violations(
        old_password_ok,
        new_matches_current,
        &body.new_password,
        &body.new_password_confirm,
    );
    if !fields.is_empty() {
        return Err(AppError::Fields(fields));
    }

    let password_hash = hash_password(&body.new_password)?;
    users::update_password_hash(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(Json(json!({ "detail": "Password changed successfully." })))
}

/// Password check first, then the active gate: only a caller holding the
/// correct password learns that the account is still pending, so it can
/// offer to resend the activation link.
fn check_credentials(user: &User, password: &str) -> AppResult<()> {
    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }
    if !user.is_active {
        return Err(AppError::InactiveAccount);
    }
    Ok(())
}

/// Field errors for a change-password request. The same-password rule is
/// only evaluated once every other rule has passed.
fn change_password_violations(
    old_password_ok: bool,
    new_matches_current: bool,
    new_password: &str,
    new_password_confirm: &str,
) -> Vec<FieldError> {
    let mut fields = Vec::new();
    if !old_password_ok {
        fields.push(FieldError::new("old_password", "Old password is incorrect."));
    }
    if new_password != new_password_confirm {
        fields.push(FieldError::new(
            "new_password_confirm",
            "Passwords do not match.",
        ));
    }
    for message in policy_violations(new_password) {
        fields.push(FieldError::new("new_password", message));
    }
    if fields.is_empty() && new_matches_current {
        fields.push(FieldError::new(
            "new_password",
            "New password cannot be the same as the old password.",
        ));
    }
    fields
}

async fn send_activation_email(
    state: &AppState,
    headers: &HeaderMap,
    user: &User,
) -> AppResult<()> {
    let token = make_token(user, TokenPurpose::Activation, &state.config);
    let link = format!(
        "{}/activate/{}/{}",
        request_base_url(headers),
        user.id,
        token
    );
    state
        .mailer
        .send(
            &user.email,
            mail::ACTIVATION_SUBJECT,
            &mail::activation_body(&user.username, &link),
        )
        .await?;
    Ok(())
}

/// Base URL as the requester sees it, for links pointing back at this
/// service. Honors X-Forwarded-Proto/-Host from a fronting proxy.
pub(crate) fn request_base_url(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .and_then(|v| v.to_str().ok())
        .or_else(|| headers.get(HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or("localhost:8000");
    format!("{}://{}", proto, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::response::IntoResponse;
    use chrono::Utc;

    fn user_with_password(password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "marta".into(),
            email: "marta@example.com".into(),
            password_hash: hash_password(password).unwrap(),
            is_active: false,
            is_staff: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_account_with_correct_password_is_rejected_distinctly() {
        let user = user_with_password("Str0ng!pass");

        let err = check_credentials(&user, "Str0ng!pass").unwrap_err();
        assert!(matches!(err, AppError::InactiveAccount));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn wrong_password_stays_opaque_even_when_pending() {
        let user = user_with_password("Str0ng!pass");

        let err = check_credentials(&user, "Wr0ng!pass").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn active_account_with_correct_password_passes() {
        let mut user = user_with_password("Str0ng!pass");
        user.is_active = true;
        assert!(check_credentials(&user, "Str0ng!pass").is_ok());
    }

    #[test]
    fn change_rules_pass_for_a_valid_request() {
        assert!(change_password_violations(true, false, "N3w!secret", "N3w!secret").is_empty());
    }

    #[test]
    fn wrong_old_password_is_a_field_error() {
        let fields = change_password_violations(false, false, "N3w!secret", "N3w!secret");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "old_password");
        assert_eq!(fields[0].message, "Old password is incorrect.");
    }

    #[test]
    fn confirmation_mismatch_is_a_field_error() {
        let fields = change_password_violations(true, false, "N3w!secret", "N3w!secrets");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "new_password_confirm");
        assert_eq!(fields[0].message, "Passwords do not match.");
    }

    #[test]
    fn same_password_is_rejected_when_everything_else_passes() {
        let fields = change_password_violations(true, true, "Curr3nt!pw", "Curr3nt!pw");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "new_password");
        assert_eq!(
            fields[0].message,
            "New password cannot be the same as the old password."
        );
    }

    #[test]
    fn same_password_is_not_reported_alongside_other_failures() {
        let fields = change_password_violations(false, true, "Curr3nt!pw", "Curr3nt!pw");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "old_password");
    }

    #[test]
    fn change_failures_are_collected_into_one_response() {
        let fields = change_password_violations(false, false, "weak", "other");
        assert!(fields.iter().any(|f| f.field == "old_password"));
        assert!(fields.iter().any(|f| f.field == "new_password_confirm"));
        // "weak" breaks the length, uppercase, digit and symbol rules
        assert_eq!(fields.iter().filter(|f| f.field == "new_password").count(), 4);
    }

    #[test]
    fn base_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("daybook.example.com"));
        assert_eq!(request_base_url(&headers), "http://daybook.example.com");
    }

    #[test]
    fn base_url_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("10.0.0.5:8000"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert(
            "x-forwarded-host",
            HeaderValue::from_static("daybook.example.com"),
        );
        assert_eq!(request_base_url(&headers), "https://daybook.example.com");
    }

    #[test]
    fn base_url_falls_back_without_headers() {
        let headers = HeaderMap::new();
        assert_eq!(request_base_url(&headers), "http://localhost:8000");
    }
}
