use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod models;

use auth::rate_limit::RateLimitState;
use config::Config;
use mail::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub mailer: Mailer,
    pub rate_limiter: RateLimitState,
}

/// Build the full router. Split out of `main` so integration tests can
/// drive the service without binding a socket.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        // Account lifecycle
        .route("/register", post(handlers::auth::register))
        .route("/activate/:user_id/:token", get(handlers::auth::activate))
        .route("/resend-activation", post(handlers::auth::resend_activation))
        .route("/token", post(handlers::auth::login))
        .route("/token/refresh", post(handlers::auth::refresh))
        .route(
            "/password-reset-request",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/password-reset-confirm",
            post(handlers::auth::confirm_password_reset),
        )
        // Mood catalog is readable without an account
        .route("/moods", get(handlers::moods::list_moods));

    let protected_routes = Router::new()
        .route("/change-password", post(handlers::auth::change_password))
        // Profile
        .route("/profile", get(handlers::profile::get_profile))
        .route("/profile", patch(handlers::profile::update_profile))
        .route("/profile", delete(handlers::profile::delete_account))
        // Entries
        .route("/entries", get(handlers::entries::list_entries))
        .route("/entries", post(handlers::entries::create_entry))
        .route("/entries/:id", get(handlers::entries::get_entry))
        .route("/entries/:id", patch(handlers::entries::update_entry))
        .route("/entries/:id", delete(handlers::entries::delete_entry))
        // Todos
        .route("/todos", get(handlers::todos::list_todos))
        .route("/todos", post(handlers::todos::create_todo))
        .route("/todos/:id", get(handlers::todos::get_todo))
        .route("/todos/:id", patch(handlers::todos::update_todo))
        .route("/todos/:id", delete(handlers::todos::delete_todo))
        // Mood catalog writes (staff only)
        .route("/moods", post(handlers::moods::create_mood))
        .route("/moods/:id", patch(handlers::moods::update_mood))
        .route("/moods/:id", delete(handlers::moods::delete_mood))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let allowed_origins: Vec<axum::http::HeaderValue> = {
        let mut origins = vec![state
            .config
            .frontend_url
            .parse::<axum::http::HeaderValue>()
            .expect("FRONTEND_URL must be a valid origin")];
        // In dev, also allow LAN access (e.g. testing from another device)
        for origin in &state.config.cors_extra_origins {
            if let Ok(hv) = origin.parse::<axum::http::HeaderValue>() {
                origins.push(hv);
            }
        }
        origins
    };
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;
    use uuid::Uuid;

    // Lazy pool: requests that reach the database fail there, which is fine
    // for everything below. These tests only cover what the router decides
    // before any query runs.
    fn test_state() -> AppState {
        let config = Arc::new(Config::for_tests());
        AppState {
            db: db::create_lazy_pool(&config.database_url),
            mailer: Mailer::from_config(&config).expect("log mailer"),
            rate_limiter: RateLimitState::new(),
            config,
        }
    }

    async fn send(
        app: Router,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn field_messages(body: &Value, field: &str) -> Vec<String> {
        body["error"]["fields"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|f| f["field"] == field)
            .filter_map(|f| f["message"].as_str().map(str::to_owned))
            .collect()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = send(app(test_state()), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "daybook-api");
    }

    #[tokio::test]
    async fn test_register_itemizes_password_rules() {
        let (status, body) = send(
            app(test_state()),
            Method::POST,
            "/register",
            Some(json!({
                "username": "marta",
                "email": "marta@example.com",
                "password": "abc"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["message"], "Validation failed");
        let messages = field_messages(&body, "password");
        assert!(messages.contains(&"Password must be at least 8 characters long.".into()));
        assert!(messages.contains(&"Password must contain an uppercase letter.".into()));
        assert!(messages.contains(&"Password must contain a digit.".into()));
        assert!(messages.contains(&"Password must contain a special character.".into()));
        // "abc" is all lowercase, so that rule passed
        assert!(!messages.contains(&"Password must contain a lowercase letter.".into()));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_email() {
        let (status, body) = send(
            app(test_state()),
            Method::POST,
            "/register",
            Some(json!({
                "username": "marta",
                "email": "not-an-address",
                "password": "Str0ng!pass"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            field_messages(&body, "email"),
            vec!["Enter a valid email address."]
        );
    }

    #[tokio::test]
    async fn test_reset_confirm_mismatch_wins_over_token() {
        let (status, body) = send(
            app(test_state()),
            Method::POST,
            "/password-reset-confirm",
            Some(json!({
                "user_id": "00000000-0000-0000-0000-000000000001",
                "token": "not-a-real-token",
                "new_password": "Str0ng!pass",
                "new_password_confirm": "Str0ng!pass2"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            field_messages(&body, "new_password_confirm"),
            vec!["Passwords do not match."]
        );
    }

    #[tokio::test]
    async fn test_reset_confirm_itemizes_policy() {
        let (status, body) = send(
            app(test_state()),
            Method::POST,
            "/password-reset-confirm",
            Some(json!({
                "user_id": "00000000-0000-0000-0000-000000000001",
                "token": "not-a-real-token",
                "new_password": "short",
                "new_password_confirm": "short"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let messages = field_messages(&body, "new_password");
        assert_eq!(messages.len(), 4);
        assert!(messages.contains(&"Password must be at least 8 characters long.".into()));
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for (method, path) in [
            (Method::GET, "/profile"),
            (Method::GET, "/entries"),
            (Method::GET, "/todos"),
            (Method::POST, "/change-password"),
            (Method::POST, "/moods"),
        ] {
            let (status, body) = send(app(test_state()), method, path, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "expected 401 for {path}");
            assert_eq!(body["error"]["message"], "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn test_garbage_bearer_token_rejected() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/profile")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();

        let response = app(test_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_tokens() {
        let state = test_state();
        let access =
            auth::jwt::create_access_token(Uuid::new_v4(), "marta", &state.config).unwrap();

        let (status, body) = send(
            app(state),
            Method::POST,
            "/token/refresh",
            Some(json!({ "refresh_token": access })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_burst() {
        let app = app(test_state());

        // First five attempts pass the limiter (and die at the missing
        // database, which does not matter here).
        for _ in 0..5 {
            let (status, _) = send(
                app.clone(),
                Method::POST,
                "/token",
                Some(json!({ "username": "flood", "password": "wrong" })),
            )
            .await;
            assert_ne!(status, StatusCode::TOO_MANY_REQUESTS);
        }

        let (status, body) = send(
            app,
            Method::POST,
            "/token",
            Some(json!({ "username": "flood", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], 429);
    }
}
