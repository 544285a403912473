use std::sync::Arc;

use daybook_api::auth::rate_limit::{self, RateLimitState};
use daybook_api::config::Config;
use daybook_api::mail::Mailer;
use daybook_api::{app, db, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daybook_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    // Database
    let pool = db::create_pool(&config.database_url).await;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    let mailer = Mailer::from_config(&config).expect("Failed to initialize mailer");

    let rate_limiter = RateLimitState::new();
    rate_limit::spawn_cleanup_worker(rate_limiter.clone(), config.login_rate_limit_window_secs);

    let state = AppState {
        db: pool,
        config: config.clone(),
        mailer,
        rate_limiter,
    };

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app(state)).await.unwrap();
}
