use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Further allowed CORS origins, e.g. LAN addresses in dev.
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,
    pub jwt_access_ttl_secs: i64,
    pub jwt_refresh_ttl_secs: i64,

    /// Signing key for activation and password-reset tokens.
    pub secret_key: String,
    pub activation_token_ttl_secs: i64,
    pub reset_token_ttl_secs: i64,

    pub login_rate_limit_max: u32,
    pub login_rate_limit_window_secs: u64,

    pub mail_api_url: Option<String>,
    pub mail_api_token: String,
    pub mail_from: String,
    pub mail_timeout_secs: u64,
    /// When true, failed email dispatch is logged instead of failing the request.
    pub mail_best_effort: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            cors_extra_origins: env::var("CORS_EXTRA_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or_default(),

            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                .unwrap_or_else(|_| "900".into())
                .parse()
                .expect("JWT_ACCESS_TTL_SECS must be a number"),
            jwt_refresh_ttl_secs: env::var("JWT_REFRESH_TTL_SECS")
                .unwrap_or_else(|_| "604800".into())
                .parse()
                .expect("JWT_REFRESH_TTL_SECS must be a number"),

            secret_key: env::var("SECRET_KEY").expect("SECRET_KEY must be set"),
            // Activation links live long enough to survive a slow inbox.
            activation_token_ttl_secs: env::var("ACTIVATION_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "604800".into())
                .parse()
                .expect("ACTIVATION_TOKEN_TTL_SECS must be a number"),
            reset_token_ttl_secs: env::var("RESET_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "3600".into())
                .parse()
                .expect("RESET_TOKEN_TTL_SECS must be a number"),

            login_rate_limit_max: env::var("LOGIN_RATE_LIMIT_MAX")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .expect("LOGIN_RATE_LIMIT_MAX must be a number"),
            login_rate_limit_window_secs: env::var("LOGIN_RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .expect("LOGIN_RATE_LIMIT_WINDOW_SECS must be a number"),

            mail_api_url: env::var("MAIL_API_URL").ok().filter(|s| !s.is_empty()),
            mail_api_token: env::var("MAIL_API_TOKEN").unwrap_or_else(|_| String::new()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@daybook.local".into()),
            mail_timeout_secs: env::var("MAIL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .expect("MAIL_TIMEOUT_SECS must be a number"),
            mail_best_effort: env::var("MAIL_BEST_EFFORT")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/daybook_test".into(),
            host: "127.0.0.1".into(),
            port: 8000,
            frontend_url: "http://localhost:3000".into(),
            cors_extra_origins: Vec::new(),
            jwt_secret: "test-jwt-secret".into(),
            jwt_access_ttl_secs: 900,
            jwt_refresh_ttl_secs: 604_800,
            secret_key: "test-signing-key".into(),
            activation_token_ttl_secs: 604_800,
            reset_token_ttl_secs: 3600,
            login_rate_limit_max: 5,
            login_rate_limit_window_secs: 60,
            mail_api_url: None,
            mail_api_token: String::new(),
            mail_from: "no-reply@daybook.local".into(),
            mail_timeout_secs: 10,
            mail_best_effort: false,
        }
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_list_is_split_and_trimmed() {
        assert_eq!(
            split_origins("http://192.168.1.20:3000, http://daybook.local ,,"),
            vec!["http://192.168.1.20:3000", "http://daybook.local"]
        );
    }

    #[test]
    fn empty_origin_list_stays_empty() {
        assert!(split_origins("").is_empty());
        assert!(split_origins(" , ").is_empty());
    }
}
