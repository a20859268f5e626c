use std::env;

/// Gateway configuration, read once at startup from the environment. Every
/// scattered `env::var` call the binary needs lives behind this struct
/// instead of being inlined in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub auth_issuer_url: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);
        let cors_origins = env::var("CORS_ORIGIN")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let auth_issuer_url = env::var("AUTH_ISSUER_URL").ok();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        Self {
            port,
            cors_origins,
            database_url,
            auth_issuer_url,
            log_level,
        }
    }
}
