//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string; in-memory stores when unset
/// - `STRIPE_SECRET_KEY` — Stripe secret; in-memory gateway/issuer when unset
/// - `WEBDRIVER_URL` — WebDriver server; stub automation when unset
/// - `STORE_BASE_URL` — storefront root the automation navigates to
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub webdriver_url: Option<String>,
    pub store_base_url: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            webdriver_url: std::env::var("WEBDRIVER_URL").ok(),
            store_base_url: std::env::var("STORE_BASE_URL")
                .unwrap_or_else(|_| "https://www.drinktrade.com".to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            stripe_secret_key: None,
            webdriver_url: None,
            store_base_url: "https://www.drinktrade.com".to_string(),
        }
    }
}
