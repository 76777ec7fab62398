use serde::Deserialize;
use std::env::vars;
use std::fmt::Display;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Env {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "prod")]
    Prod,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "pr")]
    Pr,
    #[serde(rename = "nightly")]
    Nightly,
}

impl Env {
    /// Environments where developer defaults are acceptable.
    pub fn is_development(&self) -> bool {
        matches!(self, Env::Local | Env::Test)
    }
}

impl Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Prod => write!(f, "prod"),
            Env::Test => write!(f, "test"),
            Env::Pr => write!(f, "pr"),
            Env::Nightly => write!(f, "nightly"),
        }
    }
}

// The final, validated configuration struct.
#[derive(Debug, Clone)]
pub struct Config {
    env: Env,
    database_url: String,
    server_addr: String,
    port: u16,
    // Secret shared with whoever issues session tokens
    jwt_secret: String,
    // Webhook of the notifications collaborator; log-only delivery when absent
    notifications_url: Option<String>,
    // Guards /internal/*; routes are open in development when absent
    internal_api_key: Option<String>,
    run_migrations: bool,
}

// Intermediate struct for deserializing environment variables
// where most fields are optional.
#[derive(Deserialize)]
struct RawConfig {
    env: Env,
    database_url: String,
    server_addr: Option<String>,
    port: Option<u16>,
    jwt_secret: Option<String>,
    notifications_url: Option<String>,
    internal_api_key: Option<String>,
    run_migrations: Option<bool>,
}

impl Config {
    /// Create a test configuration with default values.
    ///
    /// Available to both unit and integration tests. Not meant for production code.
    pub fn new_for_test() -> Self {
        Self {
            env: Env::Local,
            database_url: "postgres://localhost:5432/pinboard_test".to_owned(),
            server_addr: "127.0.0.1".to_owned(),
            port: 8080,
            jwt_secret: "test-jwt-secret-key-for-local-development".to_owned(),
            notifications_url: None,
            internal_api_key: None,
            run_migrations: false,
        }
    }

    /// Test configuration whose internal routes require `key`.
    pub fn new_for_test_with_internal_key(key: impl Into<String>) -> Self {
        Self {
            internal_api_key: Some(key.into()),
            ..Self::new_for_test()
        }
    }

    /// Test configuration for a specific environment.
    pub fn new_for_test_with_env(env: Env) -> Self {
        Self {
            env,
            ..Self::new_for_test()
        }
    }

    pub fn environment(&self) -> &Env {
        &self.env
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_local(&self) -> bool {
        matches!(self.env, Env::Local)
    }

    /// Get the JWT secret used to validate session tokens.
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn notifications_url(&self) -> Option<&str> {
        self.notifications_url.as_deref()
    }

    pub fn internal_api_key(&self) -> Option<&str> {
        self.internal_api_key.as_deref()
    }

    pub fn run_migrations(&self) -> bool {
        self.run_migrations
    }

    /// Initializes configuration by reading from environment variables
    /// and applying environment-aware defaults.
    pub fn init() -> anyhow::Result<Self> {
        info!("Loading configuration from environment variables");

        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            env,
            database_url,
            server_addr,
            port,
            jwt_secret,
            notifications_url,
            internal_api_key,
            run_migrations,
        } = raw_config;

        let server_addr = match server_addr {
            Some(addr) => {
                info!("Using provided SERVER_ADDR: {}", addr);
                addr
            }
            None => {
                let default_addr = match env {
                    Env::Local => "127.0.0.1",
                    _ => "0.0.0.0",
                };
                info!(
                    "SERVER_ADDR not set, defaulting to {} for {} environment",
                    default_addr, env
                );
                default_addr.to_owned()
            }
        };

        let port = match port {
            Some(port) => port,
            None if matches!(env, Env::Local) => {
                info!("PORT not set, defaulting to 8080 for local environment");
                8080
            }
            None => anyhow::bail!("PORT must be set for {} environment", env),
        };

        let jwt_secret = match jwt_secret {
            Some(secret) => secret,
            None if env.is_development() => {
                info!("JWT_SECRET not set, using default for {} environment", env);
                "default-jwt-secret-for-local-development-only".to_owned()
            }
            None => anyhow::bail!("JWT_SECRET must be set for {} environment", env),
        };

        if internal_api_key.is_none() && !env.is_development() {
            anyhow::bail!(
                "INTERNAL_API_KEY must be set for {} environment. \
                 Internal routes are never served unauthenticated outside development.",
                env
            );
        }

        if notifications_url.is_none() {
            info!(
                "NOTIFICATIONS_URL not set, activity notifications will only be logged in {} environment",
                env
            );
        }

        Ok(Config {
            env,
            database_url,
            server_addr,
            port,
            jwt_secret,
            notifications_url,
            internal_api_key,
            run_migrations: run_migrations.unwrap_or(false),
        })
    }
}
