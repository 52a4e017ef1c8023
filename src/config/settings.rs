//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Third-party verification (Turnstile, Google, Vision)
    pub verification: VerificationSettings,

    /// Media upload storage
    pub storage: StorageSettings,

    /// Content lifecycle knobs
    pub content: ContentSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Run embedded migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// When false the rate limiter is bypassed and Redis is never contacted
    pub enabled: bool,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,

    /// Refresh token expiry in days
    pub refresh_token_expiry_days: i64,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Auth endpoint attempts per minute
    pub auth_per_minute: u32,

    /// General API requests per minute
    pub api_per_minute: u32,

    /// Uploads per minute
    pub upload_per_minute: u32,

    /// Signal polling requests per minute
    pub signaling_per_minute: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Third-party verification services.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    /// Outbound HTTP timeout for all verification calls
    pub timeout_secs: u64,

    pub turnstile: TurnstileSettings,

    pub google: GoogleSettings,

    pub moderation: ModerationSettings,
}

/// Cloudflare Turnstile.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnstileSettings {
    pub enabled: bool,

    pub secret: String,

    pub verify_url: String,

    /// Proceed with registration when Cloudflare cannot be reached
    pub fail_open: bool,
}

/// Google Sign-In.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    pub enabled: bool,

    /// Accepted OAuth client ids (token audience)
    pub client_ids: Vec<String>,

    pub tokeninfo_url: String,
}

/// Google Vision SafeSearch moderation.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationSettings {
    pub enabled: bool,

    pub api_key: String,

    pub annotate_url: String,

    /// Likelihood at or above which an image is blocked (e.g. "LIKELY")
    pub block_threshold: String,

    /// Accept the upload when the moderation service cannot be reached
    pub fail_open: bool,
}

/// Media upload storage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded files are written to
    pub upload_dir: String,

    /// Base URL the upload directory is served from
    pub public_base_url: String,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

/// Content lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSettings {
    /// Hours a story stays visible
    pub story_ttl_hours: i64,

    /// Seconds a call may ring before it counts as missed
    pub call_ring_timeout_secs: i64,

    /// Interval of the denormalized counter backfill job (0 disables it)
    pub counter_backfill_interval_secs: u64,

    /// Memories recomputed per backfill batch
    pub counter_backfill_batch_size: i64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::defaults(Config::builder(), &environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("verification.google.client_ids")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .set_override_option(
                "verification.turnstile.secret",
                std::env::var("TURNSTILE_SECRET").ok(),
            )?
            .set_override_option(
                "verification.moderation.api_key",
                std::env::var("GOOGLE_VISION_API_KEY").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment.to_string())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("redis.enabled", true)?
            .set_default("jwt.access_token_expiry_minutes", 60)?
            .set_default("jwt.refresh_token_expiry_days", 30)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", crate::shared::snowflake::DEFAULT_EPOCH)?
            .set_default("rate_limit.auth_per_minute", 10)?
            .set_default("rate_limit.api_per_minute", 120)?
            .set_default("rate_limit.upload_per_minute", 20)?
            .set_default("rate_limit.signaling_per_minute", 600)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("verification.timeout_secs", 5)?
            .set_default("verification.turnstile.enabled", false)?
            .set_default("verification.turnstile.secret", "")?
            .set_default(
                "verification.turnstile.verify_url",
                "https://challenges.cloudflare.com/turnstile/v0/siteverify",
            )?
            .set_default("verification.turnstile.fail_open", false)?
            .set_default("verification.google.enabled", false)?
            .set_default("verification.google.client_ids", Vec::<String>::new())?
            .set_default(
                "verification.google.tokeninfo_url",
                "https://oauth2.googleapis.com/tokeninfo",
            )?
            .set_default("verification.moderation.enabled", false)?
            .set_default("verification.moderation.api_key", "")?
            .set_default(
                "verification.moderation.annotate_url",
                "https://vision.googleapis.com/v1/images:annotate",
            )?
            .set_default("verification.moderation.block_threshold", "LIKELY")?
            .set_default("verification.moderation.fail_open", true)?
            .set_default("storage.upload_dir", "./uploads")?
            .set_default("storage.public_base_url", "/uploads")?
            .set_default("storage.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("content.story_ttl_hours", 24)?
            .set_default("content.call_ring_timeout_secs", 45)?
            .set_default("content.counter_backfill_interval_secs", 900)?
            .set_default("content.counter_backfill_batch_size", 500)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.verification.turnstile.enabled && self.verification.turnstile.secret.is_empty() {
            return Err(ConfigError::Message(
                "verification.turnstile.secret is required when Turnstile is enabled".into(),
            ));
        }
        if self.verification.moderation.enabled && self.verification.moderation.api_key.is_empty()
        {
            return Err(ConfigError::Message(
                "verification.moderation.api_key is required when moderation is enabled".into(),
            ));
        }
        if self.verification.google.enabled && self.verification.google.client_ids.is_empty() {
            return Err(ConfigError::Message(
                "verification.google.client_ids must list at least one client id".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
