use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
///
/// Loaded once at startup and handed to every component that needs it; nothing
/// mutates it afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub providers: ProvidersConfig,
}

const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost,http://localhost:8081,http://127.0.0.1,http://127.0.0.1:8081";

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let cors_allowed_origins = var_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let database = DatabaseConfig {
            url: var_or("DATABASE_URL", "sqlite://orryin_dev.db"),
        };

        let timeout_secs = var_or("PROVIDER_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber {
                key: "PROVIDER_TIMEOUT_SECS",
            })?;

        let sumsub = SumsubConfig {
            app_token: optional_var("SUMSUB_APP_TOKEN"),
            secret_key: optional_var("SUMSUB_SECRET_KEY"),
            base_url: var_or("SUMSUB_BASE_URL", "https://api.sumsub.com"),
            level_name: var_or("SUMSUB_LEVEL_NAME", "basic-kyc-id-doc"),
            webhook_secret: optional_var("SUMSUB_WEBHOOK_SECRET"),
            enforce_webhook_signature: bool_var("SUMSUB_WEBHOOK_ENFORCE_SIGNATURE", false)?,
        };

        let wise = WiseConfig {
            api_key: optional_var("WISE_API_KEY"),
            base_url: var_or("WISE_BASE_URL", "https://api.sandbox.transferwise.tech"),
            profile_id: optional_var("WISE_PROFILE_ID"),
        };

        let drivewealth = DriveWealthConfig {
            base_url: var_or("DRIVEWEALTH_BASE_URL", "https://api.drivewealth.io"),
            app_key: optional_var("DRIVEWEALTH_APP_KEY"),
            app_secret: optional_var("DRIVEWEALTH_APP_SECRET"),
            use_mock: bool_var("DRIVEWEALTH_USE_MOCK", true)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                cors_allowed_origins,
            },
            telemetry: TelemetryConfig { log_level },
            database,
            providers: ProvidersConfig {
                timeout: Duration::from_secs(timeout_secs),
                sumsub,
                wise,
                drivewealth,
            },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bool_var(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional_var(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key }),
        },
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where entities are persisted. `memory` selects the in-process store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url.eq_ignore_ascii_case("memory")
    }
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub timeout: Duration,
    pub sumsub: SumsubConfig,
    pub wise: WiseConfig,
    pub drivewealth: DriveWealthConfig,
}

#[derive(Debug, Clone)]
pub struct SumsubConfig {
    pub app_token: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: String,
    pub level_name: String,
    pub webhook_secret: Option<String>,
    pub enforce_webhook_signature: bool,
}

impl SumsubConfig {
    /// Webhooks are signed with the dedicated secret, falling back to the API secret.
    pub fn webhook_signing_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .or(self.secret_key.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct WiseConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub profile_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DriveWealthConfig {
    pub base_url: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub use_mock: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBool { key: &'static str },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBool { key } => {
                write!(f, "{key} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBool { .. }
            | ConfigError::InvalidNumber { .. } => None,
        }
    }
}
