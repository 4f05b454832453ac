use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_SCORING_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_SCORING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EXPLANATION_FEATURES: u8 = 5;

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

/// Top-level configuration for the dashboard service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let telemetry = TelemetryConfig {
            log_level: env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            ansi: flag_var("APP_LOG_ANSI")?,
            show_targets: flag_var("APP_LOG_TARGETS")?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry,
            scoring: ScoringConfig::from_env()?,
        })
    }
}

fn flag_var(name: &'static str) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(false),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name }),
        },
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
    pub show_targets: bool,
}

/// Location and limits of the remote prediction service.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub base_url: reqwest::Url,
    /// `None` waits on the remote service indefinitely.
    pub timeout: Option<Duration>,
    pub explanation_features: u8,
}

impl ScoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url =
            env::var("SCORING_BASE_URL").unwrap_or_else(|_| DEFAULT_SCORING_BASE_URL.to_string());
        let base_url = reqwest::Url::parse(raw_url.trim())
            .map_err(|source| ConfigError::InvalidScoringUrl { source })?;

        let timeout_secs = match env::var("SCORING_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout)?,
            Err(_) => DEFAULT_SCORING_TIMEOUT_SECS,
        };
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let explanation_features = match env::var("SCORING_EXPLANATION_FEATURES") {
            Ok(raw) => raw
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|count| *count > 0)
                .ok_or(ConfigError::InvalidFeatureCount)?,
            Err(_) => DEFAULT_EXPLANATION_FEATURES,
        };

        Ok(Self {
            base_url,
            timeout,
            explanation_features,
        })
    }

    /// Settings for `base_url` with the default timeout and explanation size.
    pub fn new(base_url: reqwest::Url) -> Self {
        Self {
            base_url,
            timeout: Some(Duration::from_secs(DEFAULT_SCORING_TIMEOUT_SECS)),
            explanation_features: DEFAULT_EXPLANATION_FEATURES,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { name: &'static str },
    InvalidScoringUrl { source: url::ParseError },
    InvalidTimeout,
    InvalidFeatureCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::InvalidScoringUrl { .. } => {
                write!(f, "SCORING_BASE_URL must be an absolute http(s) URL")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "SCORING_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidFeatureCount => {
                write!(f, "SCORING_EXPLANATION_FEATURES must be between 1 and 255")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidScoringUrl { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidFeatureCount => None,
        }
    }
}
