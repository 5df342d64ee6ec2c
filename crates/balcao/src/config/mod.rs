use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::workflows::auth::VerificationEndpoint;

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

const DEFAULT_VERIFICATION_TIMEOUT_SECS: u64 = 12;
const DEFAULT_DATA_SERVICE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_FILE: &str = ".balcao/session.json";

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub data_service: DataServiceConfig,
    pub verification: VerificationConfig,
    pub session: SessionConfig,
    pub webhook: WebhookConfig,
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

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let base_url = parse_url("DATA_SERVICE_URL", &required("DATA_SERVICE_URL")?)?;
        let public_key = required("DATA_SERVICE_PUBLIC_KEY")?;

        let endpoints = parse_endpoints(&required("VERIFICATION_ENDPOINTS")?)?;
        let verification_timeout =
            timeout_secs("VERIFICATION_TIMEOUT_SECS", DEFAULT_VERIFICATION_TIMEOUT_SECS)?;
        let data_service_timeout =
            timeout_secs("DATA_SERVICE_TIMEOUT_SECS", DEFAULT_DATA_SERVICE_TIMEOUT_SECS)?;
        let webhook_timeout = timeout_secs("WEBHOOK_TIMEOUT_SECS", DEFAULT_WEBHOOK_TIMEOUT_SECS)?;

        let session_path = optional("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
                show_targets: environment != AppEnvironment::Production,
            },
            data_service: DataServiceConfig {
                base_url,
                public_key,
                timeout: data_service_timeout,
            },
            verification: VerificationConfig {
                endpoints,
                timeout: verification_timeout,
            },
            session: SessionConfig { path: session_path },
            webhook: WebhookConfig {
                allowed_prefix: optional("WEBHOOK_ALLOWED_PREFIX"),
                timeout: webhook_timeout,
            },
        })
    }
}

fn optional(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing { key })
}

/// Positive whole seconds, or `default` when unset.
fn timeout_secs(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs = match optional(key) {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout { key })?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { key, source })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme {
            key,
            scheme: url.scheme().to_string(),
        }),
    }
}

/// Parse `name=url` or bare `url` entries separated by commas. Bare entries
/// are named after their host.
fn parse_endpoints(raw: &str) -> Result<Vec<VerificationEndpoint>, ConfigError> {
    let mut endpoints = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (name, address) = match entry.split_once('=') {
            Some((name, address)) if !name.contains("://") => {
                (Some(name.trim().to_string()), address.trim())
            }
            _ => (None, entry),
        };
        let url = parse_url("VERIFICATION_ENDPOINTS", address)?;
        let name = name
            .filter(|name| !name.is_empty())
            .or_else(|| url.host_str().map(str::to_string))
            .unwrap_or_else(|| format!("endpoint-{}", endpoints.len() + 1));
        endpoints.push(VerificationEndpoint::new(name, url));
    }

    if endpoints.is_empty() {
        return Err(ConfigError::Missing {
            key: "VERIFICATION_ENDPOINTS",
        });
    }
    Ok(endpoints)
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

    /// Origin reported to third parties, e.g. as a webhook's `triggered_from`.
    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
    pub show_targets: bool,
}

/// Remote data service holding opportunities. `timeout` bounds every request.
#[derive(Debug, Clone)]
pub struct DataServiceConfig {
    pub base_url: Url,
    pub public_key: String,
    pub timeout: Duration,
}

/// Member verification endpoints and the overall deadline for a login attempt.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub endpoints: Vec<VerificationEndpoint>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub allowed_prefix: Option<String>,
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            allowed_prefix: None,
            timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidTimeout {
        key: &'static str,
    },
    Missing {
        key: &'static str,
    },
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    UnsupportedScheme {
        key: &'static str,
        scheme: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout { key } => {
                write!(f, "{key} must be a positive number of seconds")
            }
            ConfigError::Missing { key } => {
                write!(f, "{key} is required; set it in the environment or .env")
            }
            ConfigError::InvalidUrl { key, .. } => write!(f, "{key} contains an invalid URL"),
            ConfigError::UnsupportedScheme { key, scheme } => {
                write!(f, "{key} must use http or https, found '{scheme}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidUrl { source, .. } => Some(source),
            _ => None,
        }
    }
}
