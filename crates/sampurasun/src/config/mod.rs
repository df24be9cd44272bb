use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

use crate::workflows::reporting::CompliancePolicy;

pub const DEFAULT_COMPLIANCE_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_COMPLIANCE_GRACE_DAYS: i64 = 30;
pub const DEFAULT_SWEEP_HOUR: u32 = 2;
pub const DEFAULT_REMINDER_MESSAGE: &str = "Harap segera laporkan data bulan ini.";

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
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub compliance: ComplianceConfig,
    pub sweep: SweepConfig,
    pub auth: AuthConfig,
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

        let compliance = ComplianceConfig {
            window_days: env_days("APP_COMPLIANCE_WINDOW_DAYS", DEFAULT_COMPLIANCE_WINDOW_DAYS)?,
            grace_days: env_days("APP_COMPLIANCE_GRACE_DAYS", DEFAULT_COMPLIANCE_GRACE_DAYS)?,
        };

        let sweep = SweepConfig {
            enabled: env_flag("APP_SWEEP_ENABLED", true)?,
            hour: env_number("APP_SWEEP_HOUR", DEFAULT_SWEEP_HOUR)?,
            minute: env_number("APP_SWEEP_MINUTE", 0)?,
            message: env::var("APP_SWEEP_MESSAGE")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REMINDER_MESSAGE.to_string()),
        };
        if sweep.hour > 23 || sweep.minute > 59 {
            return Err(ConfigError::InvalidSweepTime {
                hour: sweep.hour,
                minute: sweep.minute,
            });
        }

        let auth = AuthConfig::parse(&env::var("APP_ADMIN_TOKENS").unwrap_or_default())?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            compliance,
            sweep,
            auth,
        })
    }
}

fn env_number<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        _ => Ok(default),
    }
}

/// Non-negative day count that fits a `chrono::Duration`.
fn env_days(var: &'static str, default: i64) -> Result<i64, ConfigError> {
    let days = env_number(var, default)?;
    if days < 0 {
        return Err(ConfigError::NegativeDays { var });
    }
    if Duration::try_days(days).is_none() {
        return Err(ConfigError::InvalidNumber {
            var,
            value: days.to_string(),
        });
    }
    Ok(days)
}

fn env_flag(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { var, value: raw }),
        },
        Err(_) => Ok(default),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Day thresholds feeding the compliance classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceConfig {
    pub window_days: i64,
    pub grace_days: i64,
}

impl ComplianceConfig {
    /// Day counts beyond `chrono`'s range saturate instead of panicking.
    pub fn policy(&self) -> CompliancePolicy {
        CompliancePolicy::new(
            saturating_days(self.window_days),
            saturating_days(self.grace_days),
        )
    }
}

fn saturating_days(days: i64) -> Duration {
    Duration::try_days(days).unwrap_or(if days < 0 { Duration::MIN } else { Duration::MAX })
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_COMPLIANCE_WINDOW_DAYS,
            grace_days: DEFAULT_COMPLIANCE_GRACE_DAYS,
        }
    }
}

/// Daily reminder sweep schedule, interpreted in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub message: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: DEFAULT_SWEEP_HOUR,
            minute: 0,
            message: DEFAULT_REMINDER_MESSAGE.to_string(),
        }
    }
}

/// Bearer tokens accepted by the static identity resolver, as `(token, subject)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub admin_tokens: Vec<(String, String)>,
}

impl AuthConfig {
    /// Parses `token:subject` pairs separated by commas. A bare token maps to subject `admin`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut admin_tokens = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let (token, subject) = match entry.split_once(':') {
                Some((token, subject)) => (token.trim(), subject.trim()),
                None => (entry, "admin"),
            };
            if token.is_empty() || subject.is_empty() {
                return Err(ConfigError::InvalidToken);
            }
            admin_tokens.push((token.to_string(), subject.to_string()));
        }
        Ok(Self { admin_tokens })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str, value: String },
    InvalidFlag { var: &'static str, value: String },
    NegativeDays { var: &'static str },
    InvalidSweepTime { hour: u32, minute: u32 },
    InvalidToken,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a number (found '{value}')")
            }
            ConfigError::InvalidFlag { var, value } => {
                write!(f, "{var} must be true or false (found '{value}')")
            }
            ConfigError::NegativeDays { var } => write!(f, "{var} must not be negative"),
            ConfigError::InvalidSweepTime { hour, minute } => write!(
                f,
                "sweep time {hour:02}:{minute:02} is outside 00:00-23:59"
            ),
            ConfigError::InvalidToken => {
                write!(f, "APP_ADMIN_TOKENS entries must be token or token:subject")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
