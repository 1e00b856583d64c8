//! Back-office configuration.
//!
//! Layered: built-in defaults, then `backoffice.toml` (optional), then
//! `PHARMA__*` environment variables.
//!
//! ```text
//! PHARMA__DATABASE__PATH=/var/lib/pharma/backoffice.db
//! PHARMA__SALES__TAX_RATE_BPS=2000
//! PHARMA__RESET_CODES__TTL_MINUTES=10
//! PHARMA__SMTP__HOST=smtp.example.com
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use pharma_core::validation::{validate_sale_prefix, validate_tax_rate_bps};
use pharma_core::{
    ResetCodePolicy, TaxRate, ValidationError, DEFAULT_SALE_PREFIX, DEFAULT_TAX_RATE_BPS,
};
use pharma_db::DbConfig;
use pharma_services::SalesConfig;

/// File read by [`BackofficeConfig::load`] when present.
pub const DEFAULT_CONFIG_FILE: &str = "backoffice.toml";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "PHARMA";

/// Longest accepted reset-code TTL or issuance window (one week).
pub const MAX_POLICY_MINUTES: i64 = 7 * 24 * 60;

/// Back-office configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackofficeConfig {
    pub database: DatabaseSettings,
    pub sales: SalesSettings,
    pub reset_codes: ResetCodeSettings,
    /// Reset codes are only logged when absent.
    pub smtp: Option<SmtpSettings>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("./backoffice.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SalesSettings {
    pub sale_prefix: String,
    pub tax_rate_bps: u32,
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            sale_prefix: DEFAULT_SALE_PREFIX.to_string(),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResetCodeSettings {
    pub ttl_minutes: i64,
    pub max_issuances: u32,
    pub window_minutes: i64,
    pub max_failed_attempts: u32,
    /// How often used and expired codes are purged.
    pub cleanup_interval_secs: u64,
}

impl Default for ResetCodeSettings {
    fn default() -> Self {
        let policy = ResetCodePolicy::default();
        ResetCodeSettings {
            ttl_minutes: policy.ttl.num_minutes(),
            max_issuances: policy.max_issuances,
            window_minutes: policy.issuance_window.num_minutes(),
            max_failed_attempts: policy.max_failed_attempts,
            cleanup_interval_secs: 300,
        }
    }
}

#[derive(Clone, Deserialize, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `Pharmacy <no-reply@pharmacy.example>`.
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: "info,pharma=debug,sqlx=warn".to_string(),
        }
    }
}

impl BackofficeConfig {
    /// Loads `backoffice.toml` (if any) and `PHARMA__*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Like [`BackofficeConfig::load`] with an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    /// Parses a TOML document without consulting the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self, ConfigError> {
        let config: BackofficeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the process misbehave rather than
    /// fail loudly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        validate_tax_rate_bps(self.sales.tax_rate_bps)?;
        validate_sale_prefix(&self.sales.sale_prefix)?;
        check_minutes("reset_codes.ttl_minutes", self.reset_codes.ttl_minutes)?;
        check_minutes(
            "reset_codes.window_minutes",
            self.reset_codes.window_minutes,
        )?;
        self.reset_policy().validate()?;

        if self.reset_codes.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reset_codes.cleanup_interval_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(smtp) = &self.smtp {
            if smtp.host.trim().is_empty() {
                return Err(ConfigError::MissingRequired("smtp.host".to_string()));
            }
            if smtp.from.trim().is_empty() {
                return Err(ConfigError::MissingRequired("smtp.from".to_string()));
            }
            if smtp.username.is_some() != smtp.password.is_some() {
                return Err(ConfigError::InvalidValue {
                    field: "smtp.username".to_string(),
                    reason: "username and password must be set together".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(StdDuration::from_secs(self.database.busy_timeout_secs))
    }

    pub fn sales_config(&self) -> SalesConfig {
        SalesConfig {
            tax_rate: TaxRate::from_bps(self.sales.tax_rate_bps),
            sale_prefix: self.sales.sale_prefix.clone(),
        }
    }

    /// Minutes are clamped to `0..=MAX_POLICY_MINUTES`; [`Self::validate`]
    /// rejects anything outside that range first.
    pub fn reset_policy(&self) -> ResetCodePolicy {
        let minutes = |m: i64| chrono::Duration::minutes(m.clamp(0, MAX_POLICY_MINUTES));
        ResetCodePolicy {
            ttl: minutes(self.reset_codes.ttl_minutes),
            max_issuances: self.reset_codes.max_issuances,
            issuance_window: minutes(self.reset_codes.window_minutes),
            max_failed_attempts: self.reset_codes.max_failed_attempts,
        }
    }

    pub fn cleanup_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.reset_codes.cleanup_interval_secs)
    }
}

fn check_minutes(field: &str, minutes: i64) -> Result<(), ConfigError> {
    if !(1..=MAX_POLICY_MINUTES).contains(&minutes) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be between 1 and {MAX_POLICY_MINUTES} minutes"),
        });
    }
    Ok(())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}
