use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::SortKey;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub marketplace: MarketplaceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarketplaceConfig {
    /// Share of a quotation retained by the platform, in percent.
    pub platform_fee_percent: Decimal,
    pub categories: Vec<String>,
    pub default_sort: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub platform_fee_percent: Option<Decimal>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CATEGORIES: &[&str] =
    &["Photos", "Pickup/Dropoff", "Walkthrough", "Signage", "Other"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://thosejobs.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            marketplace: MarketplaceConfig {
                platform_fee_percent: Decimal::new(30, 0),
                categories: DEFAULT_CATEGORIES.iter().map(|value| value.to_string()).collect(),
                default_sort: "created_at_desc".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("thosejobs.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(marketplace) = patch.marketplace {
            if let Some(platform_fee_percent) = marketplace.platform_fee_percent {
                self.marketplace.platform_fee_percent = platform_fee_percent;
            }
            if let Some(categories) = marketplace.categories {
                self.marketplace.categories = categories;
            }
            if let Some(default_sort) = marketplace.default_sort {
                self.marketplace.default_sort = default_sort;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("THOSEJOBS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("THOSEJOBS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("THOSEJOBS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("THOSEJOBS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("THOSEJOBS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("THOSEJOBS_PLATFORM_FEE_PERCENT") {
            self.marketplace.platform_fee_percent =
                parse_env("THOSEJOBS_PLATFORM_FEE_PERCENT", &value)?;
        }
        if let Some(value) = read_env("THOSEJOBS_DEFAULT_SORT") {
            self.marketplace.default_sort = value;
        }

        let log_level =
            read_env("THOSEJOBS_LOGGING_LEVEL").or_else(|| read_env("THOSEJOBS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("THOSEJOBS_LOGGING_FORMAT").or_else(|| read_env("THOSEJOBS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(platform_fee_percent) = overrides.platform_fee_percent {
            self.marketplace.platform_fee_percent = platform_fee_percent;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_marketplace(&self.marketplace)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("thosejobs.toml"), PathBuf::from("config/thosejobs.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_marketplace(marketplace: &MarketplaceConfig) -> Result<(), ConfigError> {
    let fee = marketplace.platform_fee_percent;
    if fee < Decimal::ZERO || fee > Decimal::ONE_HUNDRED {
        return Err(ConfigError::Validation(format!(
            "marketplace.platform_fee_percent must be in range 0..=100 (got {fee})"
        )));
    }

    if marketplace.categories.iter().any(|category| category.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "marketplace.categories must not contain blank entries".to_string(),
        ));
    }

    SortKey::parse(&marketplace.default_sort).map_err(|error| {
        ConfigError::Validation(format!("marketplace.default_sort is invalid: {error}"))
    })?;

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    marketplace: Option<MarketplacePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketplacePatch {
    platform_fee_percent: Option<Decimal>,
    categories: Option<Vec<String>>,
    default_sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_and_use_thirty_percent_fee() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        ensure(
            config.marketplace.platform_fee_percent == Decimal::new(30, 0),
            "default platform fee should be 30%",
        )?;
        ensure(config.marketplace.default_sort == "created_at_desc", "default sort")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default format")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_THOSEJOBS_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("thosejobs.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_THOSEJOBS_DB}"

[marketplace]
platform_fee_percent = 5
categories = ["Photos", "Other"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from the environment",
            )?;
            ensure(
                config.marketplace.platform_fee_percent == Decimal::new(5, 0),
                "file fee percent should replace the default",
            )?;
            ensure(config.marketplace.categories.len() == 2, "file categories should apply")
        })();

        clear_vars(&["TEST_THOSEJOBS_DB"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("THOSEJOBS_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("THOSEJOBS_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("thosejobs.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
format = "pretty"
"#,
            )
            .map_err(|err| err.to_string())?;

            let from_env = AppConfig::load(LoadOptions {
                config_path: Some(path.clone()),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(from_env.database.url == "sqlite://from-env.db", "env should beat file")?;
            ensure(matches!(from_env.logging.format, LogFormat::Json), "env format alias")?;
            ensure(from_env.logging.level == "warn", "file level should survive")?;

            let overridden = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    platform_fee_percent: Some(Decimal::new(125, 1)),
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                overridden.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(overridden.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                overridden.marketplace.platform_fee_percent == Decimal::new(125, 1),
                "override fee should win",
            )
        })();

        clear_vars(&["THOSEJOBS_DATABASE_URL", "THOSEJOBS_LOG_FORMAT"]);
        result
    }

    #[test]
    fn out_of_range_fee_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("THOSEJOBS_PLATFORM_FEE_PERCENT", "130");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("platform_fee_percent")
            );
            ensure(has_message, "validation failure should mention platform_fee_percent")
        })();

        clear_vars(&["THOSEJOBS_PLATFORM_FEE_PERCENT"]);
        result
    }

    #[test]
    fn malformed_env_number_is_reported_with_its_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("THOSEJOBS_DATABASE_MAX_CONNECTIONS", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "THOSEJOBS_DATABASE_MAX_CONNECTIONS", "key should be reported")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid env override".to_string()),
        };

        clear_vars(&["THOSEJOBS_DATABASE_MAX_CONNECTIONS"]);
        result
    }

    #[test]
    fn unknown_default_sort_is_rejected() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.marketplace.default_sort = "popularity".to_string();

        let rejected = matches!(
            config.validate(),
            Err(ConfigError::Validation(ref message)) if message.contains("default_sort")
        );
        ensure(rejected, "invalid default sort should fail validation")
    }
}
