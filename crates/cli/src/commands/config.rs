use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, serialize_payload, CommandResult, GlobalArgs};

const PRECEDENCE: &str = "flag > env > file > default";

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    precedence: &'static str,
    config_file: Option<String>,
    fields: Vec<ConfigField>,
}

#[derive(Debug, Serialize)]
struct ConfigField {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config("config", global) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let sources = SourceResolver::new(global);
    let database_url_flag = global.database_url.is_some();

    let fields = vec![
        sources.field_with_flag(
            "database.url",
            config.database.url.clone(),
            &["THOSEJOBS_DATABASE_URL"],
            database_url_flag.then_some("--database-url"),
        ),
        sources.field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["THOSEJOBS_DATABASE_MAX_CONNECTIONS"],
        ),
        sources.field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["THOSEJOBS_DATABASE_TIMEOUT_SECS"],
        ),
        sources.field(
            "marketplace.platform_fee_percent",
            config.marketplace.platform_fee_percent.to_string(),
            &["THOSEJOBS_PLATFORM_FEE_PERCENT"],
        ),
        sources.field(
            "marketplace.categories",
            config.marketplace.categories.join(", "),
            &[],
        ),
        sources.field(
            "marketplace.default_sort",
            config.marketplace.default_sort.clone(),
            &["THOSEJOBS_DEFAULT_SORT"],
        ),
        sources.field(
            "logging.level",
            config.logging.level.clone(),
            &["THOSEJOBS_LOGGING_LEVEL", "THOSEJOBS_LOG_LEVEL"],
        ),
        sources.field(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["THOSEJOBS_LOGGING_FORMAT", "THOSEJOBS_LOG_FORMAT"],
        ),
    ];

    let report = ConfigReport {
        command: "config",
        status: "ok",
        precedence: PRECEDENCE,
        config_file: sources.path.as_ref().map(|path| path.display().to_string()),
        fields,
    };
    CommandResult { exit_code: 0, output: serialize_payload(&report) }
}

struct SourceResolver {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl SourceResolver {
    fn new(global: &GlobalArgs) -> Self {
        let path = detect_config_path(global.config_path.as_deref());
        let doc = path.as_deref().and_then(load_config_file_doc);
        Self { path, doc }
    }

    fn field(&self, key: &'static str, value: String, env_keys: &[&str]) -> ConfigField {
        self.field_with_flag(key, value, env_keys, None)
    }

    fn field_with_flag(
        &self,
        key: &'static str,
        value: String,
        env_keys: &[&str],
        flag: Option<&str>,
    ) -> ConfigField {
        let source = match flag {
            Some(flag) => format!("flag ({flag})"),
            None => self.source(key, env_keys),
        };
        ConfigField { key, value, source }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn env_is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|value| !value.trim().is_empty())
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("thosejobs.toml"), PathBuf::from("config/thosejobs.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[marketplace]\nplatform_fee_percent = 25\n".parse().expect("toml");

        assert!(contains_path(&doc, "marketplace.platform_fee_percent"));
        assert!(!contains_path(&doc, "marketplace.default_sort"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
