pub mod config;
pub mod jobs;
pub mod migrate;
pub mod profile;
pub mod quotes;
pub mod role;
pub mod seed;

use std::future::Future;
use std::path::PathBuf;

use serde::Serialize;
use thosejobs_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use thosejobs_core::context::MarketplaceContext;
use thosejobs_core::domain::profile::ProfileId;
use thosejobs_core::errors::{ActionOutcome, WorkflowError};
use thosejobs_core::session::SessionContext;
use thosejobs_db::{connect_with_settings, migrations, sqlite_context, DbPool};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    /// Profile the command acts as. Marketplace commands run signed out
    /// without it.
    pub acting_as: Option<String>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct ActionPayload<'a, T> {
    command: &'a str,
    #[serde(flatten)]
    outcome: ActionOutcome<T>,
}

/// Exit code for a marketplace action the workflow refused.
pub const ACTION_FAILED: u8 = 1;

pub(crate) type Failure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn action<T: Serialize>(command: &str, outcome: ActionOutcome<T>) -> Self {
        let exit_code = if outcome.success { 0 } else { ACTION_FAILED };
        Self { exit_code, output: serialize_payload(&ActionPayload { command, outcome }) }
    }

    fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

pub(crate) fn serialize_payload(payload: &impl Serialize) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, global: &GlobalArgs) -> Result<AppConfig, CommandResult> {
    AppConfig::load(global.load_options()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects and brings the schema up to date.
pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;

    Ok(pool)
}

async fn sign_in(context: &MarketplaceContext, acting_as: &str) -> Result<(), WorkflowError> {
    let profile = context
        .profiles
        .find_profile(&ProfileId(acting_as.to_owned()))
        .await?
        .ok_or_else(|| WorkflowError::not_found("profile", acting_as))?;
    context.session.sign_in(&profile);
    tracing::debug!(
        event_name = "cli.session.signed_in",
        profile_id = %profile.id,
        role = %profile.role,
        "acting as profile"
    );
    Ok(())
}

/// Runs one marketplace action against the configured database and prints
/// its outcome. Infrastructure failures keep their own exit codes; refused
/// actions exit with [`ACTION_FAILED`].
pub(crate) fn run_action<T, F, Fut>(command: &str, global: &GlobalArgs, action: F) -> CommandResult
where
    T: Serialize,
    F: FnOnce(MarketplaceContext, AppConfig) -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    let config = match load_config(command, global) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let context = sqlite_context(pool.clone(), SessionContext::default());

        let outcome = match global.acting_as.as_deref() {
            Some(profile_id) => match sign_in(&context, profile_id).await {
                Ok(()) => action(context, config).await,
                Err(error) => Err(error),
            },
            None => action(context, config).await,
        };

        pool.close().await;
        Ok::<_, Failure>(outcome)
    });

    match result {
        Ok(outcome) => {
            if let Err(error) = &outcome {
                tracing::info!(
                    event_name = "cli.action.refused",
                    command,
                    kind = ?error.kind(),
                    error = %error,
                    "marketplace action failed"
                );
            }
            CommandResult::action(command, ActionOutcome::from(outcome))
        }
        Err(failure) => CommandResult::from_failure(command, failure),
    }
}
