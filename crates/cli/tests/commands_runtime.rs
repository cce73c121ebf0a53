use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use thosejobs_cli::commands::jobs::{self, JobsCommand, TransitionArg};
use thosejobs_cli::commands::profile::{self, ProfileCommand};
use thosejobs_cli::commands::quotes::{self, QuotesCommand, StatusArg};
use thosejobs_cli::commands::role::{self, RoleCommand};
use thosejobs_cli::commands::{config, migrate, seed, CommandResult, GlobalArgs};
use thosejobs_core::domain::profile::Role;

const PROVIDER: &str = "demo-provider-001";
const WORKER_ONE: &str = "demo-worker-001";
const WORKER_TWO: &str = "demo-worker-002";
const ADMIN: &str = "demo-admin-001";

struct Sandbox {
    dir: TempDir,
    database_url: String,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("cli.db").display());
        Self { dir, database_url }
    }

    fn seeded() -> Self {
        let sandbox = Self::new();
        let result = seed::run(&sandbox.anonymous(), false);
        assert_eq!(result.exit_code, 0, "seed failed: {}", result.output);
        sandbox
    }

    fn anonymous(&self) -> GlobalArgs {
        GlobalArgs {
            config_path: None,
            database_url: Some(self.database_url.clone()),
            acting_as: None,
        }
    }

    fn as_profile(&self, profile_id: &str) -> GlobalArgs {
        GlobalArgs { acting_as: Some(profile_id.to_owned()), ..self.anonymous() }
    }

    fn transition(&self, profile_id: &str, job_id: &str, action: TransitionArg) -> Value {
        let result = jobs::run(
            &self.as_profile(profile_id),
            JobsCommand::Transition { job_id: job_id.to_owned(), action },
        );
        expect_success(&result)
    }
}

#[test]
fn migrate_returns_success_for_a_fresh_database() {
    with_env(&[], || {
        let sandbox = Sandbox::new();
        let result = migrate::run(&sandbox.anonymous());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn missing_explicit_config_file_is_a_config_failure() {
    with_env(&[], || {
        let global = GlobalArgs {
            config_path: Some(PathBuf::from("does/not/exist/thosejobs.toml")),
            ..GlobalArgs::default()
        };
        let result = migrate::run(&global);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_repeatable_with_a_stable_summary() {
    with_env(&[], || {
        let sandbox = Sandbox::new();

        let first = seed::run(&sandbox.anonymous(), false);
        assert_eq!(first.exit_code, 0, "first seed failed: {}", first.output);
        let second = seed::run(&sandbox.anonymous(), false);
        assert_eq!(second.exit_code, 0, "second seed failed: {}", second.output);

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["message"], second_payload["message"]);
        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("demo-job-open"), "unexpected message: {message}");
    });
}

#[test]
fn config_reports_flag_and_env_sources() {
    with_env(&[("THOSEJOBS_PLATFORM_FEE_PERCENT", "25")], || {
        let sandbox = Sandbox::new();
        let result = config::run(&sandbox.anonymous());
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let fields = payload["fields"].as_array().cloned().unwrap_or_default();
        let field = |key: &str| {
            fields.iter().find(|field| field["key"] == key).cloned().unwrap_or(Value::Null)
        };

        assert_eq!(field("database.url")["source"], "flag (--database-url)");
        assert_eq!(field("marketplace.platform_fee_percent")["value"], "25");
        assert_eq!(
            field("marketplace.platform_fee_percent")["source"],
            "env (THOSEJOBS_PLATFORM_FEE_PERCENT)"
        );
        assert_eq!(field("logging.level")["source"], "default");
    });
}

#[test]
fn fee_preview_uses_the_configured_percentage() {
    with_env(&[], || {
        let sandbox = Sandbox::new();
        let result = quotes::run(
            &sandbox.anonymous(),
            QuotesCommand::Fee { amount: Decimal::new(100, 0) },
        );
        let data = expect_success(&result)["data"].clone();

        assert_eq!(decimal(&data["fee"]), Decimal::new(30, 0));
        assert_eq!(decimal(&data["net"]), Decimal::new(70, 0));
    });
}

#[test]
fn marketplace_commands_require_an_acting_profile() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let result = jobs::run(
            &sandbox.anonymous(),
            JobsCommand::List {
                view: None,
                search: None,
                location: None,
                category: None,
                sort: None,
            },
        );

        assert_eq!(result.exit_code, 1);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"]["kind"], "not_authenticated");
    });
}

#[test]
fn worker_board_hides_jobs_already_quoted_on() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let list = |profile_id: &str| {
            let result = jobs::run(
                &sandbox.as_profile(profile_id),
                JobsCommand::List {
                    view: None,
                    search: None,
                    location: None,
                    category: None,
                    sort: None,
                },
            );
            expect_success(&result)["data"].as_array().cloned().unwrap_or_default()
        };

        let for_second_worker = list(WORKER_TWO);
        assert_eq!(for_second_worker.len(), 1);
        assert_eq!(for_second_worker[0]["id"], "demo-job-open");
        assert_eq!(for_second_worker[0]["client_name"], "pat_provides");

        assert!(list(WORKER_ONE).is_empty());
    });
}

#[test]
fn filter_options_list_distinct_values() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let result = jobs::run(&sandbox.as_profile(PROVIDER), JobsCommand::Filters);
        let data = expect_success(&result)["data"].clone();

        assert_eq!(data["locations"], serde_json::json!(["Leeds", "York"]));
        assert_eq!(data["categories"], serde_json::json!(["Carpentry", "Decorating", "Plumbing"]));
        assert_eq!(
            data["post_categories"],
            serde_json::json!(["Photos", "Pickup/Dropoff", "Walkthrough", "Signage", "Other"])
        );
    });
}

#[test]
fn filter_options_offer_configured_post_categories() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let config_path = sandbox.dir.path().join("thosejobs.toml");
        std::fs::write(&config_path, "[marketplace]\ncategories = [\"Gardening\", \"Plumbing\"]\n")
            .expect("write config");
        let global =
            GlobalArgs { config_path: Some(config_path), ..sandbox.as_profile(WORKER_ONE) };

        let result = jobs::run(&global, JobsCommand::Filters);
        let data = expect_success(&result)["data"].clone();

        assert_eq!(data["post_categories"], serde_json::json!(["Gardening", "Plumbing"]));
        assert_eq!(data["categories"], serde_json::json!(["Carpentry", "Decorating", "Plumbing"]));
    });
}

#[test]
fn accepting_a_quote_assigns_the_job() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let result = quotes::run(
            &sandbox.as_profile(PROVIDER),
            QuotesCommand::Accept { quotation_id: "demo-quote-open".to_owned() },
        );
        let receipt = expect_success(&result)["data"].clone();

        assert_eq!(receipt["job"]["status"], "accepted");
        assert_eq!(receipt["job"]["worker_id"], WORKER_ONE);
        assert_eq!(receipt["quotation"]["status"], "accepted");

        let listing = quotes::run(
            &sandbox.as_profile(PROVIDER),
            QuotesCommand::List { job_id: "demo-job-open".to_owned(), status: StatusArg::All },
        );
        let quotations = expect_success(&listing)["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(quotations.len(), 1);
        assert_eq!(quotations[0]["worker_name"], "wes_works");
    });
}

#[test]
fn a_second_claim_reports_a_conflict() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let claim = |profile_id: &str| {
            jobs::run(
                &sandbox.as_profile(profile_id),
                JobsCommand::Claim { job_id: "demo-job-open".to_owned() },
            )
        };

        let first = claim(WORKER_TWO);
        let job = expect_success(&first)["data"].clone();
        assert_eq!(job["status"], "submitted");
        assert_eq!(job["worker_id"], WORKER_TWO);

        let second = claim(WORKER_ONE);
        assert_eq!(second.exit_code, 1);
        let payload = parse_payload(&second.output);
        assert_eq!(payload["error"]["kind"], "claim_conflict");
    });
}

#[test]
fn claimed_job_runs_through_to_payment() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        expect_success(&jobs::run(
            &sandbox.as_profile(WORKER_TWO),
            JobsCommand::Claim { job_id: "demo-job-open".to_owned() },
        ));

        sandbox.transition(PROVIDER, "demo-job-open", TransitionArg::ApproveAssignment);
        sandbox.transition(WORKER_TWO, "demo-job-open", TransitionArg::Complete);
        sandbox.transition(PROVIDER, "demo-job-open", TransitionArg::ApproveCompletion);
        let paid = sandbox.transition(ADMIN, "demo-job-open", TransitionArg::RecordPayment);

        assert_eq!(paid["data"]["status"], "paid");
    });
}

#[test]
fn quoting_worker_cannot_become_a_provider() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let result = role::run(
            &sandbox.as_profile(WORKER_ONE),
            RoleCommand::Switch { role: Role::Provider },
        );

        assert_eq!(result.exit_code, 1);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error"]["kind"], "guard_violation");
    });
}

#[test]
fn rename_rejects_a_taken_username() {
    with_env(&[], || {
        let sandbox = Sandbox::seeded();
        let taken = profile::run(
            &sandbox.as_profile(ADMIN),
            ProfileCommand::Rename { username: "wes_works".to_owned() },
        );
        assert_eq!(taken.exit_code, 1, "unexpected output: {}", taken.output);

        let renamed = profile::run(
            &sandbox.as_profile(ADMIN),
            ProfileCommand::Rename { username: "ada_ops".to_owned() },
        );
        assert_eq!(expect_success(&renamed)["data"]["username"], "ada_ops");
    });
}

fn expect_success(result: &CommandResult) -> Value {
    assert_eq!(result.exit_code, 0, "command failed: {}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["success"], true);
    payload
}

fn decimal(value: &Value) -> Decimal {
    let raw = value.as_str().map(str::to_owned).unwrap_or_else(|| value.to_string());
    raw.parse().expect("decimal field")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "THOSEJOBS_DATABASE_URL",
        "THOSEJOBS_DATABASE_MAX_CONNECTIONS",
        "THOSEJOBS_DATABASE_TIMEOUT_SECS",
        "THOSEJOBS_PLATFORM_FEE_PERCENT",
        "THOSEJOBS_DEFAULT_SORT",
        "THOSEJOBS_LOGGING_LEVEL",
        "THOSEJOBS_LOGGING_FORMAT",
        "THOSEJOBS_LOG_LEVEL",
        "THOSEJOBS_LOG_FORMAT",
    ];

    let previous: Vec<(String, Option<String>)> =
        keys.iter().map(|key| ((*key).to_string(), env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
