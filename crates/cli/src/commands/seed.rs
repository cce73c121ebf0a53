use thosejobs_db::{DemoDataset, JobSeedInfo};

use crate::commands::{build_runtime, load_config, open_pool, CommandResult, GlobalArgs};

pub fn run(global: &GlobalArgs, reset: bool) -> CommandResult {
    let config = match load_config("seed", global) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        if reset {
            DemoDataset::clean(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        }

        let seed_result = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Vec<JobSeedInfo>, (&'static str, String, u8)> =
            if verification.all_present {
                Ok(seed_result.jobs_seeded)
            } else {
                let failed_checks = verification
                    .checks
                    .iter()
                    .filter_map(|(check, passed)| (!passed).then_some(*check))
                    .collect::<Vec<_>>();
                Err(("seed_verification", verification_failure_message(&failed_checks), 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(jobs) => {
            let job_descriptions: Vec<String> =
                jobs.iter().map(|job| format!("  - {}: {}", job.job_id, job.description)).collect();
            let message = format!(
                "demo marketplace loaded with {} jobs:\n{}",
                jobs.len(),
                job_descriptions.join("\n")
            );
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some demo rows failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed_checks.join(", "))
    }
}
