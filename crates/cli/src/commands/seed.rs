use crate::commands::{load_config, runtime, CommandFailure, CommandResult};
use leaveflow_db::{connect, migrations, SeedCheck, SeedDataset, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome: Result<SeedResult, CommandFailure> = if verification.all_passed() {
            Ok(seeded)
        } else {
            Err(("seed_verification", verification_message(verification.failures()), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demonstration organization ready ({}); {} rows inserted",
                seeded.employees.join(", "),
                seeded.inserted_rows
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message<'a>(failures: impl Iterator<Item = &'a SeedCheck>) -> String {
    let failed = failures
        .map(|check| {
            format!("{} (expected {}, found {})", check.name, check.expected, check.actual)
        })
        .collect::<Vec<_>>();

    if failed.is_empty() {
        "seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}
