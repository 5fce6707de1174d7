use crate::config::{Command, Config};
use crate::connect::MetricsService;
use crate::errors::{AppError, Result};
use crate::journal::{build_and_store, Outcome};
use crate::metrics::{fetch_daily_metrics, steps_summary};
use crate::models::SleepWindow;
use crate::prompt::{ConsoleInput, InputSource, ScriptedInput};
use crate::session::obtain_session;
use serde_json::json;
use tracing::info;

/// Runs one command to completion. A missing sleep window and a declined
/// duplicate both end the run without an error.
pub async fn run(config: &Config, command: Command) -> Result<()> {
    let mut console = ConsoleInput;
    let session = obtain_session(config, &mut console).await?;
    info!("logged in as {}", session.display_name());

    match command {
        Command::Login => {
            if session.tokens_saved() {
                println!(
                    "Tokens stored in '{}'; later runs will not ask for credentials.",
                    config.token_file.display()
                );
            } else {
                println!("Stored session is still valid; nothing to update.");
            }
            Ok(())
        }
        Command::Fetch => fetch(&session, config).await,
        Command::Log { answers } => {
            let mut input: Box<dyn InputSource> = match answers {
                Some(path) => Box::new(ScriptedInput::from_file(&path)?),
                None => Box::new(console),
            };
            match build_and_store(&session, config, input.as_mut()).await {
                Ok(Outcome::Stored { row, .. }) => {
                    println!("data saved (row {row} of '{}').", config.workbook_path.display());
                    Ok(())
                }
                Ok(Outcome::Skipped) => Ok(()),
                Err(AppError::MissingSleepWindow(_)) => {
                    println!("No sleep data available from last night");
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    }
}

async fn fetch(service: &dyn MetricsService, config: &Config) -> Result<()> {
    let metrics = fetch_daily_metrics(service, config).await?;
    let steps = steps_summary(&service.steps(config.activity_date()).await?);
    let sleep = match &metrics.sleep {
        SleepWindow::Confirmed(summary) => serde_json::to_value(summary)?,
        SleepWindow::Unconfirmed => serde_json::Value::Null,
    };

    let report = json!({
        "date": config.record_date,
        "activityDate": config.activity_date(),
        "sleep": sleep,
        "health": metrics.health,
        "heartRate": metrics.heart_rate,
        "stress": metrics.stress,
        "steps": steps,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
