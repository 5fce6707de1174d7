use crate::config::Config;
use crate::connect::MetricsService;
use crate::errors::{AppError, Result};
use crate::metrics::fetch_daily_metrics;
use crate::models::{DailyRecord, SleepWindow};
use crate::prompt::{collect_ratings, InputSource};
use crate::workbook::{upsert, Upsert, Workbook};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored { row: u32, record: DailyRecord },
    /// A row for the date already existed and the user chose to keep it.
    Skipped,
}

/// Queries the service, asks for the day's ratings and merges both. Fails with
/// `MissingSleepWindow` before prompting when last night has no confirmed sleep.
pub async fn build_record(
    service: &dyn MetricsService,
    config: &Config,
    input: &mut dyn InputSource,
) -> Result<DailyRecord> {
    let metrics = fetch_daily_metrics(service, config).await?;
    let SleepWindow::Confirmed(sleep) = &metrics.sleep else {
        return Err(AppError::MissingSleepWindow(config.record_date));
    };
    info!(
        "sleep data for {}: {}",
        config.record_date,
        serde_json::to_string(sleep)?
    );

    let rating = collect_ratings(input)?;
    let record = DailyRecord::assemble(config.record_date, &rating, sleep, &metrics);
    info!("number of tracked stats: {}", record.fields.len());
    Ok(record)
}

/// Upserts `record` into the configured workbook. The file is only rewritten
/// when a row was written.
pub fn store_record(config: &Config, record: &DailyRecord, input: &mut dyn InputSource) -> Result<Outcome> {
    let mut workbook = Workbook::open(&config.workbook_path, &config.sheet_name)?;
    match upsert(workbook.sheet_mut()?, record, input)? {
        Upsert::Written(row) => {
            workbook.save()?;
            info!("row {row} written for {}", record.date);
            Ok(Outcome::Stored {
                row,
                record: record.clone(),
            })
        }
        Upsert::Skipped => Ok(Outcome::Skipped),
    }
}

pub async fn build_and_store(
    service: &dyn MetricsService,
    config: &Config,
    input: &mut dyn InputSource,
) -> Result<Outcome> {
    let record = build_record(service, config, input).await?;
    store_record(config, &record, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cli;
    use crate::models::FieldValue;
    use crate::prompt::ScriptedInput;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use clap::Parser;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// In-memory stand-in for the Connect API that records the dates asked for.
    struct FakeService {
        sleep_confirmed: bool,
        calls: Mutex<Vec<(&'static str, NaiveDate)>>,
    }

    impl FakeService {
        fn new(sleep_confirmed: bool) -> Self {
            Self {
                sleep_confirmed,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, query: &'static str, date: NaiveDate) {
            self.calls.lock().unwrap().push((query, date));
        }
    }

    #[async_trait]
    impl MetricsService for FakeService {
        async fn daily_stats(&self, date: NaiveDate) -> Result<Value> {
            self.record("stats", date);
            Ok(json!({ "totalSteps": 8421, "totalKilocalories": 2310.0 }))
        }

        async fn heart_rates(&self, date: NaiveDate) -> Result<Value> {
            self.record("heart", date);
            Ok(json!({ "maxHeartRate": 151, "restingHeartRate": 52 }))
        }

        async fn stress(&self, date: NaiveDate) -> Result<Value> {
            self.record("stress", date);
            Ok(json!({ "maxStressLevel": 88 }))
        }

        async fn sleep(&self, date: NaiveDate) -> Result<Value> {
            self.record("sleep", date);
            Ok(json!({
                "dailySleepDTO": {
                    "sleepWindowConfirmed": self.sleep_confirmed,
                    "sleepTimeSeconds": 27000,
                    "sleepStartTimestampGMT": 1_709_272_800_000_i64,
                    "sleepEndTimestampGMT": 1_709_299_800_000_i64,
                    "sleepScores": { "overall": { "value": 77 } }
                }
            }))
        }

        async fn steps(&self, date: NaiveDate) -> Result<Value> {
            self.record("steps", date);
            Ok(json!([]))
        }
    }

    fn config(workbook: &std::path::Path) -> Config {
        let cli = Cli::try_parse_from([
            "sleeplog",
            "--date",
            "2024-03-01",
            "--timezone",
            "UTC",
            "--tokenstore",
            "/nonexistent/tokens",
            "--workbook",
            workbook.to_str().unwrap(),
        ])
        .unwrap();
        Config::from_cli(&cli).unwrap()
    }

    const ANSWERS: [&str; 8] = ["8", "2", "0.25", "y", "n", "6", "7", "9"];

    #[tokio::test]
    async fn record_merges_ratings_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("sleepdata.xlsx"));
        let service = FakeService::new(true);
        let mut input = ScriptedInput::new(ANSWERS);

        let record = build_record(&service, &config, &mut input).await.unwrap();

        assert_eq!(record.fields.len(), 28);
        let names: Vec<_> = record.fields.names().collect();
        assert_eq!(&names[..3], &["date", "wakefulness", "cupsOfCoffee"]);
        assert_eq!(names[9], "sleepWindowConfirmed");
        assert_eq!(names[27], "avgStressLevel");
        assert_eq!(record.fields.get("modafanil"), Some(&FieldValue::Float(0.25)));
        assert_eq!(record.fields.get("sleepTimeHours"), Some(&FieldValue::Float(7.5)));
        assert_eq!(record.fields.get("avgStressLevel"), Some(&FieldValue::Int(0)));

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let calls = service.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![("stats", before), ("heart", before), ("stress", before), ("sleep", day)]
        );
    }

    #[tokio::test]
    async fn missing_sleep_window_stops_before_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleepdata.xlsx");
        let config = config(&path);
        let mut input = ScriptedInput::new(ANSWERS);

        let err = build_and_store(&FakeService::new(false), &config, &mut input)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingSleepWindow(_)));
        assert!(input.prompts.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn declined_duplicate_does_not_rewrite_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleepdata.xlsx");
        let config = config(&path);
        let service = FakeService::new(true);

        let first = build_and_store(&service, &config, &mut ScriptedInput::new(ANSWERS))
            .await
            .unwrap();
        assert!(matches!(first, Outcome::Stored { row: 2, .. }));
        let saved = std::fs::read(&path).unwrap();

        let mut answers: Vec<&str> = ANSWERS.to_vec();
        answers.push("n");
        let second = build_and_store(&service, &config, &mut ScriptedInput::new(answers))
            .await
            .unwrap();

        assert_eq!(second, Outcome::Skipped);
        assert_eq!(std::fs::read(&path).unwrap(), saved);
    }
}
