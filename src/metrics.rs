use crate::config::Config;
use crate::connect::MetricsService;
use crate::errors::{AppError, Result};
use crate::models::{DailyMetrics, FieldSet, FieldValue, SleepSummary, SleepWindow, StepsSummary};
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::info;

pub const HEALTH_FIELDS: [&str; 10] = [
    "totalKilocalories",
    "totalSteps",
    "highlyActiveSeconds",
    "activeSeconds",
    "sedentarySeconds",
    "bodyBatteryDrainedValue",
    "bodyBatteryChargedValue",
    "bodyBatteryLowestValue",
    "bodyBatteryHighestValue",
    "avgWakingRespirationValue",
];

pub const HEART_RATE_FIELDS: [&str; 2] = ["maxHeartRate", "restingHeartRate"];

pub const STRESS_FIELDS: [&str; 2] = ["maxStressLevel", "avgStressLevel"];

/// Picks `fields` out of a service payload. Missing, `null` or non-scalar
/// values become `0`.
pub fn project(source: &Value, fields: &[&'static str]) -> FieldSet {
    let mut projected = FieldSet::new();
    for &field in fields {
        let value = source
            .get(field)
            .and_then(FieldValue::from_json)
            .unwrap_or(FieldValue::Int(0));
        projected.push(field, value);
    }
    projected
}

/// Epoch milliseconds (GMT) to a naive wall-clock time in `zone`.
pub fn gmt_millis_to_local(millis: i64, zone: Tz) -> Result<NaiveDateTime> {
    let utc = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::unexpected(format!("timestamp {millis} is out of range")))?;
    Ok(utc.with_timezone(&zone).naive_local())
}

pub fn sleep_window(source: &Value, zone: Tz) -> Result<SleepWindow> {
    let summary = source.get("dailySleepDTO").unwrap_or(&Value::Null);
    let confirmed = summary
        .get("sleepWindowConfirmed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !confirmed {
        return Ok(SleepWindow::Unconfirmed);
    }

    let seconds = summary
        .get("sleepTimeSeconds")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let timestamp = |field: &str| -> Result<NaiveDateTime> {
        let millis = summary
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| AppError::unexpected(format!("confirmed sleep window has no {field}")))?;
        gmt_millis_to_local(millis as i64, zone)
    };
    let score = summary
        .pointer("/sleepScores/overall/value")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    Ok(SleepWindow::Confirmed(SleepSummary {
        sleep_time_hours: seconds / 3600.0,
        sleep_start_time: timestamp("sleepStartTimestampGMT")?,
        sleep_end_time: timestamp("sleepEndTimestampGMT")?,
        sleep_score: score,
    }))
}

/// Interval count and summed steps of the intraday steps series.
pub fn steps_summary(series: &Value) -> StepsSummary {
    let intervals = series.as_array().map(Vec::as_slice).unwrap_or_default();
    StepsSummary {
        intervals: intervals.len(),
        total_steps: intervals
            .iter()
            .filter_map(|interval| interval.get("steps").and_then(Value::as_i64))
            .sum(),
    }
}

/// Runs the activity, heart-rate, stress and sleep queries for the configured
/// record date.
pub async fn fetch_daily_metrics(service: &dyn MetricsService, config: &Config) -> Result<DailyMetrics> {
    let activity_date = config.activity_date();

    let stats = service.daily_stats(activity_date).await?;
    let health = project(&stats, &HEALTH_FIELDS);
    info!("health data for {activity_date}: {}", serde_json::to_string(&health)?);

    let heart = service.heart_rates(activity_date).await?;
    let heart_rate = project(&heart, &HEART_RATE_FIELDS);
    info!("heart rate data for {activity_date}: {}", serde_json::to_string(&heart_rate)?);

    let stress_data = service.stress(activity_date).await?;
    let stress = project(&stress_data, &STRESS_FIELDS);
    info!("stress data for {activity_date}: {}", serde_json::to_string(&stress)?);

    let sleep_data = service.sleep(config.record_date).await?;
    let sleep = sleep_window(&sleep_data, config.timezone)?;

    Ok(DailyMetrics {
        sleep,
        health,
        heart_rate,
        stress,
    })
}
