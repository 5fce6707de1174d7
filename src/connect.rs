use crate::errors::{AppError, Result};
use crate::tokens::TokenBundle;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Read-only, date-scoped queries against the metrics service. Each returns the
/// loosely typed payload as-is; projection happens in `metrics`.
#[async_trait]
pub trait MetricsService: Send + Sync {
    async fn daily_stats(&self, date: NaiveDate) -> Result<Value>;
    async fn heart_rates(&self, date: NaiveDate) -> Result<Value>;
    async fn stress(&self, date: NaiveDate) -> Result<Value>;
    async fn sleep(&self, date: NaiveDate) -> Result<Value>;
    async fn steps(&self, date: NaiveDate) -> Result<Value>;
}

pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

/// Authenticated Garmin Connect API handle.
#[derive(Debug, Clone)]
pub struct ConnectClient {
    http: Client,
    api_base: String,
    tokens: TokenBundle,
    display_name: String,
    tokens_saved: bool,
}

impl ConnectClient {
    pub fn new(http: Client, api_base: impl Into<String>, tokens: TokenBundle) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            tokens,
            display_name: String::new(),
            tokens_saved: false,
        }
    }

    pub fn tokens(&self) -> &TokenBundle {
        &self.tokens
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether obtaining this session wrote new tokens to the store.
    pub fn tokens_saved(&self) -> bool {
        self.tokens_saved
    }

    pub(crate) fn mark_tokens_saved(&mut self) {
        self.tokens_saved = true;
    }

    /// Resolves the display name used in per-user endpoints; doubles as the
    /// check that the stored tokens are still accepted.
    pub async fn load_profile(&mut self) -> Result<()> {
        let profile = self.get_json("/userprofile-service/socialProfile", &[]).await?;
        let name = profile
            .get("displayName")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::unexpected("social profile has no displayName"))?;
        self.display_name = name.to_string();
        debug!("resolved display name");
        Ok(())
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.tokens.oauth2.authorization())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::auth(format!("{url} rejected the session ({status})")));
        }
        if !status.is_success() {
            return Err(AppError::Status { status, url });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Object(Default::default()));
        }

        let body = response.bytes().await?;
        debug!("{} returned {} bytes", path, body.len());
        if body.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MetricsService for ConnectClient {
    async fn daily_stats(&self, date: NaiveDate) -> Result<Value> {
        let path = format!("/usersummary-service/usersummary/daily/{}", self.display_name);
        self.get_json(&path, &[("calendarDate", date.to_string())]).await
    }

    async fn heart_rates(&self, date: NaiveDate) -> Result<Value> {
        let path = format!("/wellness-service/wellness/dailyHeartRate/{}", self.display_name);
        self.get_json(&path, &[("date", date.to_string())]).await
    }

    async fn stress(&self, date: NaiveDate) -> Result<Value> {
        let path = format!("/wellness-service/wellness/dailyStress/{date}");
        self.get_json(&path, &[]).await
    }

    async fn sleep(&self, date: NaiveDate) -> Result<Value> {
        let path = format!("/wellness-service/wellness/dailySleepData/{}", self.display_name);
        self.get_json(
            &path,
            &[
                ("date", date.to_string()),
                ("nonSleepBufferMinutes", "60".to_string()),
            ],
        )
        .await
    }

    async fn steps(&self, date: NaiveDate) -> Result<Value> {
        let path = format!("/wellness-service/wellness/dailySummaryChart/{}", self.display_name);
        self.get_json(&path, &[("date", date.to_string())]).await
    }
}
