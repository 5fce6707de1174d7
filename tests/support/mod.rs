use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const EMAIL: &str = "sleeper@example.com";
pub const PASSWORD: &str = "correct horse";
pub const STORED_ACCESS: &str = "stored-access";
pub const FRESH_ACCESS: &str = "fresh-access";
pub const DISPLAY_NAME: &str = "sleeper";

#[derive(Debug, Default)]
pub struct MockState {
    pub sleep_confirmed: bool,
    pub logins: AtomicUsize,
    pub exchanges: AtomicUsize,
    pub rejections: AtomicUsize,
}

pub struct MockConnect {
    pub base_url: String,
    pub state: Arc<MockState>,
}

/// Serves the subset of the Connect, SSO and OAuth endpoints the client uses.
pub async fn spawn_mock(sleep_confirmed: bool) -> MockConnect {
    let state = Arc::new(MockState {
        sleep_confirmed,
        ..MockState::default()
    });

    let app = Router::new()
        .route("/consumer", get(consumer))
        .route("/sso/embed", get(embed))
        .route("/sso/signin", get(signin_page).post(signin_submit))
        .route("/oauth-service/oauth/preauthorized", get(preauthorized))
        .route("/oauth-service/oauth/exchange/user/2.0", post(exchange))
        .route("/userprofile-service/socialProfile", get(social_profile))
        .route("/usersummary-service/usersummary/daily/:name", get(daily_stats))
        .route("/wellness-service/wellness/dailyHeartRate/:name", get(heart_rates))
        .route("/wellness-service/wellness/dailyStress/:date", get(stress))
        .route("/wellness-service/wellness/dailySleepData/:name", get(sleep))
        .route("/wellness-service/wellness/dailySummaryChart/:name", get(steps))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });

    MockConnect {
        base_url: format!("http://{addr}"),
        state,
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    value == format!("Bearer {STORED_ACCESS}") || value == format!("Bearer {FRESH_ACCESS}")
}

fn guarded(headers: &HeaderMap, body: Value) -> Response {
    if authorized(headers) {
        Json(body).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn consumer() -> Json<Value> {
    Json(json!({ "consumer_key": "consumer-key", "consumer_secret": "consumer-secret" }))
}

async fn embed() -> Html<&'static str> {
    Html("<html><body>embed</body></html>")
}

async fn signin_page() -> Html<&'static str> {
    Html(r#"<html><form><input type="hidden" name="_csrf" value="csrf-123"/></form></html>"#)
}

async fn signin_submit(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Html<String> {
    let accepted = form.get("username").map(String::as_str) == Some(EMAIL)
        && form.get("password").map(String::as_str) == Some(PASSWORD)
        && form.get("_csrf").map(String::as_str) == Some("csrf-123");
    if !accepted {
        return Html("<html><head><title>GARMIN Authentication Application</title></head></html>".to_string());
    }
    state.logins.fetch_add(1, Ordering::SeqCst);
    Html(
        r#"<html><head><title>Success</title></head>
        <body><script>var url = "https://sso.example/sso/embed?ticket=ST-0001-abc";</script></body></html>"#
            .to_string(),
    )
}

async fn preauthorized(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    let signed = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("OAuth ") && v.contains("oauth_signature="));
    if !signed || query.get("ticket").map(String::as_str) != Some("ST-0001-abc") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    "oauth_token=oauth1-token&oauth_token_secret=oauth1-secret".into_response()
}

async fn exchange(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let signed = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("oauth_token=\"oauth1-token\""));
    if !signed {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.exchanges.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "scope": "CONNECT_READ",
        "jti": "jti-1",
        "token_type": "Bearer",
        "access_token": FRESH_ACCESS,
        "refresh_token": "refresh",
        "expires_in": 3600,
        "refresh_token_expires_in": 7200
    }))
    .into_response()
}

async fn social_profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        state.rejections.fetch_add(1, Ordering::SeqCst);
    }
    guarded(&headers, json!({ "displayName": DISPLAY_NAME, "id": 42 }))
}

async fn daily_stats(
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if name != DISPLAY_NAME || !query.contains_key("calendarDate") {
        return StatusCode::NOT_FOUND.into_response();
    }
    guarded(
        &headers,
        json!({
            "calendarDate": query["calendarDate"],
            "totalKilocalories": 2412.0,
            "totalSteps": 11873,
            "highlyActiveSeconds": 1620,
            "activeSeconds": 5400,
            "sedentarySeconds": 41000,
            "bodyBatteryDrainedValue": 71,
            "bodyBatteryChargedValue": 64,
            "bodyBatteryLowestValue": 18,
            "bodyBatteryHighestValue": 89,
            "avgWakingRespirationValue": 14.5
        }),
    )
}

async fn heart_rates(headers: HeaderMap) -> Response {
    guarded(
        &headers,
        json!({ "maxHeartRate": 163, "restingHeartRate": 51, "heartRateValues": [] }),
    )
}

async fn stress(headers: HeaderMap) -> Response {
    guarded(&headers, json!({ "maxStressLevel": 92, "avgStressLevel": 31 }))
}

async fn sleep(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    guarded(
        &headers,
        json!({
            "dailySleepDTO": {
                "sleepWindowConfirmed": state.sleep_confirmed,
                "sleepTimeSeconds": 27000,
                "sleepStartTimestampGMT": 1_709_272_800_000_i64,
                "sleepEndTimestampGMT": 1_709_299_800_000_i64,
                "sleepScores": { "overall": { "value": 81, "qualifierKey": "GOOD" } }
            }
        }),
    )
}

async fn steps(headers: HeaderMap) -> Response {
    guarded(
        &headers,
        json!([
            { "startGMT": "2024-02-29T08:00:00.0", "steps": 412 },
            { "startGMT": "2024-02-29T08:15:00.0", "steps": 88 }
        ]),
    )
}

/// Command-line arguments pointing every endpoint and file at the mock and `dir`.
pub fn args(mock: &MockConnect, dir: &FsPath) -> Vec<String> {
    vec![
        "sleeplog".to_string(),
        "--date".to_string(),
        "2024-03-01".to_string(),
        "--timezone".to_string(),
        "UTC".to_string(),
        "--tokenstore".to_string(),
        tokens_dir(dir).display().to_string(),
        "--tokenstore-base64".to_string(),
        tokens_file(dir).display().to_string(),
        "--workbook".to_string(),
        workbook_path(dir).display().to_string(),
        "--api-url".to_string(),
        mock.base_url.clone(),
        "--sso-url".to_string(),
        mock.base_url.clone(),
        "--consumer-url".to_string(),
        format!("{}/consumer", mock.base_url),
    ]
}

pub fn tokens_dir(dir: &FsPath) -> PathBuf {
    dir.join("garminconnect")
}

pub fn tokens_file(dir: &FsPath) -> PathBuf {
    dir.join("garminconnect_base64")
}

pub fn workbook_path(dir: &FsPath) -> PathBuf {
    dir.join("sleepdata.xlsx")
}

/// Writes a stored session whose OAuth2 token expires at `expires_at`.
pub fn write_tokens(dir: &FsPath, expires_at: i64) {
    write_tokens_with(dir, STORED_ACCESS, expires_at);
}

pub fn write_tokens_with(dir: &FsPath, access_token: &str, expires_at: i64) {
    let store = tokens_dir(dir);
    std::fs::create_dir_all(&store).unwrap();
    std::fs::write(
        store.join("oauth1_token.json"),
        json!({
            "oauth_token": "oauth1-token",
            "oauth_token_secret": "oauth1-secret",
            "domain": "garmin.com"
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        store.join("oauth2_token.json"),
        json!({
            "scope": "CONNECT_READ",
            "jti": "jti-0",
            "token_type": "Bearer",
            "access_token": access_token,
            "refresh_token": "refresh",
            "expires_in": 3600,
            "expires_at": expires_at,
            "refresh_token_expires_in": 7200,
            "refresh_token_expires_at": expires_at + 3600
        })
        .to_string(),
    )
    .unwrap();
}

pub const RATING_ANSWERS: [&str; 8] = ["8", "2", "0.25", "y", "n", "6", "7", "9"];
