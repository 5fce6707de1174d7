//! Credential exchange against Garmin SSO and the OAuth1 to OAuth2 token swap.

use crate::config::Endpoints;
use crate::errors::{AppError, Result};
use crate::tokens::{OAuth1Token, OAuth2Token, TokenBundle};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use reqwest::{header, Client, Method};
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, info};
use url::form_urlencoded;

const OAUTH_USER_AGENT: &str = "com.garmin.android.apps.connectmobile";

#[derive(Debug, Clone, Deserialize)]
pub struct Consumer {
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// Logs in with e-mail and password and returns a fresh token bundle.
pub async fn login(http: &Client, endpoints: &Endpoints, email: &str, password: &str) -> Result<TokenBundle> {
    let sso = format!("{}/sso", endpoints.sso);
    let embed = format!("{sso}/embed");
    let signin = format!("{sso}/signin");

    let embed_params = [
        ("id", "gauth-widget"),
        ("embedWidget", "true"),
        ("gauthHost", sso.as_str()),
    ];
    let signin_params = [
        ("id", "gauth-widget"),
        ("embedWidget", "true"),
        ("gauthHost", embed.as_str()),
        ("service", embed.as_str()),
        ("source", embed.as_str()),
        ("redirectAfterAccountLoginUrl", embed.as_str()),
        ("redirectAfterAccountCreationUrl", embed.as_str()),
    ];

    http.get(&embed)
        .query(&embed_params)
        .send()
        .await?
        .error_for_status()?;

    let page = http
        .get(&signin)
        .query(&signin_params)
        .header(header::REFERER, embed.as_str())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let csrf = capture(r#"name="_csrf"\s+value="(.+?)""#, &page)?
        .ok_or_else(|| AppError::unexpected("sign-in page has no csrf token"))?;

    let page = http
        .post(&signin)
        .query(&signin_params)
        .header(header::REFERER, signin.as_str())
        .form(&[
            ("username", email),
            ("password", password),
            ("embed", "true"),
            ("_csrf", csrf.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let title = capture(r"<title>(.+?)</title>", &page)?.unwrap_or_default();
    if title.contains("MFA") {
        return Err(AppError::auth("multi-factor authentication is not supported"));
    }
    if title != "Success" {
        return Err(AppError::auth(format!("sign-in was not accepted (page title '{title}')")));
    }
    let ticket = capture(r#"embed\?ticket=([^"]+)""#, &page)?
        .ok_or_else(|| AppError::unexpected("sign-in response has no ticket"))?;
    debug!("received sign-in ticket");

    let consumer = fetch_consumer(http, endpoints).await?;
    let oauth1 = preauthorize(http, endpoints, &consumer, &ticket, &embed).await?;
    let oauth2 = exchange_with(http, endpoints, &consumer, &oauth1).await?;
    info!("logged in to Garmin Connect");
    Ok(TokenBundle { oauth1, oauth2 })
}

/// Trades a still valid OAuth1 token for a new OAuth2 token.
pub async fn exchange(http: &Client, endpoints: &Endpoints, oauth1: &OAuth1Token) -> Result<OAuth2Token> {
    let consumer = fetch_consumer(http, endpoints).await?;
    exchange_with(http, endpoints, &consumer, oauth1).await
}

async fn fetch_consumer(http: &Client, endpoints: &Endpoints) -> Result<Consumer> {
    let consumer = http
        .get(&endpoints.consumer)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(consumer)
}

async fn preauthorize(
    http: &Client,
    endpoints: &Endpoints,
    consumer: &Consumer,
    ticket: &str,
    login_url: &str,
) -> Result<OAuth1Token> {
    let url = format!("{}/oauth-service/oauth/preauthorized", endpoints.api);
    let query = [
        ("ticket", ticket),
        ("login-url", login_url),
        ("accepts-mfa-tokens", "true"),
    ];
    let authorization = authorization_header(&Method::GET, &url, &query, consumer, None)?;

    let body = http
        .get(&url)
        .query(&query)
        .header(header::USER_AGENT, OAUTH_USER_AGENT)
        .header(header::AUTHORIZATION, authorization)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let pairs = parse_form(&body);
    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    };
    Ok(OAuth1Token {
        oauth_token: lookup("oauth_token")
            .ok_or_else(|| AppError::unexpected("preauthorized response has no oauth_token"))?,
        oauth_token_secret: lookup("oauth_token_secret").ok_or_else(|| {
            AppError::unexpected("preauthorized response has no oauth_token_secret")
        })?,
        mfa_token: lookup("mfa_token"),
        mfa_expiration_timestamp: lookup("mfa_expiration_timestamp"),
        domain: endpoints
            .api
            .split_once("connectapi.")
            .map(|(_, domain)| domain.to_string()),
    })
}

async fn exchange_with(
    http: &Client,
    endpoints: &Endpoints,
    consumer: &Consumer,
    oauth1: &OAuth1Token,
) -> Result<OAuth2Token> {
    let url = format!("{}/oauth-service/oauth/exchange/user/2.0", endpoints.api);
    let form: Vec<(&str, &str)> = oauth1
        .mfa_token
        .as_deref()
        .map(|token| vec![("mfa_token", token)])
        .unwrap_or_default();
    let authorization = authorization_header(&Method::POST, &url, &form, consumer, Some(oauth1))?;

    let token: OAuth2Token = http
        .post(&url)
        .header(header::USER_AGENT, OAUTH_USER_AGENT)
        .header(header::AUTHORIZATION, authorization)
        .form(&form)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    debug!("exchanged oauth1 token for oauth2 token");
    Ok(token.stamp_expiry())
}

fn capture(pattern: &str, haystack: &str) -> Result<Option<String>> {
    let regex = Regex::new(pattern).map_err(|err| AppError::unexpected(err.to_string()))?;
    Ok(regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str().to_string()))
}

/// Builds an OAuth 1.0a `Authorization` header signed with HMAC-SHA1.
fn authorization_header(
    method: &Method,
    url: &str,
    params: &[(&str, &str)],
    consumer: &Consumer,
    token: Option<&OAuth1Token>,
) -> Result<String> {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let timestamp = Utc::now().timestamp().to_string();
    sign(method, url, params, consumer, token, &nonce, &timestamp)
}

fn sign(
    method: &Method,
    url: &str,
    params: &[(&str, &str)],
    consumer: &Consumer,
    token: Option<&OAuth1Token>,
    nonce: &str,
    timestamp: &str,
) -> Result<String> {
    let mut oauth = vec![
        ("oauth_consumer_key", consumer.consumer_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_version", "1.0".to_string()),
    ];
    if let Some(token) = token {
        oauth.push(("oauth_token", token.oauth_token.clone()));
    }

    let mut encoded: Vec<(String, String)> = oauth
        .iter()
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .chain(
            params
                .iter()
                .map(|(key, value)| (percent_encode(key), percent_encode(value))),
        )
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(url),
        percent_encode(&normalized)
    );
    let key = format!(
        "{}&{}",
        percent_encode(&consumer.consumer_secret),
        percent_encode(token.map(|t| t.oauth_token_secret.as_str()).unwrap_or(""))
    );

    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|err| AppError::Auth(format!("cannot sign request: {err}")))?;
    mac.update(base.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    oauth.push(("oauth_signature", signature));
    let fields = oauth
        .iter()
        .map(|(key, value)| format!(r#"{}="{}""#, key, percent_encode(value)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

/// RFC 3986 encoding: everything but unreserved characters becomes `%XX`.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

fn percent_encode(raw: &str) -> String {
    utf8_percent_encode(raw, OAUTH_ENCODE).to_string()
}

fn parse_form(body: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(body.trim().as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
