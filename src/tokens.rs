use crate::errors::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

const OAUTH1_FILE: &str = "oauth1_token.json";
const OAUTH2_FILE: &str = "oauth2_token.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Fills in the absolute expiry fields from the relative ones, as the
    /// exchange endpoint only returns the latter.
    pub fn stamp_expiry(mut self) -> Self {
        let now = Utc::now().timestamp();
        self.expires_at = now + self.expires_in;
        self.refresh_token_expires_at = now + self.refresh_token_expires_in;
        self
    }

    pub fn expired(&self) -> bool {
        self.expires_at < Utc::now().timestamp()
    }

    pub fn authorization(&self) -> String {
        let scheme = match self.token_type.as_str() {
            "" => "Bearer",
            "bearer" => "Bearer",
            other => other,
        };
        format!("{scheme} {}", self.access_token)
    }
}

/// Credential material that lets a run resume without a password.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBundle {
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

impl TokenBundle {
    pub async fn load_dir(dir: &Path) -> Result<Self> {
        let oauth1 = fs::read(dir.join(OAUTH1_FILE)).await?;
        let oauth2 = fs::read(dir.join(OAUTH2_FILE)).await?;
        Ok(Self {
            oauth1: serde_json::from_slice(&oauth1)?,
            oauth2: serde_json::from_slice(&oauth2)?,
        })
    }

    pub async fn dump_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).await?;
        fs::write(dir.join(OAUTH1_FILE), serde_json::to_vec_pretty(&self.oauth1)?).await?;
        fs::write(dir.join(OAUTH2_FILE), serde_json::to_vec_pretty(&self.oauth2)?).await?;
        info!("oauth tokens stored in '{}'", dir.display());
        Ok(())
    }

    /// Base64 of the JSON pair `[oauth1, oauth2]`.
    pub fn encode(&self) -> Result<String> {
        let payload = serde_json::to_vec(&(&self.oauth1, &self.oauth2))?;
        Ok(STANDARD.encode(payload))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| AppError::Token(format!("invalid base64 token bundle: {err}")))?;
        let (oauth1, oauth2): (OAuth1Token, OAuth2Token) = serde_json::from_slice(&bytes)?;
        Ok(Self { oauth1, oauth2 })
    }

    pub async fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).await?;
        Self::decode(&contents)
    }

    pub async fn dump_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, self.encode()?).await?;
        info!("encoded oauth tokens saved to '{}'", path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_bundle(expires_at: i64) -> TokenBundle {
    TokenBundle {
        oauth1: OAuth1Token {
            oauth_token: "oauth-token".to_string(),
            oauth_token_secret: "oauth-secret".to_string(),
            mfa_token: None,
            mfa_expiration_timestamp: None,
            domain: Some("garmin.com".to_string()),
        },
        oauth2: OAuth2Token {
            scope: "CONNECT_READ".to_string(),
            jti: "jti".to_string(),
            token_type: "Bearer".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 3600,
            expires_at,
            refresh_token_expires_in: 7200,
            refresh_token_expires_at: expires_at + 3600,
        },
    }
}
