use crate::config::{Config, TokenSource};
use crate::connect::{http_client, ConnectClient};
use crate::errors::{AppError, Result};
use crate::prompt::InputSource;
use crate::sso;
use crate::tokens::TokenBundle;
use reqwest::Client;
use tracing::{info, warn};

/// Returns an authenticated client, resuming stored tokens when possible and
/// logging in with credentials otherwise. Fresh tokens are persisted.
pub async fn obtain_session(config: &Config, input: &mut dyn InputSource) -> Result<ConnectClient> {
    let http = http_client()?;

    match resume(&http, config).await {
        Ok(client) => return Ok(client),
        Err(err) if err.is_session_recoverable() => {
            warn!("stored session unusable ({err}), logging in with credentials");
        }
        Err(err) => return Err(err),
    }

    fresh_login(&http, config, input).await.map_err(|err| match err {
        AppError::Auth(_) | AppError::InputClosed => err,
        other => AppError::Auth(other.to_string()),
    })
}

async fn resume(http: &Client, config: &Config) -> Result<ConnectClient> {
    let mut bundle = load_bundle(config).await?;
    let refreshed = bundle.oauth2.expired();
    if refreshed {
        info!("stored oauth2 token expired, exchanging oauth1 token");
        bundle.oauth2 = sso::exchange(http, &config.endpoints, &bundle.oauth1).await?;
    }

    let mut client = ConnectClient::new(http.clone(), config.endpoints.api.clone(), bundle);
    client.load_profile().await?;
    if refreshed {
        persist(config, client.tokens()).await?;
        client.mark_tokens_saved();
    }
    info!("resumed Garmin Connect session");
    Ok(client)
}

async fn load_bundle(config: &Config) -> Result<TokenBundle> {
    match &config.token_source {
        TokenSource::Inline(encoded) => TokenBundle::decode(encoded),
        TokenSource::Directory(dir) => {
            info!("loading tokens from directory '{}'", dir.display());
            match TokenBundle::load_dir(dir).await {
                Ok(bundle) => Ok(bundle),
                Err(AppError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                    info!("trying encoded tokens in '{}'", config.token_file.display());
                    TokenBundle::load_file(&config.token_file)
                        .await
                        .map_err(|_| AppError::Io(err))
                }
                Err(err) => Err(err),
            }
        }
    }
}

async fn fresh_login(http: &Client, config: &Config, input: &mut dyn InputSource) -> Result<ConnectClient> {
    let (email, password) = match (&config.email, &config.password) {
        (Some(email), Some(password)) => (email.clone(), password.clone()),
        _ => {
            let email = input.read_line("Login e-mail: ")?.ok_or(AppError::InputClosed)?;
            let password = input
                .read_secret("Enter password: ")?
                .ok_or(AppError::InputClosed)?;
            (email.trim().to_string(), password)
        }
    };

    let bundle = sso::login(http, &config.endpoints, &email, &password).await?;
    let mut client = ConnectClient::new(http.clone(), config.endpoints.api.clone(), bundle);
    client.load_profile().await?;
    persist(config, client.tokens()).await?;
    client.mark_tokens_saved();
    Ok(client)
}

async fn persist(config: &Config, bundle: &TokenBundle) -> Result<()> {
    if let TokenSource::Directory(dir) = &config.token_source {
        bundle.dump_dir(dir).await?;
    }
    bundle.dump_file(&config.token_file).await
}
