use crate::errors::{AppError, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

const DEFAULT_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";

/// Token store strings longer than this are treated as an inline encoded bundle
/// rather than a directory path.
pub const INLINE_TOKEN_THRESHOLD: usize = 512;

#[derive(Debug, Parser)]
#[command(
    name = "sleeplog",
    version,
    about = "Log last night's Garmin sleep and daily ratings to a spreadsheet"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Garmin Connect login e-mail; prompted for when absent.
    #[arg(long, env = "EMAIL", global = true)]
    pub email: Option<String>,

    #[arg(long, env = "PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Directory holding the OAuth token files.
    #[arg(long, env = "GARMINTOKENS", global = true, default_value = "~/.garminconnect")]
    pub tokenstore: String,

    /// File receiving the base64 encoded token bundle.
    #[arg(
        long,
        env = "GARMINTOKENS_BASE64",
        global = true,
        default_value = "~/.garminconnect_base64"
    )]
    pub tokenstore_base64: String,

    #[arg(long, env = "SLEEPLOG_WORKBOOK", global = true, default_value = "sleepdata.xlsx")]
    pub workbook: String,

    #[arg(long, env = "SLEEPLOG_SHEET", global = true, default_value = "data")]
    pub sheet: String,

    /// IANA zone the sleep timestamps are converted to.
    #[arg(
        long,
        env = "SLEEPLOG_TIMEZONE",
        global = true,
        default_value = "America/Los_Angeles"
    )]
    pub timezone: String,

    /// Record date (YYYY-MM-DD); defaults to today.
    #[arg(long, global = true)]
    pub date: Option<NaiveDate>,

    #[arg(long, env = "GARMIN_DOMAIN", global = true, default_value = "garmin.com")]
    pub domain: String,

    #[arg(long, env = "GARMIN_CONNECT_API", global = true, hide = true)]
    pub api_url: Option<String>,

    #[arg(long, env = "GARMIN_SSO_URL", global = true, hide = true)]
    pub sso_url: Option<String>,

    #[arg(long, env = "GARMIN_CONSUMER_URL", global = true, hide = true)]
    pub consumer_url: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Fetch metrics, ask for ratings and write the day's row (default).
    Log {
        /// Read answers line by line from this file instead of the terminal.
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Fetch and print the day's metrics without prompting or writing.
    Fetch,
    /// Log in and store fresh tokens.
    Login,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api: String,
    pub sso: String,
    pub consumer: String,
}

impl Endpoints {
    pub fn for_domain(domain: &str) -> Self {
        Self {
            api: format!("https://connectapi.{domain}"),
            sso: format!("https://sso.{domain}"),
            consumer: DEFAULT_CONSUMER_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TokenSource {
    Directory(PathBuf),
    Inline(String),
}

/// Process-wide settings, built once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub email: Option<String>,
    pub password: Option<String>,
    pub token_source: TokenSource,
    pub token_file: PathBuf,
    pub workbook_path: PathBuf,
    pub sheet_name: String,
    pub timezone: Tz,
    pub record_date: NaiveDate,
    pub endpoints: Endpoints,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let timezone: Tz = cli
            .timezone
            .parse()
            .map_err(|_| AppError::Config(format!("unknown time zone '{}'", cli.timezone)))?;

        let token_source = if cli.tokenstore.len() > INLINE_TOKEN_THRESHOLD {
            TokenSource::Inline(cli.tokenstore.trim().to_string())
        } else {
            TokenSource::Directory(expand_home(&cli.tokenstore)?)
        };

        let mut endpoints = Endpoints::for_domain(&cli.domain);
        if let Some(api) = &cli.api_url {
            endpoints.api = api.trim_end_matches('/').to_string();
        }
        if let Some(sso) = &cli.sso_url {
            endpoints.sso = sso.trim_end_matches('/').to_string();
        }
        if let Some(consumer) = &cli.consumer_url {
            endpoints.consumer = consumer.clone();
        }

        Ok(Self {
            email: cli.email.clone().filter(|value| !value.is_empty()),
            password: cli.password.clone().filter(|value| !value.is_empty()),
            token_source,
            token_file: expand_home(&cli.tokenstore_base64)?,
            workbook_path: expand_home(&cli.workbook)?,
            sheet_name: cli.sheet.clone(),
            timezone,
            record_date: cli.date.unwrap_or_else(|| Utc::now().with_timezone(&timezone).date_naive()),
            endpoints,
        })
    }

    /// Day the activity summaries are read for: the day before the record date.
    pub fn activity_date(&self) -> NaiveDate {
        self.record_date.pred_opt().unwrap_or(self.record_date)
    }
}

pub fn expand_home(raw: &str) -> Result<PathBuf> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };
    let home = home::home_dir()
        .ok_or_else(|| AppError::Config("home directory not found: set HOME".to_string()))?;
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(Path::new(rest)))
    }
}
