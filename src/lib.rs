pub mod app;
pub mod config;
pub mod connect;
pub mod errors;
pub mod journal;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod session;
pub mod sso;
pub mod tokens;
pub mod workbook;

pub use app::run;
pub use config::{Cli, Command, Config};
pub use connect::{ConnectClient, MetricsService};
pub use errors::{AppError, Result};
pub use journal::{build_and_store, Outcome};
pub use session::obtain_session;
