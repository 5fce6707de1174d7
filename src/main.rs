use clap::Parser;
use sleeplog::{Cli, Command, Config};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;
    let command = cli.command.unwrap_or(Command::Log { answers: None });

    if let Err(err) = sleeplog::run(&config, command).await {
        error!("{err}");
        std::process::exit(1);
    }

    Ok(())
}
