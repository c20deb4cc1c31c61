use anyhow::Result;
use clap::Parser;
use itadakimasu::app::{App, Endpoints};
use itadakimasu::config::Configuration;
use itadakimasu::credentials::CredentialStore;
use itadakimasu::ui::StdioPrompter;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// API key to use instead of the stored one
    #[arg(long, env = "BREADBOX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they stay out of the prompts.
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Itadakimasu v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.unwrap_or_else(Configuration::default_path);
    let config = Configuration::from_file(&config_path)?;
    info!("Configuration loaded from: {}", config_path.display());

    let credentials = CredentialStore::beside(&config_path);
    let mut prompter = StdioPrompter::new(std::io::stdin().lock(), std::io::stdout());
    if std::io::stdin().is_terminal() {
        prompter = prompter.hiding_secrets();
    }

    let mut app = App::new(prompter, config, config_path, credentials, Endpoints::default())?
        .with_api_key(cli.api_key);

    let outcome = app.run().await;
    if let Err(e) = app.save_config() {
        error!("Failed to save configuration: {:#}", e);
    }
    outcome
}
