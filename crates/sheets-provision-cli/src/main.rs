//! Command-line entry point for `sheets-provision`.
//!
//! Usage:
//! ```bash
//! sheets-provision "Quarterly Report"
//! sheets-provision --config ./sheets-provision.toml --folder-id 0AbCdEf "Quarterly Report"
//! RUST_LOG=debug sheets-provision --log-format json "Quarterly Report"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sheets_provision::{ConfigError, GoogleSheetsClient, ProvisionConfig, SheetProvisioner};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sheets-provision", author, version, about)]
struct Cli {
    /// Name of the spreadsheet to create or update
    name: String,

    /// Path to a config file (skips config file discovery)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drive folder to list and create spreadsheets in (overrides config)
    #[arg(long)]
    folder_id: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Builds the log filter from `RUST_LOG`-style directives, defaulting to `info`
/// when none are set or they fail to parse.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn init_tracing(format: LogFormat) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(directives.as_deref()));

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Applies command-line overrides on top of the resolved config and
/// validates the result.
fn apply_cli_overrides(
    mut config: ProvisionConfig,
    cli: &Cli,
) -> std::result::Result<ProvisionConfig, ConfigError> {
    if let Some(folder_id) = &cli.folder_id {
        config.folder_id = Some(folder_id.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = ProvisionConfig::resolve(cli.config.as_deref())
        .context("failed to load configuration")?;
    let config = apply_cli_overrides(config, &cli).context("invalid command-line options")?;

    let client =
        GoogleSheetsClient::from_config(&config.google).context("failed to build API client")?;
    let mut provisioner = SheetProvisioner::new(client);
    if let Some(folder_id) = config.folder_id {
        provisioner = provisioner.with_folder(folder_id);
    }

    let provisioned = provisioner
        .provision(&cli.name)
        .await
        .with_context(|| format!("failed to provision spreadsheet '{}'", cli.name))?;

    info!(
        spreadsheet_id = %provisioned.spreadsheet.id,
        sheet_id = provisioned.worksheet.sheet_id,
        "spreadsheet '{}' is up to date",
        provisioned.spreadsheet.title
    );
    Ok(())
}
