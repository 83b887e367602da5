//! Cloud Identity CLI
//!
//! Resolves the controller's cloud identity from the ambient environment and
//! prints a summary. Secrets are never printed.
//!
//! # Usage
//! ```bash
//! # Resolve using AZURE_* env vars
//! cloud-identity
//!
//! # Override the subscription and emit JSON
//! cloud-identity --subscription-id 00000000-0000-0000-0000-000000000000 --format json
//!
//! # Check the credentials against the management endpoint
//! cloud-identity --probe
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cloud_identity::{IdentityBundle, IdentityResolver};

const PROBE_API_VERSION: &str = "2022-12-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cloud-identity", version, about = "Resolve cloud identity for a controller")]
struct Cli {
    /// Subscription to target (falls back to AZURE_SUBSCRIPTION_ID)
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID_OVERRIDE")]
    subscription_id: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Send one authorized request to the management endpoint
    #[arg(long)]
    probe: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Serialize)]
struct IdentitySummary<'a> {
    environment: &'a str,
    resource_manager_endpoint: &'a str,
    dns_suffix: &'a str,
    subscription_id: &'a str,
    tenant_id: &'a str,
    client_id: &'a str,
    client_secret_set: bool,
}

impl<'a> From<&'a IdentityBundle> for IdentitySummary<'a> {
    fn from(bundle: &'a IdentityBundle) -> Self {
        Self {
            environment: bundle.environment_name(),
            resource_manager_endpoint: bundle.resource_manager_endpoint(),
            dns_suffix: bundle.resource_manager_dns_suffix(),
            subscription_id: bundle.subscription_id(),
            tenant_id: bundle.tenant_id(),
            client_id: bundle.client_id(),
            client_secret_set: !bundle.client_secret().is_empty(),
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// GET the subscription with the resolved credentials
async fn probe(bundle: &IdentityBundle) -> Result<()> {
    let url = format!(
        "{}/subscriptions/{}?api-version={}",
        bundle.resource_manager_endpoint().trim_end_matches('/'),
        bundle.subscription_id(),
        PROBE_API_VERSION
    );

    let client = reqwest::Client::new();
    let request = bundle
        .authorize(client.get(&url))
        .await
        .context("Failed to authorize probe request")?;

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if status.is_success() {
        info!(status = status.as_u16(), "Probe succeeded");
    } else {
        warn!(status = status.as_u16(), "Probe returned non-success status");
    }
    println!("probe: {}", status);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let hint = cli.subscription_id.unwrap_or_default();
    let bundle = IdentityResolver::from_env()
        .resolve(&hint)
        .context("Failed to resolve cloud identity")?;

    let summary = IdentitySummary::from(&bundle);
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("environment:      {}", summary.environment);
            println!("endpoint:         {}", summary.resource_manager_endpoint);
            println!("dns suffix:       {}", summary.dns_suffix);
            println!("subscription id:  {}", summary.subscription_id);
            println!("tenant id:        {}", summary.tenant_id);
            println!("client id:        {}", summary.client_id);
            println!("client secret:    {}", if summary.client_secret_set { "set" } else { "unset" });
        }
    }

    if cli.probe {
        probe(&bundle).await?;
    }

    Ok(())
}
