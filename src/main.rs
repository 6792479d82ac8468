use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tap_console::config::Config;

/// Terminal client for the TAP (Territory Analysis & Partitioning) Toolbox.
#[derive(Parser, Debug)]
#[command(name = "tap-console", version, about)]
struct Cli {
    /// Base URL of the TAP backend (overrides TAP_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Request timeout in seconds (overrides TAP_API_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tap_console=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration; CLI flags win over the environment
    let mut config = Config::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        config.api.timeout_secs = timeout_secs;
    }
    info!("Using backend at {}", config.api.base_url);

    tap_console::tui::run(config).await
}
