//! Response override proxy.
//!
//! Forwards every request to one upstream and rewrites the upstream response
//! according to the configured override rules.
//!
//! ```text
//!     Client ──▶ listener ──▶ request id / timeout ──▶ override layer ──▶ upstream
//!     Client ◀── rewritten response ◀── engine ◀── capture ◀──────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use response_override::config::{load_config, watcher::ConfigWatcher};
use response_override::http::HttpServer;
use response_override::lifecycle::{signals, Shutdown};
use response_override::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "response-override")]
#[command(
    about = "Reverse proxy that rewrites upstream responses by status code",
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension).
    #[arg(short, long, env = "RESPONSE_OVERRIDE_CONFIG", default_value = "response-override.toml")]
    config: PathBuf,

    /// Reload override rules when the configuration file changes.
    #[arg(long)]
    watch: bool,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    if cli.check {
        println!(
            "{}: ok ({} override rules in {:?})",
            cli.config.display(),
            config.response_override.overrides.len(),
            config.response_override.name
        );
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = if cli.watch {
        let (watcher, updates) = ConfigWatcher::new(&cli.config);
        (Some(watcher.spawn()?), updates)
    } else {
        let (_, updates) = mpsc::unbounded_channel();
        (None, updates)
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
