//! iris-server: A TCP classification server for iris flower measurements
//!
//! Clients connect, send measurements one `input` command at a time, ask
//! the server to `classify` them, and query the result. Classification
//! uses a fixed-weight nearest-prototype model over 21 prototypes.
//!
//! Features:
//! - One independent session per connection
//! - Global shutdown from any session or Ctrl-C
//! - Configuration via CLI arguments or TOML file

mod classifier;
mod config;
mod measurement;
mod protocol;
mod server;
mod session;
mod shutdown;

use config::Config;
use server::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_connections = config.max_connections,
        max_line_length = config.max_line_length,
        idle_timeout = config.idle_timeout,
        workers = ?config.workers,
        "Starting iris-server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(serve(config))?;
    Ok(())
}

async fn serve(config: Config) -> std::io::Result<()> {
    let server = Server::bind(&config)?;
    let shutdown = server.shutdown_handle();
    let run = server.run();
    tokio::pin!(run);

    // First interrupt stops accepting; a second one abandons open sessions
    tokio::select! {
        result = &mut run => return result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupt received, shutting down the server");
            shutdown.trigger();
        }
    }

    tokio::select! {
        result = &mut run => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("Second interrupt received, closing open sessions");
            Ok(())
        }
    }
}
