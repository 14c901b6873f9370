use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netstore::cli::ServerArgs;
use netstore::{server, FileIndex};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()?;

    let args = ServerArgs::parse();

    // Directory scan is blocking, run it off the runtime threads.
    let dir = args.dir.clone();
    let index = tokio::task::spawn_blocking(move || FileIndex::scan(&dir))
        .await?
        .with_context(|| format!("Could not read files directory {}", args.dir.display()))?;
    if index.is_empty() {
        warn!("No regular files in {}", args.dir.display());
    }

    let listener = TcpListener::bind((args.host, args.port))
        .await
        .with_context(|| format!("Could not bind {}:{}", args.host, args.port))?;
    info!(
        "Serving {} files from {} on {}",
        index.len(),
        args.dir.display(),
        listener.local_addr()?
    );

    server::serve(listener, Arc::new(index), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}
