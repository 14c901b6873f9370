use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netstore::cli::{prompt_number, ClientArgs};
use netstore::Client;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init()?;

    let args = ClientArgs::parse();
    let client = Client::new(args.server);

    let filenames = client
        .fetch_filenames()
        .await
        .context("Could not get filenames")?;

    let mut stdout = io::stdout();
    if filenames.is_empty() {
        stdout.write_all(b"No files available.\n").await?;
        stdout.flush().await?;
        return Ok(());
    }

    let mut listing = String::from("Available files:\n");
    for (i, name) in filenames.iter().enumerate() {
        listing.push_str(&format!("{} {}\n", i + 1, String::from_utf8_lossy(name)));
    }
    stdout.write_all(listing.as_bytes()).await?;

    let mut stdin = BufReader::new(io::stdin());
    let count = u32::try_from(filenames.len()).unwrap_or(u32::MAX);
    let number = prompt_number(&mut stdin, &mut stdout, "Choose file number: ", 1, count).await?;
    let offset = prompt_number(&mut stdin, &mut stdout, "Choose chunk offset: ", 0, u32::MAX).await?;
    let size = prompt_number(&mut stdin, &mut stdout, "Choose chunk size: ", 1, u32::MAX).await?;

    let filename = &filenames[(number - 1) as usize];
    let download = client
        .download_chunk(&args.out_dir, filename, offset, size)
        .await
        .context("Could not get file chunk")?;

    stdout
        .write_all(
            format!(
                "Wrote {} bytes to {} at offset {}\n",
                download.bytes,
                download.path.display(),
                offset
            )
            .as_bytes(),
        )
        .await?;
    stdout.flush().await?;
    Ok(())
}
