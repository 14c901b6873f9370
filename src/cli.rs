//! Command-line options and interactive prompts.

use clap::Parser;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::DEFAULT_PORT;
use crate::storage::RECEIVED_FILES_DIR;

/// Serve the regular files of a directory.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct ServerArgs {
    /// Directory whose files are offered
    #[arg(long, default_value = ".", env = "NETSTORE_DIR")]
    pub dir: PathBuf,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT, env = "NETSTORE_PORT")]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,
}

/// List a server's files and download a chunk of one of them.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct ClientArgs {
    /// Server address with port number
    #[arg(long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"), env = "NETSTORE_SERVER")]
    pub server: String,

    /// Directory downloaded chunks are written to
    #[arg(long, default_value = RECEIVED_FILES_DIR)]
    pub out_dir: PathBuf,
}

/// Why an entered number was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    Parse(String),
    TooSmall { min: u32 },
    TooBig { max: u32 },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::Parse(e) => write!(f, "Parsing failed: {e}"),
            RangeError::TooSmall { min } => write!(f, "Value too small, minimal value is {min}"),
            RangeError::TooBig { max } => write!(f, "Value too big, maximal value is {max}"),
        }
    }
}

/// Parse one line of input as a number in `[min, max]`.
pub fn parse_number_in_range(text: &str, min: u32, max: u32) -> Result<u32, RangeError> {
    let number: u64 = text
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| RangeError::Parse(e.to_string()))?;
    if number < min as u64 {
        Err(RangeError::TooSmall { min })
    } else if number > max as u64 {
        Err(RangeError::TooBig { max })
    } else {
        Ok(number as u32)
    }
}

/// Ask for a number in `[min, max]` until a valid one is entered.
///
/// Fails if the input ends before that.
pub async fn prompt_number<R, W>(
    input: &mut R,
    output: &mut W,
    message: &str,
    min: u32,
    max: u32,
) -> anyhow::Result<u32>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        output.write_all(message.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            anyhow::bail!("input closed");
        }
        match parse_number_in_range(&line, min, max) {
            Ok(n) => return Ok(n),
            Err(e) => {
                output.write_all(format!("{e}\n").as_bytes()).await?;
            }
        }
    }
}
