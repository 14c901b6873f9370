//! Client side of the two exchanges.
//!
//! Every exchange uses its own connection: send the request, flush, then
//! block on the full response.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{ProtocolError, Result};
use crate::protocol::{
    decode_chunk_response, decode_filenames_response, decode_refusal, decode_response_type,
    encode_chunk_request, encode_filenames_request, ResponseType,
};
use crate::storage;

/// Outcome of a chunk saved to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u32,
}

/// Talks to one server address.
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", self.addr);
        Ok(stream)
    }

    /// Ask the server for the names of the files it serves.
    pub async fn fetch_filenames(&self) -> Result<Vec<Vec<u8>>> {
        let stream = self.connect().await?;
        request_filenames(stream).await
    }

    /// Fetch `size` bytes of `filename` from `offset` into `sink`.
    /// Returns the number of bytes the server sent.
    pub async fn fetch_chunk<W>(
        &self,
        filename: &[u8],
        offset: u32,
        size: u32,
        sink: &mut W,
    ) -> Result<u32>
    where
        W: AsyncWrite + Unpin,
    {
        let stream = self.connect().await?;
        request_chunk(stream, filename, offset, size, sink).await
    }

    /// Fetch a chunk and write it into `out_dir/<filename>` at `offset`.
    ///
    /// The local file is only opened once the server has agreed to send the
    /// chunk, so a refusal leaves no file behind.
    pub async fn download_chunk(
        &self,
        out_dir: &Path,
        filename: &[u8],
        offset: u32,
        size: u32,
    ) -> anyhow::Result<Download> {
        let path = storage::local_path_for(out_dir, filename)?;
        storage::ensure_dir(out_dir)
            .await
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;

        let stream = self
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", self.addr))?;
        let mut stream = BufReader::new(stream);
        send_chunk_request(&mut stream, filename, offset, size).await?;
        expect_chunk(&mut stream).await?;

        let mut file = storage::open_for_write_at(&path, offset as u64)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let bytes = decode_chunk_response(&mut stream, &mut file).await?;
        file.flush()
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            "Saved {} bytes to {} at offset {}",
            bytes,
            path.display(),
            offset
        );
        Ok(Download { path, bytes })
    }
}

/// List filenames over an already connected stream.
pub async fn request_filenames<S>(stream: S) -> Result<Vec<Vec<u8>>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    encode_filenames_request(&mut stream).await?;
    stream.flush().await?;

    match decode_response_type(&mut stream).await? {
        ResponseType::Filenames => {}
        other => {
            return Err(ProtocolError::UnexpectedResponseType {
                expected: ResponseType::Filenames as u16,
                actual: other as u16,
            })
        }
    }
    let response = decode_filenames_response(&mut stream).await?;
    debug!("Received {} filenames", response.filenames.len());
    Ok(response.filenames)
}

/// Fetch a chunk over an already connected stream into `sink`.
pub async fn request_chunk<S, W>(
    stream: S,
    filename: &[u8],
    offset: u32,
    size: u32,
    sink: &mut W,
) -> Result<u32>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    send_chunk_request(&mut stream, filename, offset, size).await?;
    expect_chunk(&mut stream).await?;
    let received = decode_chunk_response(&mut stream, sink).await?;
    debug!("Received {} byte chunk", received);
    Ok(received)
}

async fn send_chunk_request<S>(stream: &mut S, filename: &[u8], offset: u32, size: u32) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    encode_chunk_request(stream, offset, size, filename).await?;
    stream.flush().await?;
    Ok(())
}

/// Read the response type of a chunk request. A refusal becomes
/// `ProtocolError::Refused` carrying its cause.
async fn expect_chunk<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    match decode_response_type(stream).await? {
        ResponseType::Chunk => Ok(()),
        ResponseType::Refusal => {
            let cause = decode_refusal(stream).await?;
            Err(ProtocolError::Refused(cause))
        }
        ResponseType::Filenames => Err(ProtocolError::UnexpectedResponseType {
            expected: ResponseType::Chunk as u16,
            actual: ResponseType::Filenames as u16,
        }),
    }
}
