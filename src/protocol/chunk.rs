//! Fixed-length byte transfer between two streams.
//!
//! Moves a chunk through a bounded buffer so the whole chunk never has to
//! sit in memory at once.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Copy buffer size (64KB)
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copy exactly `n` bytes from `source` to `sink`.
///
/// Fails with `ShortRead` if `source` ends early and with `WriteFailure` if
/// `sink` rejects a write. Nothing is retried.
pub async fn stream_copy<R, W>(source: &mut R, sink: &mut W, n: u64) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let buf_len = n.min(COPY_BUFFER_SIZE as u64) as usize;
    let mut buf = vec![0u8; buf_len];
    let mut copied = 0u64;

    while copied < n {
        let want = (n - copied).min(buf_len as u64) as usize;
        let read = source.read(&mut buf[..want]).await?;
        if read == 0 {
            return Err(ProtocolError::ShortRead {
                expected: n,
                actual: copied,
            });
        }
        sink.write_all(&buf[..read])
            .await
            .map_err(ProtocolError::WriteFailure)?;
        copied += read as u64;
    }

    Ok(())
}
