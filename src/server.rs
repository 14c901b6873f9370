//! Server side: accept loop and per-connection request dispatch.
//!
//! Each connection carries exactly one request. The handler reads the
//! request type, answers with a single response, flushes and closes.

use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::Result;
use crate::index::{FileIndex, FileInfo};
use crate::protocol::{
    decode_chunk_request, decode_request_type, encode_chunk_response, encode_filenames_response,
    encode_refusal, ChunkRequest, RefusalCause, RequestType,
};
use crate::storage;

/// Accept connections until `shutdown` resolves, one task per connection.
///
/// Connection failures are logged and only tear down that connection.
pub async fn serve<F>(listener: TcpListener, index: Arc<FileIndex>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Accept failed: {}", e);
                    continue;
                }
            },
        };

        let index = Arc::clone(&index);
        tokio::spawn(
            async move {
                debug!("Accepted connection");
                if let Err(e) = handle_connection(stream, &index).await {
                    error!("Handling connection failed: {}", e);
                }
            }
            .instrument(info_span!("conn", %peer)),
        );
    }
}

/// Serve a single request on `stream`.
///
/// A malformed request type closes the connection without a response.
pub async fn handle_connection<S>(stream: S, index: &FileIndex) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (rd, wr) = tokio::io::split(stream);
    let mut reader = BufReader::new(rd);
    let mut writer = BufWriter::new(wr);

    match decode_request_type(&mut reader).await? {
        RequestType::Filenames => {
            encode_filenames_response(&mut writer, &index.filenames()).await?;
            debug!("Sent {} filenames", index.len());
        }
        RequestType::Chunk => {
            let request = decode_chunk_request(&mut reader).await?;
            handle_chunk_request(&request, &mut writer, index).await?;
        }
    }

    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

async fn handle_chunk_request<W>(
    request: &ChunkRequest,
    writer: &mut W,
    index: &FileIndex,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug!(
        "Chunk request: file={:?} offset={} size={}",
        String::from_utf8_lossy(&request.filename),
        request.offset,
        request.size
    );

    match validate_chunk_request(request, index) {
        Err(cause) => {
            warn!(
                "Refusing chunk of {:?}: {}",
                String::from_utf8_lossy(&request.filename),
                cause
            );
            encode_refusal(writer, cause).await
        }
        Ok((info, size)) => {
            // Dropped on every exit path below.
            let mut file = storage::open_for_read_at(&info.path, request.offset as u64).await?;
            encode_chunk_response(writer, &mut file, size).await?;
            info!(
                "Sent {} bytes of {:?} from offset {}",
                size,
                String::from_utf8_lossy(&info.name),
                request.offset
            );
            Ok(())
        }
    }
}

/// Check a chunk request against the index.
///
/// Checks run in a fixed order: size, then filename, then offset. On success
/// returns the file and the number of bytes to send, clamped to what the file
/// holds past `offset`.
pub fn validate_chunk_request<'a>(
    request: &ChunkRequest,
    index: &'a FileIndex,
) -> std::result::Result<(&'a FileInfo, u32), RefusalCause> {
    if request.size == 0 {
        return Err(RefusalCause::BadSize);
    }
    let info = index
        .get(&request.filename)
        .ok_or(RefusalCause::BadFilename)?;
    let offset = request.offset as u64;
    if offset >= info.size {
        return Err(RefusalCause::BadOffset);
    }
    let available = info.size - offset;
    let size = (request.size as u64).min(available) as u32;
    Ok((info, size))
}
