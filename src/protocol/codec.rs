//! Message encoders and decoders.
//!
//! Every decoder reads exactly the bytes its framing declares and leaves the
//! stream positioned right after the message.

use bytes::{BufMut, BytesMut};
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{ProtocolError, Result};
use crate::protocol::chunk::stream_copy;

/// Default TCP port of the server.
pub const DEFAULT_PORT: u16 = 5551;

/// Terminates every filename inside a filenames response.
pub const FILENAMES_DELIMITER: u8 = 0x00;

/// The filename length field of a chunk request is 16 bits wide.
pub const MAX_FILENAME_LEN: usize = u16::MAX as usize;

/// Header sizes (type discriminator included).
pub const CHUNK_REQUEST_HEADER_LEN: usize = 12;
pub const FILENAMES_RESPONSE_HEADER_LEN: usize = 6;
pub const REFUSAL_LEN: usize = 6;
pub const CHUNK_RESPONSE_HEADER_LEN: usize = 6;

// =============================================================================
// Discriminators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RequestType {
    Filenames = 1,
    Chunk = 2,
}

impl RequestType {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Filenames),
            2 => Some(Self::Chunk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseType {
    Filenames = 1,
    Refusal = 2,
    Chunk = 3,
}

impl ResponseType {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Filenames),
            2 => Some(Self::Refusal),
            3 => Some(Self::Chunk),
            _ => None,
        }
    }
}

/// Why the server turned down a chunk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RefusalCause {
    BadFilename = 1,
    BadOffset = 2,
    BadSize = 3,
}

impl TryFrom<u32> for RefusalCause {
    type Error = ProtocolError;

    fn try_from(v: u32) -> Result<Self> {
        match v {
            1 => Ok(Self::BadFilename),
            2 => Ok(Self::BadOffset),
            3 => Ok(Self::BadSize),
            other => Err(ProtocolError::UnknownRefusalCause(other)),
        }
    }
}

impl fmt::Display for RefusalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefusalCause::BadFilename => "bad filename",
            RefusalCause::BadOffset => "bad offset",
            RefusalCause::BadSize => "bad size",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub offset: u32,
    pub size: u32,
    pub filename: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenamesResponse {
    pub filenames: Vec<Vec<u8>>,
}

async fn read_u16<R: AsyncRead + Unpin>(r: &mut R) -> Result<u16> {
    r.read_u16().await.map_err(ProtocolError::from_read)
}

async fn read_u32<R: AsyncRead + Unpin>(r: &mut R) -> Result<u32> {
    r.read_u32().await.map_err(ProtocolError::from_read)
}

// =============================================================================
// Requests
// =============================================================================

pub async fn encode_filenames_request<W: AsyncWrite + Unpin>(w: &mut W) -> Result<()> {
    w.write_all(&(RequestType::Filenames as u16).to_be_bytes())
        .await?;
    Ok(())
}

pub async fn encode_chunk_request<W: AsyncWrite + Unpin>(
    w: &mut W,
    offset: u32,
    size: u32,
    filename: &[u8],
) -> Result<()> {
    if filename.len() > MAX_FILENAME_LEN {
        return Err(ProtocolError::FilenameTooLong(filename.len()));
    }

    let mut buf = BytesMut::with_capacity(CHUNK_REQUEST_HEADER_LEN + filename.len());
    buf.put_u16(RequestType::Chunk as u16);
    buf.put_u32(offset);
    buf.put_u32(size);
    buf.put_u16(filename.len() as u16);
    buf.put_slice(filename);

    w.write_all(&buf).await?;
    Ok(())
}

pub async fn decode_request_type<R: AsyncRead + Unpin>(r: &mut R) -> Result<RequestType> {
    let v = read_u16(r).await?;
    RequestType::from_u16(v).ok_or(ProtocolError::UnknownRequestType(v))
}

/// Decode the body of a chunk request (the type has already been read).
pub async fn decode_chunk_request<R: AsyncRead + Unpin>(r: &mut R) -> Result<ChunkRequest> {
    let mut hdr = [0u8; CHUNK_REQUEST_HEADER_LEN - 2];
    r.read_exact(&mut hdr)
        .await
        .map_err(ProtocolError::from_read)?;
    let offset = u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
    let size = u32::from_be_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
    let filename_len = u16::from_be_bytes([hdr[8], hdr[9]]) as usize;

    let mut filename = vec![0u8; filename_len];
    r.read_exact(&mut filename)
        .await
        .map_err(ProtocolError::from_read)?;

    Ok(ChunkRequest {
        offset,
        size,
        filename,
    })
}

// =============================================================================
// Responses
// =============================================================================

pub async fn decode_response_type<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<ResponseType> {
    let v = read_u16(r).await?;
    ResponseType::from_u16(v).ok_or(ProtocolError::UnknownResponseType(v))
}

pub async fn encode_filenames_response<W, F>(w: &mut W, filenames: &[F]) -> Result<()>
where
    W: AsyncWrite + Unpin,
    F: AsRef<[u8]>,
{
    let mut payload_len = 0u64;
    for name in filenames {
        let name = name.as_ref();
        if name.contains(&FILENAMES_DELIMITER) {
            return Err(ProtocolError::InvalidFilename);
        }
        payload_len += name.len() as u64 + 1;
    }
    let payload_len =
        u32::try_from(payload_len).map_err(|_| ProtocolError::PayloadTooLarge(payload_len))?;

    let mut buf = BytesMut::with_capacity(FILENAMES_RESPONSE_HEADER_LEN + payload_len as usize);
    buf.put_u16(ResponseType::Filenames as u16);
    buf.put_u32(payload_len);
    for name in filenames {
        buf.put_slice(name.as_ref());
        buf.put_u8(FILENAMES_DELIMITER);
    }

    w.write_all(&buf).await?;
    Ok(())
}

/// Decode the body of a filenames response (the type has already been read).
pub async fn decode_filenames_response<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<FilenamesResponse> {
    let payload_len = read_u32(r).await? as u64;

    // Buffering is confined to the declared payload so nothing past it is consumed.
    let mut payload = BufReader::new((&mut *r).take(payload_len));
    let mut filenames = Vec::new();
    let mut consumed = 0u64;
    loop {
        let mut entry = Vec::new();
        let n = payload
            .read_until(FILENAMES_DELIMITER, &mut entry)
            .await?;
        if n == 0 {
            break;
        }
        consumed += n as u64;
        if entry.pop() != Some(FILENAMES_DELIMITER) {
            return Err(ProtocolError::TruncatedMessage);
        }
        filenames.push(entry);
    }
    if consumed != payload_len {
        return Err(ProtocolError::TruncatedMessage);
    }

    Ok(FilenamesResponse { filenames })
}

pub async fn encode_refusal<W: AsyncWrite + Unpin>(
    w: &mut W,
    cause: RefusalCause,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(REFUSAL_LEN);
    buf.put_u16(ResponseType::Refusal as u16);
    buf.put_u32(cause as u32);
    w.write_all(&buf).await?;
    Ok(())
}

/// Encode a refusal from its raw wire value. Fails for anything other than
/// the three defined causes.
pub async fn encode_refusal_code<W: AsyncWrite + Unpin>(
    w: &mut W,
    code: u32,
) -> Result<()> {
    let cause = RefusalCause::try_from(code)?;
    encode_refusal(w, cause).await
}

/// Decode the body of a refusal (the type has already been read).
pub async fn decode_refusal<R: AsyncRead + Unpin>(r: &mut R) -> Result<RefusalCause> {
    let v = read_u32(r).await?;
    RefusalCause::try_from(v)
}

/// Write a chunk response, streaming `size` bytes from `source`.
///
/// The caller flushes `w`.
pub async fn encode_chunk_response<W, S>(w: &mut W, source: &mut S, size: u32) -> Result<()>
where
    W: AsyncWrite + Unpin,
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(CHUNK_RESPONSE_HEADER_LEN);
    buf.put_u16(ResponseType::Chunk as u16);
    buf.put_u32(size);
    w.write_all(&buf).await?;

    stream_copy(source, w, size as u64).await
}

/// Decode the body of a chunk response (the type has already been read),
/// streaming the payload into `sink`. Returns the chunk size.
pub async fn decode_chunk_response<R, S>(r: &mut R, sink: &mut S) -> Result<u32>
where
    R: AsyncRead + Unpin,
    S: AsyncWrite + Unpin,
{
    let size = read_u32(r).await?;
    stream_copy(r, sink, size as u64).await?;
    Ok(size)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn encoded_chunk_request(offset: u32, size: u32, filename: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_chunk_request(&mut out, offset, size, filename)
            .await
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_filenames_request_layout() {
        let mut out = Vec::new();
        encode_filenames_request(&mut out).await.unwrap();
        assert_eq!(out, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_chunk_request_layout() {
        let out = encoded_chunk_request(0x01020304, 0x0A0B0C0D, b"ab").await;
        assert_eq!(
            out,
            vec![0, 2, 1, 2, 3, 4, 0x0A, 0x0B, 0x0C, 0x0D, 0, 2, b'a', b'b']
        );
    }

    #[tokio::test]
    async fn test_chunk_request_roundtrip() {
        let out = encoded_chunk_request(u32::MAX, 17, b"file.txt").await;
        let mut rd: &[u8] = &out;
        assert_eq!(
            decode_request_type(&mut rd).await.unwrap(),
            RequestType::Chunk
        );
        let req = decode_chunk_request(&mut rd).await.unwrap();
        assert_eq!(
            req,
            ChunkRequest {
                offset: u32::MAX,
                size: 17,
                filename: b"file.txt".to_vec(),
            }
        );
        assert!(rd.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_request_filename_limits() {
        let longest = vec![b'x'; MAX_FILENAME_LEN];
        let out = encoded_chunk_request(0, 1, &longest).await;
        assert_eq!(out.len(), CHUNK_REQUEST_HEADER_LEN + MAX_FILENAME_LEN);

        let too_long = vec![b'x'; MAX_FILENAME_LEN + 1];
        let mut out = Vec::new();
        let err = encode_chunk_request(&mut out, 0, 1, &too_long)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FilenameTooLong(65536)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_request_leaves_trailing_bytes() {
        let mut out = encoded_chunk_request(5, 6, b"name").await;
        out.extend_from_slice(&[9, 9, 9]);
        let mut rd: &[u8] = &out[2..];
        decode_chunk_request(&mut rd).await.unwrap();
        assert_eq!(rd, &[9, 9, 9]);
    }

    #[tokio::test]
    async fn test_chunk_request_truncated() {
        let out = encoded_chunk_request(5, 6, b"name").await;
        let body = &out[2..];
        for len in 0..body.len() {
            let mut rd: &[u8] = &body[..len];
            let err = decode_chunk_request(&mut rd).await.unwrap_err();
            assert!(
                matches!(err, ProtocolError::TruncatedMessage),
                "len {len}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_request_type_values() {
        let mut rd: &[u8] = &[0, 1];
        assert_eq!(
            decode_request_type(&mut rd).await.unwrap(),
            RequestType::Filenames
        );
        for bad in [0u16, 3, 0xFFFF] {
            let bytes = bad.to_be_bytes();
            let mut rd: &[u8] = &bytes;
            let err = decode_request_type(&mut rd).await.unwrap_err();
            assert!(matches!(err, ProtocolError::UnknownRequestType(v) if v == bad));
        }
    }

    #[tokio::test]
    async fn test_request_type_reads_two_bytes() {
        let mut rd: &[u8] = &[0, 2, 7];
        decode_request_type(&mut rd).await.unwrap();
        assert_eq!(rd, &[7]);

        let mut rd: &[u8] = &[0];
        assert!(matches!(
            decode_request_type(&mut rd).await.unwrap_err(),
            ProtocolError::TruncatedMessage
        ));
    }

    #[tokio::test]
    async fn test_response_type_values() {
        for (raw, expected) in [
            (1u16, ResponseType::Filenames),
            (2, ResponseType::Refusal),
            (3, ResponseType::Chunk),
        ] {
            let bytes = raw.to_be_bytes();
            let mut rd: &[u8] = &bytes;
            assert_eq!(decode_response_type(&mut rd).await.unwrap(), expected);
        }
        let mut rd: &[u8] = &[0, 4];
        assert!(matches!(
            decode_response_type(&mut rd).await.unwrap_err(),
            ProtocolError::UnknownResponseType(4)
        ));
        let mut rd: &[u8] = &[];
        assert!(matches!(
            decode_response_type(&mut rd).await.unwrap_err(),
            ProtocolError::TruncatedMessage
        ));
    }

    #[tokio::test]
    async fn test_filenames_response_layout() {
        let mut out = Vec::new();
        encode_filenames_response(&mut out, &[b"a".as_slice(), b"bc".as_slice()])
            .await
            .unwrap();
        assert_eq!(out, vec![0, 1, 0, 0, 0, 5, b'a', 0, b'b', b'c', 0]);
    }

    #[tokio::test]
    async fn test_filenames_response_empty() {
        let mut out = Vec::new();
        let empty: &[&[u8]] = &[];
        encode_filenames_response(&mut out, empty).await.unwrap();
        assert_eq!(out, vec![0, 1, 0, 0, 0, 0]);

        let mut rd: &[u8] = &out[2..];
        let resp = decode_filenames_response(&mut rd).await.unwrap();
        assert!(resp.filenames.is_empty());
        assert!(rd.is_empty());
    }

    #[tokio::test]
    async fn test_filenames_response_roundtrip_keeps_order() {
        let names = vec![b"zeta".to_vec(), Vec::new(), b"alpha".to_vec(), b"zeta".to_vec()];
        let mut out = Vec::new();
        encode_filenames_response(&mut out, &names).await.unwrap();
        out.extend_from_slice(b"next");

        let mut rd: &[u8] = &out;
        assert_eq!(
            decode_response_type(&mut rd).await.unwrap(),
            ResponseType::Filenames
        );
        let resp = decode_filenames_response(&mut rd).await.unwrap();
        assert_eq!(resp.filenames, names);
        assert_eq!(rd, b"next");
    }

    #[tokio::test]
    async fn test_filenames_response_rejects_delimiter_in_name() {
        let mut out = Vec::new();
        let err = encode_filenames_response(&mut out, &[b"a\0b".as_slice()])
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFilename));
    }

    #[tokio::test]
    async fn test_filenames_response_missing_delimiter() {
        // Declared payload ends before the run is terminated.
        let mut rd: &[u8] = &[0, 0, 0, 3, b'a', b'b', b'c', 0];
        let err = decode_filenames_response(&mut rd).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedMessage));
    }

    #[tokio::test]
    async fn test_filenames_response_truncated() {
        let mut out = Vec::new();
        encode_filenames_response(&mut out, &[b"one".as_slice(), b"two".as_slice()])
            .await
            .unwrap();
        let body = &out[2..];
        for len in 0..body.len() {
            let mut rd: &[u8] = &body[..len];
            let err = decode_filenames_response(&mut rd).await.unwrap_err();
            assert!(
                matches!(err, ProtocolError::TruncatedMessage),
                "len {len}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_refusal_roundtrip() {
        for cause in [
            RefusalCause::BadFilename,
            RefusalCause::BadOffset,
            RefusalCause::BadSize,
        ] {
            let mut out = Vec::new();
            encode_refusal(&mut out, cause).await.unwrap();
            assert_eq!(out.len(), REFUSAL_LEN);
            out.push(0xAA);

            let mut rd: &[u8] = &out;
            assert_eq!(
                decode_response_type(&mut rd).await.unwrap(),
                ResponseType::Refusal
            );
            assert_eq!(decode_refusal(&mut rd).await.unwrap(), cause);
            assert_eq!(rd, &[0xAA]);
        }
    }

    #[tokio::test]
    async fn test_refusal_unknown_cause() {
        let mut out = Vec::new();
        let err = encode_refusal_code(&mut out, 4).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRefusalCause(4)));
        assert!(out.is_empty());

        encode_refusal_code(&mut out, 2).await.unwrap();
        assert_eq!(out, vec![0, 2, 0, 0, 0, 2]);

        let mut rd: &[u8] = &[0, 0, 0, 0];
        assert!(matches!(
            decode_refusal(&mut rd).await.unwrap_err(),
            ProtocolError::UnknownRefusalCause(0)
        ));
        let mut rd: &[u8] = &[0, 0, 1];
        assert!(matches!(
            decode_refusal(&mut rd).await.unwrap_err(),
            ProtocolError::TruncatedMessage
        ));
    }

    #[tokio::test]
    async fn test_chunk_response_roundtrip() {
        let data: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        let mut source: &[u8] = &data;
        let mut out = Vec::new();
        encode_chunk_response(&mut out, &mut source, 150_000)
            .await
            .unwrap();
        assert_eq!(out.len(), CHUNK_RESPONSE_HEADER_LEN + 150_000);
        assert_eq!(source.len(), 50_000);
        out.extend_from_slice(&[1, 2]);

        let mut rd: &[u8] = &out;
        assert_eq!(
            decode_response_type(&mut rd).await.unwrap(),
            ResponseType::Chunk
        );
        let mut sink = Vec::new();
        let size = decode_chunk_response(&mut rd, &mut sink).await.unwrap();
        assert_eq!(size, 150_000);
        assert_eq!(sink, &data[..150_000]);
        assert_eq!(rd, &[1, 2]);
    }

    #[tokio::test]
    async fn test_chunk_response_source_too_short() {
        let mut source: &[u8] = b"abc";
        let mut out = Vec::new();
        let err = encode_chunk_response(&mut out, &mut source, 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRead {
                expected: 5,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_chunk_response_truncated_payload() {
        let mut rd: &[u8] = &[0, 0, 0, 4, b'x', b'y'];
        let mut sink = Vec::new();
        let err = decode_chunk_response(&mut rd, &mut sink).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRead {
                expected: 4,
                actual: 2
            }
        ));

        let mut rd: &[u8] = &[0, 0];
        let err = decode_chunk_response(&mut rd, &mut sink).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedMessage));
    }

    #[test]
    fn test_refusal_cause_display() {
        assert_eq!(RefusalCause::BadFilename.to_string(), "bad filename");
        assert_eq!(RefusalCause::BadSize.to_string(), "bad size");
    }
}
