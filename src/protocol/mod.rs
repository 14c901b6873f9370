//! Wire protocol.
//!
//! One request and one response per TCP connection. All integers are
//! big-endian.
//!
//! # Layout
//!
//! ```text
//! Requests:
//!   ListFilenames   type:u16=1
//!   GetChunk        type:u16=2 | offset:u32 | size:u32 | name_len:u16 | name
//!
//! Responses:
//!   Filenames       type:u16=1 | payload_len:u32 | (name 0x00)*
//!   Refusal         type:u16=2 | cause:u32 (1=bad filename, 2=bad offset, 3=bad size)
//!   Chunk           type:u16=3 | size:u32 | size raw bytes
//! ```
//!
//! Type discriminators are decoded separately from message bodies, so the
//! `decode_*` functions for bodies expect the type to be consumed already.

pub mod chunk;
pub mod codec;

pub use chunk::{stream_copy, COPY_BUFFER_SIZE};
pub use codec::{
    decode_chunk_request, decode_chunk_response, decode_filenames_response, decode_refusal,
    decode_request_type, decode_response_type, encode_chunk_request, encode_chunk_response,
    encode_filenames_request, encode_filenames_response, encode_refusal, encode_refusal_code,
    ChunkRequest, FilenamesResponse, RefusalCause, RequestType, ResponseType, DEFAULT_PORT,
    FILENAMES_DELIMITER, MAX_FILENAME_LEN,
};
