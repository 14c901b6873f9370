//! netstore - list a server's files and download byte ranges of them.
//!
//! A compact binary protocol over TCP, one request per connection.
//!
//! # Architecture
//!
//! ```text
//! Client --(request)--> codec --> TCP --> codec --> server dispatch --> FileIndex
//!                                                          |
//! local file <-- client <-- codec <-- TCP <-- codec <------+ (chunk streamed from disk)
//! ```

pub mod cli;
pub mod client;
pub mod error;
pub mod index;
pub mod protocol;
pub mod server;
pub mod storage;

pub use client::{Client, Download};
pub use error::{IndexError, ProtocolError, StorageError};
pub use index::{FileIndex, FileInfo};
pub use protocol::{RefusalCause, DEFAULT_PORT};
