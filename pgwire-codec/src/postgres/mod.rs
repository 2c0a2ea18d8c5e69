//! Wire level building blocks.
//!
//! Type oids and names, format codes, and the framed messages exchanged on a replication
//! connection. Every message is a type byte followed by a big endian `u32` length that counts
//! itself but not the type byte:
//!
//! ```text
//! 'd' | 00 00 00 2a | body (38 bytes)
//! ```
//!
//! Message bodies are decoded by [`BackendProtocol`] and encoded by [`FrontendProtocol`], the
//! framing itself is done by [`PgReader`][crate::io::PgReader] and [`PgWriter`][crate::io::PgWriter].
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>

mod pg_type;
mod pg_format;

pub mod frontend;
pub mod backend;

mod error;

pub use pg_type::{Oid, PgType, oid};
pub(crate) use pg_type::{type_name, type_oid};
pub use pg_format::PgFormat;

pub use frontend::FrontendProtocol;
pub use backend::{BackendMessage, BackendProtocol, ErrorResponse, NoticeResponse};
pub use error::ProtocolError;
