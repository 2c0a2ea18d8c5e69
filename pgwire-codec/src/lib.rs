//! Postgres binary wire codec.
//!
//! Converters for the postgres types that general purpose drivers leave out: geometric and
//! network types, full text search, records, ranges and multiranges. Plus a decoder for the
//! `pgoutput` logical replication stream.
//!
//! Every codec is written once as an `async` algorithm over [`PgReader`][io::PgReader] and
//! [`PgWriter`][io::PgWriter], and can be driven to completion on an in memory buffer or
//! suspended on real io.
//!
//! # Examples
//!
//! Synchronous, on a buffer:
//!
//! ```
//! use pgwire_codec::{ConverterExt, convert::TsQueryConverter, types::TsQuery};
//!
//! let query: TsQuery = "fat & (rat | cat)".parse().unwrap();
//! let bytes = TsQueryConverter::default().encode(&query).unwrap();
//! let decoded = TsQueryConverter::default().decode(bytes.freeze()).unwrap();
//! assert_eq!(decoded, query);
//! ```
//!
//! Resolving a codec at runtime:
//!
//! ```
//! use pgwire_codec::{ConverterExt, resolve::{TypeMapper, Value}, types::Range};
//!
//! let mapper = TypeMapper::default();
//! let info = mapper.resolve_name("int4range").unwrap();
//! let value = Value::from(Range::half_open(1i32, 10i32));
//! let bytes = info.codec.encode(&value).unwrap();
//! assert_eq!(info.codec.decode(bytes.freeze()).unwrap(), value);
//! ```
//!
//! Logical replication, see [`replication`].

mod common;
mod ext;

// Io
pub mod io;

// Protocol
pub mod postgres;

// Encoding
pub mod types;
pub mod convert;
pub mod resolve;

// Component
pub mod replication;

mod error;

pub use convert::{Converter, ConverterExt};
pub use error::{DecodeError, Error, ErrorKind, FormatError, OutOfRangeError, Result};
