//! Value types for postgres types without a natural rust counterpart.
//!
//! Everything here is plain data. Wire encoding lives in [`convert`][crate::convert].
mod geometric;
mod network;
mod tid;
mod lsn;
mod tsvector;
mod tsquery;
mod range;
mod record;
pub(crate) mod datetime;

pub use geometric::{Circle, Line, LineSegment, Path, PgBox, Point, Polygon};
pub use network::{Cidr, Inet};
pub use tid::Tid;
pub use lsn::Lsn;
pub use tsvector::{MAX_POSITIONS, PosWeight, TsVector, TsVectorLexeme, WordEntryPos};
pub use tsquery::{TsQuery, TsQueryLexeme, Weight};
pub use range::{Range, RangeBound};
pub(crate) use range::flags as range_flags;
pub use record::{Record, RecordField};
