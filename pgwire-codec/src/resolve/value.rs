use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcDateTime};

use crate::types::{
    Cidr, Circle, Inet, Line, LineSegment, Lsn, Path, PgBox, Point, Polygon, Range, Record, Tid,
    TsQuery, TsVector,
};

/// Dynamically typed value read or written by a [`Codec`][super::Codec].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int4(i32),
    Int8(i64),
    Numeric(Decimal),
    Timestamp(PrimitiveDateTime),
    TimestampTz(UtcDateTime),
    OffsetTimestampTz(OffsetDateTime),
    Date(Date),
    Point(Point),
    Line(Line),
    LineSegment(LineSegment),
    Box(PgBox),
    Path(Path),
    Polygon(Polygon),
    Circle(Circle),
    Inet(Inet),
    Cidr(Cidr),
    Tid(Tid),
    Lsn(Lsn),
    TsVector(TsVector),
    TsQuery(TsQuery),
    Record(Record),
    Range(Box<Range<Value>>),
    RangeArray(Vec<Range<Value>>),
    /// Multirange in the [`Array`][super::Container::Array] container.
    Multirange(Box<[Range<Value>]>),
    /// Multirange in the [`List`][super::Container::List] container.
    MultirangeList(Vec<Range<Value>>),
    /// Array of [`Multirange`][Value::Multirange] or [`MultirangeList`][Value::MultirangeList].
    MultirangeArray(Vec<Value>),
}

impl Value {
    /// Variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int4(_) => "Int4",
            Self::Int8(_) => "Int8",
            Self::Numeric(_) => "Numeric",
            Self::Timestamp(_) => "Timestamp",
            Self::TimestampTz(_) => "TimestampTz",
            Self::OffsetTimestampTz(_) => "OffsetTimestampTz",
            Self::Date(_) => "Date",
            Self::Point(_) => "Point",
            Self::Line(_) => "Line",
            Self::LineSegment(_) => "LineSegment",
            Self::Box(_) => "Box",
            Self::Path(_) => "Path",
            Self::Polygon(_) => "Polygon",
            Self::Circle(_) => "Circle",
            Self::Inet(_) => "Inet",
            Self::Cidr(_) => "Cidr",
            Self::Tid(_) => "Tid",
            Self::Lsn(_) => "Lsn",
            Self::TsVector(_) => "TsVector",
            Self::TsQuery(_) => "TsQuery",
            Self::Record(_) => "Record",
            Self::Range(_) => "Range",
            Self::RangeArray(_) => "RangeArray",
            Self::Multirange(_) => "Multirange",
            Self::MultirangeList(_) => "MultirangeList",
            Self::MultirangeArray(_) => "MultirangeArray",
        }
    }
}

macro_rules! from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    )*};
}

from! {
    i32 => Int4,
    i64 => Int8,
    Decimal => Numeric,
    PrimitiveDateTime => Timestamp,
    UtcDateTime => TimestampTz,
    OffsetDateTime => OffsetTimestampTz,
    Date => Date,
    Point => Point,
    Line => Line,
    LineSegment => LineSegment,
    PgBox => Box,
    Path => Path,
    Polygon => Polygon,
    Circle => Circle,
    Inet => Inet,
    Cidr => Cidr,
    Tid => Tid,
    Lsn => Lsn,
    TsVector => TsVector,
    TsQuery => TsQuery,
    Record => Record,
}

impl<T: Into<Value>> From<Range<T>> for Value {
    fn from(value: Range<T>) -> Self {
        Self::Range(Box::new(value.map(Into::into)))
    }
}
