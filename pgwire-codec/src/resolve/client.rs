use std::fmt;

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcDateTime};

use crate::types::{
    Cidr, Circle, Inet, Line, LineSegment, Lsn, Path, PgBox, Point, Polygon, Range, Record, Tid,
    TsQuery, TsVector,
};

/// Rust representation of a range element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// [`i32`]
    Int4,
    /// [`i64`]
    Int8,
    /// [`Decimal`]
    Numeric,
    /// [`PrimitiveDateTime`]
    Timestamp,
    /// [`UtcDateTime`]
    TimestampTz,
    /// [`OffsetDateTime`]
    OffsetTimestampTz,
    /// [`Date`]
    Date,
}

impl ElementType {
    pub fn rust_name(&self) -> &'static str {
        match self {
            Self::Int4 => "i32",
            Self::Int8 => "i64",
            Self::Numeric => "Decimal",
            Self::Timestamp => "PrimitiveDateTime",
            Self::TimestampTz => "UtcDateTime",
            Self::OffsetTimestampTz => "OffsetDateTime",
            Self::Date => "Date",
        }
    }

    pub(crate) fn is_datetime(&self) -> bool {
        matches!(self, Self::Timestamp | Self::TimestampTz | Self::OffsetTimestampTz)
    }
}

/// Collection a multirange is materialized into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Container {
    /// `Box<[Range<T>]>`
    #[default]
    Array,
    /// `Vec<Range<T>>`
    List,
}

/// Rust representation requested for a postgres value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    Element(ElementType),
    Point,
    Line,
    LineSegment,
    Box,
    Path,
    Polygon,
    Circle,
    Inet,
    Cidr,
    Tid,
    Lsn,
    TsVector,
    TsQuery,
    Record,
    Range(ElementType),
    RangeArray(ElementType),
    Multirange(ElementType, Container),
    MultirangeArray(ElementType, Container),
}

impl ClientType {
    /// Element of range types.
    pub fn element(&self) -> Option<ElementType> {
        match *self {
            Self::Element(e)
            | Self::Range(e)
            | Self::RangeArray(e)
            | Self::Multirange(e, _)
            | Self::MultirangeArray(e, _) => Some(e),
            _ => None,
        }
    }

    pub fn is_range_kind(&self) -> bool {
        matches!(
            self,
            Self::Range(_) | Self::RangeArray(_) | Self::Multirange(..) | Self::MultirangeArray(..)
        )
    }

    /// Whether a value requested as `self` can use a mapping declared as `mapping`.
    ///
    /// `Vec<Range<T>>` is both a multirange list and a range array.
    pub(crate) fn accepts(&self, mapping: &ClientType) -> bool {
        match (self, mapping) {
            (Self::Multirange(a, Container::List), Self::RangeArray(b)) => a == b,
            _ => self == mapping,
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(e) => f.write_str(e.rust_name()),
            Self::Range(e) => write!(f, "Range<{}>", e.rust_name()),
            Self::RangeArray(e) => write!(f, "Vec<Range<{}>>", e.rust_name()),
            Self::Multirange(e, Container::Array) => write!(f, "Box<[Range<{}>]>", e.rust_name()),
            Self::Multirange(e, Container::List) => write!(f, "Vec<Range<{}>>", e.rust_name()),
            Self::MultirangeArray(e, Container::Array) => {
                write!(f, "Vec<Box<[Range<{}>]>>", e.rust_name())
            }
            Self::MultirangeArray(e, Container::List) => {
                write!(f, "Vec<Vec<Range<{}>>>", e.rust_name())
            }
            Self::Box => f.write_str("PgBox"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// A rust type with a known [`ClientType`].
pub trait ClientTyped {
    const CLIENT_TYPE: ClientType;
}

/// A rust type usable as range element.
pub trait RangeElement {
    const ELEMENT: ElementType;
}

macro_rules! element {
    ($($ty:ty => $e:ident),* $(,)?) => {$(
        impl RangeElement for $ty {
            const ELEMENT: ElementType = ElementType::$e;
        }

        impl ClientTyped for $ty {
            const CLIENT_TYPE: ClientType = ClientType::Element(ElementType::$e);
        }
    )*};
}

element! {
    i32 => Int4,
    i64 => Int8,
    Decimal => Numeric,
    PrimitiveDateTime => Timestamp,
    UtcDateTime => TimestampTz,
    OffsetDateTime => OffsetTimestampTz,
    Date => Date,
}

macro_rules! client {
    ($($ty:ty => $client:ident),* $(,)?) => {$(
        impl ClientTyped for $ty {
            const CLIENT_TYPE: ClientType = ClientType::$client;
        }
    )*};
}

client! {
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

impl<T: RangeElement> ClientTyped for Range<T> {
    const CLIENT_TYPE: ClientType = ClientType::Range(T::ELEMENT);
}

impl<T: RangeElement> ClientTyped for Vec<Range<T>> {
    const CLIENT_TYPE: ClientType = ClientType::Multirange(T::ELEMENT, Container::List);
}

impl<T: RangeElement> ClientTyped for Box<[Range<T>]> {
    const CLIENT_TYPE: ClientType = ClientType::Multirange(T::ELEMENT, Container::Array);
}

impl<T: RangeElement> ClientTyped for Vec<Box<[Range<T>]>> {
    const CLIENT_TYPE: ClientType = ClientType::MultirangeArray(T::ELEMENT, Container::Array);
}

impl<T: RangeElement> ClientTyped for Vec<Vec<Range<T>>> {
    const CLIENT_TYPE: ClientType = ClientType::MultirangeArray(T::ELEMENT, Container::List);
}
