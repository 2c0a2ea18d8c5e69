use crate::types::{
    Cidr, Circle, Inet, Line, LineSegment, Lsn, Path, PgBox, Point, Polygon, Tid, TsQuery,
    TsVector,
};

/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// A type that have corresponding postgres oid.
pub trait PgType {
    const OID: Oid;
}

macro_rules! well_known {
    ($($id:ident = $oid:literal, $name:literal;)*) => {
        /// Well known postgres type oids.
        pub mod oid {
            use super::Oid;
            $(
                #[doc = concat!("`", $name, "`")]
                pub const $id: Oid = $oid;
            )*
        }

        /// Unqualified type name of well known oid.
        pub(crate) fn type_name(oid: Oid) -> Option<&'static str> {
            match oid {
                $($oid => Some($name),)*
                _ => None,
            }
        }

        /// Oid of well known unqualified type name.
        pub(crate) fn type_oid(name: &str) -> Option<Oid> {
            match name {
                $($name => Some($oid),)*
                _ => None,
            }
        }
    };
}

well_known! {
    TID = 27, "tid";
    INT8 = 20, "int8";
    INT4 = 23, "int4";
    TEXT = 25, "text";
    POINT = 600, "point";
    LSEG = 601, "lseg";
    PATH = 602, "path";
    BOX = 603, "box";
    POLYGON = 604, "polygon";
    LINE = 628, "line";
    CIDR = 650, "cidr";
    CIRCLE = 718, "circle";
    INET = 869, "inet";
    DATE = 1082, "date";
    TIMESTAMP = 1114, "timestamp";
    TIMESTAMPTZ = 1184, "timestamptz";
    NUMERIC = 1700, "numeric";
    RECORD = 2249, "record";
    RECORD_ARRAY = 2287, "_record";
    PG_LSN = 3220, "pg_lsn";
    TSVECTOR = 3614, "tsvector";
    TSQUERY = 3615, "tsquery";
    TSVECTOR_ARRAY = 3643, "_tsvector";
    TSQUERY_ARRAY = 3645, "_tsquery";
    INT4RANGE = 3904, "int4range";
    INT4RANGE_ARRAY = 3905, "_int4range";
    NUMRANGE = 3906, "numrange";
    NUMRANGE_ARRAY = 3907, "_numrange";
    TSRANGE = 3908, "tsrange";
    TSRANGE_ARRAY = 3909, "_tsrange";
    TSTZRANGE = 3910, "tstzrange";
    TSTZRANGE_ARRAY = 3911, "_tstzrange";
    DATERANGE = 3912, "daterange";
    DATERANGE_ARRAY = 3913, "_daterange";
    INT8RANGE = 3926, "int8range";
    INT8RANGE_ARRAY = 3927, "_int8range";
    INT4MULTIRANGE = 4451, "int4multirange";
    NUMMULTIRANGE = 4532, "nummultirange";
    TSMULTIRANGE = 4533, "tsmultirange";
    TSTZMULTIRANGE = 4534, "tstzmultirange";
    DATEMULTIRANGE = 4535, "datemultirange";
    INT8MULTIRANGE = 4536, "int8multirange";
    INT4MULTIRANGE_ARRAY = 6150, "_int4multirange";
    NUMMULTIRANGE_ARRAY = 6151, "_nummultirange";
    TSMULTIRANGE_ARRAY = 6152, "_tsmultirange";
    TSTZMULTIRANGE_ARRAY = 6153, "_tstzmultirange";
    DATEMULTIRANGE_ARRAY = 6155, "_datemultirange";
    INT8MULTIRANGE_ARRAY = 6157, "_int8multirange";
}

macro_rules! oid {
    ($ty:ty, $oid:expr $(, $doc:literal)? ) => {
        impl PgType for $ty {
            $(#[doc = $doc])?
            const OID: Oid = $oid;
        }
    };
}

oid!(i32, oid::INT4, "`int4` -2 billion to 2 billion integer, 4-byte storage");
oid!(i64, oid::INT8, "`int8` ~18 digit integer, 8-byte storage");
oid!(rust_decimal::Decimal, oid::NUMERIC, "`numeric` exact numeric of selectable precision");
oid!(time::PrimitiveDateTime, oid::TIMESTAMP, "`timestamp` date and time");
oid!(time::UtcDateTime, oid::TIMESTAMPTZ, "`timestamptz` date and time with time zone");
oid!(time::OffsetDateTime, oid::TIMESTAMPTZ, "`timestamptz` date and time with time zone");
oid!(time::Date, oid::DATE, "`date` calendar date");
oid!(Point, oid::POINT, "`point` geometric point '(x, y)'");
oid!(LineSegment, oid::LSEG, "`lseg` geometric line segment '(pt1,pt2)'");
oid!(Path, oid::PATH, "`path` geometric path '(pt1,...)'");
oid!(PgBox, oid::BOX, "`box` geometric box '(lower left,upper right)'");
oid!(Polygon, oid::POLYGON, "`polygon` geometric polygon '(pt1,...)'");
oid!(Line, oid::LINE, "`line` geometric line");
oid!(Circle, oid::CIRCLE, "`circle` geometric circle '(center,radius)'");
oid!(Inet, oid::INET, "`inet` IP address/netmask, host address, netmask optional");
oid!(Cidr, oid::CIDR, "`cidr` network IP address/netmask, network address");
oid!(Tid, oid::TID, "`tid` tuple physical location, format '(block,offset)'");
oid!(Lsn, oid::PG_LSN, "`pg_lsn` PostgreSQL LSN");
oid!(TsVector, oid::TSVECTOR, "`tsvector` text representation for text search");
oid!(TsQuery, oid::TSQUERY, "`tsquery` query representation for text search");

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn well_known_lookup() {
        assert_eq!(type_name(3904), Some("int4range"));
        assert_eq!(type_oid("_tstzmultirange"), Some(oid::TSTZMULTIRANGE_ARRAY));
        assert_eq!(type_oid("nope"), None);
        assert_eq!(<PgBox as PgType>::OID, 603);
    }
}
