//! Codecs resolved at runtime.
use super::{ClientType, Container, ElementType, TypeMapperOptions, UnsupportedError, Value};
use crate::{
    Result,
    convert::{
        ArrayConverter, BoxConverter, BufferRequirement, CidrConverter, CircleConverter, Converter,
        DateConverter, InetConverter, Int4Converter, Int8Converter, LineConverter,
        LineSegmentConverter, LsnConverter, MultirangeArrayConverter, MultirangeListConverter,
        NumericConverter, OffsetDateTimeConverter, PathConverter, PointConverter, PolygonConverter,
        RangeConverter, RecordConverter, TidConverter, TimestampConverter, TimestampTzConverter,
        TsQueryConverter, TsVectorConverter,
    },
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{Oid, PgFormat},
    types::Range,
};

fn mismatch(expected: &'static str, found: &Value) -> UnsupportedError {
    UnsupportedError::ValueMismatch { expected, found: found.kind() }
}

/// Converter of a single range element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementCodec {
    pub element: ElementType,
    pub infinity_conversions: bool,
}

impl ElementCodec {
    pub fn new(element: ElementType, infinity_conversions: bool) -> Self {
        Self { element, infinity_conversions }
    }
}

/// Dispatch over the element converter, `$conv` is bound to the converter.
macro_rules! with_element {
    ($self:ident, $conv:ident => $body:expr) => {{
        let infinity_conversions = $self.infinity_conversions;
        match $self.element {
            ElementType::Int4 => { let $conv = Int4Converter; $body }
            ElementType::Int8 => { let $conv = Int8Converter; $body }
            ElementType::Numeric => { let $conv = NumericConverter; $body }
            ElementType::Timestamp => { let $conv = TimestampConverter { infinity_conversions }; $body }
            ElementType::TimestampTz => { let $conv = TimestampTzConverter { infinity_conversions }; $body }
            ElementType::OffsetTimestampTz => {
                let $conv = OffsetDateTimeConverter { infinity_conversions };
                $body
            }
            ElementType::Date => { let $conv = DateConverter { infinity_conversions }; $body }
        }
    }};
}

impl Converter for ElementCodec {
    type Value = Value;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        with_element!(self, conv => conv.can_convert(format))
    }

    fn get_size(&self, value: &Value) -> Result<usize> {
        match (self.element, value) {
            (ElementType::Int4, Value::Int4(_)) | (ElementType::Date, Value::Date(_)) => Ok(4),
            (ElementType::Int8, Value::Int8(_))
            | (ElementType::Timestamp, Value::Timestamp(_))
            | (ElementType::TimestampTz, Value::TimestampTz(_))
            | (ElementType::OffsetTimestampTz, Value::OffsetTimestampTz(_)) => Ok(8),
            (ElementType::Numeric, Value::Numeric(v)) => NumericConverter.get_size(v),
            (element, found) => Err(mismatch(element.rust_name(), found).into()),
        }
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Value> {
        with_element!(self, conv => conv.read(reader).await.map(Value::from))
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Value) -> Result<()> {
        let infinity_conversions = self.infinity_conversions;
        match (self.element, value) {
            (ElementType::Int4, Value::Int4(v)) => Int4Converter.write(writer, v).await,
            (ElementType::Int8, Value::Int8(v)) => Int8Converter.write(writer, v).await,
            (ElementType::Numeric, Value::Numeric(v)) => NumericConverter.write(writer, v).await,
            (ElementType::Timestamp, Value::Timestamp(v)) => {
                TimestampConverter { infinity_conversions }.write(writer, v).await
            }
            (ElementType::TimestampTz, Value::TimestampTz(v)) => {
                TimestampTzConverter { infinity_conversions }.write(writer, v).await
            }
            (ElementType::OffsetTimestampTz, Value::OffsetTimestampTz(v)) => {
                OffsetDateTimeConverter { infinity_conversions }.write(writer, v).await
            }
            (ElementType::Date, Value::Date(v)) => {
                DateConverter { infinity_conversions }.write(writer, v).await
            }
            (element, found) => Err(mismatch(element.rust_name(), found).into()),
        }
    }
}

/// Multirange of elements, read into the configured [`Container`].
///
/// Either container is accepted when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultirangeCodec {
    pub element: ElementCodec,
    pub container: Container,
}

impl MultirangeCodec {
    fn array(&self) -> MultirangeArrayConverter<ElementCodec> {
        MultirangeArrayConverter::<ElementCodec>::new(self.element)
    }

    fn list(&self) -> MultirangeListConverter<ElementCodec> {
        MultirangeListConverter::<ElementCodec>::new(self.element)
    }
}

impl Converter for MultirangeCodec {
    type Value = Value;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        self.list().can_convert(format)
    }

    fn get_size(&self, value: &Value) -> Result<usize> {
        match value {
            Value::Multirange(ranges) => self.array().get_size(ranges),
            Value::MultirangeList(ranges) => self.list().get_size(ranges),
            found => Err(mismatch("Multirange", found).into()),
        }
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Value> {
        match self.container {
            Container::Array => Ok(Value::Multirange(self.array().read(reader).await?)),
            Container::List => Ok(Value::MultirangeList(self.list().read(reader).await?)),
        }
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Value) -> Result<()> {
        match value {
            Value::Multirange(ranges) => self.array().write(writer, ranges).await,
            Value::MultirangeList(ranges) => self.list().write(writer, ranges).await,
            found => Err(mismatch("Multirange", found).into()),
        }
    }
}

type RangeArrayConverter = ArrayConverter<RangeConverter<ElementCodec>, Vec<Range<Value>>>;
type MultirangeArrayOfConverter = ArrayConverter<MultirangeCodec, Vec<Value>>;

/// Codec of any resolvable type, reading and writing [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Element(ElementCodec),
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
    TsQuery { max_depth: usize },
    Record,
    Range(ElementCodec),
    /// Array of ranges, `oid` is the range type oid.
    RangeArray { element: ElementCodec, oid: Oid },
    Multirange(MultirangeCodec),
    /// Array of multiranges, `oid` is the multirange type oid.
    MultirangeArray { multirange: MultirangeCodec, oid: Oid },
}

/// Invoke `$m` with every codec backed by a single converter.
macro_rules! simple_codecs {
    ($m:ident) => {
        $m! {
            Point => PointConverter,
            Line => LineConverter,
            LineSegment => LineSegmentConverter,
            Box => BoxConverter,
            Path => PathConverter,
            Polygon => PolygonConverter,
            Circle => CircleConverter,
            Inet => InetConverter,
            Cidr => CidrConverter,
            Tid => TidConverter,
            Lsn => LsnConverter,
            TsVector => TsVectorConverter,
            Record => RecordConverter::untyped(),
        }
    };
}

impl Converter for Codec {
    type Value = Value;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        macro_rules! can_convert {
            ($($variant:ident => $conv:expr,)*) => {
                match self {
                    $(Self::$variant => $conv.can_convert(format),)*
                    Self::Element(e) => e.can_convert(format),
                    Self::TsQuery { max_depth } => {
                        TsQueryConverter::new().with_max_depth(*max_depth).can_convert(format)
                    }
                    Self::Range(e) => RangeConverter::new(*e).can_convert(format),
                    Self::RangeArray { element, oid } => {
                        RangeArrayConverter::new(RangeConverter::new(*element), *oid).can_convert(format)
                    }
                    Self::Multirange(m) => m.can_convert(format),
                    Self::MultirangeArray { multirange, oid } => {
                        MultirangeArrayOfConverter::new(*multirange, *oid).can_convert(format)
                    }
                }
            };
        }
        simple_codecs!(can_convert)
    }

    fn get_size(&self, value: &Value) -> Result<usize> {
        macro_rules! get_size {
            ($($variant:ident => $conv:expr,)*) => {
                match (self, value) {
                    $((Self::$variant, Value::$variant(v)) => $conv.get_size(v),)*
                    (Self::Element(e), value) => e.get_size(value),
                    (Self::TsQuery { max_depth }, Value::TsQuery(v)) => {
                        TsQueryConverter::new().with_max_depth(*max_depth).get_size(v)
                    }
                    (Self::Range(e), Value::Range(v)) => RangeConverter::new(*e).get_size(v),
                    (Self::RangeArray { element, oid }, Value::RangeArray(v)) => {
                        RangeArrayConverter::new(RangeConverter::new(*element), *oid).get_size(v)
                    }
                    (Self::Multirange(m), value) => m.get_size(value),
                    (Self::MultirangeArray { multirange, oid }, Value::MultirangeArray(v)) => {
                        MultirangeArrayOfConverter::new(*multirange, *oid).get_size(v)
                    }
                    (codec, found) => Err(mismatch(codec.kind(), found).into()),
                }
            };
        }
        simple_codecs!(get_size)
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Value> {
        macro_rules! read {
            ($($variant:ident => $conv:expr,)*) => {
                match self {
                    $(Self::$variant => Ok(Value::$variant($conv.read(reader).await?)),)*
                    Self::Element(e) => e.read(reader).await,
                    Self::TsQuery { max_depth } => {
                        let conv = TsQueryConverter::new().with_max_depth(*max_depth);
                        Ok(Value::TsQuery(conv.read(reader).await?))
                    }
                    Self::Range(e) => {
                        Ok(Value::Range(Box::new(RangeConverter::new(*e).read(reader).await?)))
                    }
                    Self::RangeArray { element, oid } => {
                        let conv = RangeArrayConverter::new(RangeConverter::new(*element), *oid);
                        Ok(Value::RangeArray(conv.read(reader).await?))
                    }
                    Self::Multirange(m) => m.read(reader).await,
                    Self::MultirangeArray { multirange, oid } => {
                        let conv = MultirangeArrayOfConverter::new(*multirange, *oid);
                        Ok(Value::MultirangeArray(conv.read(reader).await?))
                    }
                }
            };
        }
        simple_codecs!(read)
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Value) -> Result<()> {
        macro_rules! write {
            ($($variant:ident => $conv:expr,)*) => {
                match (self, value) {
                    $((Self::$variant, Value::$variant(v)) => $conv.write(writer, v).await,)*
                    (Self::Element(e), value) => e.write(writer, value).await,
                    (Self::TsQuery { max_depth }, Value::TsQuery(v)) => {
                        TsQueryConverter::new().with_max_depth(*max_depth).write(writer, v).await
                    }
                    (Self::Range(e), Value::Range(v)) => RangeConverter::new(*e).write(writer, v).await,
                    (Self::RangeArray { element, oid }, Value::RangeArray(v)) => {
                        let conv = RangeArrayConverter::new(RangeConverter::new(*element), *oid);
                        conv.write(writer, v).await
                    }
                    (Self::Multirange(m), value) => m.write(writer, value).await,
                    (Self::MultirangeArray { multirange, oid }, Value::MultirangeArray(v)) => {
                        MultirangeArrayOfConverter::new(*multirange, *oid).write(writer, v).await
                    }
                    (codec, found) => Err(mismatch(codec.kind(), found).into()),
                }
            };
        }
        simple_codecs!(write)
    }
}

impl Codec {
    /// Codec of `client` representation.
    ///
    /// `element_oid` is the array element type, ignored for non array types.
    pub fn for_client(client: &ClientType, element_oid: Oid, options: &TypeMapperOptions) -> Codec {
        let element = |e| ElementCodec::new(e, options.infinity_conversions);
        let multirange = |e, container| MultirangeCodec { element: element(e), container };
        match *client {
            ClientType::Element(e) => Self::Element(element(e)),
            ClientType::Point => Self::Point,
            ClientType::Line => Self::Line,
            ClientType::LineSegment => Self::LineSegment,
            ClientType::Box => Self::Box,
            ClientType::Path => Self::Path,
            ClientType::Polygon => Self::Polygon,
            ClientType::Circle => Self::Circle,
            ClientType::Inet => Self::Inet,
            ClientType::Cidr => Self::Cidr,
            ClientType::Tid => Self::Tid,
            ClientType::Lsn => Self::Lsn,
            ClientType::TsVector => Self::TsVector,
            ClientType::TsQuery => Self::TsQuery { max_depth: options.max_tsquery_depth },
            ClientType::Record => Self::Record,
            ClientType::Range(e) => Self::Range(element(e)),
            ClientType::RangeArray(e) => Self::RangeArray { element: element(e), oid: element_oid },
            ClientType::Multirange(e, container) => Self::Multirange(multirange(e, container)),
            ClientType::MultirangeArray(e, container) => Self::MultirangeArray {
                multirange: multirange(e, container),
                oid: element_oid,
            },
        }
    }

    /// Name of the [`Value`] variant this codec reads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Element(e) => e.element.rust_name(),
            Self::Point => "Point",
            Self::Line => "Line",
            Self::LineSegment => "LineSegment",
            Self::Box => "Box",
            Self::Path => "Path",
            Self::Polygon => "Polygon",
            Self::Circle => "Circle",
            Self::Inet => "Inet",
            Self::Cidr => "Cidr",
            Self::Tid => "Tid",
            Self::Lsn => "Lsn",
            Self::TsVector => "TsVector",
            Self::TsQuery { .. } => "TsQuery",
            Self::Record => "Record",
            Self::Range(_) => "Range",
            Self::RangeArray { .. } => "RangeArray",
            Self::Multirange(_) => "Multirange",
            Self::MultirangeArray { .. } => "MultirangeArray",
        }
    }
}
