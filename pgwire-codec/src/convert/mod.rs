//! Binary converters.
//!
//! A [`Converter`] reads and writes one postgres value in [`Binary`][PgFormat::Binary] format,
//! without its length prefix. Fixed size types implement [`FixedConverter`] instead and get
//! their [`Converter`] impl from it.
//!
//! # Buffering
//!
//! [`Converter::read`] never assumes the whole value is buffered. Before each primitive read
//! that may cross the buffer boundary it calls [`PgReader::ensure`], which suspends on the
//! underlying io when needed. Writing mirrors this with [`PgWriter::ensure`].
//!
//! [`Converter::get_size`] must return exactly the number of bytes [`Converter::write`] emits,
//! postgres reads the value using the length prefix computed from it.
use bytes::{Bytes, BytesMut};

use crate::{
    Result,
    error::{DecodeError, Error},
    io::{PgReader, PgWriter, ReadSource, WriteSink, block_on},
    postgres::{PgFormat, ProtocolError},
};

mod geometric;
mod network;
mod internal;
mod numeric;
mod datetime;
mod text_search;
mod record;
mod range;
mod array;

pub use geometric::{
    BoxConverter, CircleConverter, LineConverter, LineSegmentConverter, PathConverter,
    PointConverter, PolygonConverter,
};
pub use network::{CidrConverter, InetConverter};
pub use internal::{LsnConverter, TidConverter};
pub use numeric::{Int4Converter, Int8Converter, NumericConverter};
pub use datetime::{DateConverter, OffsetDateTimeConverter, TimestampConverter, TimestampTzConverter};
pub use text_search::{DEFAULT_TSQUERY_DEPTH, MAX_LEXEME_LEN, TsQueryConverter, TsVectorConverter};
pub use record::RecordConverter;
pub use range::{
    MultirangeArrayConverter, MultirangeConverter, MultirangeListConverter, RangeConverter,
};
pub use array::ArrayConverter;

/// How much of a value must be buffered before reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRequirement {
    /// Exactly this many bytes.
    Fixed(usize),
    /// At most this many bytes.
    UpperBound(usize),
    /// Value size is only known while reading it.
    Streaming,
}

/// Binary codec of a single postgres value.
pub trait Converter {
    type Value;

    /// Returns whether `format` is supported, and how the value is buffered.
    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement);

    /// Exact number of bytes [`write`][Converter::write] emits for `value`.
    ///
    /// Values that cannot be written fail here, before anything is written.
    fn get_size(&self, value: &Self::Value) -> Result<usize>;

    fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> impl Future<Output = Result<Self::Value>>;

    fn write<S: WriteSink>(
        &self,
        writer: &mut PgWriter<S>,
        value: &Self::Value,
    ) -> impl Future<Output = Result<()>>;
}

/// Blocking and in memory helpers for every [`Converter`].
pub trait ConverterExt: Converter {
    /// Read on the current thread, blocking on io when the buffer runs out.
    fn read_blocking<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Self::Value> {
        block_on(self.read(reader))
    }

    /// Write on the current thread, blocking on io when the buffer is full.
    fn write_blocking<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Self::Value) -> Result<()> {
        block_on(self.write(writer, value))
    }

    /// Decode a complete value, all of `bytes` must be consumed.
    fn decode(&self, bytes: Bytes) -> Result<Self::Value> {
        let len = bytes.len();
        let mut reader = PgReader::new(bytes);
        let value = self.read_blocking(&mut reader)?;
        if reader.position() != len as u64 {
            return Err(DecodeError::Invalid(
                format!("value is {len} bytes, converter read {}", reader.position()).into(),
            )
            .into());
        }
        Ok(value)
    }

    /// Encode a complete value, checking the written size against [`Converter::get_size`].
    fn encode(&self, value: &Self::Value) -> Result<BytesMut> {
        let size = self.get_size(value)?;
        let mut writer = PgWriter::with_capacity(BytesMut::with_capacity(size), size.max(1));
        self.write_blocking(&mut writer, value)?;
        writer.flush_blocking()?;
        if writer.written() != size as u64 {
            return Err(Error::internal("written size differs from computed size"));
        }
        Ok(writer.into_inner())
    }
}

impl<C: Converter + ?Sized> ConverterExt for C { }

/// Converter of a value with size known up front.
pub trait FixedConverter {
    type Value;

    const SIZE: usize;

    /// Read with [`SIZE`][FixedConverter::SIZE] bytes guaranteed to be buffered.
    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Self::Value>;

    /// Write [`SIZE`][FixedConverter::SIZE] bytes.
    ///
    /// Must validate `value` before writing any byte.
    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Self::Value) -> Result<()>;
}

/// Implement [`Converter`] for [`FixedConverter`]s.
macro_rules! impl_fixed {
    ($($ty:ty),* $(,)?) => {$(
        impl $crate::convert::Converter for $ty {
            type Value = <$ty as $crate::convert::FixedConverter>::Value;

            fn can_convert(
                &self,
                format: $crate::postgres::PgFormat,
            ) -> (bool, $crate::convert::BufferRequirement) {
                let size = <$ty as $crate::convert::FixedConverter>::SIZE;
                (
                    format == $crate::postgres::PgFormat::Binary,
                    $crate::convert::BufferRequirement::Fixed(size),
                )
            }

            fn get_size(&self, _: &Self::Value) -> $crate::Result<usize> {
                Ok(<$ty as $crate::convert::FixedConverter>::SIZE)
            }

            async fn read<S: $crate::io::ReadSource>(
                &self,
                reader: &mut $crate::io::PgReader<S>,
            ) -> $crate::Result<Self::Value> {
                reader.ensure(<$ty as $crate::convert::FixedConverter>::SIZE).await?;
                $crate::convert::FixedConverter::read_fixed(self, reader)
            }

            async fn write<S: $crate::io::WriteSink>(
                &self,
                writer: &mut $crate::io::PgWriter<S>,
                value: &Self::Value,
            ) -> $crate::Result<()> {
                writer.ensure(<$ty as $crate::convert::FixedConverter>::SIZE).await?;
                $crate::convert::FixedConverter::write_fixed(self, writer, value)
            }
        }
    )*};
}

pub(crate) use impl_fixed;

/// Read a length prefixed nested value, `len` is the already read prefix.
///
/// The converter must consume exactly `len` bytes.
pub(crate) async fn read_sized<C, S>(converter: &C, reader: &mut PgReader<S>, len: i32) -> Result<C::Value>
where
    C: Converter,
    S: ReadSource,
{
    if len < 0 {
        return Err(DecodeError::Null.into());
    }

    let start = reader.position();
    let value = converter.read(reader).await?;
    let read = reader.position() - start;

    if read != len as u64 {
        return Err(ProtocolError::malformed(format!(
            "nested value length is {len} but {read} bytes were read"
        ))
        .into());
    }

    Ok(value)
}

/// Write `len` prefix followed by the value.
pub(crate) async fn write_sized<C, S>(
    converter: &C,
    writer: &mut PgWriter<S>,
    value: &C::Value,
    len: i32,
) -> Result<()>
where
    C: Converter,
    S: WriteSink,
{
    writer.ensure(4).await?;
    writer.write_i32(len);
    converter.write(writer, value).await
}

/// Read a 4 byte signed count, negative is malformed.
pub(crate) async fn read_count<S: ReadSource>(reader: &mut PgReader<S>, what: &'static str) -> Result<usize> {
    reader.ensure(4).await?;
    let count = reader.read_i32();
    usize::try_from(count)
        .map_err(|_| ProtocolError::malformed(format!("negative {what} count {count}")).into())
}

/// Preallocation cap for counts read from the wire.
pub(crate) const MAX_PREALLOC: usize = 1024;

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn decode_requires_whole_value() {
        let err = Int4Converter.decode(Bytes::from_static(&[0, 0, 0, 1, 0])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(_)));
        assert_eq!(Int4Converter.decode(Bytes::from_static(&[0, 0, 0, 1])).unwrap(), 1);
    }

    #[test]
    fn sized_read_checks_length() {
        let mut reader = PgReader::new(Bytes::from_static(&[0, 0, 0, 1, 0, 0, 0, 2]));
        let err = block_on(read_sized(&Int4Converter, &mut reader, 8)).unwrap_err();
        assert!(err.is_fatal());

        let mut reader = PgReader::new(Bytes::new());
        let err = block_on(read_sized(&Int4Converter, &mut reader, -1)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(DecodeError::Null)));
    }
}
