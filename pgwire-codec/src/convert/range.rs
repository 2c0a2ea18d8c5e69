use std::marker::PhantomData;

use super::{BufferRequirement, Converter, MAX_PREALLOC, read_count, read_sized, write_sized};
use crate::{
    Result,
    ext::UsizeExt,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{PgFormat, ProtocolError},
    types::{Range, RangeBound, range_flags as flags},
};

/// Range over the values of an element converter.
#[derive(Debug, Clone, Default)]
pub struct RangeConverter<C> {
    element: C,
}

impl<C: Converter> RangeConverter<C> {
    pub fn new(element: C) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &C {
        &self.element
    }

    /// Size of each finite bound, lower first.
    fn bound_sizes(&self, value: &Range<C::Value>) -> Result<[Option<i32>; 2]> {
        let Range::NonEmpty { lower, upper } = value else {
            return Ok([None, None]);
        };
        let mut sizes = [None; 2];
        for (size, bound) in sizes.iter_mut().zip([lower, upper]) {
            if let Some(value) = bound.value() {
                *size = Some(self.element.get_size(value)?.to_i32()?);
            }
        }
        Ok(sizes)
    }

    async fn read_bound<S: ReadSource>(
        &self,
        reader: &mut PgReader<S>,
        infinite: bool,
        inclusive: bool,
    ) -> Result<RangeBound<C::Value>> {
        if infinite {
            return Ok(RangeBound::Unbounded);
        }
        reader.ensure(4).await?;
        let len = reader.read_i32();
        if len < 0 {
            return Err(ProtocolError::malformed("range bound is null").into());
        }
        let value = read_sized(&self.element, reader, len).await?;
        Ok(match inclusive {
            true => RangeBound::Inclusive(value),
            false => RangeBound::Exclusive(value),
        })
    }
}

impl<C: Converter> Converter for RangeConverter<C> {
    type Value = Range<C::Value>;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        let (supported, _) = self.element.can_convert(format);
        (supported, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &Self::Value) -> Result<usize> {
        let sizes = self.bound_sizes(value)?;
        Ok(1 + sizes.iter().flatten().map(|&size| 4 + size as usize).sum::<usize>())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Self::Value> {
        reader.ensure(1).await?;
        let flags = reader.read_u8();
        if flags & flags::EMPTY != 0 {
            return Ok(Range::Empty);
        }

        let lower = self
            .read_bound(reader, flags & flags::LB_INF != 0, flags & flags::LB_INC != 0)
            .await?;
        let upper = self
            .read_bound(reader, flags & flags::UB_INF != 0, flags & flags::UB_INC != 0)
            .await?;

        Ok(Range::NonEmpty { lower, upper })
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Self::Value) -> Result<()> {
        let sizes = self.bound_sizes(value)?;

        writer.ensure(1).await?;
        writer.write_u8(value.flags());

        let Range::NonEmpty { lower, upper } = value else {
            return Ok(());
        };
        for (size, bound) in sizes.into_iter().zip([lower, upper]) {
            if let (Some(size), Some(value)) = (size, bound.value()) {
                write_sized(&self.element, writer, value, size).await?;
            }
        }

        Ok(())
    }
}

/// Multirange over the values of an element converter.
///
/// `K` is the container ranges are collected into.
#[derive(Debug, Clone)]
pub struct MultirangeConverter<C, K> {
    range: RangeConverter<C>,
    _container: PhantomData<fn() -> K>,
}

/// Multirange collected into a [`Vec`].
pub type MultirangeListConverter<C> = MultirangeConverter<C, Vec<Range<<C as Converter>::Value>>>;

/// Multirange collected into a boxed slice.
pub type MultirangeArrayConverter<C> = MultirangeConverter<C, Box<[Range<<C as Converter>::Value>]>>;

impl<C, K> MultirangeConverter<C, K>
where
    C: Converter,
    K: From<Vec<Range<C::Value>>> + AsRef<[Range<C::Value>]>,
{
    pub fn new(element: C) -> Self {
        Self { range: RangeConverter::new(element), _container: PhantomData }
    }

    pub fn element(&self) -> &C {
        self.range.element()
    }

    fn range_sizes(&self, value: &K) -> Result<Vec<i32>> {
        value
            .as_ref()
            .iter()
            .map(|range| Ok(self.range.get_size(range)?.to_i32()?))
            .collect()
    }
}

impl<C, K> Converter for MultirangeConverter<C, K>
where
    C: Converter,
    K: From<Vec<Range<C::Value>>> + AsRef<[Range<C::Value>]>,
{
    type Value = K;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        self.range.can_convert(format)
    }

    fn get_size(&self, value: &K) -> Result<usize> {
        value.as_ref().len().to_i32()?;
        let sizes = self.range_sizes(value)?;
        Ok(4 + sizes.iter().map(|&size| 4 + size as usize).sum::<usize>())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<K> {
        let count = read_count(reader, "multirange").await?;
        let mut ranges = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            reader.ensure(4).await?;
            let len = reader.read_i32();
            if len < 0 {
                return Err(ProtocolError::malformed("multirange contains null range").into());
            }
            ranges.push(read_sized(&self.range, reader, len).await?);
        }
        Ok(K::from(ranges))
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &K) -> Result<()> {
        let count = value.as_ref().len().to_i32()?;
        let sizes = self.range_sizes(value)?;

        writer.ensure(4).await?;
        writer.write_i32(count);
        for (range, size) in value.as_ref().iter().zip(sizes) {
            write_sized(&self.range, writer, range, size).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        convert::{ConverterExt, Int4Converter, NumericConverter},
        error::ErrorKind,
        io::Chunked,
    };
    use bytes::Bytes;
    use rust_decimal::Decimal;

    #[test]
    fn int4_range_layout() {
        let conv = RangeConverter::new(Int4Converter);
        let bytes = conv.encode(&Range::half_open(1, 5)).unwrap();
        assert_eq!(&bytes[..], &[2, 0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 5]);

        let unbounded = Range::new(RangeBound::Unbounded, RangeBound::Inclusive(9));
        let bytes = conv.encode(&unbounded).unwrap();
        assert_eq!(bytes.len(), 1 + 8);
        assert_eq!(conv.decode(bytes.freeze()).unwrap(), unbounded);

        let bytes = conv.encode(&Range::Empty).unwrap();
        assert_eq!(&bytes[..], &[1]);
        assert_eq!(conv.decode(bytes.freeze()).unwrap(), Range::Empty);
    }

    #[test]
    fn bound_length_mismatch() {
        let conv = RangeConverter::new(Int4Converter);
        let bytes = Bytes::from_static(&[0x10 | 0x02, 0, 0, 0, 8, 0, 0, 0, 1]);
        let err = conv.decode(bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }

    #[test]
    fn multirange_containers() {
        let ranges = vec![
            Range::half_open(Decimal::new(15, 1), Decimal::new(3, 0)),
            Range::new(RangeBound::Exclusive(Decimal::new(10, 0)), RangeBound::Unbounded),
        ];

        let list = MultirangeListConverter::<NumericConverter>::new(NumericConverter);
        let bytes = list.encode(&ranges).unwrap();
        assert_eq!(bytes.len(), list.get_size(&ranges).unwrap());

        let mut reader = PgReader::with_capacity(Chunked::new(bytes.clone().freeze(), 3), 4);
        assert_eq!(list.read_blocking(&mut reader).unwrap(), ranges);

        let array = MultirangeArrayConverter::<NumericConverter>::new(NumericConverter);
        let decoded = array.decode(bytes.freeze()).unwrap();
        assert_eq!(&decoded[..], &ranges[..]);
    }
}
