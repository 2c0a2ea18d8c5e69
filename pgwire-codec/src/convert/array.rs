use std::marker::PhantomData;

use super::{BufferRequirement, Converter, MAX_PREALLOC, read_sized, write_sized};
use crate::{
    Result,
    error::DecodeError,
    ext::UsizeExt,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{Oid, PgFormat, ProtocolError},
};

/// Postgres limit of array dimensions.
const MAX_DIM: i32 = 6;

/// ndim, has_null, element oid
const HEADER_SIZE: usize = 12;

/// One dimensional array without nulls, collected into `K`.
///
/// Arrays of other element types, more dimensions or with null elements are consumed completely
/// before the error is returned.
#[derive(Debug, Clone)]
pub struct ArrayConverter<C, K> {
    element: C,
    element_oid: Oid,
    _container: PhantomData<fn() -> K>,
}

impl<C, K> ArrayConverter<C, K>
where
    C: Converter,
    K: From<Vec<C::Value>> + AsRef<[C::Value]>,
{
    pub fn new(element: C, element_oid: Oid) -> Self {
        Self { element, element_oid, _container: PhantomData }
    }

    pub fn element_oid(&self) -> Oid {
        self.element_oid
    }

    fn element_sizes(&self, value: &K) -> Result<Vec<i32>> {
        value
            .as_ref()
            .iter()
            .map(|element| Ok(self.element.get_size(element)?.to_i32()?))
            .collect()
    }
}

impl<C, K> Converter for ArrayConverter<C, K>
where
    C: Converter,
    K: From<Vec<C::Value>> + AsRef<[C::Value]>,
{
    type Value = K;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        let (supported, _) = self.element.can_convert(format);
        (supported, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &K) -> Result<usize> {
        if value.as_ref().is_empty() {
            return Ok(HEADER_SIZE);
        }
        value.as_ref().len().to_i32()?;
        let sizes = self.element_sizes(value)?;
        Ok(HEADER_SIZE + 8 + sizes.iter().map(|&size| 4 + size as usize).sum::<usize>())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<K> {
        reader.ensure(HEADER_SIZE).await?;
        let ndim = reader.read_i32();
        let _has_null = reader.read_i32();
        let element_oid = reader.read_u32();

        if !(0..=MAX_DIM).contains(&ndim) {
            return Err(ProtocolError::malformed(format!("array with {ndim} dimensions")).into());
        }

        let mut count = if ndim == 0 { 0usize } else { 1 };
        reader.ensure(8 * ndim as usize).await?;
        for _ in 0..ndim {
            let len = reader.read_i32();
            let _lbound = reader.read_i32();
            count = usize::try_from(len)
                .ok()
                .and_then(|len| count.checked_mul(len))
                .ok_or_else(|| ProtocolError::malformed(format!("array dimension length {len}")))?;
        }

        let mut error = if element_oid != self.element_oid {
            Some(DecodeError::OidMissmatch { expected: self.element_oid, found: element_oid })
        } else if ndim > 1 {
            Some(DecodeError::Invalid(format!("array has {ndim} dimensions, expected 1").into()))
        } else {
            None
        };

        let mut values = Vec::with_capacity(if error.is_none() { count.min(MAX_PREALLOC) } else { 0 });
        for _ in 0..count {
            reader.ensure(4).await?;
            let len = reader.read_i32();
            if len < 0 {
                error.get_or_insert(DecodeError::Null);
                continue;
            }
            if error.is_some() {
                reader.skip(len as usize).await?;
                continue;
            }
            values.push(read_sized(&self.element, reader, len).await?);
        }

        match error {
            Some(error) => Err(error.into()),
            None => Ok(K::from(values)),
        }
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &K) -> Result<()> {
        let elements = value.as_ref();
        let count = elements.len().to_i32()?;
        let sizes = self.element_sizes(value)?;

        writer.ensure(HEADER_SIZE + 8).await?;
        writer.write_i32(if elements.is_empty() { 0 } else { 1 });
        writer.write_i32(0);
        writer.write_u32(self.element_oid);
        if elements.is_empty() {
            return Ok(());
        }
        writer.write_i32(count);
        writer.write_i32(1);

        for (element, size) in elements.iter().zip(sizes) {
            write_sized(&self.element, writer, element, size).await?;
        }
        Ok(())
    }
}
