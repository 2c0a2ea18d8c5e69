use super::{BufferRequirement, Converter, MAX_PREALLOC, read_count};
use crate::{
    Result,
    error::{DecodeError, OutOfRangeError},
    ext::UsizeExt,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{Oid, PgFormat},
    types::{Record, RecordField},
};

/// `record`, anonymous composite.
///
/// A typed converter checks every column oid against the expected list once the whole value is
/// read, so a mismatch leaves the stream positioned after the record.
#[derive(Debug, Clone, Default)]
pub struct RecordConverter {
    expected: Option<Vec<Oid>>,
}

impl RecordConverter {
    /// Accept any column types.
    pub fn untyped() -> Self {
        Self { expected: None }
    }

    /// Require exactly these column types, in order.
    pub fn typed(oids: impl Into<Vec<Oid>>) -> Self {
        Self { expected: Some(oids.into()) }
    }

    fn check(&self, record: &Record) -> Result<(), DecodeError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };
        if expected.len() != record.len() {
            return Err(DecodeError::Invalid(
                format!("record has {} columns, expected {}", record.len(), expected.len()).into(),
            ));
        }
        for (&expected, field) in expected.iter().zip(&record.fields) {
            if expected != field.oid {
                return Err(DecodeError::OidMissmatch { expected, found: field.oid });
            }
        }
        Ok(())
    }
}

impl Converter for RecordConverter {
    type Value = Record;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        (format == PgFormat::Binary, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &Record) -> Result<usize> {
        value.len().to_i32()?;
        let mut size = 4;
        for field in &value.fields {
            let len = field.value.as_ref().map_or(0, |v| v.len());
            len.to_i32()?;
            size += 8 + len;
        }
        Ok(size)
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Record> {
        let count = read_count(reader, "record column").await?;
        let mut fields = Vec::with_capacity(count.min(MAX_PREALLOC));

        for _ in 0..count {
            reader.ensure(8).await?;
            let oid = reader.read_u32();
            let len = reader.read_i32();
            let value = match usize::try_from(len) {
                Ok(len) => Some(reader.read_exact(len).await?),
                Err(_) => None,
            };
            fields.push(RecordField { oid, value });
        }

        let record = Record::new(fields);
        self.check(&record)?;
        Ok(record)
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Record) -> Result<()> {
        let count = value.len().to_i32()?;
        if let Some(expected) = &self.expected {
            let matches = expected.len() == value.len()
                && expected.iter().zip(&value.fields).all(|(&oid, field)| oid == field.oid);
            if !matches {
                return Err(OutOfRangeError::new("record columns do not match expected types").into());
            }
        }

        writer.ensure(4).await?;
        writer.write_i32(count);

        for field in &value.fields {
            writer.ensure(8).await?;
            writer.write_u32(field.oid);
            match &field.value {
                Some(bytes) => {
                    writer.write_i32(bytes.len() as i32);
                    writer.write_all(bytes).await?;
                }
                None => writer.write_i32(-1),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{convert::ConverterExt, error::ErrorKind, io::Chunked, postgres::oid};
    use bytes::Bytes;

    fn record() -> Record {
        Record::new(vec![
            RecordField { oid: oid::INT4, value: Some(Bytes::from_static(&[0, 0, 0, 42])) },
            RecordField { oid: oid::TEXT, value: None },
        ])
    }

    #[test]
    fn untyped_round_trip() {
        let conv = RecordConverter::untyped();
        let value = record();
        let bytes = conv.encode(&value).unwrap();
        assert_eq!(bytes.len(), 4 + 8 + 4 + 8);
        assert_eq!(&bytes[16..], &[0, 0, 0, 25, 0xff, 0xff, 0xff, 0xff]);

        let mut reader = PgReader::with_capacity(Chunked::new(bytes.freeze(), 5), 8);
        assert_eq!(conv.read_blocking(&mut reader).unwrap(), value);
    }

    #[test]
    fn oid_mismatch_consumes_record() {
        let bytes = RecordConverter::untyped().encode(&record()).unwrap().freeze();
        let len = bytes.len() as u64;

        let conv = RecordConverter::typed([oid::INT4, oid::INT8]);
        let mut reader = PgReader::new(bytes);
        let err = conv.read_blocking(&mut reader).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(DecodeError::OidMissmatch { found: 25, .. })));
        assert!(!err.is_fatal());
        assert_eq!(reader.position(), len);

        let conv = RecordConverter::typed([oid::INT4, oid::TEXT]);
        assert_eq!(conv.decode(RecordConverter::untyped().encode(&record()).unwrap().freeze()).unwrap(), record());
    }
}
