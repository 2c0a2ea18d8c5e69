use super::{FixedConverter, impl_fixed};
use crate::{
    Result,
    io::{PgReader, PgWriter},
    types::{Lsn, Tid},
};

/// `tid`, block number then offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct TidConverter;

impl FixedConverter for TidConverter {
    type Value = Tid;

    const SIZE: usize = 6;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Tid> {
        Ok(Tid::new(reader.read_u32(), reader.read_u16()))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Tid) -> Result<()> {
        writer.write_u32(value.block);
        writer.write_u16(value.offset);
        Ok(())
    }
}

/// `pg_lsn`, unsigned 64 bit log position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsnConverter;

impl FixedConverter for LsnConverter {
    type Value = Lsn;

    const SIZE: usize = 8;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Lsn> {
        Ok(Lsn(reader.read_u64()))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Lsn) -> Result<()> {
        writer.write_u64(value.0);
        Ok(())
    }
}

impl_fixed!(TidConverter, LsnConverter);

#[cfg(test)]
mod test {
    use super::*;
    use crate::convert::ConverterExt;

    #[test]
    fn tid() {
        let tid = Tid::new(0x01020304, 7);
        let bytes = TidConverter.encode(&tid).unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3, 4, 0, 7]);
        assert_eq!(TidConverter.decode(bytes.freeze()).unwrap(), tid);
    }

    #[test]
    fn lsn() {
        let lsn: Lsn = "16/B374D848".parse().unwrap();
        let bytes = LsnConverter.encode(&lsn).unwrap();
        assert_eq!(&bytes[..], &0x16_B374_D848u64.to_be_bytes());
        assert_eq!(LsnConverter.decode(bytes.freeze()).unwrap(), lsn);
    }
}
