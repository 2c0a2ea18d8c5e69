use rust_decimal::Decimal;

use super::{BufferRequirement, Converter, FixedConverter, MAX_PREALLOC, impl_fixed};
use crate::{
    Result,
    error::DecodeError,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{PgFormat, ProtocolError},
};

/// `int4`
#[derive(Debug, Clone, Copy, Default)]
pub struct Int4Converter;

impl FixedConverter for Int4Converter {
    type Value = i32;

    const SIZE: usize = 4;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<i32> {
        Ok(reader.read_i32())
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &i32) -> Result<()> {
        writer.write_i32(*value);
        Ok(())
    }
}

/// `int8`
#[derive(Debug, Clone, Copy, Default)]
pub struct Int8Converter;

impl FixedConverter for Int8Converter {
    type Value = i64;

    const SIZE: usize = 8;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<i64> {
        Ok(reader.read_i64())
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &i64) -> Result<()> {
        writer.write_i64(*value);
        Ok(())
    }
}

impl_fixed!(Int4Converter, Int8Converter);

const SIGN_POS: u16 = 0x0000;
const SIGN_NEG: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_PINF: u16 = 0xD000;
const SIGN_NINF: u16 = 0xF000;

const NBASE: i128 = 10_000;
const MAX_SCALE: u32 = 28;

/// ndigits, weight, sign, dscale
const HEADER_SIZE: usize = 8;

/// Base 10000 representation of a decimal, most significant group first.
struct NumericParts {
    weight: i16,
    sign: u16,
    dscale: u16,
    digits: Vec<i16>,
}

impl NumericParts {
    fn from_decimal(value: &Decimal) -> NumericParts {
        let scale = value.scale();
        let pad = (4 - scale % 4) % 4;
        let frac_groups = ((scale + pad) / 4) as i32;

        let mut mantissa = value.mantissa().unsigned_abs() * 10u128.pow(pad);
        let mut digits = Vec::new();
        while mantissa != 0 {
            digits.push((mantissa % NBASE as u128) as i16);
            mantissa /= NBASE as u128;
        }

        if digits.is_empty() {
            return NumericParts { weight: 0, sign: SIGN_POS, dscale: scale as u16, digits };
        }

        let weight = (digits.len() as i32 - 1 - frac_groups) as i16;
        let zeros = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..zeros);
        digits.reverse();

        NumericParts {
            weight,
            sign: if value.is_sign_negative() { SIGN_NEG } else { SIGN_POS },
            dscale: scale as u16,
            digits,
        }
    }

    fn to_decimal(&self) -> Result<Decimal, DecodeError> {
        match self.sign {
            SIGN_POS | SIGN_NEG => {}
            SIGN_NAN => return Err(DecodeError::Invalid("numeric NaN is not a decimal".into())),
            SIGN_PINF | SIGN_NINF => {
                return Err(DecodeError::Invalid("numeric infinity is not a decimal".into()))
            }
            sign => return Err(DecodeError::Invalid(format!("numeric sign {sign:#x}").into())),
        }

        let overflow = || DecodeError::Invalid("numeric does not fit in a decimal".into());

        let mut mantissa = 0i128;
        for &digit in &self.digits {
            if !(0..NBASE as i16).contains(&digit) {
                return Err(DecodeError::Invalid(format!("numeric digit {digit}").into()));
            }
            mantissa = mantissa
                .checked_mul(NBASE)
                .and_then(|m| m.checked_add(digit as i128))
                .ok_or_else(overflow)?;
        }

        let exp = self.weight as i32 - self.digits.len() as i32 + 1;
        let mut scale = 0u32;
        if exp >= 0 {
            let factor = NBASE.checked_pow(exp as u32).ok_or_else(overflow)?;
            mantissa = mantissa.checked_mul(factor).ok_or_else(overflow)?;
        } else {
            scale = (-exp) as u32 * 4;
        }

        while scale > MAX_SCALE {
            mantissa /= 10;
            scale -= 1;
        }

        let mut decimal = Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|_| overflow())?;
        decimal.rescale((self.dscale as u32).min(MAX_SCALE));
        decimal.set_sign_negative(self.sign == SIGN_NEG);
        Ok(decimal)
    }
}

/// `numeric` as [`Decimal`].
///
/// `NaN` and infinities fail to decode, digits past 28 fractional places are truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericConverter;

impl Converter for NumericConverter {
    type Value = Decimal;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        (format == PgFormat::Binary, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &Decimal) -> Result<usize> {
        Ok(HEADER_SIZE + 2 * NumericParts::from_decimal(value).digits.len())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Decimal> {
        reader.ensure(HEADER_SIZE).await?;
        let ndigits = reader.read_i16();
        let weight = reader.read_i16();
        let sign = reader.read_u16();
        let dscale = reader.read_u16();

        let Ok(ndigits) = usize::try_from(ndigits) else {
            return Err(ProtocolError::malformed(format!("numeric digit count {ndigits}")).into());
        };

        let mut digits = Vec::with_capacity(ndigits.min(MAX_PREALLOC));
        for _ in 0..ndigits {
            reader.ensure(2).await?;
            digits.push(reader.read_i16());
        }

        Ok(NumericParts { weight, sign, dscale, digits }.to_decimal()?)
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Decimal) -> Result<()> {
        let parts = NumericParts::from_decimal(value);
        writer.ensure(HEADER_SIZE).await?;
        writer.write_i16(parts.digits.len() as i16);
        writer.write_i16(parts.weight);
        writer.write_u16(parts.sign);
        writer.write_u16(parts.dscale);
        for digit in parts.digits {
            writer.ensure(2).await?;
            writer.write_i16(digit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{convert::ConverterExt, error::ErrorKind};
    use bytes::{BufMut, BytesMut};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn wire_layout() {
        let bytes = NumericConverter.encode(&dec("123.45")).unwrap();
        let mut expected = BytesMut::new();
        for v in [2i16, 0, 0, 2, 123, 4500] {
            expected.put_i16(v);
        }
        assert_eq!(bytes, expected);

        let bytes = NumericConverter.encode(&dec("-0.0001")).unwrap();
        assert_eq!(&bytes[..], &[0, 1, 0xff, 0xff, 0x40, 0, 0, 4, 0, 1]);

        let bytes = NumericConverter.encode(&dec("0.00")).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 0, 0, 0, 2]);
    }

    #[test]
    fn round_trip() {
        for s in ["0", "1", "10000", "1200000", "-987654321.123456789", "0.5", "79228162514264337593543950335"] {
            let value = dec(s);
            let bytes = NumericConverter.encode(&value).unwrap();
            let decoded = NumericConverter.decode(bytes.freeze()).unwrap();
            assert_eq!(decoded, value, "{s}");
            assert_eq!(decoded.scale(), value.scale(), "{s}");
        }
    }

    #[test]
    fn special_values() {
        let mut bytes = BytesMut::new();
        for v in [0u16, 0, 0xC000, 0] {
            bytes.put_u16(v);
        }
        let err = NumericConverter.decode(bytes.freeze()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn integers() {
        let bytes = Int4Converter.encode(&-2).unwrap();
        assert_eq!(&bytes[..], &[0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(Int8Converter.decode(Int8Converter.encode(&i64::MIN).unwrap().freeze()).unwrap(), i64::MIN);
    }
}
