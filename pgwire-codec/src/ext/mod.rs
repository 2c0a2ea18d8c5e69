use bytes::{Buf, BufMut, Bytes};

use crate::{error::OutOfRangeError, postgres::ProtocolError};

/// Integer signess in postgres docs is awful.
pub trait UsizeExt {
    /// Length is `usize` in rust, while sometime postgres want `u32`,
    /// this will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
    /// Length is `usize` in rust, while postgres value length prefix is `i32`.
    fn to_i32(self) -> Result<i32, OutOfRangeError>;
    /// Length is `usize` in rust, while postgres element count is `i16`.
    fn to_i16(self) -> Result<i16, OutOfRangeError>;
}

/// Nul string operation.
pub trait StrExt {
    /// String length plus nul (1).
    fn nul_string_len(&self) -> u32;
}

/// Nul string operation in [`BufMut`]
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);
}

/// Nul string operation in [`Bytes`]
pub trait BytesExt {
    /// Read nul terminated bytes, excluding the nul.
    fn get_nul_bytes(&mut self) -> Result<Bytes, ProtocolError>;

    /// Read nul terminated utf8 string.
    fn get_nul_string(&mut self) -> Result<String, ProtocolError>;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_i32(self) -> Result<i32, OutOfRangeError> {
        self.try_into()
            .map_err(|_| OutOfRangeError::new(format!("length {self} exceeds i32")))
    }

    fn to_i16(self) -> Result<i16, OutOfRangeError> {
        self.try_into()
            .map_err(|_| OutOfRangeError::new(format!("count {self} exceeds i16")))
    }
}

impl StrExt for str {
    fn nul_string_len(&self) -> u32 {
        self.len().to_u32() + 1/* nul */
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

impl BytesExt for Bytes {
    fn get_nul_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        let Some(end) = memchr::memchr(b'\0', self) else {
            return Err(ProtocolError::malformed("string is not nul terminated"));
        };
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        Ok(me)
    }

    fn get_nul_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.get_nul_bytes()?;
        String::from_utf8(bytes.into())
            .map_err(|_| ProtocolError::malformed("string is not valid utf8"))
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nul_string() {
        let mut buf = bytes::BytesMut::new();
        buf.put_nul_string("foo");
        buf.put_nul_string("");
        let mut buf = buf.freeze();
        assert_eq!(buf.get_nul_string().unwrap(), "foo");
        assert_eq!(buf.get_nul_string().unwrap(), "");
        assert!(buf.is_empty());

        let mut buf = Bytes::from_static(b"unterminated");
        assert!(buf.get_nul_bytes().is_err());
    }

    #[test]
    fn lossy() {
        assert_eq!(b"a\x00b".lossy().to_string(), "a\\x0b");
        assert_eq!(format!("{:?}", b"ok".lossy()), "b\"ok\"");
    }
}
