//! Frontend messages of a replication session.
//!
//! Answers to authentication challenges, simple queries carrying replication commands, and
//! the client side of the copy stream.
//!
//! <https://www.postgresql.org/docs/current/protocol-replication.html>
use bytes::{BufMut, BytesMut};

use crate::ext::{BufMutExt, StrExt, UsizeExt};

/// Write a frontend message to `buf`.
pub fn write<F: FrontendProtocol>(msg: F, buf: &mut BytesMut) {
    // msgtype + length
    const PREFIX: usize = 1 + 4;

    let body_len = msg.size_hint();
    buf.reserve(PREFIX + body_len as usize);

    let start = buf.len();
    buf.put_u8(F::MSGTYPE);
    buf.put_u32(4 + body_len);
    msg.encode(&mut *buf);

    debug_assert_eq!(
        buf.len() - start,
        PREFIX + body_len as usize,
        "{} wrote a body different from its size hint",
        F::MSGTYPE as char,
    );
}

/// A message the client sends.
pub trait FrontendProtocol {
    const MSGTYPE: u8;

    /// Exact body length, excluding the type byte and the length field.
    fn size_hint(&self) -> u32;

    /// Write exactly [`size_hint`][FrontendProtocol::size_hint] bytes.
    fn encode(self, buf: impl BufMut);
}

/// Reply to a cleartext or MD5 challenge, already hashed for the latter.
#[derive(Debug)]
pub struct PasswordMessage<'a> {
    pub password: &'a str,
}

impl FrontendProtocol for PasswordMessage<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> u32 {
        self.password.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.password);
    }
}

/// First SASL message, naming the chosen mechanism.
#[derive(Debug)]
pub struct SASLInitialResponse<'a> {
    pub mechanism: &'a str,
    /// Client first message, `None` is sent as length `-1`.
    pub data: Option<&'a [u8]>,
}

impl FrontendProtocol for SASLInitialResponse<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> u32 {
        let data = self.data.map_or(0, |data| data.len().to_u32());
        self.mechanism.nul_string_len() + 4 + data
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.mechanism);
        let Some(data) = self.data else {
            buf.put_i32(-1);
            return;
        };
        buf.put_u32(data.len().to_u32());
        buf.put_slice(data);
    }
}

/// Later SASL messages, the body is mechanism specific.
#[derive(Debug)]
pub struct SASLResponse<'a> {
    pub data: &'a [u8],
}

impl FrontendProtocol for SASLResponse<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> u32 {
        self.data.len().to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.data);
    }
}

/// Simple query, used to issue replication commands such as `START_REPLICATION`.
#[derive(Debug)]
pub struct Query<'a> {
    pub sql: &'a str,
}

impl FrontendProtocol for Query<'_> {
    const MSGTYPE: u8 = b'Q';

    fn size_hint(&self) -> u32 {
        self.sql.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.sql);
    }
}

/// Raw copy stream payload.
#[derive(Debug)]
pub struct CopyData<'a> {
    pub data: &'a [u8],
}

impl FrontendProtocol for CopyData<'_> {
    const MSGTYPE: u8 = b'd';

    fn size_hint(&self) -> u32 {
        self.data.len().to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.data);
    }
}

/// Client side end of the copy stream.
#[derive(Debug)]
pub struct CopyDone;

impl FrontendProtocol for CopyDone {
    const MSGTYPE: u8 = b'c';

    fn size_hint(&self) -> u32 { 0 }

    fn encode(self, _: impl BufMut) { }
}
