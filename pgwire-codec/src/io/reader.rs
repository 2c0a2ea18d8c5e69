use bytes::{Buf, Bytes, BytesMut};
use tokio_util::sync::CancellationToken;

use super::{DEFAULT_BUF_CAPACITY, Fill, ReadSource, block_on};
use crate::{
    Result,
    common::verbose,
    error::{Error, ErrorKind},
    postgres::{BackendProtocol, ProtocolError},
};

/// Buffered reader over a [`ReadSource`].
///
/// Primitive reads such as [`read_i32`][PgReader::read_i32] never suspend and panic when the
/// buffer does not hold enough bytes, callers must [`ensure`][PgReader::ensure] first.
///
/// After a cancelled or failed [`buffer`][PgReader::buffer], the reader no longer knows
/// where it is within the wire stream. Every later buffering attempt fails until
/// [`reset`][PgReader::reset] is called.
#[derive(Debug)]
pub struct PgReader<S> {
    source: S,
    buf: BytesMut,
    cancel: CancellationToken,
    consumed: u64,
    desync: Option<Desync>,
}

#[derive(Debug, Clone, Copy)]
enum Desync {
    Cancelled,
    Failed,
}

macro_rules! read_primitive {
    ($($name:ident -> $ty:ty = $get:ident;)*) => {$(
        #[doc = concat!("Read big endian `", stringify!($ty), "` from the buffer.")]
        ///
        /// # Panics
        ///
        /// Panics if the buffer does not hold enough bytes.
        pub fn $name(&mut self) -> $ty {
            self.consumed += size_of::<$ty>() as u64;
            self.buf.$get()
        }
    )*};
}

impl<S> PgReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_BUF_CAPACITY)
    }

    pub fn with_capacity(source: S, capacity: usize) -> Self {
        Self {
            source,
            buf: BytesMut::with_capacity(capacity),
            cancel: CancellationToken::new(),
            consumed: 0,
            desync: None,
        }
    }

    /// Observe `token` at every suspension point.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Number of bytes currently buffered.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes consumed since construction or last [`reset`][PgReader::reset].
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Returns `true` if reading `n` bytes requires buffering first.
    pub fn should_buffer(&self, n: usize) -> bool {
        self.buf.len() < n
    }

    /// Discard buffered bytes and forget previous failure.
    ///
    /// Only valid once the caller resynchronized the underlying source, for example by
    /// draining a connection to its next message boundary.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.consumed = 0;
        self.desync = None;
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    read_primitive! {
        read_u8 -> u8 = get_u8;
        read_i8 -> i8 = get_i8;
        read_u16 -> u16 = get_u16;
        read_i16 -> i16 = get_i16;
        read_u32 -> u32 = get_u32;
        read_i32 -> i32 = get_i32;
        read_u64 -> u64 = get_u64;
        read_i64 -> i64 = get_i64;
        read_f64 -> f64 = get_f64;
    }

    /// Split `n` bytes from the buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not hold enough bytes.
    pub fn read_bytes(&mut self, n: usize) -> Bytes {
        self.consumed += n as u64;
        self.buf.split_to(n).freeze()
    }

    /// Peek buffered bytes without consuming them.
    pub fn peek(&self) -> &[u8] {
        &self.buf
    }
}

impl<S: ReadSource> PgReader<S> {
    /// Read from the source until at least `n` bytes are buffered.
    ///
    /// This is a suspension point, cancellation is observed here.
    pub async fn buffer(&mut self, n: usize) -> Result<()> {
        match self.desync {
            Some(Desync::Cancelled) => return Err(ErrorKind::Cancelled.into()),
            Some(Desync::Failed) => return Err(Error::internal("reader used after failed read")),
            None => {}
        }

        verbose!(needed = n, buffered = self.buf.len(), "buffering");

        let Self { source, buf, cancel, desync, .. } = self;
        let result = Fill::new(source, buf, n, cancel.cancelled()).await;

        if let Err(err) = &result {
            *desync = Some(match err.kind() {
                ErrorKind::Cancelled => Desync::Cancelled,
                _ => Desync::Failed,
            });
        }

        result
    }

    /// Buffer only if less than `n` bytes are available.
    pub async fn ensure(&mut self, n: usize) -> Result<()> {
        if self.should_buffer(n) {
            self.buffer(n).await?;
        }
        Ok(())
    }

    /// Blocking version of [`ensure`][PgReader::ensure].
    pub fn ensure_blocking(&mut self, n: usize) -> Result<()> {
        block_on(self.ensure(n))
    }

    /// Buffer and split `n` bytes.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        self.ensure(n).await?;
        Ok(self.read_bytes(n))
    }

    /// Read nul terminated utf8 string, buffering as needed.
    pub async fn read_nul_string(&mut self) -> Result<String> {
        let mut scanned = 0;
        loop {
            if let Some(end) = memchr::memchr(b'\0', &self.buf[scanned..]) {
                let end = scanned + end;
                let bytes = self.buf.split_to(end);
                self.buf.advance(1);
                self.consumed += end as u64 + 1;
                return Ok(String::from_utf8(bytes.into())?);
            }
            scanned = self.buf.len();
            self.buffer(scanned + 1).await?;
        }
    }

    /// Discard `n` bytes, buffering as needed without holding them all at once.
    pub async fn skip(&mut self, mut n: usize) -> Result<()> {
        loop {
            let available = n.min(self.buf.len());
            self.buf.advance(available);
            self.consumed += available as u64;
            n -= available;

            if n == 0 {
                return Ok(());
            }

            self.buffer(n.min(DEFAULT_BUF_CAPACITY)).await?;
        }
    }

    /// Read message header, returns message type and body length.
    pub async fn read_header(&mut self) -> Result<(u8, usize)> {
        self.ensure(5).await?;
        let msgtype = self.read_u8();
        let len = self.read_i32();
        if len < 4 {
            return Err(ProtocolError::malformed(format!("message length {len} is less than 4")).into());
        }
        Ok((msgtype, len as usize - 4))
    }

    /// Read a whole backend message.
    pub async fn recv<B: BackendProtocol>(&mut self) -> Result<B> {
        let (msgtype, len) = self.read_header().await?;
        let body = self.read_exact(len).await?;
        verbose!(msgtype = %(msgtype as char), len, "recv");
        Ok(B::decode(msgtype, body)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::{Blocking, Chunked};

    #[test]
    fn primitives_across_chunks() {
        let mut data = vec![];
        data.extend_from_slice(&420i32.to_be_bytes());
        data.extend_from_slice(&(-7i64).to_be_bytes());
        data.extend_from_slice(b"hello\0world\0");
        data.extend_from_slice(&1.5f64.to_be_bytes());

        let mut r = PgReader::new(Chunked::new(data, 3));
        block_on(async {
            r.ensure(12).await.unwrap();
            assert_eq!(r.read_i32(), 420);
            assert_eq!(r.read_i64(), -7);
            assert_eq!(r.read_nul_string().await.unwrap(), "hello");
            assert_eq!(r.read_nul_string().await.unwrap(), "world");
            r.ensure(8).await.unwrap();
            assert_eq!(r.read_f64(), 1.5);
        });
        assert_eq!(r.position(), 4 + 8 + 12 + 8);
    }

    #[test]
    fn eof_is_fatal() {
        let mut r = PgReader::new(&b"\x00\x01"[..]);
        let err = r.ensure_blocking(4).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
        assert!(err.is_fatal());
        assert!(matches!(r.ensure_blocking(1).unwrap_err().kind(), ErrorKind::Internal(_)));

        r.reset();
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn skip_large() {
        let data = vec![7u8; DEFAULT_BUF_CAPACITY * 3 + 5];
        let mut r = PgReader::new(Blocking(std::io::Cursor::new(data)));
        block_on(r.skip(DEFAULT_BUF_CAPACITY * 3 + 1)).unwrap();
        block_on(r.ensure(4)).unwrap();
        assert_eq!(r.read_u32(), 0x07070707);
    }

    #[test]
    fn cancelled_reader() {
        let token = CancellationToken::new();
        let mut r = PgReader::new(Chunked::new(vec![0u8; 16], 1)).with_cancellation(token.clone());
        token.cancel();
        let err = r.ensure_blocking(8).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cancelled));
        assert!(matches!(r.ensure_blocking(8).unwrap_err().kind(), ErrorKind::Cancelled));
    }

    #[test]
    fn recv_message() {
        let mut r = PgReader::new(&b"Z\0\0\0\x05I"[..]);
        let msg = block_on(r.recv::<crate::postgres::BackendMessage>()).unwrap();
        assert!(matches!(msg, crate::postgres::BackendMessage::ReadyForQuery(_)));
    }

    #[test]
    fn tokio_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let (mut tx, rx) = tokio::io::duplex(4);
            let task = tokio::spawn(async move {
                use tokio::io::AsyncWriteExt;
                tx.write_all(b"abc\0tail").await.unwrap();
            });
            let mut r = PgReader::new(crate::io::TokioIo(rx));
            assert_eq!(r.read_nul_string().await.unwrap(), "abc");
            assert_eq!(&r.read_exact(4).await.unwrap()[..], b"tail");
            task.await.unwrap();
        });
    }
}
