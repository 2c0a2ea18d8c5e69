use bytes::{BufMut, BytesMut};
use tokio_util::sync::CancellationToken;

use super::{DEFAULT_BUF_CAPACITY, FlushBuf, WriteSink, block_on};
use crate::{
    Result,
    common::verbose,
    error::Error,
    postgres::{FrontendProtocol, frontend},
};

/// Buffered writer over a [`WriteSink`].
///
/// Primitive writes never suspend, the buffer grows instead. Codecs keep the buffer bounded
/// by calling [`ensure`][PgWriter::ensure] which flushes once the pending bytes would exceed
/// the configured capacity.
#[derive(Debug)]
pub struct PgWriter<S> {
    sink: S,
    buf: BytesMut,
    capacity: usize,
    cancel: CancellationToken,
    written: u64,
    desync: bool,
}

macro_rules! write_primitive {
    ($($name:ident($ty:ty) = $put:ident;)*) => {$(
        #[doc = concat!("Write big endian `", stringify!($ty), "` into the buffer.")]
        pub fn $name(&mut self, value: $ty) {
            self.written += size_of::<$ty>() as u64;
            self.buf.$put(value);
        }
    )*};
}

impl<S> PgWriter<S> {
    pub fn new(sink: S) -> Self {
        Self::with_capacity(sink, DEFAULT_BUF_CAPACITY)
    }

    pub fn with_capacity(sink: S, capacity: usize) -> Self {
        Self {
            sink,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            cancel: CancellationToken::new(),
            written: 0,
            desync: false,
        }
    }

    /// Observe `token` at every suspension point.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Total bytes written into the buffer.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Bytes waiting to be flushed.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Returns `true` if writing `n` more bytes would exceed buffer capacity.
    pub fn should_flush(&self, n: usize) -> bool {
        !self.buf.is_empty() && self.buf.len() + n > self.capacity
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    write_primitive! {
        write_u8(u8) = put_u8;
        write_i8(i8) = put_i8;
        write_u16(u16) = put_u16;
        write_i16(i16) = put_i16;
        write_u32(u32) = put_u32;
        write_i32(i32) = put_i32;
        write_u64(u64) = put_u64;
        write_i64(i64) = put_i64;
        write_f64(f64) = put_f64;
    }

    /// Write bytes into the buffer regardless of capacity.
    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.written += bytes.len() as u64;
        self.buf.put_slice(bytes);
    }

    /// Encode a frontend message into the buffer.
    pub fn write_message<F: FrontendProtocol>(&mut self, msg: F) {
        let before = self.buf.len();
        frontend::write(msg, &mut self.buf);
        self.written += (self.buf.len() - before) as u64;
    }
}

impl<S: WriteSink> PgWriter<S> {
    /// Write all buffered bytes into the sink.
    ///
    /// This is a suspension point, cancellation is observed here.
    pub async fn flush(&mut self) -> Result<()> {
        if self.desync {
            return Err(Error::internal("writer used after failed flush"));
        }

        verbose!(pending = self.buf.len(), "flushing");

        let Self { sink, buf, cancel, desync, .. } = self;
        let result = FlushBuf::new(sink, buf, cancel.cancelled()).await;
        if result.is_err() {
            *desync = true;
        }
        result
    }

    /// Blocking version of [`flush`][PgWriter::flush].
    pub fn flush_blocking(&mut self) -> Result<()> {
        block_on(self.flush())
    }

    /// Flush only if `n` more bytes would exceed buffer capacity.
    pub async fn ensure(&mut self, n: usize) -> Result<()> {
        if self.should_flush(n) {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write bytes in pieces no larger than buffer capacity, flushing in between.
    pub async fn write_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            self.ensure(bytes.len().min(self.capacity)).await?;
            let room = self.capacity.saturating_sub(self.buf.len()).max(1);
            let (head, tail) = bytes.split_at(room.min(bytes.len()));
            self.write_slice(head);
            bytes = tail;
        }
        Ok(())
    }

    /// Write string followed by nul.
    pub async fn write_nul_string(&mut self, string: &str) -> Result<()> {
        self.write_all(string.as_bytes()).await?;
        self.ensure(1).await?;
        self.write_u8(0);
        Ok(())
    }

    /// Encode a frontend message and flush.
    pub async fn send<F: FrontendProtocol>(&mut self, msg: F) -> Result<()> {
        self.write_message(msg);
        self.flush().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::ErrorKind, io::Blocking};

    #[test]
    fn bounded_buffer() {
        let mut w = PgWriter::with_capacity(Vec::new(), 8);
        block_on(async {
            w.write_i32(1);
            w.ensure(8).await.unwrap();
            assert!(w.pending().is_empty());
            w.write_all(&[9u8; 20]).await.unwrap();
            assert!(w.pending().len() <= 8);
            w.write_nul_string("ab").await.unwrap();
            w.flush().await.unwrap();
        });
        let out = w.into_inner();
        assert_eq!(out.len(), 4 + 20 + 3);
        assert_eq!(&out[..4], &[0, 0, 0, 1]);
        assert_eq!(&out[24..], b"ab\0");
    }

    #[test]
    fn blocking_sink() {
        let mut w = PgWriter::new(Blocking(Vec::new()));
        w.write_message(frontend::CopyDone);
        w.flush_blocking().unwrap();
        assert_eq!(w.written(), 5);
        assert_eq!(&w.into_inner().0[..], b"c\0\0\0\x04");
    }

    #[test]
    fn cancelled_flush() {
        let token = CancellationToken::new();
        let mut w = PgWriter::new(Vec::new()).with_cancellation(token.clone());
        w.write_u8(1);
        token.cancel();
        assert!(matches!(w.flush_blocking().unwrap_err().kind(), ErrorKind::Cancelled));
        assert!(w.flush_blocking().unwrap_err().is_fatal());
    }
}
