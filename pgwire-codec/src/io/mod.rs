//! Buffered reader and writer every codec is written against.
//!
//! A codec never touches a socket. It asks [`PgReader::should_buffer`] before each read that
//! may cross the buffer boundary and awaits [`PgReader::buffer`] when needed, and mirrors that
//! with [`PgWriter::should_flush`] and [`PgWriter::flush`] when writing. These are the only
//! suspension points, and the only places cancellation is observed.
//!
//! The same future drives both calling conventions. Async callers `.await` it, blocking
//! callers hand it to [`block_on`], which never parks when the source is a [`Blocking`] io.
use bytes::{Buf, BytesMut};
use std::{
    io,
    task::{Context, Poll},
};

mod poll;
mod fill;
mod reader;
mod writer;

pub use fill::{Fill, FlushBuf};
pub use reader::PgReader;
pub use writer::PgWriter;
#[cfg(feature = "tokio")]
pub use poll::TokioIo;

pub(crate) const DEFAULT_BUF_CAPACITY: usize = 8 * 1024;

/// Drive a codec future to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    futures_executor::block_on(future)
}

/// A source of bytes for [`PgReader`].
pub trait ReadSource: Unpin {
    /// Poll to read more bytes, appending them to `buf`.
    ///
    /// Returns `0` when the source reached end of stream.
    fn poll_fill(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>>;
}

/// A destination of bytes for [`PgWriter`].
pub trait WriteSink: Unpin {
    /// Poll to write the whole `buf` and flush the underlying io.
    ///
    /// Written bytes are consumed from `buf`.
    fn poll_write_buf(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<()>>;
}

impl<S> ReadSource for &mut S where S: ReadSource {
    fn poll_fill(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>> {
        S::poll_fill(self, cx, buf)
    }
}

impl<S> WriteSink for &mut S where S: WriteSink {
    fn poll_write_buf(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<()>> {
        S::poll_write_buf(self, cx, buf)
    }
}

impl ReadSource for bytes::Bytes {
    fn poll_fill(&mut self, _: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>> {
        let n = self.len();
        buf.extend_from_slice(self);
        self.advance(n);
        Poll::Ready(Ok(n))
    }
}

impl ReadSource for &[u8] {
    fn poll_fill(&mut self, _: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>> {
        let n = self.len();
        buf.extend_from_slice(self);
        *self = &[];
        Poll::Ready(Ok(n))
    }
}

impl WriteSink for Vec<u8> {
    fn poll_write_buf(&mut self, _: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<()>> {
        self.extend_from_slice(buf);
        buf.clear();
        Poll::Ready(Ok(()))
    }
}

impl WriteSink for BytesMut {
    fn poll_write_buf(&mut self, _: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<()>> {
        self.extend_from_slice(buf);
        buf.clear();
        Poll::Ready(Ok(()))
    }
}

/// Adapter for blocking [`std::io::Read`] and [`std::io::Write`].
///
/// Polling never returns [`Poll::Pending`], the calling thread blocks inside the io instead.
#[derive(Debug)]
pub struct Blocking<T>(pub T);

impl<R: io::Read + Unpin> ReadSource for Blocking<R> {
    fn poll_fill(&mut self, _: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>> {
        const CHUNK: usize = 4 * 1024;

        let offset = buf.len();
        buf.resize(offset + CHUNK, 0);
        let result = loop {
            match self.0.read(&mut buf[offset..]) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                result => break result,
            }
        };
        buf.truncate(offset + *result.as_ref().unwrap_or(&0));
        Poll::Ready(result)
    }
}

impl<W: io::Write + Unpin> WriteSink for Blocking<W> {
    fn poll_write_buf(&mut self, _: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<()>> {
        self.0.write_all(buf)?;
        buf.clear();
        Poll::Ready(self.0.flush())
    }
}

/// In memory source which hands out at most `chunk` bytes per poll.
///
/// Every other poll returns [`Poll::Pending`] after waking the task, so codecs reading from it
/// go through the suspension path the same way they would on a slow socket.
#[derive(Debug)]
pub struct Chunked {
    data: bytes::Bytes,
    chunk: usize,
    pending: bool,
}

impl Chunked {
    pub fn new(data: impl Into<bytes::Bytes>, chunk: usize) -> Self {
        Self { data: data.into(), chunk: chunk.max(1), pending: true }
    }
}

impl ReadSource for Chunked {
    fn poll_fill(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>> {
        let next = !self.pending;
        if std::mem::replace(&mut self.pending, next) {
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        let n = self.chunk.min(self.data.len());
        buf.extend_from_slice(&self.data.split_to(n));
        Poll::Ready(Ok(n))
    }
}
