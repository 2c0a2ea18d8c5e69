//! Tokio io adapter.
#![cfg(feature = "tokio")]
use bytes::{Buf, BufMut, BytesMut};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{ReadSource, WriteSink};

/// Adapter for tokio [`AsyncRead`] and [`AsyncWrite`].
#[derive(Debug)]
pub struct TokioIo<T>(pub T);

impl<T> TokioIo<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<R: AsyncRead + Unpin> ReadSource for TokioIo<R> {
    fn poll_fill(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<usize>> {
        if buf.capacity() == buf.len() {
            buf.reserve(super::DEFAULT_BUF_CAPACITY);
        }
        poll_read(&mut self.0, buf, cx)
    }
}

impl<W: AsyncWrite + Unpin> WriteSink for TokioIo<W> {
    fn poll_write_buf(&mut self, cx: &mut Context, buf: &mut BytesMut) -> Poll<io::Result<()>> {
        ready!(poll_write_all(&mut self.0, buf, cx))?;
        Pin::new(&mut self.0).poll_flush(cx)
    }
}

fn poll_read<R, B>(reader: &mut R, buf: &mut B, cx: &mut Context) -> Poll<io::Result<usize>>
where
    R: AsyncRead + Unpin + ?Sized,
    B: BufMut + ?Sized,
{
    if !buf.has_remaining_mut() {
        return Poll::Ready(Ok(0));
    }

    let n = {
        let dst = buf.chunk_mut();
        let dst = unsafe { dst.as_uninit_slice_mut() };
        let mut buf = ReadBuf::uninit(dst);
        let ptr = buf.filled().as_ptr();
        ready!(Pin::new(reader).poll_read(cx, &mut buf)?);

        // Ensure the pointer does not change from under us
        assert_eq!(ptr, buf.filled().as_ptr());
        buf.filled().len()
    };

    // Safety: This is guaranteed to be the number of initialized (and read)
    // bytes due to the invariants provided by `ReadBuf::filled`.
    unsafe {
        buf.advance_mut(n);
    }

    Poll::Ready(Ok(n))
}

fn poll_write_all<W, B>(writer: &mut W, buf: &mut B, cx: &mut Context) -> Poll<io::Result<()>>
where
    W: AsyncWrite + Unpin + ?Sized,
    B: Buf + ?Sized,
{
    use std::io::IoSlice;

    const MAX_VECTOR_ELEMENTS: usize = 64;

    while buf.has_remaining() {
        let n = if writer.is_write_vectored() {
            let mut slices = [IoSlice::new(&[]); MAX_VECTOR_ELEMENTS];
            let cnt = buf.chunks_vectored(&mut slices);
            ready!(Pin::new(&mut *writer).poll_write_vectored(cx, &slices[..cnt]))?
        } else {
            ready!(Pin::new(&mut *writer).poll_write(cx, buf.chunk())?)
        };
        buf.advance(n);
        if n == 0 {
            return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
        }
    }

    Poll::Ready(Ok(()))
}
