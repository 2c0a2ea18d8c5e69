use bytes::BytesMut;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio_util::sync::WaitForCancellationFuture;

use super::{ReadSource, WriteSink};
use crate::{Result, error::ErrorKind};

pin_project_lite::pin_project! {
    /// A future to read from [`ReadSource`] until the buffer holds `target` bytes.
    ///
    /// Resolves with [`ErrorKind::Cancelled`] if the token is cancelled first.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Fill<'a, S: ?Sized> {
        source: &'a mut S,
        buf: &'a mut BytesMut,
        target: usize,
        #[pin]
        cancelled: WaitForCancellationFuture<'a>,
    }
}

impl<'a, S: ?Sized> Fill<'a, S> {
    pub(crate) fn new(
        source: &'a mut S,
        buf: &'a mut BytesMut,
        target: usize,
        cancelled: WaitForCancellationFuture<'a>,
    ) -> Self {
        Self { source, buf, target, cancelled }
    }
}

impl<S> Future for Fill<'_, S>
where
    S: ReadSource + ?Sized,
{
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut me = self.project();

        while me.buf.len() < *me.target {
            if me.cancelled.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(ErrorKind::Cancelled.into()));
            }

            me.buf.reserve(*me.target - me.buf.len());

            let n = ready!(me.source.poll_fill(cx, me.buf))?;
            if n == 0 {
                return Poll::Ready(Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()));
            }
        }

        Poll::Ready(Ok(()))
    }
}

pin_project_lite::pin_project! {
    /// A future to write the whole buffer into [`WriteSink`].
    ///
    /// Resolves with [`ErrorKind::Cancelled`] if the token is cancelled first.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct FlushBuf<'a, S: ?Sized> {
        sink: &'a mut S,
        buf: &'a mut BytesMut,
        #[pin]
        cancelled: WaitForCancellationFuture<'a>,
    }
}

impl<'a, S: ?Sized> FlushBuf<'a, S> {
    pub(crate) fn new(
        sink: &'a mut S,
        buf: &'a mut BytesMut,
        cancelled: WaitForCancellationFuture<'a>,
    ) -> Self {
        Self { sink, buf, cancelled }
    }
}

impl<S> Future for FlushBuf<'_, S>
where
    S: WriteSink + ?Sized,
{
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.project();

        if me.cancelled.poll(cx).is_ready() {
            return Poll::Ready(Err(ErrorKind::Cancelled.into()));
        }

        ready!(me.sink.poll_write_buf(cx, me.buf))?;
        Poll::Ready(Ok(()))
    }
}
