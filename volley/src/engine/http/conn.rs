use core::{
    future::Future,
    pin::Pin,
    task::{ready, Context, Poll},
    time::Duration,
};
use std::{
    io::{self, IoSlice},
    sync::Arc,
};

use pin_project_lite::pin_project;
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    time::{Instant, Sleep},
};

use crate::stat::TransferStat;

/// Idle deadline for one direction of a stream.
#[derive(Debug)]
struct Deadline {
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl Deadline {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: Box::pin(tokio::time::sleep(timeout)),
        }
    }

    #[inline]
    fn renew(&mut self) {
        let deadline = Instant::now() + self.timeout;
        self.sleep.as_mut().reset(deadline);
    }

    #[inline]
    fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.sleep.as_mut().poll(cx)
    }
}

fn timed_out(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{op} timed out"))
}

pin_project! {
    /// Byte stream decorator that accounts transferred bytes and enforces
    /// idle read/write timeouts.
    ///
    /// Each successful read or write is reported to the [`TransferStat`] and
    /// pushes the corresponding deadline forward by its timeout. An operation
    /// that stays pending past the deadline fails with
    /// [`io::ErrorKind::TimedOut`].
    #[derive(Debug)]
    pub struct InstrumentedStream<S, T> {
        #[pin]
        inner: S,
        read: Deadline,
        write: Deadline,
        stat: Arc<T>,
    }
}

impl<S, T> InstrumentedStream<S, T> {
    /// Wraps the given stream.
    ///
    /// Both deadlines are armed immediately.
    pub fn new(inner: S, read_timeout: Duration, write_timeout: Duration, stat: Arc<T>) -> Self {
        Self {
            inner,
            read: Deadline::new(read_timeout),
            write: Deadline::new(write_timeout),
            stat,
        }
    }
}

impl<S, T> AsyncRead for InstrumentedStream<S, T>
where
    S: AsyncRead,
    T: TransferStat,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.project();
        let filled = buf.filled().len();

        match this.inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.stat.on_recv((buf.filled().len() - filled) as u64);
                this.read.renew();
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => {
                ready!(this.read.poll_expired(cx));
                Poll::Ready(Err(timed_out("read")))
            }
        }
    }
}

impl<S, T> AsyncWrite for InstrumentedStream<S, T>
where
    S: AsyncWrite,
    T: TransferStat,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.project();

        match this.inner.poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.stat.on_send(n as u64);
                this.write.renew();
                // The response clock starts once the request is on the wire.
                this.read.renew();
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => {
                ready!(this.write.poll_expired(cx));
                Poll::Ready(Err(timed_out("write")))
            }
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();

        match this.inner.poll_write_vectored(cx, bufs) {
            Poll::Ready(Ok(n)) => {
                this.stat.on_send(n as u64);
                this.write.renew();
                // The response clock starts once the request is on the wire.
                this.read.renew();
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => {
                ready!(this.write.poll_expired(cx));
                Poll::Ready(Err(timed_out("write")))
            }
        }
    }

    #[inline]
    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    #[inline]
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    #[inline]
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}
