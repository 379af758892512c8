//! Re-segments a byte stream of unknown length into fixed-size chunks.
//!
//! The stream is pull based: nothing is read from the source until the
//! consumer polls. [`ChunkedBufferStream::pause`] makes the stream stop
//! polling its source entirely until [`ChunkedBufferStream::resume`] is
//! called, so at most about two chunks of the source sit in memory.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Minimum multipart part size accepted by S3 (5 MiB). Also the direct
/// upload threshold.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// One emitted segment of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the emitted sequence, starting at 0
    pub index: u64,
    pub data: Bytes,
    /// Last chunk of the stream
    pub terminal: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub struct ChunkedBufferStream<S> {
    source: S,
    chunk_size: usize,
    buffer: BytesMut,
    /// Full chunk held back until we know whether more data follows
    pending: Option<Bytes>,
    emitted: u64,
    paused: bool,
    waker: Option<Waker>,
    done: bool,
}

impl<S> ChunkedBufferStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    /// Chunk size must be > 0; a zero size is raised to 1.
    pub fn new(source: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            source,
            chunk_size,
            buffer: BytesMut::with_capacity(chunk_size.min(DEFAULT_CHUNK_SIZE)),
            pending: None,
            emitted: 0,
            paused: false,
            waker: None,
            done: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks emitted so far
    pub fn number_of_chunks(&self) -> u64 {
        self.emitted
    }

    /// Stop reading from the source until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    fn emit(&mut self, data: Bytes, terminal: bool) -> Chunk {
        let chunk = Chunk {
            index: self.emitted,
            data,
            terminal,
        };
        self.emitted += 1;
        if terminal {
            self.done = true;
        }
        chunk
    }

    fn fail(&mut self, err: io::Error) -> Poll<Option<io::Result<Chunk>>> {
        self.buffer.clear();
        self.pending = None;
        self.done = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl<S> Stream for ChunkedBufferStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.paused {
            this.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        loop {
            // A full chunk is only released once at least one more byte (or
            // end of stream) is seen, so the last chunk is always marked.
            if this.pending.is_some() && !this.buffer.is_empty() {
                if let Some(data) = this.pending.take() {
                    return Poll::Ready(Some(Ok(this.emit(data, false))));
                }
            }
            if this.pending.is_none() && this.buffer.len() >= this.chunk_size {
                let data = this.buffer.split_to(this.chunk_size).freeze();
                this.pending = Some(data);
                continue;
            }

            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(err))) => return this.fail(err),
                Poll::Ready(None) => {
                    let chunk = match this.pending.take() {
                        Some(data) => this.emit(data, true),
                        None => {
                            let data = this.buffer.split().freeze();
                            this.emit(data, true)
                        }
                    };
                    return Poll::Ready(Some(Ok(chunk)));
                }
            }
        }
    }
}
