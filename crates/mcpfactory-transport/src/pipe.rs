//! Unidirectional in-memory byte pipe
//!
//! A [`Pipe`] is a FIFO byte buffer with one writing half and one reading
//! half. Both halves can be completed independently:
//!
//! - completing the **writer** lets the reader drain what is buffered and
//!   then observe end-of-stream;
//! - completing the **reader** discards buffered bytes, and later writes are
//!   accepted and dropped.
//!
//! Neither completion ever surfaces as an I/O error on the other half, so a
//! pipe can be torn down while reads and writes are still in flight.
//!
//! The buffer is unbounded, but a writer is suspended while the unread
//! backlog is at or above [`PipeOptions::pause_writer_threshold`] and resumed
//! once the reader drains it to [`PipeOptions::resume_writer_threshold`].

use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Default backlog at which a writer is suspended (64 KiB)
pub const DEFAULT_PAUSE_WRITER_THRESHOLD: usize = 64 * 1024;

/// Default backlog at which a suspended writer resumes (32 KiB)
pub const DEFAULT_RESUME_WRITER_THRESHOLD: usize = 32 * 1024;

/// Backpressure configuration for a [`Pipe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeOptions {
    /// Unread bytes at which writes start to wait
    pub pause_writer_threshold: usize,

    /// Unread bytes at which waiting writes are released
    pub resume_writer_threshold: usize,
}

impl PipeOptions {
    /// Create options with explicit thresholds
    ///
    /// The resume threshold is clamped to the pause threshold, and a pause
    /// threshold of zero is raised to one so a writer can always make progress.
    pub fn new(pause_writer_threshold: usize, resume_writer_threshold: usize) -> Self {
        let pause = pause_writer_threshold.max(1);
        Self {
            pause_writer_threshold: pause,
            resume_writer_threshold: resume_writer_threshold.min(pause),
        }
    }
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self::new(
            DEFAULT_PAUSE_WRITER_THRESHOLD,
            DEFAULT_RESUME_WRITER_THRESHOLD,
        )
    }
}

#[derive(Debug, Default)]
struct PipeState {
    buffer: BytesMut,
    writer_completed: bool,
    reader_completed: bool,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl PipeState {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<PipeState>,
    options: PipeOptions,
}

impl Shared {
    // No code path panics while holding the lock, but a poisoned pipe is
    // still structurally valid, so recover the guard instead of failing.
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete_writer(&self) {
        let mut state = self.lock();
        state.writer_completed = true;
        state.wake_reader();
        state.wake_writer();
    }

    fn complete_reader(&self) {
        let mut state = self.lock();
        state.reader_completed = true;
        state.buffer.clear();
        state.wake_writer();
        state.wake_reader();
    }
}

/// A unidirectional in-memory byte stream
///
/// Cloning a `Pipe` yields another handle to the same buffer.
#[derive(Debug, Clone)]
pub struct Pipe {
    shared: Arc<Shared>,
}

impl Pipe {
    /// Create a pipe with default thresholds
    pub fn new() -> Self {
        Self::with_options(PipeOptions::default())
    }

    /// Create a pipe with explicit thresholds
    pub fn with_options(options: PipeOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PipeState::default()),
                options,
            }),
        }
    }

    /// Get a handle to the reading half
    ///
    /// A pipe is meant to have a single consumer; handles share one cursor.
    pub fn reader(&self) -> PipeReader {
        PipeReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Get a handle to the writing half
    pub fn writer(&self) -> PipeWriter {
        PipeWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Complete both halves
    ///
    /// Idempotent. Buffered bytes are discarded.
    pub fn complete(&self) {
        self.shared.complete_writer();
        self.shared.complete_reader();
    }

    /// Whether both halves have been completed
    pub fn is_completed(&self) -> bool {
        let state = self.shared.lock();
        state.writer_completed && state.reader_completed
    }

    /// Number of bytes written but not yet read
    pub fn buffered(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    /// Thresholds this pipe was created with
    pub fn options(&self) -> PipeOptions {
        self.shared.options
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

/// Reading half of a [`Pipe`]
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    /// Stop reading
    ///
    /// Buffered and future bytes are discarded. Idempotent.
    pub fn complete(&self) {
        self.shared.complete_reader();
    }

    /// Whether this half has been completed
    pub fn is_completed(&self) -> bool {
        self.shared.lock().reader_completed
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();

        if state.reader_completed {
            return Poll::Ready(Ok(()));
        }

        if !state.buffer.is_empty() {
            let n = buf.remaining().min(state.buffer.len());
            let chunk = state.buffer.split_to(n);
            buf.put_slice(&chunk);

            if state.buffer.len() <= shared.options.resume_writer_threshold {
                state.wake_writer();
            }
            return Poll::Ready(Ok(()));
        }

        if state.writer_completed {
            return Poll::Ready(Ok(()));
        }

        state.read_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Writing half of a [`Pipe`]
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Stop writing
    ///
    /// The reader drains what is buffered, then sees end-of-stream. Idempotent.
    pub fn complete(&self) {
        self.shared.complete_writer();
    }

    /// Whether this half has been completed
    pub fn is_completed(&self) -> bool {
        self.shared.lock().writer_completed
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();

        // Completed pipes swallow writes.
        if state.writer_completed || state.reader_completed {
            return Poll::Ready(Ok(data.len()));
        }

        if state.buffer.len() >= shared.options.pause_writer_threshold {
            state.write_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        state.buffer.extend_from_slice(data);
        state.wake_reader();
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shared.complete_writer();
        Poll::Ready(Ok(()))
    }
}
