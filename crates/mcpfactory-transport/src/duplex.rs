//! Two pipes wired as a bidirectional connection
//!
//! [`DuplexTransport`] owns a client→server pipe and a server→client pipe.
//! The client endpoint writes into the first and reads from the second; the
//! server endpoint does the opposite. Closing the transport completes every
//! writer before any reader so in-flight bytes are never surfaced as errors.

use crate::pipe::{Pipe, PipeOptions, PipeReader, PipeWriter};
use std::io;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

/// Marker for the client end of a [`DuplexTransport`]
#[derive(Debug, Clone, Copy)]
pub enum ClientSide {}

/// Marker for the server end of a [`DuplexTransport`]
#[derive(Debug, Clone, Copy)]
pub enum ServerSide {}

/// One end of a [`DuplexTransport`]
///
/// Reads and writes are delegated to the underlying pipes.
#[derive(Debug)]
pub struct Endpoint<Side> {
    reader: PipeReader,
    writer: PipeWriter,
    _side: PhantomData<fn() -> Side>,
}

/// The end handed to the MCP client
pub type ClientEndpoint = Endpoint<ClientSide>;

/// The end handed to the MCP server
pub type ServerEndpoint = Endpoint<ServerSide>;

impl<Side> Endpoint<Side> {
    fn new(reader: PipeReader, writer: PipeWriter) -> Self {
        Self {
            reader,
            writer,
            _side: PhantomData,
        }
    }

    /// Split into independently owned read and write halves
    pub fn into_split(self) -> (PipeReader, PipeWriter) {
        (self.reader, self.writer)
    }
}

impl<Side> AsyncRead for Endpoint<Side> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl<Side> AsyncWrite for Endpoint<Side> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

/// A pair of in-memory pipes connecting one client to one server
///
/// Cheap to clone; clones share the same pipes and close flag.
#[derive(Debug, Clone)]
pub struct DuplexTransport {
    client_to_server: Pipe,
    server_to_client: Pipe,
    closed: Arc<AtomicBool>,
}

impl DuplexTransport {
    /// Open a transport with default pipe thresholds
    pub fn open() -> Self {
        Self::with_options(PipeOptions::default())
    }

    /// Open a transport whose pipes use `options`
    pub fn with_options(options: PipeOptions) -> Self {
        debug!(
            pause = options.pause_writer_threshold,
            resume = options.resume_writer_threshold,
            "Opening duplex transport"
        );
        Self {
            client_to_server: Pipe::with_options(options),
            server_to_client: Pipe::with_options(options),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pipe carrying client requests to the server
    pub fn client_to_server(&self) -> &Pipe {
        &self.client_to_server
    }

    /// Pipe carrying server responses to the client
    pub fn server_to_client(&self) -> &Pipe {
        &self.server_to_client
    }

    /// Endpoint for the client: writes requests, reads responses
    pub fn client_endpoint(&self) -> ClientEndpoint {
        Endpoint::new(
            self.server_to_client.reader(),
            self.client_to_server.writer(),
        )
    }

    /// Endpoint for the server: reads requests, writes responses
    pub fn server_endpoint(&self) -> ServerEndpoint {
        Endpoint::new(
            self.client_to_server.reader(),
            self.server_to_client.writer(),
        )
    }

    /// Complete both pipes
    ///
    /// Writers are completed first, then readers. Only the first call does
    /// any work.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("Closing duplex transport");
        self.client_to_server.writer().complete();
        self.server_to_client.writer().complete();
        self.client_to_server.reader().complete();
        self.server_to_client.reader().complete();
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for DuplexTransport {
    fn default() -> Self {
        Self::open()
    }
}
