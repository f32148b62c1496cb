//! Newline-delimited JSON framing
//!
//! Each message is one JSON document followed by `\n`. Blank lines between
//! messages are ignored on read.

use crate::error::{Result, TransportError};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Reads newline-delimited JSON messages
#[derive(Debug)]
pub struct JsonLineReader<R> {
    reader: BufReader<R>,
    // Partial line survives a cancelled `recv`.
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> JsonLineReader<R> {
    /// Wrap an async reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
        }
    }

    /// Receive the next message
    ///
    /// Returns `Ok(None)` at end-of-stream. A trailing fragment without a
    /// newline is still parsed when the stream ends.
    ///
    /// Cancel safe: dropping the future keeps any partially read line for the
    /// next call.
    pub async fn recv(&mut self) -> Result<Option<Value>> {
        loop {
            let n = self.reader.read_until(b'\n', &mut self.line).await?;
            let at_eof = n == 0 || !self.line.ends_with(b"\n");

            let line = std::mem::take(&mut self.line);
            let text = std::str::from_utf8(&line)
                .map_err(|e| TransportError::Serialization(e.to_string()))?
                .trim();

            if text.is_empty() {
                if at_eof {
                    return Ok(None);
                }
                continue;
            }

            let message = serde_json::from_str(text)?;
            return Ok(Some(message));
        }
    }
}

/// Writes newline-delimited JSON messages
#[derive(Debug)]
pub struct JsonLineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> JsonLineWriter<W> {
    /// Wrap an async writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `message` and write it as one line
    pub async fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let mut json = serde_json::to_vec(message)?;
        json.push(b'\n');

        self.writer.write_all(&json).await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Shut down the underlying writer
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Pipe;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_send_then_recv() {
        let pipe = Pipe::new();
        let mut writer = JsonLineWriter::new(pipe.writer());
        let mut reader = JsonLineReader::new(pipe.reader());

        writer.send(&json!({"id": 1, "method": "ping"})).await.unwrap();
        writer.send(&json!({"id": 2, "method": "ping"})).await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(reader.recv().await.unwrap().unwrap()["id"], 1);
        assert_eq!(reader.recv().await.unwrap().unwrap()["id"], 2);
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let pipe = Pipe::new();
        let mut raw = pipe.writer();
        raw.write_all(b"\n  \n{\"a\":true}\n\n").await.unwrap();
        raw.complete();

        let mut reader = JsonLineReader::new(pipe.reader());
        assert_eq!(reader.recv().await.unwrap(), Some(json!({"a": true})));
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trailing_fragment_parsed_at_eof() {
        let pipe = Pipe::new();
        let mut raw = pipe.writer();
        raw.write_all(b"{\"last\":1}").await.unwrap();
        raw.complete();

        let mut reader = JsonLineReader::new(pipe.reader());
        assert_eq!(reader.recv().await.unwrap(), Some(json!({"last": 1})));
    }

    #[tokio::test]
    async fn test_malformed_line_is_serialization_error() {
        let pipe = Pipe::new();
        let mut raw = pipe.writer();
        raw.write_all(b"{not json}\n").await.unwrap();

        let mut reader = JsonLineReader::new(pipe.reader());
        let err = reader.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::Serialization(_)));
    }
}
