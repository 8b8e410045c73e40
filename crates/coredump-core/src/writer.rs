//! Chunked HTTP response writer.
//!
//! The transport itself is abstracted behind [`ChunkSink`]: on ESP32 it is
//! the IDF HTTP server's chunked response, on Linux a channel feeding an
//! axum body. [`ChunkedWriter`] sits on top and enforces the ordering rules.

use crate::error::TransportError;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Status line and headers of a chunked response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub content_type: String,
    /// Suggested download filename, sent as `Content-Disposition`.
    pub filename: Option<String>,
}

impl ResponseHead {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            filename: None,
        }
    }

    pub fn html() -> Self {
        Self::new(CONTENT_TYPE_HTML)
    }

    /// A download response with an attachment filename hint.
    pub fn attachment(content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::new(content_type)
        }
    }

    /// Value of the `Content-Disposition` header, if any.
    pub fn content_disposition(&self) -> Option<String> {
        self.filename
            .as_ref()
            .map(|name| format!("attachment;filename={}", name))
    }

    /// Headers to send, in order.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Content-Type", self.content_type.clone())];
        if let Some(disposition) = self.content_disposition() {
            headers.push(("Content-Disposition", disposition));
        }
        headers
    }
}

/// An HTTP chunked-response primitive: open with headers, write chunks, close.
pub trait ChunkSink {
    /// Send the status line and headers.
    fn open(&mut self, head: &ResponseHead) -> Result<(), TransportError>;

    /// Send one non-empty chunk.
    fn send_chunk(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Send the terminating zero-length chunk.
    ///
    /// A transport may defer the terminator until the handler returns.
    fn finish(&mut self) -> Result<(), TransportError>;

    /// Block until the finished response, terminator included, has been
    /// handed to the connection.
    ///
    /// Only needed when the handler will not return normally.
    fn commit(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn open(&mut self, head: &ResponseHead) -> Result<(), TransportError> {
        (**self).open(head)
    }

    fn send_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send_chunk(data)
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        (**self).finish()
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        (**self).commit()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Ready,
    Open,
    Finished,
    Poisoned,
}

/// Writes blocks to a [`ChunkSink`] in order, one chunk per block.
///
/// Empty blocks are skipped so a data chunk can never be mistaken for the
/// terminator, and `finish` sends the terminator exactly once. After any
/// sink error the writer is poisoned and refuses further writes.
pub struct ChunkedWriter<S: ChunkSink> {
    sink: S,
    state: WriterState,
    chunks: usize,
    bytes: u64,
}

impl<S: ChunkSink> ChunkedWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: WriterState::Ready,
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn open(&mut self, head: &ResponseHead) -> Result<(), TransportError> {
        self.expect(WriterState::Ready)?;
        let result = self.sink.open(head);
        self.settle(result, WriterState::Open)
    }

    pub fn write_block(&mut self, block: &[u8]) -> Result<(), TransportError> {
        self.expect(WriterState::Open)?;
        if block.is_empty() {
            return Ok(());
        }
        let result = self.sink.send_chunk(block);
        self.settle(result, WriterState::Open)?;
        self.chunks += 1;
        self.bytes += block.len() as u64;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), TransportError> {
        self.expect(WriterState::Open)?;
        let result = self.sink.finish();
        self.settle(result, WriterState::Finished)
    }

    /// Data chunks written, excluding the terminator.
    pub fn chunks_written(&self) -> usize {
        self.chunks
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn is_finished(&self) -> bool {
        self.state == WriterState::Finished
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    fn expect(&self, state: WriterState) -> Result<(), TransportError> {
        if self.state == state {
            Ok(())
        } else {
            Err(TransportError::Unusable)
        }
    }

    fn settle(
        &mut self,
        result: Result<(), TransportError>,
        next: WriterState,
    ) -> Result<(), TransportError> {
        self.state = if result.is_ok() {
            next
        } else {
            WriterState::Poisoned
        };
        result
    }
}

// ============================================================================
// Recording sink
// ============================================================================

/// A sink that records every frame, for tests and diagnostics.
///
/// `frames` holds data chunks in order; the terminator is recorded as an
/// empty frame. The sink can be told to fail once a number of data chunks
/// have been accepted, like a client hanging up mid-transfer.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub head: Option<ResponseHead>,
    pub frames: Vec<Vec<u8>>,
    /// Number of `send_chunk` calls, including rejected ones.
    pub attempts: usize,
    /// Number of frames, terminator included, present at the last `commit`.
    pub committed: Option<usize>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every chunk after the first `chunks` have been accepted.
    pub fn failing_after(chunks: usize) -> Self {
        Self {
            fail_after: Some(chunks),
            ..Self::default()
        }
    }

    /// Data chunks, excluding the terminator.
    pub fn data_chunks(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.frames.iter().filter(|frame| !frame.is_empty())
    }

    /// Number of terminators sent.
    pub fn terminators(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_empty()).count()
    }

    /// Concatenated body bytes.
    pub fn body(&self) -> Vec<u8> {
        self.frames.concat()
    }

    fn accepted(&self) -> usize {
        self.data_chunks().count()
    }
}

impl ChunkSink for RecordingSink {
    fn open(&mut self, head: &ResponseHead) -> Result<(), TransportError> {
        self.head = Some(head.clone());
        Ok(())
    }

    fn send_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.attempts += 1;
        if self.fail_after.is_some_and(|limit| self.accepted() >= limit) {
            return Err(TransportError::Closed);
        }
        self.frames.push(data.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        if self.fail_after.is_some_and(|limit| self.accepted() >= limit) {
            return Err(TransportError::Closed);
        }
        self.frames.push(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        self.committed = Some(self.frames.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attachment_head() {
        let head = ResponseHead::attachment(CONTENT_TYPE_OCTET_STREAM, "core.bin");
        assert_eq!(
            head.headers(),
            vec![
                ("Content-Type", "application/octet-stream".to_string()),
                ("Content-Disposition", "attachment;filename=core.bin".to_string()),
            ]
        );
    }

    #[test]
    fn test_writer_orders_and_terminates_once() {
        let mut writer = ChunkedWriter::new(RecordingSink::new());
        writer.open(&ResponseHead::html()).unwrap();
        writer.write_block(b"abc").unwrap();
        writer.write_block(b"").unwrap();
        writer.write_block(b"de").unwrap();
        writer.finish().unwrap();

        assert_eq!(writer.finish(), Err(TransportError::Unusable));
        assert_eq!(writer.write_block(b"x"), Err(TransportError::Unusable));
        assert_eq!(writer.chunks_written(), 2);
        assert_eq!(writer.bytes_written(), 5);

        let sink = writer.into_inner();
        assert_eq!(sink.frames, vec![b"abc".to_vec(), b"de".to_vec(), Vec::new()]);
        assert_eq!(sink.terminators(), 1);
    }

    #[test]
    fn test_writer_requires_open() {
        let mut writer = ChunkedWriter::new(RecordingSink::new());
        assert_eq!(writer.write_block(b"abc"), Err(TransportError::Unusable));
        assert_eq!(writer.finish(), Err(TransportError::Unusable));
        assert!(writer.into_inner().frames.is_empty());
    }

    #[test]
    fn test_writer_poisoned_after_sink_error() {
        let mut writer = ChunkedWriter::new(RecordingSink::failing_after(1));
        writer.open(&ResponseHead::html()).unwrap();
        writer.write_block(b"one").unwrap();
        assert_eq!(writer.write_block(b"two"), Err(TransportError::Closed));
        assert_eq!(writer.write_block(b"three"), Err(TransportError::Unusable));
        assert_eq!(writer.finish(), Err(TransportError::Unusable));

        let sink = writer.into_inner();
        assert_eq!(sink.attempts, 2);
        assert_eq!(sink.terminators(), 0);
    }
}
