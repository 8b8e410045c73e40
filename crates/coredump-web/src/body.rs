//! Bridge from the blocking chunk sink to an axum streaming body.
//!
//! Handlers run on the blocking pool and write through [`ChannelSink`]. The
//! async side waits for the response head, then streams chunks from a
//! channel. Every chunk carries an acknowledgement that the body stream
//! releases when hyper asks for the next frame, and `send_chunk` blocks on
//! it, so the next block is only read once the previous one has been taken
//! by the connection. Once the head is out, a failure is pushed into the
//! body stream as an error, which makes hyper drop the connection instead of
//! sending the terminating chunk.

use std::io;

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::{mpsc, oneshot};
use tracing::error;

use coredump_core::{ChunkSink, DumpError, ResponseHead, TransportError};

type HeadResult = Result<ResponseHead, DumpError>;
type BodyItem = Result<Bytes, io::Error>;

/// One body item and the acknowledgement released once hyper has taken it.
type Frame = (BodyItem, oneshot::Sender<()>);

/// Blocking side of a streamed response.
pub struct ChannelSink {
    head: Option<oneshot::Sender<HeadResult>>,
    body: Option<mpsc::Sender<Frame>>,
    drained: Option<oneshot::Receiver<()>>,
}

/// Async side of a streamed response.
pub struct PendingResponse {
    head: oneshot::Receiver<HeadResult>,
    body: mpsc::Receiver<Frame>,
    drained: oneshot::Sender<()>,
}

impl ChannelSink {
    pub fn new() -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(1);
        let (drained_tx, drained_rx) = oneshot::channel();
        (
            Self {
                head: Some(head_tx),
                body: Some(body_tx),
                drained: Some(drained_rx),
            },
            PendingResponse {
                head: head_rx,
                body: body_rx,
                drained: drained_tx,
            },
        )
    }

    /// Report a terminal failure to the client side.
    ///
    /// Before the head is sent this becomes an error status; afterwards it
    /// aborts the body stream.
    pub fn fail(&mut self, err: &DumpError) {
        if let Some(head) = self.head.take() {
            let _ = head.send(Err(err.clone()));
            return;
        }
        if let Some(body) = self.body.take() {
            let (ack, _) = oneshot::channel();
            let item = Err(io::Error::new(io::ErrorKind::Other, err.to_string()));
            let _ = body.blocking_send((item, ack));
        }
    }
}

impl ChunkSink for ChannelSink {
    fn open(&mut self, head: &ResponseHead) -> Result<(), TransportError> {
        let tx = self.head.take().ok_or(TransportError::Unusable)?;
        tx.send(Ok(head.clone())).map_err(|_| TransportError::Closed)
    }

    fn send_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let body = self.body.as_ref().ok_or(TransportError::Unusable)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        body.blocking_send((Ok(Bytes::copy_from_slice(data)), ack_tx))
            .map_err(|_| TransportError::Closed)?;
        // Dropped unacknowledged when the client goes away.
        ack_rx.blocking_recv().map_err(|_| TransportError::Closed)
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        // Closing the channel ends the body; hyper writes the zero-length chunk.
        self.body.take().map(drop).ok_or(TransportError::Unusable)
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        if self.body.is_some() {
            return Err(TransportError::Unusable);
        }
        let drained = self.drained.take().ok_or(TransportError::Unusable)?;
        drained.blocking_recv().map_err(|_| TransportError::Closed)
    }
}

/// Body stream state: the frame channel, the acknowledgement of the frame
/// hyper holds, and the signal sent once the stream has ended.
struct BodyState {
    frames: mpsc::Receiver<Frame>,
    taken: Option<oneshot::Sender<()>>,
    drained: Option<oneshot::Sender<()>>,
}

impl BodyState {
    async fn next(mut self) -> Option<(BodyItem, Self)> {
        // Being polled again means hyper has taken the previous frame.
        if let Some(ack) = self.taken.take() {
            let _ = ack.send(());
        }
        match self.frames.recv().await {
            Some((item, ack)) => {
                self.taken = Some(ack);
                Some((item, self))
            }
            None => {
                if let Some(drained) = self.drained.take() {
                    let _ = drained.send(());
                }
                None
            }
        }
    }
}

impl PendingResponse {
    /// Wait for the handler to open the response and build it.
    pub async fn into_response(self) -> Response {
        let PendingResponse {
            head,
            body,
            drained,
        } = self;

        let head = match head.await {
            Ok(Ok(head)) => head,
            Ok(Err(err)) => return error_response(&err),
            Err(_) => {
                error!("Handler ended without opening a response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let state = BodyState {
            frames: body,
            taken: None,
            drained: Some(drained),
        };
        let stream = futures::stream::unfold(state, BodyState::next);

        let mut builder = axum::http::Response::builder().status(head.status);
        for (name, value) in head.headers() {
            builder = builder.header(name, value);
        }

        match builder.body(Body::from_stream(stream)) {
            Ok(response) => response,
            Err(err) => {
                error!("Invalid response head: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Status for a session that failed before sending anything.
pub fn error_response(err: &DumpError) -> Response {
    let status = match err {
        DumpError::RegionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coredump_core::RegionId;

    #[test]
    fn test_error_status() {
        let not_found = error_response(&DumpError::RegionNotFound(RegionId::core_dump()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let closed = error_response(&DumpError::TransportWrite(TransportError::Closed));
        assert_eq!(closed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_sink_rejects_second_open() {
        let (mut sink, _pending) = ChannelSink::new();
        sink.open(&ResponseHead::html()).unwrap();
        assert_eq!(sink.open(&ResponseHead::html()), Err(TransportError::Unusable));
    }

    #[test]
    fn test_sink_reports_closed_client() {
        let (mut sink, pending) = ChannelSink::new();
        drop(pending);
        assert_eq!(sink.open(&ResponseHead::html()), Err(TransportError::Closed));
        assert_eq!(sink.send_chunk(b"data"), Err(TransportError::Closed));
    }

    #[test]
    fn test_commit_requires_finish() {
        let (mut sink, _pending) = ChannelSink::new();
        assert_eq!(sink.commit(), Err(TransportError::Unusable));
    }

    #[test]
    fn test_commit_reports_dropped_body() {
        let (mut sink, pending) = ChannelSink::new();
        sink.finish().unwrap();
        drop(pending);
        assert_eq!(sink.commit(), Err(TransportError::Closed));
    }
}
