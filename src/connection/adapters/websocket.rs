//! Websocket transport adapter built on axum's upgraded sockets.

use std::borrow::Cow;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::connection::{
    domain::Frame,
    ports::transport::{FrameChannel, FrameSink, FrameSource, TransportError, TransportResult},
};

/// An upgraded websocket, ready to be split into pump halves.
#[derive(Debug)]
pub struct WebSocketChannel {
    socket: WebSocket,
    peer: String,
}

impl WebSocketChannel {
    /// Wraps an upgraded socket accepted from `peer`.
    #[must_use]
    pub fn new(socket: WebSocket, peer: SocketAddr) -> Self {
        Self {
            socket,
            peer: peer.to_string(),
        }
    }
}

impl FrameChannel for WebSocketChannel {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        let (sink, stream) = self.socket.split();
        (
            Box::new(WebSocketSink { sink }),
            Box::new(WebSocketSource { stream }),
        )
    }
}

struct WebSocketSink {
    sink: SplitSink<WebSocket, WsMessage>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> TransportResult<()> {
        self.sink
            .send(into_ws(frame))
            .await
            .map_err(TransportError::io)
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.sink.close().await.map_err(TransportError::io)
    }
}

struct WebSocketSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Option<TransportResult<Frame>> {
        loop {
            let next = match self.stream.next().await? {
                Ok(message) => from_ws(message),
                Err(err) => return Some(Err(TransportError::io(err))),
            };
            match next {
                Some(frame) => return Some(Ok(frame)),
                None => debug!("dropping binary frame that is not valid UTF-8"),
            }
        }
    }
}

fn into_ws(frame: Frame) -> WsMessage {
    match frame {
        Frame::Text(text) => WsMessage::Text(text),
        Frame::Ping(payload) => WsMessage::Ping(payload),
        Frame::Pong(payload) => WsMessage::Pong(payload),
        Frame::Close(reason) => WsMessage::Close(reason.map(|reason| CloseFrame {
            code: close_code::NORMAL,
            reason: Cow::Owned(reason),
        })),
    }
}

/// Maps an incoming websocket message to a frame.
///
/// Binary payloads are accepted as text when they hold valid UTF-8; any
/// other binary payload yields `None` and is dropped without ending the
/// connection.
fn from_ws(message: WsMessage) -> Option<Frame> {
    match message {
        WsMessage::Text(text) => Some(Frame::Text(text)),
        WsMessage::Binary(bytes) => String::from_utf8(bytes).ok().map(Frame::Text),
        WsMessage::Ping(payload) => Some(Frame::Ping(payload)),
        WsMessage::Pong(payload) => Some(Frame::Pong(payload)),
        WsMessage::Close(frame) => Some(Frame::Close(
            frame.map(|close| close.reason.into_owned()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn utf8_binary_payloads_become_text() {
        let frame = from_ws(WsMessage::Binary(b"{\"content\":\"hi\"}".to_vec()));

        assert_eq!(frame, Some(Frame::Text("{\"content\":\"hi\"}".to_owned())));
    }

    #[rstest]
    fn invalid_utf8_binary_payloads_are_dropped() {
        assert_eq!(from_ws(WsMessage::Binary(vec![0xff, 0xfe])), None);
    }

    #[rstest]
    fn close_reason_is_kept() {
        let frame = from_ws(WsMessage::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: Cow::Borrowed("bye bye"),
        })));

        assert_eq!(frame, Some(Frame::Close(Some("bye bye".to_owned()))));
    }
}
