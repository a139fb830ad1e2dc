//! Read and write pumps.
//!
//! Each pump owns one half of the transport. Both race every suspending
//! operation against the connection's cancellation token and end by
//! triggering teardown, which is a no-op when another task got there first.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::Teardown;
use crate::connection::{
    domain::{CLOSE_REASON, CloseCause, Frame, OutboundItem},
    outbox::OutboxReceiver,
    ports::{FrameSink, FrameSource, InboundHandler},
};
use crate::message::codec::{self, WireFormat};

/// How long the write pump waits for the close frame and the transport
/// close once the connection is winding down.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Receives frames until the peer leaves, the transport fails, the handler
/// reports a fatal error or the connection is cancelled.
///
/// Text frames go to `handler` and pongs bump the `pongs` counter watched
/// by the heartbeat. Pings are ignored: the transport answers them.
pub async fn read_pump<H>(
    mut source: Box<dyn FrameSource>,
    mut handler: H,
    pongs: watch::Sender<u64>,
    teardown: Teardown,
) where
    H: InboundHandler,
{
    let cancel = teardown.token().clone();
    let connection = teardown.connection();

    let cause = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = source.recv() => next,
        };

        match next {
            None | Some(Ok(Frame::Close(_))) => break CloseCause::PeerClosed,
            Some(Err(err)) => {
                warn!(%connection, error = %err, "transport read failed");
                break CloseCause::TransportError;
            }
            Some(Ok(Frame::Text(text))) => {
                let handled = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    handled = handler.on_text(text) => handled,
                };
                match handled {
                    Ok(()) => {}
                    Err(err) if err.is_fatal() => {
                        warn!(%connection, error = %err, "inbound handling failed");
                        break CloseCause::InboundFailed;
                    }
                    Err(err) => debug!(%connection, error = %err, "dropping inbound frame"),
                }
            }
            Some(Ok(Frame::Ping(_))) => {}
            Some(Ok(Frame::Pong(_))) => {
                pongs.send_modify(|count| *count = count.wrapping_add(1));
            }
        }
    };

    teardown.run(cause).await;
}

/// Writes queued items until the queue is closed and drained, a write fails
/// or the connection is cancelled.
///
/// Every write is raced against cancellation, so a peer that stopped
/// reading cannot hold the pump. After the loop the queue receiver is
/// dropped, which fails any producer still blocked on a full queue. A close
/// frame with reason `"bye bye"` is then attempted unless a write failed,
/// and the sink is closed exactly once; both steps are bounded by
/// [`CLOSE_GRACE`].
pub async fn write_pump(
    mut sink: Box<dyn FrameSink>,
    mut receiver: OutboxReceiver,
    format: WireFormat,
    teardown: Teardown,
) {
    let cancel = teardown.token().clone();
    let connection = teardown.connection();

    let cause = loop {
        let next = tokio::select! {
            biased;
            item = receiver.recv() => item,
            () = cancel.cancelled() => None,
        };

        let Some(item) = next else {
            break CloseCause::QueueClosed;
        };

        let frame = match item {
            OutboundItem::Message(message) => match codec::render(&message, format) {
                Ok(text) => Frame::Text(text),
                Err(err) => {
                    warn!(
                        %connection,
                        error = %err,
                        id = %message.id(),
                        "dropping unencodable message"
                    );
                    continue;
                }
            },
            OutboundItem::Probe => Frame::Ping(Vec::new()),
        };

        let sent = tokio::select! {
            biased;
            sent = sink.send(frame) => sent,
            () = cancel.cancelled() => {
                debug!(%connection, "write abandoned by teardown");
                break CloseCause::Shutdown;
            }
        };
        if let Err(err) = sent {
            warn!(%connection, error = %err, "transport write failed");
            break CloseCause::WriteFailed;
        }
    };
    drop(receiver);

    if cause != CloseCause::WriteFailed {
        let close = Frame::Close(Some(CLOSE_REASON.to_owned()));
        match tokio::time::timeout(CLOSE_GRACE, sink.send(close)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%connection, error = %err, "close frame not delivered"),
            Err(_) => debug!(%connection, "close frame timed out"),
        }
    }
    match tokio::time::timeout(CLOSE_GRACE, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(%connection, error = %err, "closing transport failed"),
        Err(_) => debug!(%connection, "closing transport timed out"),
    }
    if teardown.run(cause).await {
        info!(%connection, %cause, "connection closed by write pump");
    }
}
