//! End-to-end tests of broker-backed relay sessions over in-memory
//! transports.

use std::sync::Arc;
use std::time::Duration;

use chat_relay::connection::{
    adapters::memory::{PeerEnd, duplex},
    domain::{CloseCause, Frame},
};
use chat_relay::message::{
    adapters::memory::InMemoryMessageStore,
    codec,
    domain::{Address, Message, MessageContent, MessageId, MessageIdGenerator, ParticipantId},
    policy::DefaultContentPolicy,
    ports::MessageStore,
};
use chat_relay::relay::{
    adapters::memory::InMemoryBroker,
    services::{
        RelayService,
        session::{self, RelaySessionContext, RelaySettings},
    },
};
use chrono::{Duration as ChronoDuration, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

struct Relay {
    broker: Arc<InMemoryBroker>,
    store: InMemoryMessageStore,
    context: RelaySessionContext<InMemoryBroker, DefaultClock>,
}

impl Relay {
    fn service(&self) -> &RelayService<InMemoryBroker> {
        self.context.relay()
    }

    fn connect(&self, who: &str, target: &str) -> (PeerEnd, JoinHandle<Option<CloseCause>>) {
        let (channel, peer) = duplex(format!("peer-{who}"), 32);
        let served = tokio::spawn(session::serve(
            channel,
            participant(who),
            Some(target.parse::<Address>().expect("valid target")),
            self.context.clone(),
        ));
        (peer, served)
    }
}

#[fixture]
fn relay() -> Relay {
    let broker = Arc::new(InMemoryBroker::new());
    let store = InMemoryMessageStore::new();
    let context = RelaySessionContext::new(
        RelayService::new(Arc::clone(&broker)),
        Arc::new(store.clone()),
        Arc::new(DefaultContentPolicy::new()),
        Arc::new(MessageIdGenerator::new()),
        Arc::new(DefaultClock),
    )
    .with_settings(RelaySettings {
        heartbeat: None,
        ..RelaySettings::default()
    });
    Relay {
        broker,
        store,
        context,
    }
}

fn participant(raw: &str) -> ParticipantId {
    ParticipantId::new(raw).expect("valid identity")
}

fn stored(id: i64, minutes_ago: i64, from: &str, to: &str, content: &str) -> Message {
    Message::from_persisted(
        MessageId::new(id),
        Utc::now() - ChronoDuration::minutes(minutes_ago),
        participant(from),
        to.parse::<Address>().expect("valid address"),
        MessageContent::new(content),
    )
}

async fn next_message(peer: &mut PeerEnd) -> Message {
    match tokio::time::timeout(WAIT, peer.recv_data()).await {
        Ok(Some(Frame::Text(text))) => {
            codec::decode_message(text.as_bytes()).expect("json message frame")
        }
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn finish(mut peer: PeerEnd, served: JoinHandle<Option<CloseCause>>) {
    peer.hang_up();
    assert_eq!(
        tokio::time::timeout(WAIT, served)
            .await
            .expect("session ended")
            .expect("joined"),
        Some(CloseCause::PeerClosed)
    );
}

#[rstest]
#[tokio::test]
async fn history_is_replayed_before_live_traffic(relay: Relay) {
    let older = stored(1, 10, "7", "42", "first");
    let newer = stored(2, 5, "42", "7", "second");
    relay.store.append(&older).await.expect("stored");
    relay.store.append(&newer).await.expect("stored");
    let history = relay
        .store
        .find_by_participant(&participant("42"), None)
        .await
        .expect("history");
    assert_eq!(
        history.iter().map(Message::id).collect::<Vec<_>>(),
        vec![MessageId::new(2), MessageId::new(1)]
    );

    let live = stored(3, 0, "7", "42", "live");
    relay.service().publish(&live).await.expect("published");

    let (mut peer, served) = relay.connect("42", "7");
    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(1));
    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(2));
    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(3));
    finish(peer, served).await;
}

#[rstest]
#[tokio::test]
async fn offline_recipients_receive_messages_on_connect(relay: Relay) {
    let message = stored(10, 0, "1", "7", "while you were away");
    relay.service().publish(&message).await.expect("published");
    assert_eq!(relay.broker.queue_depth("7_queue"), Some(1));

    let (mut peer, served) = relay.connect("7", "1");
    let delivered = next_message(&mut peer).await;

    assert_eq!(delivered.content().as_str(), "while you were away");
    finish(peer, served).await;
    assert_eq!(relay.broker.queue_depth("7_queue"), Some(0));
}

#[rstest]
#[tokio::test]
async fn messages_in_both_history_and_mailbox_arrive_once(relay: Relay) {
    let message = stored(20, 1, "1", "42", "only once");
    relay.store.append(&message).await.expect("stored");
    relay.service().publish(&message).await.expect("published");
    let follow_up = stored(21, 0, "1", "42", "next");
    relay.service().publish(&follow_up).await.expect("published");

    let (mut peer, served) = relay.connect("42", "1");

    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(20));
    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(21));
    finish(peer, served).await;
}

#[rstest]
#[tokio::test]
async fn mailbox_backlog_beyond_the_history_limit_keeps_order(relay: Relay) {
    let relay = Relay {
        context: relay.context.clone().with_settings(RelaySettings {
            heartbeat: None,
            history_limit: Some(2),
            ..RelaySettings::default()
        }),
        ..relay
    };
    for (id, content) in [(1, "one"), (2, "two"), (3, "three")] {
        let message = stored(id, 10 - id, "1", "42", content);
        relay.store.append(&message).await.expect("stored");
        relay.service().publish(&message).await.expect("published");
    }

    let (mut peer, served) = relay.connect("42", "1");
    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(2));
    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(3));
    relay
        .service()
        .publish(&stored(4, 0, "1", "42", "four"))
        .await
        .expect("published");

    assert_eq!(next_message(&mut peer).await.id(), MessageId::new(4));
    finish(peer, served).await;
    assert_eq!(relay.broker.queue_depth("42_queue"), Some(0));
}

#[rstest]
#[tokio::test]
async fn two_participants_exchange_messages(relay: Relay) {
    let (mut alice, alice_served) = relay.connect("1", "2");
    let (mut bob, bob_served) = relay.connect("2", "1");

    alice
        .send_text(r#"{"content":"hi bob"}"#)
        .await
        .expect("send");
    let received = next_message(&mut bob).await;
    let echoed = next_message(&mut alice).await;

    assert_eq!(received.from().as_str(), "1");
    assert_eq!(received.to().to_string(), "2");
    assert_eq!(received.content().as_str(), "hi bob");
    assert_eq!(echoed.id(), received.id());

    bob.send_text(r#"{"to":"1","content":"hi\nalice"}"#)
        .await
        .expect("send");
    let reply = next_message(&mut alice).await;
    assert_eq!(reply.content().as_str(), "hi alice");
    assert!(reply.id() > received.id());

    finish(alice, alice_served).await;
    finish(bob, bob_served).await;
    assert_eq!(relay.store.len(), 2);
}

#[rstest]
#[tokio::test]
async fn deleting_the_mailbox_ends_the_session(relay: Relay) {
    let (mut peer, served) = relay.connect("5", "1");
    relay
        .service()
        .publish(&stored(30, 0, "1", "5", "ping"))
        .await
        .expect("published");
    next_message(&mut peer).await;

    relay
        .service()
        .delete_mailbox(&participant("5"))
        .await
        .expect("deleted");

    let cause = tokio::time::timeout(WAIT, served)
        .await
        .expect("session ended")
        .expect("joined");
    assert_eq!(cause, Some(CloseCause::MailboxEnded));
    assert_eq!(
        tokio::time::timeout(WAIT, peer.recv_data()).await.expect("closed"),
        Some(Frame::Close(Some("bye bye".to_owned())))
    );
}
