//! Tests for relay session inbound handling and duplicate suppression.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::DefaultClock;
use mockall::mock;
use rstest::{fixture, rstest};

use super::support::{message, participant};
use crate::connection::{
    domain::OutboundItem,
    outbox::Outbox,
    ports::{InboundError, InboundHandler},
};
use crate::message::{
    adapters::memory::InMemoryMessageStore,
    domain::{Address, Message, MessageId, MessageIdGenerator, ParticipantId},
    policy::DefaultContentPolicy,
    ports::store::{AppendOutcome, MessageStore, StoreError, StoreResult},
};
use crate::relay::{
    adapters::memory::InMemoryBroker,
    services::{
        MessageSink, RelayService,
        session::{MailboxForwarder, RecentIds, RelaySession, RelaySessionContext, RelaySettings},
    },
};

mock! {
    pub Store {}

    #[async_trait]
    impl MessageStore for Store {
        async fn append(&self, message: &Message) -> StoreResult<AppendOutcome>;

        async fn find_by_participant(
            &self,
            participant: &ParticipantId,
            limit: Option<usize>,
        ) -> StoreResult<Vec<Message>>;

        async fn soft_delete(&self, id: MessageId) -> StoreResult<bool>;
    }
}

/// Store whose appends never complete.
struct HangingStore;

#[async_trait]
impl MessageStore for HangingStore {
    async fn append(&self, _message: &Message) -> StoreResult<AppendOutcome> {
        std::future::pending().await
    }

    async fn find_by_participant(
        &self,
        _participant: &ParticipantId,
        _limit: Option<usize>,
    ) -> StoreResult<Vec<Message>> {
        Ok(Vec::new())
    }

    async fn soft_delete(&self, _id: MessageId) -> StoreResult<bool> {
        Ok(false)
    }
}

struct Harness {
    broker: Arc<InMemoryBroker>,
    store: InMemoryMessageStore,
    context: RelaySessionContext<InMemoryBroker, DefaultClock>,
}

impl Harness {
    fn session(
        &self,
        who: &str,
        default_target: Option<&str>,
    ) -> RelaySession<InMemoryBroker, DefaultClock> {
        RelaySession::new(
            self.context.clone(),
            participant(who),
            default_target.map(|raw| raw.parse::<Address>().expect("valid address")),
        )
    }
}

fn context_with(
    broker: &Arc<InMemoryBroker>,
    store: Arc<dyn MessageStore>,
) -> RelaySessionContext<InMemoryBroker, DefaultClock> {
    RelaySessionContext::new(
        RelayService::new(Arc::clone(broker)),
        store,
        Arc::new(DefaultContentPolicy::new()),
        Arc::new(MessageIdGenerator::new()),
        Arc::new(DefaultClock),
    )
}

async fn stored_for(store: &InMemoryMessageStore, who: &str) -> Vec<Message> {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let history = store
                .find_by_participant(&participant(who), None)
                .await
                .expect("history");
            if !history.is_empty() {
                return history;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("message stored")
}

#[fixture]
fn harness() -> Harness {
    let broker = Arc::new(InMemoryBroker::new());
    let store = InMemoryMessageStore::new();
    let context = context_with(&broker, Arc::new(store.clone()));
    Harness {
        broker,
        store,
        context,
    }
}

#[rstest]
#[tokio::test]
async fn inbound_messages_are_stored_published_and_echoed(harness: Harness) {
    let mut session = harness.session("1", None);

    session
        .on_text(r#"{"to":"2","content":"hello"}"#.to_owned())
        .await
        .expect("accepted");

    let history = stored_for(&harness.store, "2").await;
    assert_eq!(history.len(), 1);
    let stored = history.first().expect("stored message");
    assert_eq!(stored.from().as_str(), "1");
    assert_eq!(stored.content().as_str(), "hello");
    assert_eq!(harness.broker.queue_depth("2_queue"), Some(1));
    assert_eq!(harness.broker.queue_depth("1_queue"), Some(1));
}

#[rstest]
#[tokio::test]
async fn default_target_applies_when_to_is_omitted(harness: Harness) {
    let mut session = harness.session("1", Some("9"));

    session
        .on_text(r#"{"content":"hi"}"#.to_owned())
        .await
        .expect("accepted");

    assert_eq!(harness.broker.queue_depth("9_queue"), Some(1));
}

#[rstest]
#[tokio::test]
async fn frames_without_a_recipient_are_dropped(harness: Harness) {
    let mut session = harness.session("1", None);

    let result = session.on_text(r#"{"content":"hi"}"#.to_owned()).await;

    let err = result.expect_err("no recipient");
    assert!(!err.is_fatal());
    assert!(harness.store.is_empty());
}

#[rstest]
#[case("not json")]
#[case(r#"{"to":"two words","content":"x"}"#)]
#[tokio::test]
async fn malformed_frames_are_dropped(harness: Harness, #[case] frame: &str) {
    let mut session = harness.session("1", None);

    let result = session.on_text(frame.to_owned()).await;

    assert!(result.is_err_and(|err| !err.is_fatal()));
    assert!(harness.store.is_empty());
}

#[rstest]
#[tokio::test]
async fn empty_content_is_rejected(harness: Harness) {
    let mut session = harness.session("1", None);

    let result = session
        .on_text(r#"{"to":"2","content":" \n "}"#.to_owned())
        .await;

    assert!(matches!(result, Err(InboundError::Rejected)));
    assert!(harness.store.is_empty());
    assert_eq!(harness.broker.queue_depth("2_queue"), None);
}

#[rstest]
#[tokio::test]
async fn echo_can_be_disabled(harness: Harness) {
    let context = harness.context.clone().with_settings(RelaySettings {
        echo_to_sender: false,
        ..RelaySettings::default()
    });
    let mut session = RelaySession::new(context, participant("1"), None);

    session
        .on_text(r#"{"to":"2","content":"quiet"}"#.to_owned())
        .await
        .expect("accepted");

    assert_eq!(harness.broker.queue_depth("2_queue"), Some(1));
    assert_eq!(harness.broker.queue_depth("1_queue"), None);
}

#[rstest]
#[tokio::test]
async fn notes_to_self_are_published_once(harness: Harness) {
    let mut session = harness.session("1", None);

    session
        .on_text(r#"{"to":"1","content":"memo"}"#.to_owned())
        .await
        .expect("accepted");

    assert_eq!(harness.broker.queue_depth("1_queue"), Some(1));
}

#[rstest]
#[tokio::test]
async fn store_failures_do_not_block_delivery() {
    let attempted = Arc::new(tokio::sync::Notify::new());
    let signal = Arc::clone(&attempted);
    let mut store = MockStore::new();
    store.expect_append().times(1).returning(move |_| {
        signal.notify_one();
        Err(StoreError::connection("database unavailable"))
    });
    let broker = Arc::new(InMemoryBroker::new());
    let context = context_with(&broker, Arc::new(store));
    let mut session = RelaySession::new(context, participant("1"), None);

    session
        .on_text(r#"{"to":"2","content":"still delivered"}"#.to_owned())
        .await
        .expect("accepted");
    tokio::time::timeout(Duration::from_secs(1), attempted.notified())
        .await
        .expect("append attempted");

    assert_eq!(broker.queue_depth("2_queue"), Some(1));
}

#[rstest]
#[tokio::test]
async fn hung_store_does_not_hold_up_delivery() {
    let broker = Arc::new(InMemoryBroker::new());
    let context = context_with(&broker, Arc::new(HangingStore));
    let mut session = RelaySession::new(context, participant("1"), None);

    let handled = tokio::time::timeout(
        Duration::from_secs(1),
        session.on_text(r#"{"to":"2","content":"hi"}"#.to_owned()),
    )
    .await
    .expect("handled without waiting for the store");

    assert!(handled.is_ok());
    assert_eq!(broker.queue_depth("2_queue"), Some(1));
    assert_eq!(broker.queue_depth("1_queue"), Some(1));
}

#[rstest]
fn recent_ids_forget_the_oldest_entries() {
    let mut seen = RecentIds::new(2);

    seen.insert(MessageId::new(1));
    seen.insert(MessageId::new(2));
    seen.insert(MessageId::new(3));

    assert!(!seen.contains(MessageId::new(1)));
    assert!(seen.contains(MessageId::new(2)));
    assert!(seen.contains(MessageId::new(3)));
}

#[rstest]
#[tokio::test]
async fn forwarder_skips_already_delivered_ids() {
    let (outbox, mut receiver) = Outbox::new(8);
    let mut seen = RecentIds::new(8);
    seen.insert(MessageId::new(1));
    let mut forwarder = MailboxForwarder::new(outbox.clone(), seen);

    forwarder
        .deliver(message(1, "1", "2", "from history"))
        .await
        .expect("skipped");
    forwarder
        .deliver(message(2, "1", "2", "live"))
        .await
        .expect("delivered");
    forwarder
        .deliver(message(2, "1", "2", "live again"))
        .await
        .expect("skipped");
    outbox.close();

    let mut contents = Vec::new();
    while let Some(item) = receiver.recv().await {
        if let OutboundItem::Message(m) = item {
            contents.push(m.content().as_str().to_owned());
        }
    }
    assert_eq!(contents, vec!["live"]);
}

#[rstest]
#[tokio::test]
async fn forwarder_skips_backlog_older_than_the_replayed_history() {
    let (outbox, mut receiver) = Outbox::new(8);
    let mut seen = RecentIds::new(8);
    seen.insert(MessageId::new(3));
    seen.insert(MessageId::new(4));
    let mut forwarder =
        MailboxForwarder::new(outbox.clone(), seen).with_floor(Some(MessageId::new(3)));

    for (id, content) in [(1, "old"), (2, "older"), (3, "replayed"), (4, "replayed"), (5, "new")] {
        forwarder
            .deliver(message(id, "1", "2", content))
            .await
            .expect("accepted");
    }
    outbox.close();

    let mut delivered = Vec::new();
    while let Some(item) = receiver.recv().await {
        if let OutboundItem::Message(m) = item {
            delivered.push(m.id());
        }
    }
    assert_eq!(delivered, vec![MessageId::new(5)]);
}

#[rstest]
#[tokio::test]
async fn forwarder_refuses_when_the_connection_is_gone() {
    let (outbox, receiver) = Outbox::new(8);
    drop(receiver);
    let mut forwarder = MailboxForwarder::new(outbox, RecentIds::new(8));

    let result = forwarder.deliver(message(1, "1", "2", "lost")).await;

    assert!(result.is_err());
}
