//! Tests for the in-memory broker.

use rstest::{fixture, rstest};

use crate::relay::{
    adapters::memory::InMemoryBroker,
    ports::{Broker, BrokerError, ExchangeKind},
};

#[fixture]
fn broker() -> InMemoryBroker {
    InMemoryBroker::new()
}

async fn mailbox(broker: &InMemoryBroker, exchange: &str, queue: &str) {
    broker
        .declare_exchange(exchange, ExchangeKind::Fanout, true)
        .await
        .expect("exchange");
    broker.declare_queue(queue, true).await.expect("queue");
    broker.bind_queue(queue, exchange, "").await.expect("bind");
}

#[rstest]
#[tokio::test]
async fn declarations_are_idempotent(broker: InMemoryBroker) {
    mailbox(&broker, "x", "q").await;
    mailbox(&broker, "x", "q").await;

    assert_eq!(broker.bindings("x"), vec!["q".to_owned()]);
}

#[rstest]
#[tokio::test]
async fn redeclaring_with_other_settings_fails(broker: InMemoryBroker) {
    broker.declare_queue("q", true).await.expect("queue");

    let result = broker.declare_queue("q", false).await;

    assert!(matches!(result, Err(BrokerError::PreconditionFailed(_))));
}

#[rstest]
#[tokio::test]
async fn binding_requires_both_sides(broker: InMemoryBroker) {
    broker.declare_queue("q", true).await.expect("queue");

    let missing_exchange = broker.bind_queue("q", "nowhere", "").await;
    let missing_queue = broker.bind_queue("nothing", "nowhere", "").await;

    assert!(matches!(missing_exchange, Err(BrokerError::UnknownExchange(_))));
    assert!(matches!(missing_queue, Err(BrokerError::UnknownQueue(_))));
}

#[rstest]
#[tokio::test]
async fn publishing_to_an_unknown_exchange_fails(broker: InMemoryBroker) {
    let result = broker.publish("nowhere", "", b"x".to_vec(), true).await;

    assert!(matches!(result, Err(BrokerError::UnknownExchange(_))));
}

#[rstest]
#[tokio::test]
async fn fanout_copies_to_every_bound_queue(broker: InMemoryBroker) {
    mailbox(&broker, "x", "a").await;
    broker.declare_queue("b", true).await.expect("queue");
    broker.bind_queue("b", "x", "").await.expect("bind");

    broker.publish("x", "", b"hi".to_vec(), true).await.expect("publish");

    assert_eq!(broker.queue_depth("a"), Some(1));
    assert_eq!(broker.queue_depth("b"), Some(1));
}

#[rstest]
#[tokio::test]
async fn deliveries_arrive_in_publish_order_and_ack_removes_them(broker: InMemoryBroker) {
    mailbox(&broker, "x", "q").await;
    for body in ["one", "two"] {
        broker
            .publish("x", "", body.as_bytes().to_vec(), true)
            .await
            .expect("publish");
    }

    let mut consumer = broker.consume("q").await.expect("consume");
    let first = consumer.next().await.expect("open").expect("delivery");
    let second = consumer.next().await.expect("open").expect("delivery");

    assert_eq!(first.payload(), b"one");
    assert_eq!(second.payload(), b"two");
    assert!(!first.redelivered());
    first.ack().await.expect("ack");
    second.ack().await.expect("ack");
    drop(consumer);
    assert_eq!(broker.queue_depth("q"), Some(0));
}

#[rstest]
#[tokio::test]
async fn unacknowledged_deliveries_return_when_the_consumer_drops(broker: InMemoryBroker) {
    mailbox(&broker, "x", "q").await;
    broker.publish("x", "", b"one".to_vec(), true).await.expect("publish");
    broker.publish("x", "", b"two".to_vec(), true).await.expect("publish");

    let mut consumer = broker.consume("q").await.expect("consume");
    let first = consumer.next().await.expect("open").expect("delivery");
    let _second = consumer.next().await.expect("open").expect("delivery");
    drop(first);
    drop(consumer);

    let mut fresh = broker.consume("q").await.expect("consume");
    let again = fresh.next().await.expect("open").expect("delivery");

    assert_eq!(again.payload(), b"one");
    assert!(again.redelivered());
    assert_eq!(broker.queue_depth("q"), Some(1));
}

#[rstest]
#[case(false, Some(0))]
#[case(true, Some(1))]
#[tokio::test]
async fn reject_honours_requeue(
    broker: InMemoryBroker,
    #[case] requeue: bool,
    #[case] depth: Option<usize>,
) {
    mailbox(&broker, "x", "q").await;
    broker.publish("x", "", b"bad".to_vec(), true).await.expect("publish");

    let mut consumer = broker.consume("q").await.expect("consume");
    let delivery = consumer.next().await.expect("open").expect("delivery");
    delivery.reject(requeue).await.expect("reject");

    assert_eq!(broker.queue_depth("q"), depth);
}

#[rstest]
#[tokio::test]
async fn deleting_the_queue_ends_waiting_consumers(broker: InMemoryBroker) {
    mailbox(&broker, "x", "q").await;
    let mut consumer = broker.consume("q").await.expect("consume");

    let waiting = tokio::spawn(async move { consumer.next().await.is_none() });
    tokio::task::yield_now().await;
    broker.delete_queue("q").await.expect("delete");

    assert!(waiting.await.expect("join"));
    assert!(!broker.has_queue("q"));
    assert!(broker.bindings("x").is_empty());
}

#[rstest]
#[tokio::test]
async fn waiting_consumers_wake_on_publish(broker: InMemoryBroker) {
    mailbox(&broker, "x", "q").await;
    let mut consumer = broker.consume("q").await.expect("consume");

    let waiting = tokio::spawn(async move {
        consumer
            .next()
            .await
            .and_then(Result::ok)
            .map(|delivery| delivery.payload().to_vec())
    });
    tokio::task::yield_now().await;
    broker.publish("x", "", b"late".to_vec(), true).await.expect("publish");

    assert_eq!(waiting.await.expect("join"), Some(b"late".to_vec()));
}

#[rstest]
#[tokio::test]
async fn closed_broker_refuses_work(broker: InMemoryBroker) {
    mailbox(&broker, "x", "q").await;
    let mut consumer = broker.consume("q").await.expect("consume");

    broker.close().await.expect("close");
    broker.close().await.expect("second close");

    assert!(matches!(
        broker.publish("x", "", Vec::new(), true).await,
        Err(BrokerError::Closed)
    ));
    assert!(matches!(consumer.next().await, Some(Err(BrokerError::Closed))));
}
