//! In-memory implementation of the broker port.
//!
//! Models the parts of an AMQP broker the relay relies on: fanout exchanges
//! with bindings, queues that keep messages until a consumer acknowledges
//! them, requeueing (flagged as redelivered) of everything a dropped
//! consumer left unsettled, and queue deletion ending attached consumers.
//! Durability flags are recorded but every message lives only as long as
//! the broker value.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use crate::relay::ports::broker::{
    Acknowledger, Broker, BrokerError, BrokerResult, Delivery, DeliveryStream, ExchangeKind,
};

#[derive(Debug, Clone)]
struct Envelope {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct Exchange {
    kind: ExchangeKind,
    durable: bool,
    bindings: Vec<String>,
}

#[derive(Debug)]
struct Queue {
    durable: bool,
    ready: Mutex<VecDeque<Envelope>>,
    notify: Notify,
    deleted: AtomicBool,
}

impl Queue {
    fn new(durable: bool) -> Self {
        Self {
            durable,
            ready: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            deleted: AtomicBool::new(false),
        }
    }

    fn ready(&self) -> MutexGuard<'_, VecDeque<Envelope>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, envelope: Envelope) {
        self.ready().push_back(envelope);
        self.notify.notify_waiters();
    }

    fn requeue(&self, envelopes: impl DoubleEndedIterator<Item = Envelope>) {
        {
            let mut ready = self.ready();
            for envelope in envelopes.rev() {
                ready.push_front(Envelope {
                    redelivered: true,
                    ..envelope
                });
            }
        }
        self.notify.notify_waiters();
    }

    fn delete(&self) {
        self.deleted.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Default)]
struct Topology {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, Arc<Queue>>,
}

/// In-memory implementation of [`Broker`].
///
/// Clones share the same exchanges and queues.
///
/// # Example
///
/// ```
/// use chat_relay::relay::adapters::memory::InMemoryBroker;
/// use chat_relay::relay::ports::{Broker, ExchangeKind};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let broker = InMemoryBroker::new();
/// broker.declare_exchange("7_exchange", ExchangeKind::Fanout, true).await.expect("declared");
/// broker.declare_queue("7_queue", true).await.expect("declared");
/// broker.bind_queue("7_queue", "7_exchange", "").await.expect("bound");
/// broker.publish("7_exchange", "", b"hi".to_vec(), true).await.expect("published");
/// assert_eq!(broker.queue_depth("7_queue"), Some(1));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    topology: Arc<RwLock<Topology>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of ready (undelivered) messages in a queue.
    #[must_use]
    pub fn queue_depth(&self, name: &str) -> Option<usize> {
        self.read()
            .queues
            .get(name)
            .map(|queue| queue.ready().len())
    }

    /// Returns `true` if the exchange exists.
    #[must_use]
    pub fn has_exchange(&self, name: &str) -> bool {
        self.read().exchanges.contains_key(name)
    }

    /// Returns `true` if the queue exists.
    #[must_use]
    pub fn has_queue(&self, name: &str) -> bool {
        self.read().queues.contains_key(name)
    }

    /// Returns the queues bound to an exchange.
    #[must_use]
    pub fn bindings(&self, exchange: &str) -> Vec<String> {
        self.read()
            .exchanges
            .get(exchange)
            .map(|found| found.bindings.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Topology> {
        self.topology.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Topology> {
        self.topology.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut topology = self.write();
        match topology.exchanges.get(name) {
            Some(existing) if existing.kind != kind || existing.durable != durable => {
                Err(BrokerError::PreconditionFailed(format!(
                    "exchange '{name}' redeclared differently"
                )))
            }
            Some(_) => Ok(()),
            None => {
                topology.exchanges.insert(
                    name.to_owned(),
                    Exchange {
                        kind,
                        durable,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str, durable: bool) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut topology = self.write();
        match topology.queues.get(name) {
            Some(existing) if existing.durable != durable => Err(BrokerError::PreconditionFailed(
                format!("queue '{name}' redeclared differently"),
            )),
            Some(_) => Ok(()),
            None => {
                topology
                    .queues
                    .insert(name.to_owned(), Arc::new(Queue::new(durable)));
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        _routing_key: &str,
    ) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut topology = self.write();
        if !topology.queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_owned()));
        }
        let target = topology
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_owned()))?;
        if !target.bindings.iter().any(|bound| bound == queue) {
            target.bindings.push(queue.to_owned());
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        _routing_key: &str,
        payload: Vec<u8>,
        _persistent: bool,
    ) -> BrokerResult<()> {
        self.ensure_open()?;
        let topology = self.read();
        let source = topology
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_owned()))?;
        match source.kind {
            ExchangeKind::Fanout => {
                for queue in source
                    .bindings
                    .iter()
                    .filter_map(|bound| topology.queues.get(bound))
                {
                    queue.push(Envelope {
                        payload: payload.clone(),
                        redelivered: false,
                    });
                }
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> BrokerResult<Box<dyn DeliveryStream>> {
        self.ensure_open()?;
        let found = self
            .read()
            .queues
            .get(queue)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_owned()))?;
        debug!(queue, "consumer attached");
        Ok(Box::new(MemoryConsumer::new(found, Arc::clone(&self.closed))))
    }

    async fn delete_queue(&self, name: &str) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut topology = self.write();
        if let Some(queue) = topology.queues.remove(name) {
            queue.delete();
        }
        for exchange in topology.exchanges.values_mut() {
            exchange.bindings.retain(|bound| bound != name);
        }
        Ok(())
    }

    async fn delete_exchange(&self, name: &str) -> BrokerResult<()> {
        self.ensure_open()?;
        self.write().exchanges.remove(name);
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for queue in self.read().queues.values() {
            queue.notify.notify_waiters();
        }
        debug!("in-memory broker closed");
        Ok(())
    }
}

#[derive(Debug)]
struct Outstanding {
    queue: Arc<Queue>,
    unacked: Mutex<Vec<(u64, Envelope)>>,
}

impl Outstanding {
    fn unacked(&self) -> MutexGuard<'_, Vec<(u64, Envelope)>> {
        self.unacked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, tag: u64) -> BrokerResult<Envelope> {
        let mut unacked = self.unacked();
        let position = unacked
            .iter()
            .position(|(pending, _)| *pending == tag)
            .ok_or(BrokerError::UnknownDelivery(tag))?;
        Ok(unacked.remove(position).1)
    }
}

#[async_trait]
impl Acknowledger for Outstanding {
    async fn ack(&self, tag: u64) -> BrokerResult<()> {
        self.take(tag).map(drop)
    }

    async fn reject(&self, tag: u64, requeue: bool) -> BrokerResult<()> {
        let envelope = self.take(tag)?;
        if requeue {
            self.queue.requeue(std::iter::once(envelope));
        }
        Ok(())
    }
}

struct MemoryConsumer {
    outstanding: Arc<Outstanding>,
    broker_closed: Arc<AtomicBool>,
    next_tag: AtomicU64,
}

impl MemoryConsumer {
    fn new(queue: Arc<Queue>, broker_closed: Arc<AtomicBool>) -> Self {
        Self {
            outstanding: Arc::new(Outstanding {
                queue,
                unacked: Mutex::new(Vec::new()),
            }),
            broker_closed,
            next_tag: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl DeliveryStream for MemoryConsumer {
    async fn next(&mut self) -> Option<BrokerResult<Delivery>> {
        let queue = Arc::clone(&self.outstanding.queue);
        loop {
            let notified = queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.broker_closed.load(Ordering::Acquire) {
                return Some(Err(BrokerError::Closed));
            }
            if queue.deleted.load(Ordering::Acquire) {
                return None;
            }
            let popped = queue.ready().pop_front();
            if let Some(envelope) = popped {
                let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
                self.outstanding.unacked().push((tag, envelope.clone()));
                let acker: Arc<dyn Acknowledger> = Arc::<Outstanding>::clone(&self.outstanding);
                return Some(Ok(Delivery::new(
                    tag,
                    envelope.payload,
                    envelope.redelivered,
                    acker,
                )));
            }

            notified.await;
        }
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let pending: Vec<Envelope> = self
            .outstanding
            .unacked()
            .drain(..)
            .map(|(_, envelope)| envelope)
            .collect();
        if !pending.is_empty() && !self.outstanding.queue.deleted.load(Ordering::Acquire) {
            debug!(count = pending.len(), "requeueing unacknowledged deliveries");
            self.outstanding.queue.requeue(pending.into_iter());
        }
    }
}
