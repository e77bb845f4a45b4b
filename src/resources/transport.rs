//! In-process publish/subscribe node for velocity messages.
//!
//! [`TransportNode`] stands in for the messaging runtime: it owns one or more
//! dispatcher threads that share a single crossbeam channel. Publishing
//! enqueues a message; whichever dispatcher picks it up invokes every callback
//! subscribed to that exact topic. With more than one worker, callbacks for
//! different messages run concurrently and in no particular order, so
//! subscribers must synchronize any state they touch.
//!
//! Subscriptions are RAII guards: dropping a [`Subscription`] removes its
//! callback. Dropping the node shuts the dispatchers down and joins them
//! after the already queued messages have been delivered.
//!
//! The topic helpers [`as_valid_topic`] and [`valid_topic`] normalize topic
//! names the same way for publishers and subscribers.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::TransportError;
use crate::events::twist::{MessageInfo, Twist};

/// Callback invoked on a dispatcher thread for each delivered message.
pub type TwistCallback = Arc<dyn Fn(&Twist, &MessageInfo) + Send + Sync + 'static>;

/// Commands sent to the dispatcher threads.
enum TransportCmd {
    Publish { topic: String, msg: Twist },
    Shutdown,
}

struct Subscriber {
    id: u64,
    callback: TwistCallback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    topics: FxHashMap<String, Vec<Subscriber>>,
}

impl Registry {
    fn insert(&mut self, topic: &str, callback: TwistCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, callback });
        id
    }

    fn remove(&mut self, topic: &str, id: u64) {
        if let Some(subscribers) = self.topics.get_mut(topic) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    fn callbacks(&self, topic: &str) -> Vec<TwistCallback> {
        self.topics
            .get(topic)
            .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
            .unwrap_or_default()
    }
}

/// Counts published messages that have not been dispatched yet.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn end(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

/// Guard for one subscription. Dropping it unsubscribes the callback.
pub struct Subscription {
    id: u64,
    topic: String,
    registry: Weak<RwLock<Registry>>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.write().remove(&self.topic, self.id);
            debug!("unsubscribed from [{}]", self.topic);
        }
    }
}

/// In-process publish/subscribe node backed by dispatcher threads.
pub struct TransportNode {
    tx_cmd: Sender<TransportCmd>,
    registry: Arc<RwLock<Registry>>,
    in_flight: Arc<InFlight>,
    handles: Vec<JoinHandle<()>>,
}

impl TransportNode {
    /// Spawn a node with `workers` dispatcher threads (at least one).
    pub fn new(workers: usize) -> Self {
        let (tx_cmd, rx_cmd) = unbounded::<TransportCmd>();
        let registry = Arc::new(RwLock::new(Registry::default()));
        let in_flight = Arc::new(InFlight::default());

        let handles = (0..workers.max(1))
            .map(|_| {
                let rx_cmd = rx_cmd.clone();
                let registry = registry.clone();
                let in_flight = in_flight.clone();
                std::thread::spawn(move || dispatch_thread(rx_cmd, registry, in_flight))
            })
            .collect();

        Self {
            tx_cmd,
            registry,
            in_flight,
            handles,
        }
    }

    /// Register `callback` for messages published on `topic`.
    ///
    /// The topic must already be in normalized form (see [`as_valid_topic`]).
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> Result<Subscription, TransportError>
    where
        F: Fn(&Twist, &MessageInfo) + Send + Sync + 'static,
    {
        if !is_valid_topic(topic) {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }
        let id = self.registry.write().insert(topic, Arc::new(callback));
        debug!("subscribed to [{}] (id={})", topic, id);
        Ok(Subscription {
            id,
            topic: topic.to_string(),
            registry: Arc::downgrade(&self.registry),
        })
    }

    /// Queue `msg` for delivery to every subscriber of `topic`.
    pub fn publish(&self, topic: &str, msg: Twist) -> Result<(), TransportError> {
        if !is_valid_topic(topic) {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }
        self.in_flight.begin();
        if self
            .tx_cmd
            .send(TransportCmd::Publish {
                topic: topic.to_string(),
                msg,
            })
            .is_err()
        {
            self.in_flight.end();
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Block until every published message has been dispatched or `timeout`
    /// elapses. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.in_flight.wait_idle(timeout)
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .topics
            .get(topic)
            .map_or(0, |subs| subs.len())
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }
}

impl Default for TransportNode {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Drop for TransportNode {
    fn drop(&mut self) {
        for _ in 0..self.handles.len() {
            let _ = self.tx_cmd.send(TransportCmd::Shutdown);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("transport dispatcher thread panicked");
            }
        }
    }
}

/// Entry point of one dispatcher thread.
///
/// Callbacks are cloned out of the registry before they run so that no
/// registry lock is held while subscriber code executes.
fn dispatch_thread(
    rx_cmd: Receiver<TransportCmd>,
    registry: Arc<RwLock<Registry>>,
    in_flight: Arc<InFlight>,
) {
    for cmd in rx_cmd.iter() {
        match cmd {
            TransportCmd::Publish { topic, msg } => {
                let callbacks = registry.read().callbacks(&topic);
                let info = MessageInfo::new(topic);
                for callback in callbacks {
                    callback(&msg, &info);
                }
                in_flight.end();
            }
            TransportCmd::Shutdown => break,
        }
    }
}

/// Normalize `raw` into a valid topic name.
///
/// Whitespace becomes `_`, characters outside `[A-Za-z0-9_/.-]` are removed,
/// repeated `/` collapse into one and trailing `/` are dropped. Returns `None`
/// when nothing valid remains.
pub fn as_valid_topic(raw: &str) -> Option<String> {
    let mut topic = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_whitespace() { '_' } else { c };
        if !(c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | '-')) {
            continue;
        }
        if c == '/' && topic.ends_with('/') {
            continue;
        }
        topic.push(c);
    }
    while topic.len() > 1 && topic.ends_with('/') {
        topic.pop();
    }
    if topic.is_empty() || topic == "/" {
        None
    } else {
        Some(topic)
    }
}

/// True if `topic` is already in normalized form.
pub fn is_valid_topic(topic: &str) -> bool {
    as_valid_topic(topic).as_deref() == Some(topic)
}

/// Return the first candidate that normalizes into a valid topic.
pub fn valid_topic<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for candidate in candidates {
        let candidate = candidate.as_ref();
        match as_valid_topic(candidate) {
            Some(topic) => {
                if topic != candidate {
                    warn!("Topic [{}] changed to valid topic [{}]", candidate, topic);
                }
                return Some(topic);
            }
            None => warn!("Topic [{}] is invalid, ignoring", candidate),
        }
    }
    None
}
