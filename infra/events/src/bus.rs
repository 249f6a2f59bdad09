use crate::args::EventArgs;
use crate::error::EventBusError;
use fxhash::FxHashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default capacity of the broadcast tap.
const DEFAULT_TAP_CAPACITY: usize = 128;
/// Default bound of pending posts.
const DEFAULT_MAX_QUEUE: usize = 10_000;

/// Identifies one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandlerKey(u64);

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an event was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// Handlers see the original arguments.
    Standard,
    /// Handlers may replace the arguments seen by later handlers and the callback.
    Relay,
    /// Runs a callback once every handler has been called.
    Queue,
}

/// An event as seen by tap subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedEvent {
    pub seq: u64,
    pub name: String,
    pub kind: PostKind,
    pub args: EventArgs,
}

/// One handler registration.
#[derive(Debug, Clone)]
pub struct Registration<H> {
    pub key: HandlerKey,
    pub priority: i32,
    pub handler: H,
}

/// A popped event with the handlers registered for it at pop time.
///
/// Handlers are ordered by descending priority, ties in registration order.
#[derive(Debug)]
pub struct Dispatch<H> {
    pub name: String,
    pub kind: PostKind,
    pub args: EventArgs,
    pub callback: Option<H>,
    pub handlers: Vec<Registration<H>>,
}

#[derive(Debug)]
struct Pending<H> {
    name: String,
    kind: PostKind,
    args: EventArgs,
    callback: Option<H>,
}

/// A named event queue with prioritized handlers.
///
/// The bus never calls handlers itself: `H` is plain data and the owner pops
/// [`Dispatch`]es and routes each registration. This keeps handler code free to
/// mutate the owner while the bus is borrowed only between calls.
///
/// Event names are case-insensitive.
#[derive(Debug)]
pub struct EventBus<H> {
    handlers: FxHashMap<String, Vec<Registration<H>>>,
    keys: FxHashMap<HandlerKey, String>,
    queue: VecDeque<Pending<H>>,
    next_key: u64,
    seq: u64,
    max_queue: usize,
    tap: broadcast::Sender<Arc<PostedEvent>>,
}

impl<H: Clone + PartialEq + Debug> Default for EventBus<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone + PartialEq + Debug> EventBus<H> {
    #[must_use]
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(DEFAULT_TAP_CAPACITY);
        Self {
            handlers: FxHashMap::default(),
            keys: FxHashMap::default(),
            queue: VecDeque::new(),
            next_key: 0,
            seq: 0,
            max_queue: DEFAULT_MAX_QUEUE,
            tap,
        }
    }

    /// Creates a bus whose tap buffers `capacity` events per subscriber.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidCapacity`] if `capacity` is zero.
    pub fn with_tap_capacity(capacity: usize) -> Result<Self, EventBusError> {
        if capacity == 0 {
            return Err(EventBusError::InvalidCapacity {
                message: "tap capacity must be greater than zero".into(),
                context: None,
            });
        }
        let (tap, _) = broadcast::channel(capacity);
        Ok(Self { tap, ..Self::new() })
    }

    /// Sets the bound on pending posts.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidCapacity`] if `max` is zero.
    pub fn set_max_queue(&mut self, max: usize) -> Result<(), EventBusError> {
        if max == 0 {
            return Err(EventBusError::InvalidCapacity {
                message: "queue bound must be greater than zero".into(),
                context: None,
            });
        }
        self.max_queue = max;
        Ok(())
    }

    /// Registers `handler` for `event`.
    ///
    /// Registering a handler equal to one already attached to the same event keeps a
    /// single registration, moved to the new priority, and returns its original key.
    pub fn add_handler(&mut self, event: &str, handler: H, priority: i32) -> HandlerKey {
        let event = event.to_lowercase();
        let list = self.handlers.entry(event.clone()).or_default();

        if let Some(existing) = list.iter_mut().find(|r| r.handler == handler) {
            existing.priority = priority;
            let key = existing.key;
            list.sort_by_key(|r| std::cmp::Reverse(r.priority));
            return key;
        }

        let key = HandlerKey(self.next_key);
        self.next_key += 1;
        list.push(Registration { key, priority, handler });
        list.sort_by_key(|r| std::cmp::Reverse(r.priority));
        self.keys.insert(key, event.clone());
        trace!(event = %event, key = %key, priority, "Handler registered");
        key
    }

    /// Removes every registration equal to `handler`, on any event.
    ///
    /// Returns the number of registrations removed.
    pub fn remove_handler(&mut self, handler: &H) -> usize {
        let mut removed = Vec::new();
        self.handlers.retain(|_, list| {
            list.retain(|r| {
                let hit = r.handler == *handler;
                if hit {
                    removed.push(r.key);
                }
                !hit
            });
            !list.is_empty()
        });
        for key in &removed {
            self.keys.remove(key);
        }
        removed.len()
    }

    /// Removes one registration. Returns `false` for unknown or already removed keys.
    pub fn remove_handler_by_key(&mut self, key: HandlerKey) -> bool {
        let Some(event) = self.keys.remove(&key) else {
            return false;
        };
        if let Some(list) = self.handlers.get_mut(&event) {
            list.retain(|r| r.key != key);
            if list.is_empty() {
                self.handlers.remove(&event);
            }
        }
        true
    }

    pub fn remove_handlers_by_keys(&mut self, keys: impl IntoIterator<Item = HandlerKey>) {
        for key in keys {
            self.remove_handler_by_key(key);
        }
    }

    #[must_use]
    pub fn is_registered(&self, key: HandlerKey) -> bool {
        self.keys.contains_key(&key)
    }

    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(&event.to_lowercase()).map_or(0, Vec::len)
    }

    /// Whether `handler` is currently attached to `event`.
    #[must_use]
    pub fn has_handler(&self, event: &str, handler: &H) -> bool {
        self.handlers
            .get(&event.to_lowercase())
            .is_some_and(|list| list.iter().any(|r| r.handler == *handler))
    }

    /// Queues a standard event.
    ///
    /// # Errors
    /// Returns [`EventBusError::QueueFull`] when the pending queue is at its bound.
    pub fn post(&mut self, event: &str, args: EventArgs) -> Result<(), EventBusError> {
        self.enqueue(event, PostKind::Standard, args, None)
    }

    /// Queues a relay event with an optional callback.
    ///
    /// # Errors
    /// Returns [`EventBusError::QueueFull`] when the pending queue is at its bound.
    pub fn post_relay(
        &mut self,
        event: &str,
        args: EventArgs,
        callback: Option<H>,
    ) -> Result<(), EventBusError> {
        self.enqueue(event, PostKind::Relay, args, callback)
    }

    /// Queues an event whose `callback` runs after all of its handlers.
    ///
    /// # Errors
    /// Returns [`EventBusError::QueueFull`] when the pending queue is at its bound.
    pub fn post_queue(
        &mut self,
        event: &str,
        args: EventArgs,
        callback: H,
    ) -> Result<(), EventBusError> {
        self.enqueue(event, PostKind::Queue, args, Some(callback))
    }

    fn enqueue(
        &mut self,
        event: &str,
        kind: PostKind,
        args: EventArgs,
        callback: Option<H>,
    ) -> Result<(), EventBusError> {
        if self.queue.len() >= self.max_queue {
            return Err(EventBusError::QueueFull {
                message: format!("{} pending events", self.queue.len()).into(),
                context: Some(format!("posting '{event}'").into()),
            });
        }

        let name = event.to_lowercase();
        self.seq += 1;
        debug!(event = %name, kind = ?kind, args = ?args, "Event posted");

        if self.tap.receiver_count() > 0 {
            let posted =
                PostedEvent { seq: self.seq, name: name.clone(), kind, args: args.clone() };
            if self.tap.send(Arc::new(posted)).is_err() {
                trace!(event = %name, "Tap subscribers dropped");
            }
        }

        self.queue.push_back(Pending { name, kind, args, callback });
        Ok(())
    }

    /// Pops the oldest pending event with a snapshot of its handlers.
    pub fn pop(&mut self) -> Option<Dispatch<H>> {
        let pending = self.queue.pop_front()?;
        let handlers = self.handlers.get(&pending.name).cloned().unwrap_or_default();
        trace!(event = %pending.name, handlers = handlers.len(), "Dispatching event");
        Some(Dispatch {
            name: pending.name,
            kind: pending.kind,
            args: pending.args,
            callback: pending.callback,
            handlers,
        })
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Subscribes to every posted event.
    #[must_use]
    pub fn tap(&self) -> broadcast::Receiver<Arc<PostedEvent>> {
        self.tap.subscribe()
    }
}
