//! # Event Bus
//!
//! A named event queue in the style of a pinball machine's event manager.
//!
//! ## Overview
//!
//! * Handlers attach to event names with a priority; higher priorities run first.
//! * `post`, `post_relay` and `post_queue` enqueue events. The owner pops
//!   [`Dispatch`]es in FIFO order, so events posted while another is being handled
//!   run after it.
//! * Relay events let each handler replace the arguments seen by the next one.
//! * Every post is mirrored on a `tokio` broadcast tap for observers.
//!
//! # Example
//!
//! ```rust
//! use pinrig_events::{EventArgs, EventBus, EventReceiverExt};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Handler { CountBalls }
//!
//! let mut bus = EventBus::new();
//! let mut tap = bus.tap();
//! bus.add_handler("sw_trough", Handler::CountBalls, 1);
//! bus.post("sw_trough", EventArgs::new().with("balls", 1)).unwrap();
//!
//! let dispatch = bus.pop().unwrap();
//! assert_eq!(dispatch.handlers[0].handler, Handler::CountBalls);
//! assert_eq!(tap.drain()[0].name, "sw_trough");
//! ```

mod args;
mod bus;
mod error;
mod receiver;

pub use args::EventArgs;
pub use bus::{Dispatch, EventBus, HandlerKey, PostKind, PostedEvent, Registration};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
