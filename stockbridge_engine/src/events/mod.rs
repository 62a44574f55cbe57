//! Order lifecycle events.
//!
//! The engine publishes an event whenever an order is first recorded or changes status. Subscribers (the Discord
//! notifier, for instance) register async hooks with [`EventHooks`] and receive events on their own tasks, so a slow
//! subscriber never holds up intake.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
