//! Event pipeline for fincore.
//!
//! The [`OutboxRelay`] publishes the engine's outbox rows on the in-process
//! [`Broker`]; one [`Worker`] per channel consumes them and calls back into
//! the engine (budget evaluation, notification dispatch) and settles the
//! message's outbox row once it is done with it.

pub use broker::{Broker, Delivery, Subscription, dead_letter_queue};
pub use error::{BrokerError, Disposition, PipelineError};
pub use publisher::Publisher;
pub use relay::{OutboxRelay, RelayConfig};
pub use worker::{Worker, WorkerConfig};

mod broker;
mod error;
mod handlers;
mod publisher;
mod relay;
mod worker;
