//! One long-lived consumer per channel.
//!
//! Messages of a channel are handled one at a time in arrival order. Each
//! handler runs under a deadline; the outcome decides between ack, drop,
//! delayed requeue and dead-lettering. Messages relayed from the outbox are
//! settled on their durable row before they are acknowledged.

use std::{sync::Arc, time::Duration};

use api_types::events::{Channel, DomainEvent};
use engine::Engine;
use tracing::{debug, error, info, warn};

use crate::{Broker, Delivery, Disposition, PipelineError, handlers};

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Upper bound for handling one message.
    pub deadline: Duration,
    /// Deliveries before a retryable message is dead-lettered.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5),
            max_attempts: 5,
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// `base × 2^attempt`, capped at `backoff_max`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.backoff_max)
    }
}

pub struct Worker {
    channel: Channel,
    engine: Arc<Engine>,
    broker: Broker,
    config: WorkerConfig,
}

impl Worker {
    #[must_use]
    pub fn new(channel: Channel, engine: Arc<Engine>, broker: Broker, config: WorkerConfig) -> Self {
        Self {
            channel,
            engine,
            broker,
            config,
        }
    }

    /// Consume the channel until the broker closes.
    pub async fn run(self) -> Result<(), PipelineError> {
        let mut subscription = self.broker.subscribe(self.channel.as_str()).await?;
        info!(channel = %self.channel, "worker started");
        while let Some(delivery) = subscription.next().await {
            self.process(delivery).await;
        }
        info!(channel = %self.channel, "worker stopped");
        Ok(())
    }

    async fn process(&self, delivery: Delivery) {
        let attempt = delivery.attempt();
        let handled = tokio::time::timeout(self.config.deadline, self.handle(delivery.payload()));
        let result = match handled.await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Deadline(self.config.deadline)),
        };
        // The durable row is settled before the in-memory ack.
        let result = match result {
            Ok(()) => self.settle(&delivery, None).await,
            Err(err) => Err(err),
        };

        let err = match result {
            Ok(()) => {
                delivery.ack();
                return;
            }
            Err(err) => err,
        };

        match err.disposition() {
            Disposition::Drop => {
                warn!(channel = %self.channel, attempt, "dropping message: {err}");
                if let Err(settle_err) = self.settle(&delivery, Some(&err.to_string())).await {
                    error!(channel = %self.channel, "cannot settle dropped message: {settle_err}");
                }
                delivery.nack(false).await;
            }
            Disposition::Retry if attempt.saturating_add(1) >= self.config.max_attempts => {
                error!(channel = %self.channel, attempt, "giving up on message: {err}");
                let reason = err.to_string();
                if let Some(id) = delivery.message_id() {
                    if let Err(mark_err) = self.engine.mark_outbox_dead_lettered(id, &reason).await {
                        error!(channel = %self.channel, outbox_id = id, "cannot record dead letter: {mark_err}");
                    }
                }
                self.broker.dead_letter(delivery, &reason).await;
            }
            Disposition::Retry => {
                let delay = self.config.backoff(attempt);
                warn!(
                    channel = %self.channel,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying message: {err}"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => delivery.nack(true).await,
                    () = self.broker.closed() => {
                        // Left unsettled: the relay publishes it again on the next start.
                        info!(
                            channel = %self.channel,
                            outbox_id = ?delivery.message_id(),
                            "shutdown during backoff, message left in flight"
                        );
                    }
                }
            }
        }
    }

    /// Stamp the outbox row of `delivery` as settled. Messages published
    /// outside the outbox have nothing to settle.
    async fn settle(&self, delivery: &Delivery, error: Option<&str>) -> Result<(), PipelineError> {
        if let Some(id) = delivery.message_id() {
            self.engine.mark_outbox_settled(id, error).await?;
        }
        Ok(())
    }

    async fn handle(&self, payload: &[u8]) -> Result<(), PipelineError> {
        let event = DomainEvent::decode(self.channel, payload).map_err(|source| {
            PipelineError::Decode {
                channel: self.channel,
                source,
            }
        })?;
        debug!(channel = %self.channel, user_id = event.user_id(), "handling event");
        handlers::handle(&self.engine, event).await
    }
}
