//! Outbox relay: moves committed outbox rows onto the broker.
//!
//! A row stays in flight after it is published until a worker settles it.
//! Rows left in flight by a previous run are published again on start.

use std::{sync::Arc, time::Duration};

use engine::Engine;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{PipelineError, Publisher};

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub interval: Duration,
    pub batch_size: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            batch_size: 100,
        }
    }
}

pub struct OutboxRelay {
    engine: Arc<Engine>,
    publisher: Publisher,
    config: RelayConfig,
}

impl OutboxRelay {
    #[must_use]
    pub fn new(engine: Arc<Engine>, publisher: Publisher, config: RelayConfig) -> Self {
        Self {
            engine,
            publisher,
            config,
        }
    }

    /// Publish one batch of pending rows in id order.
    ///
    /// A failed publish is recorded on its row and ends the batch, so later
    /// rows never overtake it. Returns how many rows were published.
    pub async fn run_once(&self) -> Result<usize, PipelineError> {
        let pending = self.engine.pending_outbox(self.config.batch_size).await?;
        let mut published = 0;
        for message in pending {
            match self.publisher.publish_outbox(&message).await {
                Ok(()) => {
                    self.engine.mark_outbox_published(message.id).await?;
                    published += 1;
                }
                Err(err) => {
                    warn!(
                        outbox_id = message.id,
                        channel = %message.channel,
                        attempts = message.attempts,
                        "publish failed: {err}"
                    );
                    self.engine
                        .mark_outbox_failed(message.id, &err.to_string())
                        .await?;
                    break;
                }
            }
        }
        Ok(published)
    }

    /// Make rows published by a previous run but never settled pending
    /// again. Call before any worker of this process consumes.
    pub async fn recover(&self) -> Result<u64, PipelineError> {
        Ok(self.engine.requeue_unsettled_outbox().await?)
    }

    /// Recover in-flight rows, then poll until the broker closes.
    pub async fn run(self) {
        if let Err(err) = self.recover().await {
            error!("outbox recovery failed: {err}");
        }
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "outbox relay started"
        );
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.publisher.broker().is_closed() {
                break;
            }
            loop {
                match self.run_once().await {
                    Ok(0) => break,
                    Ok(published) if published as u64 == self.config.batch_size => {
                        debug!(published, "outbox batch full, draining");
                    }
                    Ok(published) => {
                        debug!(published, "outbox batch relayed");
                        break;
                    }
                    Err(err) => {
                        error!("outbox relay failed: {err}");
                        break;
                    }
                }
            }
        }
        info!("outbox relay stopped");
    }
}
