use api_types::events::DomainEvent;
use engine::OutboxMessage;
use tracing::debug;

use crate::{Broker, PipelineError};

/// Hands domain events to their channel on the broker.
#[derive(Clone, Debug)]
pub struct Publisher {
    broker: Broker,
}

impl Publisher {
    #[must_use]
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Serialize `event` and publish it on its channel.
    pub async fn publish(&self, event: &DomainEvent) -> Result<(), PipelineError> {
        let channel = event.channel();
        let payload = event
            .to_json()
            .map_err(|source| PipelineError::Encode { channel, source })?;
        debug!(%channel, user_id = event.user_id(), "publishing event");
        self.broker
            .publish(channel.as_str(), payload.into_bytes())
            .await?;
        Ok(())
    }

    /// Publish an outbox row as stored, tagged with its id so the consuming
    /// worker can settle it.
    pub async fn publish_outbox(&self, message: &OutboxMessage) -> Result<(), PipelineError> {
        self.broker
            .publish_with_id(
                message.channel.as_str(),
                message.payload.clone().into_bytes(),
                message.id,
            )
            .await?;
        Ok(())
    }
}
