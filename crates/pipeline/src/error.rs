use std::time::Duration;

use api_types::events::Channel;
use engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker is closed")]
    Closed,

    #[error("queue {0} already has a subscriber")]
    AlreadySubscribed(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed payload on {channel}: {source}")]
    Decode {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode event for {channel}: {source}")]
    Encode {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("handler did not finish within {0:?}")]
    Deadline(Duration),
}

/// What a worker does with a message whose handling failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Poison or invalid message: acknowledge it away.
    Drop,
    /// Transient failure: requeue after a backoff.
    Retry,
}

impl PipelineError {
    /// One policy per error kind, whatever the channel.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Decode { .. } | Self::Encode { .. } => Disposition::Drop,
            Self::Engine(err) if err.kind().is_retryable() => Disposition::Retry,
            Self::Engine(_) => Disposition::Drop,
            Self::Broker(_) | Self::Deadline(_) => Disposition::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_messages_are_dropped_and_outages_retried() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PipelineError::Decode {
            channel: Channel::TransactionCreated,
            source: decode,
        };
        assert_eq!(err.disposition(), Disposition::Drop);

        let err = PipelineError::from(EngineError::Forbidden);
        assert_eq!(err.disposition(), Disposition::Drop);

        let err = PipelineError::from(EngineError::KeyNotFound("budget".to_string()));
        assert_eq!(err.disposition(), Disposition::Drop);

        let outage = sea_orm::DbErr::Custom("connection refused".to_string());
        let err = PipelineError::from(EngineError::Database(outage));
        assert_eq!(err.disposition(), Disposition::Retry);

        let err = PipelineError::Deadline(Duration::from_secs(1));
        assert_eq!(err.disposition(), Disposition::Retry);
    }
}
