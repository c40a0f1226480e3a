//! Durable queue of events waiting to be relayed to the broker.
//!
//! Rows are written in the same database transaction as the state change that
//! produced them. A row moves through three stamps:
//!
//! - `published_at`: the relay handed it to the broker;
//! - `settled_at`: a worker is done with it, successfully or not;
//! - `dead_lettered_at`: the worker gave up after exhausting its retries.
//!
//! A published row without `settled_at` is still in flight. If the process
//! stops before it settles, the relay publishes it again on the next start.

use api_types::events::{Channel, DomainEvent};
use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};

use crate::{EngineError, ResultEngine};

/// An outbox row as handed to the relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboxMessage {
    pub id: i64,
    pub channel: Channel,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub created_at: DateTimeUtc,
    pub published_at: Option<DateTimeUtc>,
    pub settled_at: Option<DateTimeUtc>,
    pub dead_lettered_at: Option<DateTimeUtc>,
    pub attempts: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn for_event(event: &DomainEvent) -> ResultEngine<Self> {
        Ok(Self {
            id: ActiveValue::NotSet,
            channel: ActiveValue::Set(event.channel().as_str().to_string()),
            payload: ActiveValue::Set(event.to_json()?),
            created_at: ActiveValue::Set(Utc::now()),
            published_at: ActiveValue::Set(None),
            settled_at: ActiveValue::Set(None),
            dead_lettered_at: ActiveValue::Set(None),
            attempts: ActiveValue::Set(0),
            last_error: ActiveValue::Set(None),
        })
    }
}

impl TryFrom<Model> for OutboxMessage {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            channel: Channel::try_from(model.channel.as_str()).map_err(EngineError::InvalidInput)?,
            payload: model.payload,
            created_at: model.created_at,
            attempts: model.attempts,
            last_error: model.last_error,
        })
    }
}
