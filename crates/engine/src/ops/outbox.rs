use api_types::events::DomainEvent;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    prelude::*, sea_query::Expr,
};
use tracing::{debug, info};

use crate::{EngineError, OutboxMessage, ResultEngine, outbox};

use super::Engine;

/// Append `event` to the outbox as part of the caller's transaction.
pub(super) async fn enqueue(db: &DatabaseTransaction, event: &DomainEvent) -> ResultEngine<()> {
    let model = outbox::ActiveModel::for_event(event)?.insert(db).await?;
    debug!(outbox_id = model.id, channel = %event.channel(), "event queued");
    Ok(())
}

fn require_updated(rows_affected: u64, id: i64) -> ResultEngine<()> {
    if rows_affected == 0 {
        return Err(EngineError::KeyNotFound(format!("outbox {id}")));
    }
    Ok(())
}

impl Engine {
    /// Oldest rows not yet handed to the broker, in id order.
    pub async fn pending_outbox(&self, limit: u64) -> ResultEngine<Vec<OutboxMessage>> {
        let rows = outbox::Entity::find()
            .filter(outbox::Column::PublishedAt.is_null())
            .filter(outbox::Column::SettledAt.is_null())
            .order_by_asc(outbox::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;
        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    pub async fn mark_outbox_published(&self, id: i64) -> ResultEngine<()> {
        let result = outbox::Entity::update_many()
            .col_expr(outbox::Column::PublishedAt, Expr::value(Utc::now()))
            .col_expr(
                outbox::Column::Attempts,
                Expr::col(outbox::Column::Attempts).add(1),
            )
            .filter(outbox::Column::Id.eq(id))
            .exec(&self.database)
            .await?;
        require_updated(result.rows_affected, id)
    }

    /// Record a failed publish; the row stays pending.
    pub async fn mark_outbox_failed(&self, id: i64, error: &str) -> ResultEngine<()> {
        let result = outbox::Entity::update_many()
            .col_expr(
                outbox::Column::Attempts,
                Expr::col(outbox::Column::Attempts).add(1),
            )
            .col_expr(outbox::Column::LastError, Expr::value(error.to_string()))
            .filter(outbox::Column::Id.eq(id))
            .exec(&self.database)
            .await?;
        require_updated(result.rows_affected, id)
    }

    /// A worker is done with the row. `error` is set when the message was
    /// dropped instead of handled.
    pub async fn mark_outbox_settled(&self, id: i64, error: Option<&str>) -> ResultEngine<()> {
        let mut update = outbox::Entity::update_many()
            .col_expr(outbox::Column::SettledAt, Expr::value(Utc::now()))
            .filter(outbox::Column::Id.eq(id));
        if let Some(error) = error {
            update = update.col_expr(outbox::Column::LastError, Expr::value(error.to_string()));
        }
        let result = update.exec(&self.database).await?;
        require_updated(result.rows_affected, id)
    }

    /// The worker gave up on the row after exhausting its retries.
    pub async fn mark_outbox_dead_lettered(&self, id: i64, reason: &str) -> ResultEngine<()> {
        let now = Utc::now();
        let result = outbox::Entity::update_many()
            .col_expr(outbox::Column::SettledAt, Expr::value(now))
            .col_expr(outbox::Column::DeadLetteredAt, Expr::value(now))
            .col_expr(outbox::Column::LastError, Expr::value(reason.to_string()))
            .filter(outbox::Column::Id.eq(id))
            .exec(&self.database)
            .await?;
        require_updated(result.rows_affected, id)
    }

    /// Make every published but unsettled row pending again.
    ///
    /// Only valid while no worker is consuming: the relay calls it once on
    /// start, before publishing anything.
    pub async fn requeue_unsettled_outbox(&self) -> ResultEngine<u64> {
        let result = outbox::Entity::update_many()
            .col_expr(
                outbox::Column::PublishedAt,
                Expr::value(Option::<DateTimeUtc>::None),
            )
            .filter(outbox::Column::PublishedAt.is_not_null())
            .filter(outbox::Column::SettledAt.is_null())
            .exec(&self.database)
            .await?;
        if result.rows_affected > 0 {
            info!(rows = result.rows_affected, "in-flight outbox rows requeued");
        }
        Ok(result.rows_affected)
    }

    /// Rows no worker has finished with yet, published or not.
    pub async fn outbox_backlog(&self) -> ResultEngine<u64> {
        let count = outbox::Entity::find()
            .filter(outbox::Column::SettledAt.is_null())
            .count(&self.database)
            .await?;
        Ok(count)
    }

    /// Dead-lettered rows in id order, with the reason in `last_error`.
    pub async fn dead_lettered_outbox(&self, limit: u64) -> ResultEngine<Vec<OutboxMessage>> {
        let rows = outbox::Entity::find()
            .filter(outbox::Column::DeadLetteredAt.is_not_null())
            .order_by_asc(outbox::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;
        rows.into_iter().map(OutboxMessage::try_from).collect()
    }
}
