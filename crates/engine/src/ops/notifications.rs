use api_types::notification::NotificationList;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    EngineError, Notification, ResultEngine, notifications,
    util::{require_id, require_user_id},
};

use super::{Engine, with_tx};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct NotificationsCursor {
    created_at: DateTime<Utc>,
    notification_id: String,
}

impl NotificationsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid notifications cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid notifications cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid notifications cursor".to_string()))
    }
}

async fn require_notification_owned(
    db: &DatabaseTransaction,
    user_id: &str,
    id: Uuid,
) -> ResultEngine<notifications::Model> {
    let model = notifications::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("notification not exists".to_string()))?;
    if model.user_id != user_id {
        return Err(EngineError::Forbidden);
    }
    Ok(model)
}

impl Engine {
    /// Notifications of a user, newest first, with cursor-based pagination.
    pub async fn list_notifications_page(
        &self,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
        unread_only: bool,
    ) -> ResultEngine<NotificationList> {
        let user_id = require_user_id(user_id)?;
        if limit == 0 {
            return Err(EngineError::InvalidInput("limit must be > 0".to_string()));
        }
        with_tx!(self, |db_tx| {
            let mut query = notifications::Entity::find()
                .filter(notifications::Column::UserId.eq(user_id))
                .order_by_desc(notifications::Column::CreatedAt)
                .order_by_desc(notifications::Column::Id)
                .limit(limit.saturating_add(1));
            if unread_only {
                query = query.filter(notifications::Column::IsRead.eq(false));
            }
            if let Some(cursor) = cursor {
                let cursor = NotificationsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(notifications::Column::CreatedAt.lt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(notifications::Column::CreatedAt.eq(cursor.created_at))
                                .add(notifications::Column::Id.lt(cursor.notification_id)),
                        ),
                );
            }

            let rows = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut items = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                items.push(Notification::try_from(model)?);
            }
            let next_cursor = if has_more {
                items
                    .last()
                    .map(|n| NotificationsCursor {
                        created_at: n.created_at,
                        notification_id: n.id.to_string(),
                    })
                    .map(|c| c.encode())
                    .transpose()?
            } else {
                None
            };

            let notifications = items
                .iter()
                .map(Notification::view)
                .collect::<ResultEngine<Vec<_>>>()?;
            Ok(NotificationList {
                notifications,
                next_cursor,
            })
        })
    }

    pub async fn notification(&self, user_id: &str, id: Uuid) -> ResultEngine<Notification> {
        let user_id = require_user_id(user_id)?;
        require_id(id, "notification")?;
        with_tx!(self, |db_tx| {
            let model = require_notification_owned(&db_tx, user_id, id).await?;
            Notification::try_from(model)
        })
    }

    pub async fn mark_notification_read(&self, user_id: &str, id: Uuid) -> ResultEngine<()> {
        let user_id = require_user_id(user_id)?;
        require_id(id, "notification")?;
        with_tx!(self, |db_tx| {
            require_notification_owned(&db_tx, user_id, id).await?;
            notifications::Entity::update_many()
                .col_expr(notifications::Column::IsRead, Expr::value(true))
                .col_expr(notifications::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(notifications::Column::Id.eq(id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Marks every unread notification of the user as read and returns how
    /// many changed.
    pub async fn mark_all_notifications_read(&self, user_id: &str) -> ResultEngine<u64> {
        let user_id = require_user_id(user_id)?;
        with_tx!(self, |db_tx| {
            let result = notifications::Entity::update_many()
                .col_expr(notifications::Column::IsRead, Expr::value(true))
                .col_expr(notifications::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(notifications::Column::UserId.eq(user_id))
                .filter(notifications::Column::IsRead.eq(false))
                .exec(&db_tx)
                .await?;
            debug!(user_id, updated = result.rows_affected, "notifications marked read");
            Ok(result.rows_affected)
        })
    }

    pub async fn unread_count(&self, user_id: &str) -> ResultEngine<u64> {
        let user_id = require_user_id(user_id)?;
        notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .count(&self.database)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_rejects_foreign_payload() {
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{\"x\":1}");
        assert!(matches!(
            NotificationsCursor::decode(&encoded),
            Err(EngineError::InvalidCursor(_))
        ));
    }
}
