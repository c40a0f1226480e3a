use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};
use tracing::info;

use crate::{
    EngineError, NotificationSettings, ResultEngine, SettingsUpdate, settings,
    util::require_user_id,
};

use super::{Engine, with_tx};

/// Persisted settings, or the defaults without storing them.
pub(super) async fn settings_or_defaults<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> ResultEngine<NotificationSettings> {
    match settings::Entity::find_by_id(user_id.to_string()).one(db).await? {
        Some(model) => NotificationSettings::try_from(model),
        None => Ok(NotificationSettings::defaults(user_id)),
    }
}

/// Persisted settings, creating the defaults on first access.
pub(super) async fn resolve_settings(
    db: &DatabaseTransaction,
    user_id: &str,
) -> ResultEngine<NotificationSettings> {
    if let Some(model) = settings::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
    {
        return NotificationSettings::try_from(model);
    }

    let defaults = NotificationSettings::defaults(user_id);
    let inserted = settings::Entity::insert(settings::ActiveModel::from(&defaults))
        .on_conflict(
            OnConflict::column(settings::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    if inserted == 0 {
        // Someone else created them in the meantime.
        let model = settings::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("notification settings".to_string()))?;
        return NotificationSettings::try_from(model);
    }
    info!(user_id, "default notification settings created");
    Ok(defaults)
}

fn validate_update(update: &SettingsUpdate) -> ResultEngine<()> {
    if !(0..=100).contains(&update.budget_warning_percent) {
        return Err(EngineError::InvalidInput(
            "budget warning percent must be between 0 and 100".to_string(),
        ));
    }
    if update.low_balance_threshold_minor < 0 {
        return Err(EngineError::InvalidInput(
            "low balance threshold must be >= 0".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    /// Notification settings of `user_id`; defaults are stored on first read.
    pub async fn notification_settings(&self, user_id: &str) -> ResultEngine<NotificationSettings> {
        let user_id = require_user_id(user_id)?;
        with_tx!(self, |db_tx| resolve_settings(&db_tx, user_id).await)
    }

    /// Replace the settings of `user_id`.
    pub async fn save_notification_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> ResultEngine<NotificationSettings> {
        let user_id = require_user_id(user_id)?;
        validate_update(&update)?;
        with_tx!(self, |db_tx| {
            let mut current = resolve_settings(&db_tx, user_id).await?;
            current.budget_alerts_enabled = update.budget_alerts_enabled;
            current.balance_alerts_enabled = update.balance_alerts_enabled;
            current.budget_warning_percent = update.budget_warning_percent;
            current.low_balance_threshold_minor = update.low_balance_threshold_minor;
            current.preferred_channel = update.preferred_channel;
            current.updated_at = Utc::now();

            let mut model = settings::ActiveModel::from(&current);
            model.created_at = ActiveValue::Unchanged(current.created_at);
            model.update(&db_tx).await?;
            Ok(current)
        })
    }
}
