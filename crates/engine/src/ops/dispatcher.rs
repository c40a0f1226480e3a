//! Turns alert events into stored notifications, honouring the user's
//! settings.
//!
//! Suppressed events still commit, so defaults created on first contact are
//! kept.

use api_types::events::{
    BudgetExceeded, BudgetWarning, DomainEvent, LowBalance, NotificationCreated,
};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, TransactionTrait, prelude::*};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    BudgetExceededAlert, BudgetWarningAlert, Currency, LowBalanceAlert, Notification,
    NotificationPayload, ResultEngine, bank_accounts, budgets, notifications,
    util::{model_currency, require_id, require_user_id},
};

use super::{Engine, outbox::enqueue, settings::resolve_settings, with_tx};

/// Result of dispatching one alert event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Created(Uuid),
    Suppressed(SuppressReason),
}

/// Why an alert did not become a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressReason {
    BudgetAlertsDisabled,
    BalanceAlertsDisabled,
    /// The event's percent is below the user's own warning threshold.
    BelowUserWarningPercent,
    /// The balance is not below the user's own threshold.
    BalanceAboveThreshold,
}

impl SuppressReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BudgetAlertsDisabled => "budget alerts disabled",
            Self::BalanceAlertsDisabled => "balance alerts disabled",
            Self::BelowUserWarningPercent => "below user warning percent",
            Self::BalanceAboveThreshold => "balance above user threshold",
        }
    }
}

async fn budget_currency(db: &DatabaseTransaction, budget_id: Uuid) -> ResultEngine<Currency> {
    match budgets::Entity::find_by_id(budget_id.to_string()).one(db).await? {
        Some(model) => model_currency(&model.currency),
        None => Ok(Currency::default()),
    }
}

async fn bank_account_currency(
    db: &DatabaseTransaction,
    bank_account_id: Uuid,
) -> ResultEngine<Currency> {
    match bank_accounts::Entity::find_by_id(bank_account_id.to_string())
        .one(db)
        .await?
    {
        Some(model) => model_currency(&model.currency),
        None => Ok(Currency::default()),
    }
}

/// Store the notification and queue its `notification` event.
async fn create_notification(
    db: &DatabaseTransaction,
    user_id: &str,
    payload: NotificationPayload,
) -> ResultEngine<Dispatch> {
    let notification = Notification::new(user_id.to_string(), payload);
    notifications::ActiveModel::try_from(&notification)?
        .insert(db)
        .await?;

    let event = DomainEvent::Notification(NotificationCreated {
        notification_id: notification.id,
        user_id: notification.user_id.clone(),
        kind: notification.kind(),
        title: notification.title.clone(),
        message: notification.message.clone(),
        data: notification.payload.to_data()?,
        priority: notification.priority,
        timestamp: notification.created_at,
    });
    enqueue(db, &event).await?;

    info!(
        user_id,
        notification_id = %notification.id,
        kind = notification.kind().as_str(),
        "notification created"
    );
    Ok(Dispatch::Created(notification.id))
}

fn suppressed(user_id: &str, reason: SuppressReason) -> ResultEngine<Dispatch> {
    debug!(user_id, reason = reason.as_str(), "notification suppressed");
    Ok(Dispatch::Suppressed(reason))
}

impl Engine {
    pub async fn dispatch_budget_exceeded(&self, event: &BudgetExceeded) -> ResultEngine<Dispatch> {
        let user_id = require_user_id(&event.user_id)?;
        require_id(event.budget_id, "budget")?;
        with_tx!(self, |db_tx| {
            let settings = resolve_settings(&db_tx, user_id).await?;
            if !settings.budget_alerts_enabled {
                suppressed(user_id, SuppressReason::BudgetAlertsDisabled)
            } else {
                let currency = budget_currency(&db_tx, event.budget_id).await?;
                let payload = NotificationPayload::BudgetExceeded(BudgetExceededAlert {
                    budget_id: event.budget_id,
                    budget_name: event.budget_name.clone(),
                    category_id: event.category_id,
                    currency,
                    budget_amount_minor: event.budget_amount_minor,
                    spent_amount_minor: event.spent_amount_minor,
                    excess_amount_minor: event.excess_amount_minor,
                });
                create_notification(&db_tx, user_id, payload).await
            }
        })
    }

    pub async fn dispatch_budget_warning(&self, event: &BudgetWarning) -> ResultEngine<Dispatch> {
        let user_id = require_user_id(&event.user_id)?;
        require_id(event.budget_id, "budget")?;
        with_tx!(self, |db_tx| {
            let settings = resolve_settings(&db_tx, user_id).await?;
            if !settings.budget_alerts_enabled {
                suppressed(user_id, SuppressReason::BudgetAlertsDisabled)
            } else if event.warning_percent < f64::from(settings.budget_warning_percent) {
                suppressed(user_id, SuppressReason::BelowUserWarningPercent)
            } else {
                let currency = budget_currency(&db_tx, event.budget_id).await?;
                let payload = NotificationPayload::BudgetWarning(BudgetWarningAlert {
                    budget_id: event.budget_id,
                    budget_name: event.budget_name.clone(),
                    category_id: event.category_id,
                    currency,
                    budget_amount_minor: event.budget_amount_minor,
                    spent_amount_minor: event.spent_amount_minor,
                    warning_percent: event.warning_percent,
                });
                create_notification(&db_tx, user_id, payload).await
            }
        })
    }

    pub async fn dispatch_low_balance(&self, event: &LowBalance) -> ResultEngine<Dispatch> {
        let user_id = require_user_id(&event.user_id)?;
        require_id(event.bank_account_id, "bank account")?;
        with_tx!(self, |db_tx| {
            let settings = resolve_settings(&db_tx, user_id).await?;
            if !settings.balance_alerts_enabled {
                suppressed(user_id, SuppressReason::BalanceAlertsDisabled)
            } else if event.current_balance_minor >= settings.low_balance_threshold_minor {
                suppressed(user_id, SuppressReason::BalanceAboveThreshold)
            } else {
                let currency = bank_account_currency(&db_tx, event.bank_account_id).await?;
                let payload = NotificationPayload::LowBalance(LowBalanceAlert {
                    bank_account_id: event.bank_account_id,
                    account_name: event.account_name.clone(),
                    currency,
                    current_balance_minor: event.current_balance_minor,
                    threshold_minor: settings.low_balance_threshold_minor,
                });
                create_notification(&db_tx, user_id, payload).await
            }
        })
    }
}
