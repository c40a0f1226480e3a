//! Budget evaluation for newly recorded transactions.
//!
//! Each `transaction_created` event is checked against the budget of its
//! category for the current month. Spend is always re-aggregated from the
//! ledger, never taken from the event. Emitted alerts go to the outbox.

use api_types::events::{BudgetExceeded, BudgetWarning, DomainEvent, TransactionCreated};
use chrono::{DateTime, Datelike, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*, sea_query::OnConflict,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    AlertLevel, Budget, ResultEngine, budget_alert_marks,
    budgets::percent_of,
    util::month_bounds,
};

use super::{
    Engine, budgets::find_active_budget, outbox::enqueue,
    transactions::sum_abs_expense_for_category, with_tx,
};

/// Outcome of evaluating one transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum BudgetEvaluation {
    /// Income or transfer credit: nothing to check.
    NotAnExpense,
    /// No category, or no active budget for the category this month.
    NoBudget,
    /// The budget belongs to another account than the event's user.
    AccountMismatch { budget_id: Uuid },
    /// Below the warning threshold.
    UnderThreshold { budget_id: Uuid, spent_minor: i64 },
    /// This level was already emitted for the period.
    AlreadyAlerted { budget_id: Uuid, level: AlertLevel },
    Warning(BudgetWarning),
    Exceeded(BudgetExceeded),
}

impl BudgetEvaluation {
    /// The event queued by this evaluation, if any.
    #[must_use]
    pub fn emitted(&self) -> Option<DomainEvent> {
        match self {
            Self::Warning(event) => Some(DomainEvent::BudgetWarning(event.clone())),
            Self::Exceeded(event) => Some(DomainEvent::BudgetExceeded(event.clone())),
            _ => None,
        }
    }
}

/// Builds the alert for `budget` at `spent_minor`, or `None` below the
/// warning threshold.
fn alert_for(
    user_id: &str,
    budget: &Budget,
    spent_minor: i64,
    now: DateTime<Utc>,
) -> Option<BudgetEvaluation> {
    match AlertLevel::for_spend(spent_minor, budget.limit_minor) {
        AlertLevel::Quiet => None,
        AlertLevel::Exceeded => Some(BudgetEvaluation::Exceeded(BudgetExceeded {
            user_id: user_id.to_string(),
            budget_id: budget.id,
            budget_name: budget.name.clone(),
            budget_amount_minor: budget.limit_minor,
            spent_amount_minor: spent_minor,
            excess_amount_minor: spent_minor - budget.limit_minor,
            category_id: budget.category_id,
            timestamp: now,
        })),
        AlertLevel::Warning => Some(BudgetEvaluation::Warning(BudgetWarning {
            user_id: user_id.to_string(),
            budget_id: budget.id,
            budget_name: budget.name.clone(),
            budget_amount_minor: budget.limit_minor,
            spent_amount_minor: spent_minor,
            warning_percent: percent_of(spent_minor, budget.limit_minor),
            category_id: budget.category_id,
            timestamp: now,
        })),
    }
}

impl Engine {
    /// Evaluate the budget touched by `event` for the month containing `now`.
    pub async fn evaluate_transaction(
        &self,
        event: &TransactionCreated,
        now: DateTime<Utc>,
    ) -> ResultEngine<BudgetEvaluation> {
        if event.amount_minor >= 0 {
            return Ok(BudgetEvaluation::NotAnExpense);
        }
        let Some(category_id) = event.category_id else {
            return Ok(BudgetEvaluation::NoBudget);
        };
        let (period_start, _) = month_bounds(now.year(), now.month())?;

        with_tx!(self, |db_tx| {
            let Some(budget) =
                find_active_budget(&db_tx, &category_id.to_string(), period_start).await?
            else {
                debug!(%category_id, "no budget for category");
                return Ok(BudgetEvaluation::NoBudget);
            };

            let account = self.find_account_for_user(&db_tx, &event.user_id).await?;
            if account.is_none_or(|a| a.id != budget.account_id.to_string()) {
                warn!(
                    user_id = %event.user_id,
                    budget_id = %budget.id,
                    "budget owned by another account"
                );
                return Ok(BudgetEvaluation::AccountMismatch {
                    budget_id: budget.id,
                });
            }

            let spent_minor = sum_abs_expense_for_category(
                &db_tx,
                &category_id.to_string(),
                budget.period_start,
                budget.period_end,
            )
            .await?;

            let Some(evaluation) = alert_for(&event.user_id, &budget, spent_minor, now) else {
                return Ok(BudgetEvaluation::UnderThreshold {
                    budget_id: budget.id,
                    spent_minor,
                });
            };

            let level = AlertLevel::for_spend(spent_minor, budget.limit_minor);
            if self.dedup_budget_alerts && !self.escalate_mark(&db_tx, &budget, level).await? {
                debug!(budget_id = %budget.id, level = level.as_str(), "alert already sent");
                return Ok(BudgetEvaluation::AlreadyAlerted {
                    budget_id: budget.id,
                    level,
                });
            }

            if let Some(alert) = evaluation.emitted() {
                enqueue(&db_tx, &alert).await?;
            }
            info!(
                user_id = %event.user_id,
                budget_id = %budget.id,
                level = level.as_str(),
                spent_minor,
                limit_minor = budget.limit_minor,
                "budget alert queued"
            );
            Ok(evaluation)
        })
    }

    /// Raise the stored alert level of the budget period to `level`.
    ///
    /// Returns `false` when the stored level is already at or above `level`.
    async fn escalate_mark(
        &self,
        db: &DatabaseTransaction,
        budget: &Budget,
        level: AlertLevel,
    ) -> ResultEngine<bool> {
        let current = budget_alert_marks::Entity::find_by_id((
            budget.id.to_string(),
            budget.period_start,
        ))
        .one(db)
        .await?;
        if let Some(mark) = current
            && AlertLevel::try_from(mark.level.as_str())? >= level
        {
            return Ok(false);
        }

        let mark = budget_alert_marks::ActiveModel {
            budget_id: ActiveValue::Set(budget.id.to_string()),
            period_start: ActiveValue::Set(budget.period_start),
            level: ActiveValue::Set(level.as_str().to_string()),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        budget_alert_marks::Entity::insert(mark)
            .on_conflict(
                OnConflict::columns([
                    budget_alert_marks::Column::BudgetId,
                    budget_alert_marks::Column::PeriodStart,
                ])
                .update_columns([
                    budget_alert_marks::Column::Level,
                    budget_alert_marks::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        Ok(true)
    }
}
