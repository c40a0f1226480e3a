//! Monthly budgets per category and their spend status.
//!
//! Spend is never stored: every status re-aggregates the category's expenses
//! over the budget month.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    Budget, BudgetStatus, BudgetSummary, EngineError, NewBudgetCmd, ResultEngine, budgets,
    util::{month_bounds, normalize_required_text, parse_uuid, require_amount, require_id},
};

use super::{Engine, transactions::sum_abs_expense_for_category, with_tx};

/// The active budget of a category for the month starting at `period_start`.
pub(super) async fn find_active_budget<C: ConnectionTrait>(
    db: &C,
    category_id: &str,
    period_start: chrono::NaiveDate,
) -> ResultEngine<Option<Budget>> {
    budgets::Entity::find()
        .filter(budgets::Column::CategoryId.eq(category_id))
        .filter(budgets::Column::PeriodStart.eq(period_start))
        .filter(budgets::Column::Active.eq(true))
        .one(db)
        .await?
        .map(Budget::try_from)
        .transpose()
}

pub(super) async fn status_of<C: ConnectionTrait>(db: &C, budget: Budget) -> ResultEngine<BudgetStatus> {
    let spent = sum_abs_expense_for_category(
        db,
        &budget.category_id.to_string(),
        budget.period_start,
        budget.period_end,
    )
    .await?;
    Ok(BudgetStatus::new(budget, spent))
}

impl Engine {
    /// Create a budget for a category and calendar month.
    ///
    /// A second budget for the same category and month is rejected by the
    /// unique index and reported as `ExistingKey`.
    pub async fn create_budget(&self, cmd: NewBudgetCmd) -> ResultEngine<Budget> {
        let NewBudgetCmd {
            user_id,
            category_id,
            name,
            limit_minor,
            year,
            month,
            currency,
        } = cmd;
        require_id(category_id, "category")?;
        let limit_minor = require_amount(limit_minor, "limit_minor")?;
        let name = normalize_required_text(&name, "budget name")?;
        let (period_start, period_end) = month_bounds(year, month)?;

        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, &user_id).await?;
            self.require_category_owned(&db_tx, &account.id, category_id)
                .await?;
            let now = Utc::now();
            let budget = Budget {
                id: Uuid::new_v4(),
                account_id: parse_uuid(&account.id, "account")?,
                category_id,
                name,
                limit_minor,
                currency: currency.unwrap_or_default(),
                period_start,
                period_end,
                active: true,
                created_at: now,
                updated_at: now,
            };
            budgets::ActiveModel::from(&budget)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    EngineError::from_insert(err, &format!("budget for {year}-{month:02}"))
                })?;
            info!(
                user_id = %account.user_id,
                budget_id = %budget.id,
                category_id = %category_id,
                limit_minor,
                "budget created"
            );
            Ok(budget)
        })
    }

    pub async fn budget_status(&self, user_id: &str, budget_id: Uuid) -> ResultEngine<BudgetStatus> {
        require_id(budget_id, "budget")?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let model = budgets::Entity::find_by_id(budget_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("budget not exists".to_string()))?;
            if model.account_id != account.id {
                return Err(EngineError::Forbidden);
            }
            status_of(&db_tx, Budget::try_from(model)?).await
        })
    }

    /// Every budget of the month with its current spend, by name.
    pub async fn list_budgets_with_status(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> ResultEngine<Vec<BudgetStatus>> {
        let (period_start, _) = month_bounds(year, month)?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let models = budgets::Entity::find()
                .filter(budgets::Column::AccountId.eq(account.id.clone()))
                .filter(budgets::Column::PeriodStart.eq(period_start))
                .order_by_asc(budgets::Column::Name)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(status_of(&db_tx, Budget::try_from(model)?).await?);
            }
            Ok(out)
        })
    }

    /// Planned, spent and remaining totals for the month.
    pub async fn budget_summary(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> ResultEngine<BudgetSummary> {
        let statuses = self.list_budgets_with_status(user_id, year, month).await?;
        let mut summary = BudgetSummary::default();
        for status in statuses.iter().filter(|s| s.budget.active) {
            summary.total_planned_minor += status.budget.limit_minor;
            summary.total_spent_minor += status.spent_minor;
            summary.budgets += 1;
        }
        summary.total_remaining_minor = summary.total_planned_minor - summary.total_spent_minor;
        summary.over_budget = summary.total_spent_minor > summary.total_planned_minor;
        Ok(summary)
    }
}
