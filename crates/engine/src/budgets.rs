//! Monthly spending limits per category and the evaluation rules applied to
//! them.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError,
    util::{model_currency, parse_uuid},
};

/// Spend at or above this share of the limit (in percent) raises a warning.
pub const WARNING_THRESHOLD_PERCENT: i64 = 80;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub limit_minor: i64,
    pub currency: Currency,
    /// First day of the month (inclusive).
    pub period_start: NaiveDate,
    /// First day of the next month (exclusive).
    pub period_end: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived view of a budget over its period. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub spent_minor: i64,
    pub remaining_minor: i64,
    pub progress_percent: f64,
    pub exceeded: bool,
}

impl BudgetStatus {
    #[must_use]
    pub fn new(budget: Budget, spent_minor: i64) -> Self {
        let remaining_minor = budget.limit_minor - spent_minor;
        let progress_percent = percent_of(spent_minor, budget.limit_minor);
        let exceeded = spent_minor > budget.limit_minor;
        Self {
            budget,
            spent_minor,
            remaining_minor,
            progress_percent,
            exceeded,
        }
    }
}

/// Totals across every budget of a month.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_planned_minor: i64,
    pub total_spent_minor: i64,
    pub total_remaining_minor: i64,
    pub budgets: usize,
    pub over_budget: bool,
}

/// Alert level reached by a budget.
///
/// Ordered: `Quiet < Warning < Exceeded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Quiet,
    Warning,
    Exceeded,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Warning => "warning",
            Self::Exceeded => "exceeded",
        }
    }

    /// Level for `spent_minor` against `limit_minor`.
    #[must_use]
    pub fn for_spend(spent_minor: i64, limit_minor: i64) -> Self {
        if spent_minor > limit_minor {
            Self::Exceeded
        } else if i128::from(spent_minor) * 100
            >= i128::from(limit_minor) * i128::from(WARNING_THRESHOLD_PERCENT)
        {
            Self::Warning
        } else {
            Self::Quiet
        }
    }
}

impl TryFrom<&str> for AlertLevel {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "quiet" => Ok(Self::Quiet),
            "warning" => Ok(Self::Warning),
            "exceeded" => Ok(Self::Exceeded),
            other => Err(EngineError::InvalidInput(format!(
                "invalid alert level: {other}"
            ))),
        }
    }
}

/// `100 * part / whole`, or 0 for an empty whole.
#[must_use]
pub fn percent_of(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub category_id: String,
    pub name: String,
    pub limit_minor: i64,
    pub currency: String,
    pub period_start: Date,
    pub period_end: Date,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Category,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id.to_string()),
            account_id: ActiveValue::Set(budget.account_id.to_string()),
            category_id: ActiveValue::Set(budget.category_id.to_string()),
            name: ActiveValue::Set(budget.name.clone()),
            limit_minor: ActiveValue::Set(budget.limit_minor),
            currency: ActiveValue::Set(budget.currency.code().to_string()),
            period_start: ActiveValue::Set(budget.period_start),
            period_end: ActiveValue::Set(budget.period_end),
            active: ActiveValue::Set(budget.active),
            created_at: ActiveValue::Set(budget.created_at),
            updated_at: ActiveValue::Set(budget.updated_at),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "budget")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            category_id: parse_uuid(&model.category_id, "category")?,
            name: model.name,
            limit_minor: model.limit_minor,
            currency: model_currency(&model.currency)?,
            period_start: model.period_start,
            period_end: model.period_end,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
