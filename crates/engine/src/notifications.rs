//! Notifications delivered to users and their typed payloads.
//!
//! The payload is a closed sum type: each notification kind carries its own
//! statically known field set. It is stored as a JSON object next to the
//! `kind` column and exposed to readers as a generic map through
//! [`NotificationView`].

use api_types::notification::{NotificationKind, NotificationView, Priority};
use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine, money::Money, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetExceededAlert {
    pub budget_id: Uuid,
    pub budget_name: String,
    pub category_id: Uuid,
    pub currency: Currency,
    pub budget_amount_minor: i64,
    pub spent_amount_minor: i64,
    pub excess_amount_minor: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetWarningAlert {
    pub budget_id: Uuid,
    pub budget_name: String,
    pub category_id: Uuid,
    pub currency: Currency,
    pub budget_amount_minor: i64,
    pub spent_amount_minor: i64,
    pub warning_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LowBalanceAlert {
    pub bank_account_id: Uuid,
    pub account_name: String,
    pub currency: Currency,
    pub current_balance_minor: i64,
    pub threshold_minor: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationPayload {
    BudgetExceeded(BudgetExceededAlert),
    BudgetWarning(BudgetWarningAlert),
    LowBalance(LowBalanceAlert),
}

impl NotificationPayload {
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::BudgetExceeded(_) => NotificationKind::BudgetExceeded,
            Self::BudgetWarning(_) => NotificationKind::BudgetWarning,
            Self::LowBalance(_) => NotificationKind::LowBalance,
        }
    }

    /// Exceeded budgets and low balances need attention right away.
    #[must_use]
    pub fn priority(&self) -> Priority {
        match self {
            Self::BudgetExceeded(_) | Self::LowBalance(_) => Priority::High,
            Self::BudgetWarning(_) => Priority::Medium,
        }
    }

    /// Human readable `(title, message)`.
    #[must_use]
    pub fn render(&self) -> (String, String) {
        match self {
            Self::BudgetExceeded(alert) => (
                "Budget exceeded".to_string(),
                format!(
                    "Budget '{}' is over by {}. Spent {} of {}",
                    alert.budget_name,
                    Money::new(alert.excess_amount_minor, alert.currency),
                    Money::new(alert.spent_amount_minor, alert.currency),
                    Money::new(alert.budget_amount_minor, alert.currency),
                ),
            ),
            Self::BudgetWarning(alert) => (
                "Budget almost spent".to_string(),
                format!(
                    "Budget '{}' is {:.0}% used. Spent {} of {}",
                    alert.budget_name,
                    alert.warning_percent,
                    Money::new(alert.spent_amount_minor, alert.currency),
                    Money::new(alert.budget_amount_minor, alert.currency),
                ),
            ),
            Self::LowBalance(alert) => (
                "Low balance".to_string(),
                format!(
                    "Balance of '{}' is {}, below {}",
                    alert.account_name,
                    Money::new(alert.current_balance_minor, alert.currency),
                    Money::new(alert.threshold_minor, alert.currency),
                ),
            ),
        }
    }

    /// Generic JSON view of the payload fields.
    pub fn to_data(&self) -> ResultEngine<serde_json::Map<String, serde_json::Value>> {
        let value = match self {
            Self::BudgetExceeded(alert) => serde_json::to_value(alert)?,
            Self::BudgetWarning(alert) => serde_json::to_value(alert)?,
            Self::LowBalance(alert) => serde_json::to_value(alert)?,
        };
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(EngineError::Serialization(
                "notification payload is not an object".to_string(),
            )),
        }
    }

    pub fn from_data(kind: NotificationKind, data: &str) -> ResultEngine<Self> {
        Ok(match kind {
            NotificationKind::BudgetExceeded => Self::BudgetExceeded(serde_json::from_str(data)?),
            NotificationKind::BudgetWarning => Self::BudgetWarning(serde_json::from_str(data)?),
            NotificationKind::LowBalance => Self::LowBalance(serde_json::from_str(data)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub payload: NotificationPayload,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Builds an unread notification, rendering its title and message.
    #[must_use]
    pub fn new(user_id: String, payload: NotificationPayload) -> Self {
        let (title, message) = payload.render();
        let priority = payload.priority();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            payload,
            title,
            message,
            is_read: false,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }

    pub fn view(&self) -> ResultEngine<NotificationView> {
        Ok(NotificationView {
            id: self.id,
            user_id: self.user_id.clone(),
            kind: self.kind(),
            title: self.title.clone(),
            message: self.message.clone(),
            data: self.payload.to_data()?,
            is_read: self.is_read,
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    #[sea_orm(column_type = "Text")]
    pub data: String,
    pub is_read: bool,
    pub priority: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Notification> for ActiveModel {
    type Error = EngineError;

    fn try_from(notification: &Notification) -> Result<Self, Self::Error> {
        let data = serde_json::to_string(&notification.payload.to_data()?)?;
        Ok(Self {
            id: ActiveValue::Set(notification.id.to_string()),
            user_id: ActiveValue::Set(notification.user_id.clone()),
            kind: ActiveValue::Set(notification.kind().as_str().to_string()),
            title: ActiveValue::Set(notification.title.clone()),
            message: ActiveValue::Set(notification.message.clone()),
            data: ActiveValue::Set(data),
            is_read: ActiveValue::Set(notification.is_read),
            priority: ActiveValue::Set(notification.priority.as_str().to_string()),
            created_at: ActiveValue::Set(notification.created_at),
            updated_at: ActiveValue::Set(notification.updated_at),
        })
    }
}

impl TryFrom<Model> for Notification {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = NotificationKind::try_from(model.kind.as_str()).map_err(EngineError::InvalidInput)?;
        Ok(Self {
            id: parse_uuid(&model.id, "notification")?,
            user_id: model.user_id,
            payload: NotificationPayload::from_data(kind, &model.data)?,
            title: model.title,
            message: model.message,
            is_read: model.is_read,
            priority: Priority::try_from(model.priority.as_str())
                .map_err(EngineError::InvalidInput)?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exceeded() -> NotificationPayload {
        NotificationPayload::BudgetExceeded(BudgetExceededAlert {
            budget_id: Uuid::new_v4(),
            budget_name: "Groceries".to_string(),
            category_id: Uuid::new_v4(),
            currency: Currency::Eur,
            budget_amount_minor: 100_000,
            spent_amount_minor: 105_000,
            excess_amount_minor: 5_000,
        })
    }

    #[test]
    fn exceeded_renders_amounts_and_is_high_priority() {
        let payload = exceeded();
        let (title, message) = payload.render();
        assert_eq!(title, "Budget exceeded");
        assert_eq!(
            message,
            "Budget 'Groceries' is over by 50.00 EUR. Spent 1050.00 EUR of 1000.00 EUR"
        );
        assert_eq!(payload.priority(), Priority::High);
    }

    #[test]
    fn warning_is_medium_priority() {
        let payload = NotificationPayload::BudgetWarning(BudgetWarningAlert {
            budget_id: Uuid::new_v4(),
            budget_name: "Fun".to_string(),
            category_id: Uuid::new_v4(),
            currency: Currency::Usd,
            budget_amount_minor: 1000,
            spent_amount_minor: 850,
            warning_percent: 85.0,
        });
        assert_eq!(payload.priority(), Priority::Medium);
        assert!(payload.render().1.contains("85% used"));
    }

    #[test]
    fn data_survives_storage() {
        let payload = exceeded();
        let data = serde_json::to_string(&payload.to_data().unwrap()).unwrap();
        let back = NotificationPayload::from_data(NotificationKind::BudgetExceeded, &data).unwrap();
        assert_eq!(back, payload);
        assert!(NotificationPayload::from_data(NotificationKind::LowBalance, &data).is_err());
    }
}
