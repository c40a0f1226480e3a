//! Per-user notification preferences.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::EngineError;

pub const DEFAULT_WARNING_PERCENT: i32 = 80;
/// 100.00 in minor units.
pub const DEFAULT_LOW_BALANCE_THRESHOLD_MINOR: i64 = 10_000;

/// Where the user prefers to be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    #[default]
    Email,
    Push,
    Sms,
}

impl DeliveryChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
        }
    }
}

impl TryFrom<&str> for DeliveryChannel {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            "sms" => Ok(Self::Sms),
            other => Err(EngineError::InvalidInput(format!(
                "invalid preferred channel: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub user_id: String,
    pub budget_alerts_enabled: bool,
    pub balance_alerts_enabled: bool,
    /// 0..=100
    pub budget_warning_percent: i32,
    pub low_balance_threshold_minor: i64,
    pub preferred_channel: DeliveryChannel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSettings {
    /// Settings used for a user that never saved any.
    #[must_use]
    pub fn defaults(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            budget_alerts_enabled: true,
            balance_alerts_enabled: true,
            budget_warning_percent: DEFAULT_WARNING_PERCENT,
            low_balance_threshold_minor: DEFAULT_LOW_BALANCE_THRESHOLD_MINOR,
            preferred_channel: DeliveryChannel::Email,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_notification_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub budget_alerts_enabled: bool,
    pub balance_alerts_enabled: bool,
    pub budget_warning_percent: i32,
    pub low_balance_threshold_minor: i64,
    pub preferred_channel: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&NotificationSettings> for ActiveModel {
    fn from(settings: &NotificationSettings) -> Self {
        Self {
            user_id: ActiveValue::Set(settings.user_id.clone()),
            budget_alerts_enabled: ActiveValue::Set(settings.budget_alerts_enabled),
            balance_alerts_enabled: ActiveValue::Set(settings.balance_alerts_enabled),
            budget_warning_percent: ActiveValue::Set(settings.budget_warning_percent),
            low_balance_threshold_minor: ActiveValue::Set(settings.low_balance_threshold_minor),
            preferred_channel: ActiveValue::Set(settings.preferred_channel.as_str().to_string()),
            created_at: ActiveValue::Set(settings.created_at),
            updated_at: ActiveValue::Set(settings.updated_at),
        }
    }
}

impl TryFrom<Model> for NotificationSettings {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: model.user_id,
            budget_alerts_enabled: model.budget_alerts_enabled,
            balance_alerts_enabled: model.balance_alerts_enabled,
            budget_warning_percent: model.budget_warning_percent,
            low_balance_threshold_minor: model.low_balance_threshold_minor,
            preferred_channel: DeliveryChannel::try_from(model.preferred_channel.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
