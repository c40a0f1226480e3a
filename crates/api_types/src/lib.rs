use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod events {
    //! Payloads carried on the broker channels.
    //!
    //! Every payload is a single JSON object. Monetary fields are signed
    //! integer minor units (cents for EUR).

    use super::*;
    use crate::notification::{NotificationKind, Priority};

    /// A named delivery path on the broker.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Channel {
        TransactionCreated,
        BudgetExceeded,
        BudgetWarning,
        LowBalance,
        Notification,
    }

    impl Channel {
        pub const ALL: [Channel; 5] = [
            Channel::TransactionCreated,
            Channel::BudgetExceeded,
            Channel::BudgetWarning,
            Channel::LowBalance,
            Channel::Notification,
        ];

        /// Returns the queue name used on the broker.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::TransactionCreated => "transaction_created",
                Self::BudgetExceeded => "budget_exceeded",
                Self::BudgetWarning => "budget_warning",
                Self::LowBalance => "low_balance",
                Self::Notification => "notification",
            }
        }
    }

    impl core::fmt::Display for Channel {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl TryFrom<&str> for Channel {
        type Error = String;

        fn try_from(value: &str) -> Result<Self, Self::Error> {
            Channel::ALL
                .into_iter()
                .find(|c| c.as_str() == value)
                .ok_or_else(|| format!("unknown channel: {value}"))
        }
    }

    /// Kind of the ledger row that produced a [`TransactionCreated`] event.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LedgerKind {
        Income,
        Expense,
        Transfer,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub transaction_id: Uuid,
        pub user_id: String,
        pub bank_account_id: Uuid,
        pub category_id: Option<Uuid>,
        /// Signed amount in minor units: negative for outflows.
        #[serde(rename = "amount")]
        pub amount_minor: i64,
        pub kind: LedgerKind,
        pub description: String,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct BudgetExceeded {
        pub user_id: String,
        pub budget_id: Uuid,
        pub budget_name: String,
        #[serde(rename = "budget_amount")]
        pub budget_amount_minor: i64,
        #[serde(rename = "spent_amount")]
        pub spent_amount_minor: i64,
        #[serde(rename = "excess_amount")]
        pub excess_amount_minor: i64,
        pub category_id: Uuid,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct BudgetWarning {
        pub user_id: String,
        pub budget_id: Uuid,
        pub budget_name: String,
        #[serde(rename = "budget_amount")]
        pub budget_amount_minor: i64,
        #[serde(rename = "spent_amount")]
        pub spent_amount_minor: i64,
        /// `100 * spent / limit`.
        pub warning_percent: f64,
        pub category_id: Uuid,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct LowBalance {
        pub user_id: String,
        pub bank_account_id: Uuid,
        pub account_name: String,
        #[serde(rename = "current_balance")]
        pub current_balance_minor: i64,
        #[serde(rename = "alert_threshold")]
        pub alert_threshold_minor: i64,
        pub timestamp: DateTime<Utc>,
    }

    /// Generic notification fan-out event, consumed by delivery channels
    /// (push/email).
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct NotificationCreated {
        pub notification_id: Uuid,
        pub user_id: String,
        #[serde(rename = "type")]
        pub kind: NotificationKind,
        pub title: String,
        pub message: String,
        pub data: serde_json::Map<String, serde_json::Value>,
        pub priority: Priority,
        pub timestamp: DateTime<Utc>,
    }

    /// Any event that can travel on the broker.
    #[derive(Clone, Debug, PartialEq)]
    pub enum DomainEvent {
        TransactionCreated(TransactionCreated),
        BudgetExceeded(BudgetExceeded),
        BudgetWarning(BudgetWarning),
        LowBalance(LowBalance),
        Notification(NotificationCreated),
    }

    impl DomainEvent {
        /// The single channel this event is delivered on.
        pub fn channel(&self) -> Channel {
            match self {
                Self::TransactionCreated(_) => Channel::TransactionCreated,
                Self::BudgetExceeded(_) => Channel::BudgetExceeded,
                Self::BudgetWarning(_) => Channel::BudgetWarning,
                Self::LowBalance(_) => Channel::LowBalance,
                Self::Notification(_) => Channel::Notification,
            }
        }

        pub fn user_id(&self) -> &str {
            match self {
                Self::TransactionCreated(e) => &e.user_id,
                Self::BudgetExceeded(e) => &e.user_id,
                Self::BudgetWarning(e) => &e.user_id,
                Self::LowBalance(e) => &e.user_id,
                Self::Notification(e) => &e.user_id,
            }
        }

        /// Serializes the inner payload (without any envelope).
        pub fn to_json(&self) -> Result<String, serde_json::Error> {
            match self {
                Self::TransactionCreated(e) => serde_json::to_string(e),
                Self::BudgetExceeded(e) => serde_json::to_string(e),
                Self::BudgetWarning(e) => serde_json::to_string(e),
                Self::LowBalance(e) => serde_json::to_string(e),
                Self::Notification(e) => serde_json::to_string(e),
            }
        }

        /// Parses a payload received on `channel`.
        pub fn decode(channel: Channel, payload: &[u8]) -> Result<Self, serde_json::Error> {
            Ok(match channel {
                Channel::TransactionCreated => {
                    Self::TransactionCreated(serde_json::from_slice(payload)?)
                }
                Channel::BudgetExceeded => Self::BudgetExceeded(serde_json::from_slice(payload)?),
                Channel::BudgetWarning => Self::BudgetWarning(serde_json::from_slice(payload)?),
                Channel::LowBalance => Self::LowBalance(serde_json::from_slice(payload)?),
                Channel::Notification => Self::Notification(serde_json::from_slice(payload)?),
            })
        }
    }
}

pub mod notification {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum NotificationKind {
        BudgetExceeded,
        BudgetWarning,
        LowBalance,
    }

    impl NotificationKind {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::BudgetExceeded => "budget_exceeded",
                Self::BudgetWarning => "budget_warning",
                Self::LowBalance => "low_balance",
            }
        }
    }

    impl TryFrom<&str> for NotificationKind {
        type Error = String;

        fn try_from(value: &str) -> Result<Self, Self::Error> {
            match value {
                "budget_exceeded" => Ok(Self::BudgetExceeded),
                "budget_warning" => Ok(Self::BudgetWarning),
                "low_balance" => Ok(Self::LowBalance),
                other => Err(format!("invalid notification type: {other}")),
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Priority {
        Low,
        Medium,
        High,
    }

    impl Priority {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Low => "low",
                Self::Medium => "medium",
                Self::High => "high",
            }
        }
    }

    impl TryFrom<&str> for Priority {
        type Error = String;

        fn try_from(value: &str) -> Result<Self, Self::Error> {
            match value {
                "low" => Ok(Self::Low),
                "medium" => Ok(Self::Medium),
                "high" => Ok(Self::High),
                other => Err(format!("invalid priority: {other}")),
            }
        }
    }

    /// A notification as exposed to the read side.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct NotificationView {
        pub id: Uuid,
        pub user_id: String,
        #[serde(rename = "type")]
        pub kind: NotificationKind,
        pub title: String,
        pub message: String,
        pub data: serde_json::Map<String, serde_json::Value>,
        pub is_read: bool,
        pub priority: Priority,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationList {
        pub notifications: Vec<NotificationView>,
        /// Opaque cursor for the next page, `None` on the last page.
        pub next_cursor: Option<String>,
    }
}
