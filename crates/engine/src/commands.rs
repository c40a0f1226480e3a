//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (income/expense/transfer/budget/settings), keeping call sites readable and
//! avoiding long argument lists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{DeliveryChannel, TransactionKind};

/// Record a single income or expense row.
///
/// `amount_minor` is always positive; the stored sign follows `kind`.
#[derive(Clone, Debug)]
pub struct RecordTransactionCmd {
    pub user_id: String,
    pub bank_account_id: Uuid,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl RecordTransactionCmd {
    #[must_use]
    pub fn income(
        user_id: impl Into<String>,
        bank_account_id: Uuid,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            user_id,
            bank_account_id,
            TransactionKind::Income,
            amount_minor,
            description,
        )
    }

    #[must_use]
    pub fn expense(
        user_id: impl Into<String>,
        bank_account_id: Uuid,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            user_id,
            bank_account_id,
            TransactionKind::Expense,
            amount_minor,
            description,
        )
    }

    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        bank_account_id: Uuid,
        kind: TransactionKind,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            bank_account_id,
            kind,
            amount_minor,
            description: description.into(),
            category_id: None,
            occurred_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Move money between two bank accounts of the same user.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub user_id: String,
    pub from_bank_account_id: Uuid,
    pub to_bank_account_id: Uuid,
    /// Amount leaving the source, in the source currency.
    pub amount_minor: i64,
    pub description: String,
    /// Units of destination currency per unit of source currency.
    pub rate: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        from_bank_account_id: Uuid,
        to_bank_account_id: Uuid,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            from_bank_account_id,
            to_bank_account_id,
            amount_minor,
            description: description.into(),
            rate: None,
            occurred_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn rate(mut self, rate: Decimal) -> Self {
        self.rate = Some(rate);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Create a monthly budget for a category.
#[derive(Clone, Debug)]
pub struct NewBudgetCmd {
    pub user_id: String,
    pub category_id: Uuid,
    pub name: String,
    pub limit_minor: i64,
    pub year: i32,
    pub month: u32,
    /// Defaults to EUR.
    pub currency: Option<crate::Currency>,
}

impl NewBudgetCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        category_id: Uuid,
        name: impl Into<String>,
        limit_minor: i64,
        year: i32,
        month: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category_id,
            name: name.into(),
            limit_minor,
            year,
            month,
            currency: None,
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: crate::Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

/// Replacement values for a user's notification settings.
#[derive(Clone, Debug)]
pub struct SettingsUpdate {
    pub budget_alerts_enabled: bool,
    pub balance_alerts_enabled: bool,
    pub budget_warning_percent: i32,
    pub low_balance_threshold_minor: i64,
    pub preferred_channel: DeliveryChannel,
}

impl Default for SettingsUpdate {
    fn default() -> Self {
        Self {
            budget_alerts_enabled: true,
            balance_alerts_enabled: true,
            budget_warning_percent: crate::settings::DEFAULT_WARNING_PERCENT,
            low_balance_threshold_minor: crate::settings::DEFAULT_LOW_BALANCE_THRESHOLD_MINOR,
            preferred_channel: DeliveryChannel::Email,
        }
    }
}
