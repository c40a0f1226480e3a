//! Ledger, budgets and notifications for fincore.
//!
//! The [`Engine`] owns the database connection and exposes every operation as
//! an async method. Writes that produce events also append them to the
//! outbox inside the same database transaction; the `pipeline` crate relays
//! them to the broker.

pub use accounts::Account;
pub use bank_accounts::BankAccount;
pub use budgets::{AlertLevel, Budget, BudgetStatus, BudgetSummary, WARNING_THRESHOLD_PERCENT};
pub use categories::Category;
pub use commands::{NewBudgetCmd, RecordTransactionCmd, SettingsUpdate, TransferCmd};
pub use currency::Currency;
pub use error::{EngineError, ErrorKind};
pub use ledger::{Transaction, TransactionKind};
pub use money::{Money, convert_minor};
pub use notifications::{
    BudgetExceededAlert, BudgetWarningAlert, LowBalanceAlert, Notification, NotificationPayload,
};
pub use ops::{
    BudgetEvaluation, Dispatch, Engine, EngineBuilder, SuppressReason, TransactionListFilter,
    Transfer,
};
pub use outbox::OutboxMessage;
pub use settings::{DeliveryChannel, NotificationSettings};

mod accounts;
mod bank_accounts;
mod budget_alert_marks;
mod budgets;
mod categories;
mod commands;
mod currency;
mod error;
mod ledger;
mod money;
mod notifications;
mod ops;
mod outbox;
mod settings;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
