//! Ledger store operations: single-entry writes, lookups and aggregates.
//!
//! Every write appends its `transaction_created` event (and, for outflows
//! that cross the owner's threshold, a `low_balance` event) to the outbox in
//! the same database transaction.

use api_types::events::{DomainEvent, LowBalance};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseTransaction, QueryFilter, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    EngineError, RecordTransactionCmd, ResultEngine, Transaction, TransactionKind, bank_accounts,
    ledger,
    util::{month_bounds, normalize_required_text, require_amount, require_id},
};

use super::{Engine, outbox::enqueue, settings::settings_or_defaults, with_tx};

mod list;
mod transfer;

pub use list::TransactionListFilter;
pub use transfer::Transfer;

/// `Σ amount_minor` over every row of a bank account.
pub(super) async fn sum_for_bank_account<C: ConnectionTrait>(
    db: &C,
    bank_account_id: &str,
) -> ResultEngine<i64> {
    let total: Option<i64> = ledger::Entity::find()
        .select_only()
        .column_as(Expr::cust("COALESCE(SUM(amount_minor), 0)"), "total")
        .filter(ledger::Column::BankAccountId.eq(bank_account_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.unwrap_or(0))
}

/// `Σ |amount_minor|` over the expenses of a category inside `[start, end)`.
pub(super) async fn sum_abs_expense_for_category<C: ConnectionTrait>(
    db: &C,
    category_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> ResultEngine<i64> {
    let from = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let to = end.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let (Some(from), Some(to)) = (from, to) else {
        return Err(EngineError::InvalidInput("invalid period".to_string()));
    };
    let total: Option<i64> = ledger::Entity::find()
        .select_only()
        .column_as(Expr::cust("COALESCE(SUM(ABS(amount_minor)), 0)"), "total")
        .filter(ledger::Column::CategoryId.eq(category_id))
        .filter(ledger::Column::Kind.eq(TransactionKind::Expense.as_str()))
        .filter(ledger::Column::OccurredAt.gte(from))
        .filter(ledger::Column::OccurredAt.lt(to))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.unwrap_or(0))
}

impl Engine {
    /// Record a single income or expense.
    pub async fn record_transaction(&self, cmd: RecordTransactionCmd) -> ResultEngine<Transaction> {
        let RecordTransactionCmd {
            user_id,
            bank_account_id,
            kind,
            amount_minor,
            description,
            category_id,
            occurred_at,
        } = cmd;
        require_id(bank_account_id, "bank account")?;
        if let Some(category_id) = category_id {
            require_id(category_id, "category")?;
        }
        let amount_minor = require_amount(amount_minor, "amount_minor")?;
        let signed = match kind {
            TransactionKind::Income => amount_minor,
            TransactionKind::Expense => -amount_minor,
            TransactionKind::Transfer => {
                return Err(EngineError::InvalidInput(
                    "use transfer() to move money between bank accounts".to_string(),
                ));
            }
        };
        let description = normalize_required_text(&description, "description")?;

        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, &user_id).await?;
            let bank_account = self
                .require_active_bank_account(&db_tx, &account.id, bank_account_id)
                .await?;
            if let Some(category_id) = category_id {
                self.require_category_owned(&db_tx, &account.id, category_id)
                    .await?;
            }

            let mut tx = Transaction::new(bank_account_id, kind, signed, description, occurred_at)?;
            tx.category_id = category_id;

            self.append_entry(&db_tx, &account.user_id, &bank_account, &tx)
                .await?;
            info!(
                user_id = %account.user_id,
                transaction_id = %tx.id,
                kind = kind.as_str(),
                amount_minor = tx.amount_minor,
                "transaction recorded"
            );
            Ok(tx)
        })
    }

    /// A single ledger row, visible only to the owner of its bank account.
    pub async fn transaction(&self, user_id: &str, id: Uuid) -> ResultEngine<Transaction> {
        require_id(id, "transaction")?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let model = ledger::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
            let tx = Transaction::try_from(model)?;
            self.require_bank_account_owned(&db_tx, &account.id, tx.bank_account_id)
                .await?;
            Ok(tx)
        })
    }

    /// Total spent in a category during a calendar month.
    pub async fn sum_abs_expense_by_category_and_period(
        &self,
        user_id: &str,
        category_id: Uuid,
        year: i32,
        month: u32,
    ) -> ResultEngine<i64> {
        let (start, end) = month_bounds(year, month)?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            self.require_category_owned(&db_tx, &account.id, category_id)
                .await?;
            sum_abs_expense_for_category(&db_tx, &category_id.to_string(), start, end).await
        })
    }

    /// Insert `tx`, queue its event and, for outflows, check the low-balance
    /// threshold of the owner.
    async fn append_entry(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        bank_account: &bank_accounts::Model,
        tx: &Transaction,
    ) -> ResultEngine<()> {
        let before = if tx.is_outflow() {
            Some(sum_for_bank_account(db, &bank_account.id).await?)
        } else {
            None
        };

        ledger::ActiveModel::from(tx).insert(db).await?;

        enqueue(db, &DomainEvent::TransactionCreated(tx.created_event(user_id))).await?;

        if let Some(before) = before {
            let after = before
                .checked_add(tx.amount_minor)
                .ok_or_else(|| EngineError::InvalidInput("balance out of range".to_string()))?;
            self.queue_low_balance_if_crossed(db, user_id, bank_account, before, after)
                .await?;
        }
        Ok(())
    }

    /// Queue `low_balance` when the balance drops from at-or-above the
    /// threshold to below it. Settings are read, never created, here.
    async fn queue_low_balance_if_crossed(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        bank_account: &bank_accounts::Model,
        before: i64,
        after: i64,
    ) -> ResultEngine<()> {
        let settings = settings_or_defaults(db, user_id).await?;
        let threshold = settings.low_balance_threshold_minor;
        if !settings.balance_alerts_enabled || !(before >= threshold && after < threshold) {
            return Ok(());
        }
        let event = DomainEvent::LowBalance(LowBalance {
            user_id: user_id.to_string(),
            bank_account_id: crate::util::parse_uuid(&bank_account.id, "bank account")?,
            account_name: bank_account.name.clone(),
            current_balance_minor: after,
            alert_threshold_minor: threshold,
            timestamp: Utc::now(),
        });
        enqueue(db, &event).await?;
        debug!(
            user_id,
            bank_account_id = %bank_account.id,
            balance_minor = after,
            threshold_minor = threshold,
            "low balance crossed"
        );
        Ok(())
    }
}
