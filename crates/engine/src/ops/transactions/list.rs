use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, Select,
    TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction, TransactionKind, bank_accounts, ledger,
    util::require_id,
};

use super::super::{Engine, with_tx};

/// Filters for listing transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<TransactionKind>>,
}

fn validate_list_filter(filter: &TransactionListFilter, limit: u64) -> ResultEngine<()> {
    if limit == 0 {
        return Err(EngineError::InvalidInput("limit must be > 0".to_string()));
    }
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidInput(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::InvalidInput(
            "kinds must not be empty".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(ledger::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(ledger::Column::OccurredAt.lt(to));
        }
        if let Some(kinds) = &filter.kinds {
            let kinds: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
            self = self.filter(ledger::Column::Kind.is_in(kinds));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    occurred_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))
    }
}

/// Runs `query` newest → older by `(occurred_at DESC, id DESC)`, fetching one
/// extra row to know whether a next page exists.
async fn fetch_page(
    db: &DatabaseTransaction,
    query: Select<ledger::Entity>,
    limit: u64,
    cursor: Option<&str>,
    filter: &TransactionListFilter,
) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
    let mut query = query
        .order_by_desc(ledger::Column::OccurredAt)
        .order_by_desc(ledger::Column::Id)
        .limit(limit.saturating_add(1));

    if let Some(cursor) = cursor {
        let cursor = TransactionsCursor::decode(cursor)?;
        query = query.filter(
            Condition::any()
                .add(ledger::Column::OccurredAt.lt(cursor.occurred_at))
                .add(
                    Condition::all()
                        .add(ledger::Column::OccurredAt.eq(cursor.occurred_at))
                        .add(ledger::Column::Id.lt(cursor.transaction_id)),
                ),
        );
    }
    query = query.apply_tx_filters(filter);

    let rows: Vec<ledger::Model> = query.all(db).await?;
    let has_more = rows.len() > limit as usize;

    let mut out: Vec<Transaction> = Vec::with_capacity(rows.len().min(limit as usize));
    for model in rows.into_iter().take(limit as usize) {
        out.push(Transaction::try_from(model)?);
    }

    let next_cursor = if has_more {
        out.last()
            .map(|tx| TransactionsCursor {
                occurred_at: tx.occurred_at,
                transaction_id: tx.id.to_string(),
            })
            .map(|c| c.encode())
            .transpose()?
    } else {
        None
    };

    Ok((out, next_cursor))
}

impl Engine {
    /// Rows of one bank account, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, id DESC)`.
    pub async fn list_transactions_for_bank_account_page(
        &self,
        user_id: &str,
        bank_account_id: Uuid,
        limit: u64,
        cursor: Option<&str>,
        filter: &TransactionListFilter,
    ) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
        validate_list_filter(filter, limit)?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            self.require_bank_account_owned(&db_tx, &account.id, bank_account_id)
                .await?;
            let query = ledger::Entity::find()
                .filter(ledger::Column::BankAccountId.eq(bank_account_id.to_string()));
            fetch_page(&db_tx, query, limit, cursor, filter).await
        })
    }

    /// Rows tagged with one category, with cursor-based pagination.
    pub async fn list_transactions_for_category_page(
        &self,
        user_id: &str,
        category_id: Uuid,
        limit: u64,
        cursor: Option<&str>,
        filter: &TransactionListFilter,
    ) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
        validate_list_filter(filter, limit)?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            self.require_category_owned(&db_tx, &account.id, category_id)
                .await?;
            let query = ledger::Entity::find()
                .filter(ledger::Column::CategoryId.eq(category_id.to_string()));
            fetch_page(&db_tx, query, limit, cursor, filter).await
        })
    }

    /// Rows across every bank account of the user's account.
    pub async fn list_transactions_for_account_page(
        &self,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &TransactionListFilter,
    ) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
        validate_list_filter(filter, limit)?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let bank_account_ids: Vec<String> = bank_accounts::Entity::find()
                .select_only()
                .column(bank_accounts::Column::Id)
                .filter(bank_accounts::Column::AccountId.eq(account.id.clone()))
                .into_tuple()
                .all(&db_tx)
                .await?;
            let query = ledger::Entity::find()
                .filter(ledger::Column::BankAccountId.is_in(bank_account_ids));
            fetch_page(&db_tx, query, limit, cursor, filter).await
        })
    }

    /// Both legs of a transfer, outgoing first.
    pub async fn transfer_legs(
        &self,
        user_id: &str,
        transfer_id: Uuid,
    ) -> ResultEngine<Vec<Transaction>> {
        require_id(transfer_id, "transfer")?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let rows = ledger::Entity::find()
                .filter(ledger::Column::TransferId.eq(transfer_id.to_string()))
                .order_by_asc(ledger::Column::AmountMinor)
                .all(&db_tx)
                .await?;
            if rows.is_empty() {
                return Err(EngineError::KeyNotFound("transfer not exists".to_string()));
            }
            let mut legs = Vec::with_capacity(rows.len());
            for model in rows {
                let leg = Transaction::try_from(model)?;
                self.require_bank_account_owned(&db_tx, &account.id, leg.bank_account_id)
                    .await?;
                legs.push(leg);
            }
            Ok(legs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_and_rejects_garbage() {
        let cursor = TransactionsCursor {
            occurred_at: Utc::now(),
            transaction_id: Uuid::new_v4().to_string(),
        };
        let encoded = cursor.encode().unwrap();
        let decoded = TransactionsCursor::decode(&encoded).unwrap();
        assert_eq!(decoded.transaction_id, cursor.transaction_id);
        assert!(matches!(
            TransactionsCursor::decode("not-a-cursor"),
            Err(EngineError::InvalidCursor(_))
        ));
    }

    #[test]
    fn filter_rejects_inverted_range_and_zero_limit() {
        let now = Utc::now();
        let filter = TransactionListFilter {
            from: Some(now),
            to: Some(now),
            kinds: None,
        };
        assert!(validate_list_filter(&filter, 10).is_err());
        assert!(validate_list_filter(&TransactionListFilter::default(), 0).is_err());
    }
}
