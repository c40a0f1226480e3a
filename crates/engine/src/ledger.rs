//! Ledger primitives.
//!
//! A `Transaction` is one signed movement against one bank account. Rows are
//! append-only: they are created once (single entry or one leg of a
//! transfer) and never mutated afterwards.

use api_types::events::{LedgerKind, TransactionCreated};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{parse_rate, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    /// Whether `amount_minor` has the sign this kind requires.
    ///
    /// Transfer legs carry either sign.
    #[must_use]
    pub fn accepts_amount(self, amount_minor: i64) -> bool {
        match self {
            Self::Income => amount_minor >= 0,
            Self::Expense => amount_minor <= 0,
            Self::Transfer => true,
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

impl From<TransactionKind> for LedgerKind {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Income => LedgerKind::Income,
            TransactionKind::Expense => LedgerKind::Expense,
            TransactionKind::Transfer => LedgerKind::Transfer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub bank_account_id: Uuid,
    pub category_id: Option<Uuid>,
    /// Signed: negative for outflows.
    pub amount_minor: i64,
    pub description: String,
    pub kind: TransactionKind,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Other side of a transfer leg.
    pub counterpart_bank_account_id: Option<Uuid>,
    pub fx_rate: Option<Decimal>,
    /// Shared by both legs of a transfer.
    pub transfer_id: Option<Uuid>,
}

impl Transaction {
    pub(crate) fn new(
        bank_account_id: Uuid,
        kind: TransactionKind,
        amount_minor: i64,
        description: String,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !kind.accepts_amount(amount_minor) {
            return Err(EngineError::InvalidInput(format!(
                "amount sign does not match kind {}",
                kind.as_str()
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            bank_account_id,
            category_id: None,
            amount_minor,
            description,
            kind,
            occurred_at,
            created_at: now,
            updated_at: now,
            counterpart_bank_account_id: None,
            fx_rate: None,
            transfer_id: None,
        })
    }

    #[must_use]
    pub fn is_outflow(&self) -> bool {
        self.amount_minor < 0
    }

    /// The `transaction_created` payload announcing this row.
    #[must_use]
    pub fn created_event(&self, user_id: &str) -> TransactionCreated {
        TransactionCreated {
            transaction_id: self.id,
            user_id: user_id.to_string(),
            bank_account_id: self.bank_account_id,
            category_id: self.category_id,
            amount_minor: self.amount_minor,
            kind: self.kind.into(),
            description: self.description.clone(),
            timestamp: self.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub bank_account_id: String,
    pub category_id: Option<String>,
    pub amount_minor: i64,
    pub description: String,
    pub kind: String,
    pub occurred_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub counterpart_bank_account_id: Option<String>,
    pub fx_rate: Option<String>,
    pub transfer_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bank_accounts::Entity",
        from = "Column::BankAccountId",
        to = "super::bank_accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    BankAccount,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::bank_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccount.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            bank_account_id: ActiveValue::Set(tx.bank_account_id.to_string()),
            category_id: ActiveValue::Set(tx.category_id.map(|id| id.to_string())),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            description: ActiveValue::Set(tx.description.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
            counterpart_bank_account_id: ActiveValue::Set(
                tx.counterpart_bank_account_id.map(|id| id.to_string()),
            ),
            fx_rate: ActiveValue::Set(tx.fx_rate.map(|rate| rate.to_string())),
            transfer_id: ActiveValue::Set(tx.transfer_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            bank_account_id: parse_uuid(&model.bank_account_id, "bank account")?,
            category_id: model
                .category_id
                .as_deref()
                .map(|id| parse_uuid(id, "category"))
                .transpose()?,
            amount_minor: model.amount_minor,
            description: model.description,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            occurred_at: model.occurred_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
            counterpart_bank_account_id: model
                .counterpart_bank_account_id
                .as_deref()
                .map(|id| parse_uuid(id, "bank account"))
                .transpose()?,
            fx_rate: model.fx_rate.as_deref().map(parse_rate).transpose()?,
            transfer_id: model
                .transfer_id
                .as_deref()
                .map(|id| parse_uuid(id, "transfer"))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_must_match_kind() {
        let now = Utc::now();
        let bank = Uuid::new_v4();
        assert!(Transaction::new(bank, TransactionKind::Expense, 100, "x".into(), now).is_err());
        assert!(Transaction::new(bank, TransactionKind::Income, -100, "x".into(), now).is_err());
        assert!(Transaction::new(bank, TransactionKind::Transfer, -100, "x".into(), now).is_ok());
    }
}
