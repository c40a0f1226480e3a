//! The module contains the `BankAccount` struct and its persistence model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError,
    util::{model_currency, parse_uuid},
};

/// A place where money is kept: a checking account, a card, a cash box.
///
/// The balance is never stored. It is always the sum of the ledger rows
/// that reference this bank account (see `Engine::balance`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankAccount {
    pub id: Uuid,
    /// Owning logical account.
    pub account_id: Uuid,
    pub name: String,
    pub currency: Currency,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub currency: String,
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Account,
    #[sea_orm(has_many = "super::ledger::Entity")]
    Entries,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BankAccount> for ActiveModel {
    fn from(bank_account: &BankAccount) -> Self {
        Self {
            id: ActiveValue::Set(bank_account.id.to_string()),
            account_id: ActiveValue::Set(bank_account.account_id.to_string()),
            name: ActiveValue::Set(bank_account.name.clone()),
            currency: ActiveValue::Set(bank_account.currency.code().to_string()),
            active: ActiveValue::Set(bank_account.active),
            created_at: ActiveValue::Set(bank_account.created_at),
        }
    }
}

impl TryFrom<Model> for BankAccount {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "bank account")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            name: model.name,
            currency: model_currency(&model.currency)?,
            active: model.active,
            created_at: model.created_at,
        })
    }
}
