//! Registration of the rows the ledger hangs off: the user's account, its
//! bank accounts and its categories.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, TransactionTrait, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{
    Account, BankAccount, Category, Currency, EngineError, ResultEngine, accounts, bank_accounts,
    categories,
    util::{normalize_required_text, parse_uuid, require_user_id},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create the logical account of `user_id`. One per user.
    pub async fn new_account(&self, user_id: &str, name: &str) -> ResultEngine<Account> {
        let user_id = require_user_id(user_id)?.to_string();
        let name = normalize_required_text(name, "account name")?;
        with_tx!(self, |db_tx| {
            if self.find_account_for_user(&db_tx, &user_id).await?.is_some() {
                return Err(EngineError::ExistingKey(format!("account for {user_id}")));
            }
            let account = Account {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                name,
                created_at: Utc::now(),
            };
            accounts::ActiveModel::from(&account)
                .insert(&db_tx)
                .await
                .map_err(|err| EngineError::from_insert(err, "account"))?;
            info!(user_id = %account.user_id, account_id = %account.id, "account created");
            Ok(account)
        })
    }

    pub async fn account_for_user(&self, user_id: &str) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_account_for_user(&db_tx, user_id).await?;
            Account::try_from(model)
        })
    }

    /// Register a bank account. Names are unique within an account.
    pub async fn new_bank_account(
        &self,
        user_id: &str,
        name: &str,
        currency: Currency,
    ) -> ResultEngine<BankAccount> {
        let name = normalize_required_text(name, "bank account name")?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let bank_account = BankAccount {
                id: Uuid::new_v4(),
                account_id: parse_uuid(&account.id, "account")?,
                name,
                currency,
                active: true,
                created_at: Utc::now(),
            };
            bank_accounts::ActiveModel::from(&bank_account)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    EngineError::from_insert(err, &format!("bank account {}", bank_account.name))
                })?;
            Ok(bank_account)
        })
    }

    pub async fn bank_account(&self, user_id: &str, id: Uuid) -> ResultEngine<BankAccount> {
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let model = self
                .require_bank_account_owned(&db_tx, &account.id, id)
                .await?;
            BankAccount::try_from(model)
        })
    }

    /// Inactive bank accounts keep their history but accept no new rows.
    pub async fn set_bank_account_active(
        &self,
        user_id: &str,
        id: Uuid,
        active: bool,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            self.require_bank_account_owned(&db_tx, &account.id, id)
                .await?;
            bank_accounts::ActiveModel {
                id: ActiveValue::Set(id.to_string()),
                active: ActiveValue::Set(active),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(())
        })
    }

    pub async fn new_category(&self, user_id: &str, name: &str) -> ResultEngine<Category> {
        let name = normalize_required_text(name, "category name")?;
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let category = Category {
                id: Uuid::new_v4(),
                account_id: parse_uuid(&account.id, "account")?,
                name,
                created_at: Utc::now(),
            };
            categories::ActiveModel::from(&category)
                .insert(&db_tx)
                .await?;
            Ok(category)
        })
    }

    pub async fn category(&self, user_id: &str, id: Uuid) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let model = self
                .require_category_owned(&db_tx, &account.id, id)
                .await?;
            Category::try_from(model)
        })
    }
}
