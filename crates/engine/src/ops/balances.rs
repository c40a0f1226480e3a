use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{BankAccount, ResultEngine, bank_accounts};

use super::{Engine, transactions::sum_for_bank_account, with_tx};

impl Engine {
    /// Current balance of a bank account: the sum of its ledger rows.
    ///
    /// No balance is stored anywhere; every call re-aggregates.
    pub async fn sum_by_bank_account(
        &self,
        user_id: &str,
        bank_account_id: Uuid,
    ) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let bank_account = self
                .require_bank_account_owned(&db_tx, &account.id, bank_account_id)
                .await?;
            sum_for_bank_account(&db_tx, &bank_account.id).await
        })
    }

    /// Every bank account of the user with its balance, by name.
    pub async fn balances(&self, user_id: &str) -> ResultEngine<Vec<(BankAccount, i64)>> {
        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, user_id).await?;
            let models = bank_accounts::Entity::find()
                .filter(bank_accounts::Column::AccountId.eq(account.id.clone()))
                .order_by_asc(bank_accounts::Column::Name)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                let balance = sum_for_bank_account(&db_tx, &model.id).await?;
                out.push((BankAccount::try_from(model)?, balance));
            }
            Ok(out)
        })
    }
}
