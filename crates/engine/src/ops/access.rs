use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, accounts, bank_accounts, categories,
    util::{require_id, require_user_id},
};

use super::Engine;

/// Generates a `require_*_owned` method: the target must exist (else
/// `KeyNotFound`) and belong to `account_id` (else `Forbidden`).
macro_rules! impl_require_owned {
    ($require_fn:ident, $entity:path, $model:path, $label:literal) => {
        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            account_id: &str,
            target_id: Uuid,
        ) -> ResultEngine<$model> {
            require_id(target_id, $label)?;
            let model = <$entity>::find_by_id(target_id.to_string())
                .one(db)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(concat!($label, " not exists").to_string()))?;
            if model.account_id != account_id {
                return Err(EngineError::Forbidden);
            }
            Ok(model)
        }
    };
}

impl Engine {
    impl_require_owned!(
        require_bank_account_owned,
        bank_accounts::Entity,
        bank_accounts::Model,
        "bank account"
    );

    impl_require_owned!(
        require_category_owned,
        categories::Entity,
        categories::Model,
        "category"
    );

    pub(super) async fn find_account_for_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Option<accounts::Model>> {
        let user_id = require_user_id(user_id)?;
        accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Resolve the logical account of `user_id`.
    pub(super) async fn require_account_for_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<accounts::Model> {
        self.find_account_for_user(db, user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }

    /// Bank account owned by the user's account and still active.
    pub(super) async fn require_active_bank_account(
        &self,
        db: &DatabaseTransaction,
        account_id: &str,
        bank_account_id: Uuid,
    ) -> ResultEngine<bank_accounts::Model> {
        let model = self
            .require_bank_account_owned(db, account_id, bank_account_id)
            .await?;
        if !model.active {
            return Err(EngineError::InvalidInput(
                "bank account is not active".to_string(),
            ));
        }
        Ok(model)
    }
}
