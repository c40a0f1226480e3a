//! Transfers between two bank accounts of one user, optionally across
//! currencies.

use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction, TransactionKind, TransferCmd, convert_minor,
    util::{model_currency, normalize_required_text, require_amount, require_id},
};

use super::super::{Engine, with_tx};

/// The two ledger rows written by [`Engine::transfer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: Uuid,
    /// Debit on the source: `-amount`.
    pub outgoing: Transaction,
    /// Credit on the destination: `amount × rate`, or `amount` without a rate.
    pub incoming: Transaction,
}

impl Engine {
    /// Move money between two bank accounts of the same user.
    ///
    /// Both legs are written in one database transaction: either both rows
    /// exist afterwards or neither does. Accounts in different currencies
    /// need a rate.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<Transfer> {
        let TransferCmd {
            user_id,
            from_bank_account_id,
            to_bank_account_id,
            amount_minor,
            description,
            rate,
            occurred_at,
        } = cmd;
        require_id(from_bank_account_id, "source bank account")?;
        require_id(to_bank_account_id, "destination bank account")?;
        if from_bank_account_id == to_bank_account_id {
            return Err(EngineError::InvalidInput(
                "source and destination must differ".to_string(),
            ));
        }
        let amount_minor = require_amount(amount_minor, "amount_minor")?;
        if rate.is_some_and(|r| r <= Decimal::ZERO) {
            return Err(EngineError::InvalidInput("rate must be > 0".to_string()));
        }
        let description = normalize_required_text(&description, "description")?;

        with_tx!(self, |db_tx| {
            let account = self.require_account_for_user(&db_tx, &user_id).await?;
            let source = self
                .require_active_bank_account(&db_tx, &account.id, from_bank_account_id)
                .await?;
            let destination = self
                .require_active_bank_account(&db_tx, &account.id, to_bank_account_id)
                .await?;

            let source_currency = model_currency(&source.currency)?;
            let destination_currency = model_currency(&destination.currency)?;
            if source_currency != destination_currency && rate.is_none() {
                return Err(EngineError::CurrencyMismatch(format!(
                    "transfer from {source_currency} to {destination_currency} needs a rate"
                )));
            }
            let incoming_minor = match rate {
                Some(rate) => convert_minor(amount_minor, rate)?,
                None => amount_minor,
            };
            let incoming_minor = require_amount(incoming_minor, "converted amount")?;

            let transfer_id = Uuid::new_v4();
            let mut outgoing = Transaction::new(
                from_bank_account_id,
                TransactionKind::Transfer,
                -amount_minor,
                description.clone(),
                occurred_at,
            )?;
            outgoing.counterpart_bank_account_id = Some(to_bank_account_id);
            outgoing.fx_rate = rate;
            outgoing.transfer_id = Some(transfer_id);

            let mut incoming = Transaction::new(
                to_bank_account_id,
                TransactionKind::Transfer,
                incoming_minor,
                description,
                occurred_at,
            )?;
            incoming.counterpart_bank_account_id = Some(from_bank_account_id);
            incoming.fx_rate = rate;
            incoming.transfer_id = Some(transfer_id);

            self.append_entry(&db_tx, &account.user_id, &source, &outgoing)
                .await?;
            self.append_entry(&db_tx, &account.user_id, &destination, &incoming)
                .await?;

            info!(
                user_id = %account.user_id,
                %transfer_id,
                amount_minor,
                incoming_minor,
                "transfer recorded"
            );
            Ok(Transfer {
                transfer_id,
                outgoing,
                incoming,
            })
        })
    }
}
