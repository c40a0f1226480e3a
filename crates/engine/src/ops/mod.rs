use sea_orm::DatabaseConnection;

mod access;
mod balances;
mod budgets;
mod dispatcher;
mod evaluator;
mod notifications;
mod outbox;
mod registry;
mod settings;
mod transactions;

pub use dispatcher::{Dispatch, SuppressReason};
pub use evaluator::BudgetEvaluation;
pub use transactions::{TransactionListFilter, Transfer};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    dedup_budget_alerts: bool,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    dedup_budget_alerts: bool,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Emit each budget alert level at most once per budget period.
    pub fn dedup_budget_alerts(mut self, enabled: bool) -> EngineBuilder {
        self.dedup_budget_alerts = enabled;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> crate::ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            dedup_budget_alerts: self.dedup_budget_alerts,
        })
    }
}
