use api_types::events::DomainEvent;
use chrono::Utc;
use engine::{BudgetEvaluation, Dispatch, Engine};
use tracing::{debug, info};

use crate::PipelineError;

/// Run the consumer logic of `event`'s channel.
pub(crate) async fn handle(engine: &Engine, event: DomainEvent) -> Result<(), PipelineError> {
    match event {
        DomainEvent::TransactionCreated(event) => {
            let evaluation = engine.evaluate_transaction(&event, Utc::now()).await?;
            match &evaluation {
                BudgetEvaluation::Warning(_) | BudgetEvaluation::Exceeded(_) => {}
                other => debug!(
                    transaction_id = %event.transaction_id,
                    user_id = %event.user_id,
                    "no budget alert: {other:?}"
                ),
            }
        }
        DomainEvent::BudgetExceeded(event) => {
            let dispatch = engine.dispatch_budget_exceeded(&event).await?;
            log_dispatch(&event.user_id, "budget_exceeded", &dispatch);
        }
        DomainEvent::BudgetWarning(event) => {
            let dispatch = engine.dispatch_budget_warning(&event).await?;
            log_dispatch(&event.user_id, "budget_warning", &dispatch);
        }
        DomainEvent::LowBalance(event) => {
            let dispatch = engine.dispatch_low_balance(&event).await?;
            log_dispatch(&event.user_id, "low_balance", &dispatch);
        }
        DomainEvent::Notification(event) => {
            // Push and email delivery live outside this process.
            info!(
                user_id = %event.user_id,
                notification_id = %event.notification_id,
                kind = event.kind.as_str(),
                priority = event.priority.as_str(),
                title = %event.title,
                "notification delivered"
            );
        }
    }
    Ok(())
}

fn log_dispatch(user_id: &str, kind: &str, dispatch: &Dispatch) {
    match dispatch {
        Dispatch::Created(id) => debug!(user_id, kind, notification_id = %id, "dispatched"),
        Dispatch::Suppressed(reason) => {
            debug!(user_id, kind, reason = reason.as_str(), "suppressed")
        }
    }
}
