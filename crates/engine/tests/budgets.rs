use api_types::events::{Channel, LedgerKind, TransactionCreated};
use chrono::{Datelike, Duration, Utc};
use sea_orm::Database;

use engine::{
    AlertLevel, BudgetEvaluation, Category, Currency, Engine, EngineError, ErrorKind,
    NewBudgetCmd, RecordTransactionCmd, Transaction,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with(dedup: bool) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder()
        .database(db)
        .dedup_budget_alerts(dedup)
        .build()
        .await
        .unwrap()
}

struct Seed {
    bank_account_id: Uuid,
    groceries: Category,
}

async fn seed(engine: &Engine, user_id: &str) -> Seed {
    engine.new_account(user_id, "Personal").await.unwrap();
    let checking = engine
        .new_bank_account(user_id, "Checking", Currency::Eur)
        .await
        .unwrap();
    engine
        .record_transaction(RecordTransactionCmd::income(
            user_id,
            checking.id,
            1_000_000,
            "salary",
        ))
        .await
        .unwrap();
    let groceries = engine.new_category(user_id, "Groceries").await.unwrap();
    Seed {
        bank_account_id: checking.id,
        groceries,
    }
}

async fn budget_this_month(engine: &Engine, user_id: &str, category_id: Uuid, limit: i64) -> Uuid {
    let now = Utc::now();
    engine
        .create_budget(NewBudgetCmd::new(
            user_id,
            category_id,
            "Food",
            limit,
            now.year(),
            now.month(),
        ))
        .await
        .unwrap()
        .id
}

async fn spend(engine: &Engine, user_id: &str, s: &Seed, amount: i64) -> Transaction {
    engine
        .record_transaction(
            RecordTransactionCmd::expense(user_id, s.bank_account_id, amount, "shop")
                .category(s.groceries.id),
        )
        .await
        .unwrap()
}

async fn evaluate(engine: &Engine, user_id: &str, tx: &Transaction) -> BudgetEvaluation {
    engine
        .evaluate_transaction(&tx.created_event(user_id), Utc::now())
        .await
        .unwrap()
}

async fn queued(engine: &Engine, channel: Channel) -> usize {
    engine
        .pending_outbox(500)
        .await
        .unwrap()
        .iter()
        .filter(|m| m.channel == channel)
        .count()
}

#[tokio::test]
async fn quiet_then_warning_then_exceeded() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    let budget_id = budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;

    let tx = spend(&engine, "alice", &s, 700).await;
    assert_eq!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::UnderThreshold {
            budget_id,
            spent_minor: 700
        }
    );

    let tx = spend(&engine, "alice", &s, 150).await;
    let BudgetEvaluation::Warning(warning) = evaluate(&engine, "alice", &tx).await else {
        panic!("expected a warning at 850");
    };
    assert_eq!(warning.spent_amount_minor, 850);
    assert_eq!(warning.budget_amount_minor, 1_000);
    assert!((warning.warning_percent - 85.0).abs() < 1e-9);
    assert_eq!(warning.budget_id, budget_id);

    let tx = spend(&engine, "alice", &s, 200).await;
    let BudgetEvaluation::Exceeded(exceeded) = evaluate(&engine, "alice", &tx).await else {
        panic!("expected exceeded at 1050");
    };
    assert_eq!(exceeded.spent_amount_minor, 1_050);
    assert_eq!(exceeded.excess_amount_minor, 50);
    assert_eq!(exceeded.category_id, s.groceries.id);

    assert_eq!(queued(&engine, Channel::BudgetWarning).await, 1);
    assert_eq!(queued(&engine, Channel::BudgetExceeded).await, 1);
}

#[tokio::test]
async fn exactly_eighty_percent_warns_and_exactly_the_limit_does_not_exceed() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;

    let tx = spend(&engine, "alice", &s, 800).await;
    assert!(matches!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::Warning(_)
    ));

    let tx = spend(&engine, "alice", &s, 200).await;
    assert!(matches!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::Warning(_)
    ));
}

#[tokio::test]
async fn spend_is_reaggregated_not_taken_from_event() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;
    spend(&engine, "alice", &s, 900).await;

    let tiny = TransactionCreated {
        transaction_id: Uuid::new_v4(),
        user_id: "alice".to_string(),
        bank_account_id: s.bank_account_id,
        category_id: Some(s.groceries.id),
        amount_minor: -1,
        kind: LedgerKind::Expense,
        description: "replayed".to_string(),
        timestamp: Utc::now(),
    };
    let evaluation = engine.evaluate_transaction(&tiny, Utc::now()).await.unwrap();
    let BudgetEvaluation::Warning(warning) = evaluation else {
        panic!("expected a warning");
    };
    assert_eq!(warning.spent_amount_minor, 900);
}

#[tokio::test]
async fn nothing_to_evaluate() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    let other = engine.new_category("alice", "Fuel").await.unwrap();
    budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;

    let income = engine
        .record_transaction(
            RecordTransactionCmd::income("alice", s.bank_account_id, 5_000, "refund")
                .category(s.groceries.id),
        )
        .await
        .unwrap();
    assert_eq!(
        evaluate(&engine, "alice", &income).await,
        BudgetEvaluation::NotAnExpense
    );

    let uncategorized = engine
        .record_transaction(RecordTransactionCmd::expense(
            "alice",
            s.bank_account_id,
            5_000,
            "cash",
        ))
        .await
        .unwrap();
    assert_eq!(
        evaluate(&engine, "alice", &uncategorized).await,
        BudgetEvaluation::NoBudget
    );

    let fuel = engine
        .record_transaction(
            RecordTransactionCmd::expense("alice", s.bank_account_id, 5_000, "diesel")
                .category(other.id),
        )
        .await
        .unwrap();
    assert_eq!(
        evaluate(&engine, "alice", &fuel).await,
        BudgetEvaluation::NoBudget
    );

    assert_eq!(queued(&engine, Channel::BudgetWarning).await, 0);
    assert_eq!(queued(&engine, Channel::BudgetExceeded).await, 0);
}

#[tokio::test]
async fn budget_of_another_month_is_ignored() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    let last_month = Utc::now() - Duration::days(40);
    engine
        .create_budget(NewBudgetCmd::new(
            "alice",
            s.groceries.id,
            "Food",
            100,
            last_month.year(),
            last_month.month(),
        ))
        .await
        .unwrap();

    let tx = spend(&engine, "alice", &s, 500).await;
    assert_eq!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::NoBudget
    );
}

#[tokio::test]
async fn event_from_another_user_is_not_evaluated() {
    let engine = engine_with(false).await;
    let alice = seed(&engine, "alice").await;
    seed(&engine, "bob").await;
    let budget_id = budget_this_month(&engine, "alice", alice.groceries.id, 1_000).await;
    spend(&engine, "alice", &alice, 950).await;

    let forged = TransactionCreated {
        transaction_id: Uuid::new_v4(),
        user_id: "bob".to_string(),
        bank_account_id: alice.bank_account_id,
        category_id: Some(alice.groceries.id),
        amount_minor: -10,
        kind: LedgerKind::Expense,
        description: "forged".to_string(),
        timestamp: Utc::now(),
    };
    assert_eq!(
        engine.evaluate_transaction(&forged, Utc::now()).await.unwrap(),
        BudgetEvaluation::AccountMismatch { budget_id }
    );
    assert_eq!(queued(&engine, Channel::BudgetWarning).await, 0);
}

#[tokio::test]
async fn dedup_emits_each_level_once_per_period() {
    let engine = engine_with(true).await;
    let s = seed(&engine, "alice").await;
    let budget_id = budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;

    let tx = spend(&engine, "alice", &s, 850).await;
    assert!(matches!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::Warning(_)
    ));

    let tx = spend(&engine, "alice", &s, 50).await;
    assert_eq!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::AlreadyAlerted {
            budget_id,
            level: AlertLevel::Warning
        }
    );

    let tx = spend(&engine, "alice", &s, 200).await;
    assert!(matches!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::Exceeded(_)
    ));

    let tx = spend(&engine, "alice", &s, 10).await;
    assert_eq!(
        evaluate(&engine, "alice", &tx).await,
        BudgetEvaluation::AlreadyAlerted {
            budget_id,
            level: AlertLevel::Exceeded
        }
    );

    assert_eq!(queued(&engine, Channel::BudgetWarning).await, 1);
    assert_eq!(queued(&engine, Channel::BudgetExceeded).await, 1);
}

#[tokio::test]
async fn without_dedup_every_crossing_event_alerts() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;

    for amount in [850, 20, 30] {
        let tx = spend(&engine, "alice", &s, amount).await;
        assert!(matches!(
            evaluate(&engine, "alice", &tx).await,
            BudgetEvaluation::Warning(_)
        ));
    }
    assert_eq!(queued(&engine, Channel::BudgetWarning).await, 3);
}

#[tokio::test]
async fn one_budget_per_category_and_month() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;

    let now = Utc::now();
    let err = engine
        .create_budget(NewBudgetCmd::new(
            "alice",
            s.groceries.id,
            "Food again",
            2_000,
            now.year(),
            now.month(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = engine
        .create_budget(NewBudgetCmd::new(
            "alice",
            s.groceries.id,
            "Food",
            0,
            now.year(),
            now.month(),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = engine
        .create_budget(NewBudgetCmd::new(
            "alice",
            s.groceries.id,
            "Food",
            100,
            now.year(),
            13,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn status_and_summary_follow_the_ledger() {
    let engine = engine_with(false).await;
    let s = seed(&engine, "alice").await;
    let fuel = engine.new_category("alice", "Fuel").await.unwrap();
    let food = budget_this_month(&engine, "alice", s.groceries.id, 1_000).await;
    budget_this_month(&engine, "alice", fuel.id, 500).await;

    spend(&engine, "alice", &s, 1_200).await;

    let status = engine.budget_status("alice", food).await.unwrap();
    assert_eq!(status.spent_minor, 1_200);
    assert_eq!(status.remaining_minor, -200);
    assert!(status.exceeded);
    assert!((status.progress_percent - 120.0).abs() < 1e-9);

    let now = Utc::now();
    let listed = engine
        .list_budgets_with_status("alice", now.year(), now.month())
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);

    let summary = engine
        .budget_summary("alice", now.year(), now.month())
        .await
        .unwrap();
    assert_eq!(summary.budgets, 2);
    assert_eq!(summary.total_planned_minor, 1_500);
    assert_eq!(summary.total_spent_minor, 1_200);
    assert_eq!(summary.total_remaining_minor, 300);
    assert!(!summary.over_budget);

    seed(&engine, "bob").await;
    let err = engine.budget_status("bob", food).await.unwrap_err();
    assert_eq!(err, EngineError::Forbidden);
}
