use api_types::{
    events::{BudgetExceeded, BudgetWarning, Channel, DomainEvent, LowBalance},
    notification::{NotificationKind, Priority},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    DeliveryChannel, Dispatch, Engine, EngineError, ErrorKind, NotificationSettings,
    SettingsUpdate, SuppressReason,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn exceeded(user_id: &str) -> BudgetExceeded {
    BudgetExceeded {
        user_id: user_id.to_string(),
        budget_id: Uuid::new_v4(),
        budget_name: "Groceries".to_string(),
        budget_amount_minor: 100_000,
        spent_amount_minor: 105_000,
        excess_amount_minor: 5_000,
        category_id: Uuid::new_v4(),
        timestamp: Utc::now(),
    }
}

fn warning(user_id: &str, spent_minor: i64) -> BudgetWarning {
    BudgetWarning {
        user_id: user_id.to_string(),
        budget_id: Uuid::new_v4(),
        budget_name: "Groceries".to_string(),
        budget_amount_minor: 100_000,
        spent_amount_minor: spent_minor,
        warning_percent: spent_minor as f64 * 100.0 / 100_000.0,
        category_id: Uuid::new_v4(),
        timestamp: Utc::now(),
    }
}

fn low_balance(user_id: &str, balance_minor: i64) -> LowBalance {
    LowBalance {
        user_id: user_id.to_string(),
        bank_account_id: Uuid::new_v4(),
        account_name: "Checking".to_string(),
        current_balance_minor: balance_minor,
        alert_threshold_minor: 10_000,
        timestamp: Utc::now(),
    }
}

async fn settings_rows(db: &DatabaseConnection, user_id: &str) -> i64 {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM user_notification_settings WHERE user_id = ?",
            vec![user_id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

fn created(dispatch: Dispatch) -> Uuid {
    match dispatch {
        Dispatch::Created(id) => id,
        other => panic!("expected a notification, got {other:?}"),
    }
}

#[tokio::test]
async fn first_alert_persists_default_settings_once() {
    let (engine, db) = engine_with_db().await;

    let id = created(engine.dispatch_budget_exceeded(&exceeded("carol")).await.unwrap());
    assert_eq!(settings_rows(&db, "carol").await, 1);

    let stored = engine.notification_settings("carol").await.unwrap();
    let defaults = NotificationSettings::defaults("carol");
    assert!(stored.budget_alerts_enabled && stored.balance_alerts_enabled);
    assert_eq!(stored.budget_warning_percent, defaults.budget_warning_percent);
    assert_eq!(
        stored.low_balance_threshold_minor,
        defaults.low_balance_threshold_minor
    );
    assert_eq!(stored.preferred_channel, DeliveryChannel::Email);

    engine.dispatch_budget_exceeded(&exceeded("carol")).await.unwrap();
    assert_eq!(settings_rows(&db, "carol").await, 1);
    let again = engine.notification_settings("carol").await.unwrap();
    assert_eq!(again.created_at, stored.created_at);

    let notification = engine.notification("carol", id).await.unwrap();
    assert_eq!(notification.kind(), NotificationKind::BudgetExceeded);
    assert_eq!(notification.priority, Priority::High);
    assert_eq!(notification.title, "Budget exceeded");
    assert!(notification.message.contains("Groceries"));
    assert!(!notification.is_read);
}

#[tokio::test]
async fn disabled_budget_alerts_suppress_without_writing() {
    let (engine, db) = engine_with_db().await;
    engine
        .save_notification_settings(
            "alice",
            SettingsUpdate {
                budget_alerts_enabled: false,
                ..SettingsUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        engine.dispatch_budget_exceeded(&exceeded("alice")).await.unwrap(),
        Dispatch::Suppressed(SuppressReason::BudgetAlertsDisabled)
    );
    assert_eq!(
        engine
            .dispatch_budget_warning(&warning("alice", 95_000))
            .await
            .unwrap(),
        Dispatch::Suppressed(SuppressReason::BudgetAlertsDisabled)
    );

    let page = engine
        .list_notifications_page("alice", 10, None, false)
        .await
        .unwrap();
    assert!(page.notifications.is_empty());
    assert!(engine.pending_outbox(10).await.unwrap().is_empty());

    // low balance is governed by its own switch
    created(
        engine
            .dispatch_low_balance(&low_balance("alice", 500))
            .await
            .unwrap(),
    );
    assert_eq!(settings_rows(&db, "alice").await, 1);
}

#[tokio::test]
async fn warning_respects_user_percent() {
    let (engine, _db) = engine_with_db().await;
    engine
        .save_notification_settings(
            "alice",
            SettingsUpdate {
                budget_warning_percent: 90,
                ..SettingsUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        engine
            .dispatch_budget_warning(&warning("alice", 85_000))
            .await
            .unwrap(),
        Dispatch::Suppressed(SuppressReason::BelowUserWarningPercent)
    );

    let id = created(
        engine
            .dispatch_budget_warning(&warning("alice", 92_000))
            .await
            .unwrap(),
    );
    let notification = engine.notification("alice", id).await.unwrap();
    assert_eq!(notification.priority, Priority::Medium);
    assert_eq!(notification.kind(), NotificationKind::BudgetWarning);
}

#[tokio::test]
async fn low_balance_uses_user_threshold() {
    let (engine, _db) = engine_with_db().await;

    let id = created(
        engine
            .dispatch_low_balance(&low_balance("alice", 9_000))
            .await
            .unwrap(),
    );
    let view = engine.notification("alice", id).await.unwrap().view().unwrap();
    assert_eq!(view.kind, NotificationKind::LowBalance);
    assert_eq!(view.priority, Priority::High);
    assert_eq!(view.data["current_balance_minor"], 9_000);

    assert_eq!(
        engine
            .dispatch_low_balance(&low_balance("alice", 12_000))
            .await
            .unwrap(),
        Dispatch::Suppressed(SuppressReason::BalanceAboveThreshold)
    );

    engine
        .save_notification_settings(
            "alice",
            SettingsUpdate {
                balance_alerts_enabled: false,
                ..SettingsUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        engine
            .dispatch_low_balance(&low_balance("alice", 1))
            .await
            .unwrap(),
        Dispatch::Suppressed(SuppressReason::BalanceAlertsDisabled)
    );
}

#[tokio::test]
async fn created_notification_is_fanned_out() {
    let (engine, _db) = engine_with_db().await;
    let id = created(engine.dispatch_budget_exceeded(&exceeded("alice")).await.unwrap());

    let pending = engine.pending_outbox(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].channel, Channel::Notification);
    let DomainEvent::Notification(event) =
        DomainEvent::decode(Channel::Notification, pending[0].payload.as_bytes()).unwrap()
    else {
        panic!("expected a notification event");
    };
    assert_eq!(event.notification_id, id);
    assert_eq!(event.user_id, "alice");
    assert_eq!(event.kind, NotificationKind::BudgetExceeded);
    assert_eq!(event.data["excess_amount_minor"], 5_000);
}

#[tokio::test]
async fn read_model_pages_and_marks() {
    let (engine, _db) = engine_with_db().await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(created(
            engine.dispatch_budget_exceeded(&exceeded("alice")).await.unwrap(),
        ));
    }
    created(engine.dispatch_budget_exceeded(&exceeded("bob")).await.unwrap());

    let first = engine
        .list_notifications_page("alice", 2, None, false)
        .await
        .unwrap();
    assert_eq!(first.notifications.len(), 2);
    let cursor = first.next_cursor.clone().unwrap();
    let second = engine
        .list_notifications_page("alice", 2, Some(&cursor), false)
        .await
        .unwrap();
    assert_eq!(second.notifications.len(), 1);
    assert!(second.next_cursor.is_none());
    assert!(
        first
            .notifications
            .iter()
            .chain(second.notifications.iter())
            .all(|n| n.user_id == "alice")
    );

    assert_eq!(engine.unread_count("alice").await.unwrap(), 3);
    engine.mark_notification_read("alice", ids[0]).await.unwrap();
    assert_eq!(engine.unread_count("alice").await.unwrap(), 2);
    assert!(engine.notification("alice", ids[0]).await.unwrap().is_read);

    let unread = engine
        .list_notifications_page("alice", 10, None, true)
        .await
        .unwrap();
    assert_eq!(unread.notifications.len(), 2);
    assert!(unread.notifications.iter().all(|n| !n.is_read));

    assert_eq!(engine.mark_all_notifications_read("alice").await.unwrap(), 2);
    assert_eq!(engine.unread_count("alice").await.unwrap(), 0);
    assert_eq!(engine.unread_count("bob").await.unwrap(), 1);
}

#[tokio::test]
async fn notifications_of_others_are_forbidden() {
    let (engine, _db) = engine_with_db().await;
    let id = created(engine.dispatch_budget_exceeded(&exceeded("alice")).await.unwrap());

    let err = engine.mark_notification_read("mallory", id).await.unwrap_err();
    assert_eq!(err, EngineError::Forbidden);
    let err = engine.notification("mallory", id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OwnershipViolation);

    let err = engine
        .mark_notification_read("alice", Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(engine.unread_count("alice").await.unwrap(), 1);
}

#[tokio::test]
async fn settings_updates_are_validated() {
    let (engine, db) = engine_with_db().await;

    let err = engine
        .save_notification_settings(
            "alice",
            SettingsUpdate {
                budget_warning_percent: 150,
                ..SettingsUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(settings_rows(&db, "alice").await, 0);

    let saved = engine
        .save_notification_settings(
            "alice",
            SettingsUpdate {
                low_balance_threshold_minor: 0,
                preferred_channel: DeliveryChannel::Push,
                ..SettingsUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.preferred_channel, DeliveryChannel::Push);
    let reread = engine.notification_settings("alice").await.unwrap();
    assert_eq!(reread.low_balance_threshold_minor, 0);
    assert_eq!(reread.preferred_channel, DeliveryChannel::Push);
}
