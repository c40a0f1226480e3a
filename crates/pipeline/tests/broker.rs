use std::time::Duration;

use pipeline::{Broker, BrokerError, dead_letter_queue};

#[tokio::test]
async fn delivers_in_arrival_order() {
    let broker = Broker::new();
    for n in 0..3u8 {
        broker.publish("q", vec![n]).await.unwrap();
    }

    let mut sub = broker.subscribe("q").await.unwrap();
    for n in 0..3u8 {
        let delivery = sub.next().await.unwrap();
        assert_eq!(delivery.payload(), &[n]);
        assert_eq!(delivery.attempt(), 0);
        assert_eq!(delivery.queue(), "q");
        delivery.ack();
    }
    assert_eq!(broker.depth("q").await, 0);
}

#[tokio::test]
async fn requeue_goes_to_head_with_next_attempt() {
    let broker = Broker::new();
    broker.publish("q", b"first".to_vec()).await.unwrap();
    broker.publish("q", b"second".to_vec()).await.unwrap();

    let mut sub = broker.subscribe("q").await.unwrap();
    let first = sub.next().await.unwrap();
    first.nack(true).await;

    let again = sub.next().await.unwrap();
    assert_eq!(again.payload(), b"first");
    assert_eq!(again.attempt(), 1);
    again.nack(false).await;

    let second = sub.next().await.unwrap();
    assert_eq!(second.payload(), b"second");
    second.ack();
    assert_eq!(broker.depth("q").await, 0);
}

#[tokio::test]
async fn waiting_subscriber_is_woken_by_publish() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("q").await.unwrap();

    let publisher = broker.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish("q", b"late".to_vec()).await.unwrap();
    });

    let delivery = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.payload(), b"late");
    handle.await.unwrap();
}

#[tokio::test]
async fn one_subscriber_per_queue() {
    let broker = Broker::new();
    let sub = broker.subscribe("q").await.unwrap();
    assert_eq!(
        broker.subscribe("q").await.unwrap_err(),
        BrokerError::AlreadySubscribed("q".to_string())
    );
    drop(sub);
    assert!(broker.subscribe("q").await.is_ok());
}

#[tokio::test]
async fn dead_letter_keeps_payload_and_reason() {
    let broker = Broker::new();
    broker.publish("q", b"poison".to_vec()).await.unwrap();
    let mut sub = broker.subscribe("q").await.unwrap();
    let delivery = sub.next().await.unwrap();

    broker.dead_letter(delivery, "store unreachable").await;

    assert_eq!(broker.depth("q").await, 0);
    assert_eq!(broker.depth(&dead_letter_queue("q")).await, 1);
    let (payload, reason) = broker.take("q.dead_letter").await.unwrap();
    assert_eq!(payload, b"poison");
    assert_eq!(reason.as_deref(), Some("store unreachable"));
}

#[tokio::test]
async fn close_wakes_subscribers_and_rejects_publish() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("q").await.unwrap();
    let waiter = tokio::spawn(async move { sub.next().await.is_none() });

    tokio::time::sleep(Duration::from_millis(20)).await;
    broker.close().await;

    let woke_empty = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(woke_empty);
    assert_eq!(
        broker.publish("q", b"x".to_vec()).await.unwrap_err(),
        BrokerError::Closed
    );
    assert_eq!(
        broker.subscribe("other").await.unwrap_err(),
        BrokerError::Closed
    );
}

#[tokio::test]
async fn outbox_id_travels_with_the_message() {
    let broker = Broker::new();
    broker.publish_with_id("q", b"row".to_vec(), 42).await.unwrap();
    broker.publish("q", b"plain".to_vec()).await.unwrap();

    let mut sub = broker.subscribe("q").await.unwrap();
    let tagged = sub.next().await.unwrap();
    assert_eq!(tagged.message_id(), Some(42));
    tagged.nack(true).await;

    let again = sub.next().await.unwrap();
    assert_eq!(again.message_id(), Some(42));
    assert_eq!(again.attempt(), 1);
    again.ack();

    let plain = sub.next().await.unwrap();
    assert_eq!(plain.message_id(), None);
}

#[tokio::test]
async fn closed_resolves_for_waiters_and_late_callers() {
    let broker = Broker::new();
    let watcher = broker.clone();
    let waiter = tokio::spawn(async move { watcher.closed().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    broker.close().await;

    tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(2), broker.closed())
        .await
        .unwrap();
}
