use super::*;
use anyhow::anyhow;
use serde_json::json;
use std::{sync::atomic::AtomicUsize, time::Duration};

fn counting_handler(counter: Arc<AtomicUsize>) -> HandlerRef {
    handler_fn(move |_event| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

struct PanickingHandler;

#[async_trait]
impl EventHandler for PanickingHandler {
    async fn handle(&self, _event: &DomainEvent) -> anyhow::Result<()> {
        panic!("handler panicked mid-delivery")
    }
}

fn sample_event(event_type: &str) -> DomainEvent {
    DomainEvent::new(event_type, "client-1", json!({ "client_id": "client-1" }))
}

#[tokio::test]
async fn publish_without_subscribers_resolves() {
    let bus = EventBus::new();
    let outcome = bus.publish(sample_event(event_types::CLIENT_SELECTED)).await;
    assert_eq!(outcome, PublishOutcome::default());
}

#[tokio::test]
async fn failing_handler_does_not_block_siblings() {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicUsize::new(0));

    bus.subscribe(
        event_types::CLIENT_SELECTED,
        handler_fn(|_event| async { Err(anyhow!("handler exploded")) }),
    );
    bus.subscribe(event_types::CLIENT_SELECTED, counting_handler(counter.clone()));
    bus.subscribe(event_types::CLIENT_SELECTED, counting_handler(counter.clone()));

    let outcome = bus.publish(sample_event(event_types::CLIENT_SELECTED)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.delivered, 2);
    assert_eq!(outcome.failed, 1);
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicUsize::new(0));

    bus.subscribe(event_types::ITEM_CREATED, Arc::new(PanickingHandler));
    bus.subscribe(event_types::ITEM_CREATED, counting_handler(counter.clone()));

    let outcome = bus.publish(sample_event(event_types::ITEM_CREATED)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.failed, 1);
}

#[tokio::test]
async fn same_handler_instance_is_invoked_once() {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(counter.clone());

    bus.subscribe(event_types::BRANCH_SELECTED, handler.clone());
    bus.subscribe(event_types::BRANCH_SELECTED, handler);

    bus.publish(sample_event(event_types::BRANCH_SELECTED)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(event_types::BRANCH_SELECTED), 1);
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let first = bus.subscribe(event_types::CLIENT_CREATED, counting_handler(counter.clone()));
    let _second = bus.subscribe(event_types::CLIENT_CREATED, counting_handler(counter.clone()));

    first.unsubscribe();
    first.unsubscribe();

    assert_eq!(bus.subscriber_count(event_types::CLIENT_CREATED), 1);
    bus.publish(sample_event(event_types::CLIENT_CREATED)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unsubscribe_after_bus_dropped_is_safe() {
    let bus = EventBus::new();
    let subscription = bus.subscribe(
        event_types::CLIENT_CREATED,
        counting_handler(Arc::new(AtomicUsize::new(0))),
    );
    drop(bus);
    subscription.unsubscribe();
}

#[tokio::test]
async fn handlers_only_receive_their_event_type() {
    let bus = EventBus::new();
    let selected = Arc::new(AtomicUsize::new(0));
    let cleared = Arc::new(AtomicUsize::new(0));
    bus.subscribe(event_types::CLIENT_SELECTED, counting_handler(selected.clone()));
    bus.subscribe(
        event_types::CLIENT_SELECTION_CLEARED,
        counting_handler(cleared.clone()),
    );

    bus.publish(sample_event(event_types::CLIENT_SELECTION_CLEARED))
        .await;

    assert_eq!(selected.load(Ordering::SeqCst), 0);
    assert_eq!(cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clear_removes_every_subscription() {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicUsize::new(0));
    bus.subscribe(event_types::CLIENT_SELECTED, counting_handler(counter.clone()));
    bus.subscribe(event_types::ITEM_CREATED, counting_handler(counter.clone()));

    bus.clear();

    bus.publish(sample_event(event_types::CLIENT_SELECTED)).await;
    bus.publish(sample_event(event_types::ITEM_CREATED)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn handlers_run_concurrently_and_publish_waits_for_all() {
    let bus = EventBus::new();
    let finished = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let finished = finished.clone();
        bus.subscribe(
            event_types::ORDER_INFO_UPDATED,
            handler_fn(move |_event| {
                let finished = finished.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
    }

    let started = tokio::time::Instant::now();
    bus.publish(sample_event(event_types::ORDER_INFO_UPDATED))
        .await;

    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[test]
fn payload_decodes_into_typed_value() {
    #[derive(Deserialize)]
    struct Selected {
        client_id: String,
    }

    let event = sample_event(event_types::CLIENT_SELECTED).with_version(2);
    let decoded: Selected = event.payload_as().expect("payload");
    assert_eq!(decoded.client_id, "client-1");
    assert_eq!(event.version, 2);
}
