use super::*;
use crate::{
    event_bus::handler_fn,
    test_support::FakeWorkflow,
};
use futures::future::join_all;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

fn coordinator(service: &Arc<FakeWorkflow>, stage: Stage) -> SessionCoordinator {
    SessionCoordinator::new(stage, service.clone())
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_initialize_call() {
    let service = FakeWorkflow::new()
        .with_initialize_delay(Duration::from_millis(50))
        .into_arc();
    let sessions = coordinator(&service, Stage::ClientSearch);

    let results = join_all((0..8).map(|_| sessions.ensure_session())).await;

    assert_eq!(service.initialize_count(), 1);
    let first = results[0].clone().expect("session");
    assert!(results.iter().all(|result| result.as_ref() == Ok(&first)));
    assert_eq!(sessions.session_id(), Some(first));
    assert_eq!(sessions.ownership(), Some(Ownership::Owned));
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_rejection() {
    let service = FakeWorkflow::new()
        .with_initialize_delay(Duration::from_millis(50))
        .with_initialize_failures(1)
        .into_arc();
    let sessions = coordinator(&service, Stage::BasicOrderInfo);

    let results = join_all((0..4).map(|_| sessions.ensure_session())).await;

    assert_eq!(service.initialize_count(), 1);
    let first = results[0].clone().expect_err("rejection");
    assert!(matches!(first, SessionError::InitializeFailed { stage: Stage::BasicOrderInfo, .. }));
    assert!(results.iter().all(|result| result.as_ref() == Err(&first)));
}

#[tokio::test]
async fn failed_initialization_is_retriable() {
    let service = FakeWorkflow::new().with_initialize_failures(1).into_arc();
    let sessions = coordinator(&service, Stage::ItemManager);

    sessions.ensure_session().await.expect_err("first attempt fails");
    assert_eq!(sessions.session_id(), None);
    assert_eq!(sessions.phase(), SessionPhase::Uninitialized);

    let session_id = sessions.ensure_session().await.expect("retry succeeds");
    assert_eq!(service.initialize_count(), 2);
    assert_eq!(sessions.session_id(), Some(session_id));
}

#[tokio::test]
async fn active_session_is_a_pure_cache_hit() {
    let service = FakeWorkflow::new().into_arc();
    let sessions = coordinator(&service, Stage::BranchSelection);

    let first = sessions.ensure_session().await.expect("session");
    let second = sessions.ensure_session().await.expect("session");

    assert_eq!(first, second);
    assert_eq!(service.initialize_count(), 1);
}

#[tokio::test]
async fn adopted_session_is_returned_without_remote_call() {
    let service = FakeWorkflow::new().into_arc();
    let sessions = coordinator(&service, Stage::ItemPricing);
    let parent = SessionId::new("item_manager-42");

    sessions.adopt_session(parent.clone());

    assert_eq!(sessions.session_id(), Some(parent.clone()));
    assert_eq!(sessions.ensure_session().await, Ok(parent));
    assert_eq!(sessions.ownership(), Some(Ownership::Borrowed));
    assert_eq!(service.initialize_count(), 0);
}

#[tokio::test]
async fn reset_cancels_owned_session_and_allows_reinitialization() {
    let service = FakeWorkflow::new().into_arc();
    let sessions = coordinator(&service, Stage::ClientCreation);
    let first = sessions.ensure_session().await.expect("session");

    sessions.reset().await;

    assert_eq!(sessions.session_id(), None);
    assert_eq!(service.cancelled_sessions().await, vec![first.clone()]);

    let second = sessions.ensure_session().await.expect("fresh session");
    assert_ne!(first, second);
    assert_eq!(service.initialize_count(), 2);
}

#[tokio::test]
async fn reset_never_cancels_a_borrowed_session() {
    let service = FakeWorkflow::new().into_arc();
    let sessions = coordinator(&service, Stage::ItemDefects);
    sessions.adopt_session(SessionId::new("item_manager-7"));

    sessions.reset().await;

    assert_eq!(sessions.session_id(), None);
    assert!(service.cancelled_sessions().await.is_empty());
}

#[tokio::test]
async fn failing_remote_cancel_still_resets_locally() {
    let service = FakeWorkflow::new().with_failing_cancel().into_arc();
    let sessions = coordinator(&service, Stage::ClientSearch);
    sessions.ensure_session().await.expect("session");

    sessions.reset().await;

    assert_eq!(sessions.phase(), SessionPhase::Uninitialized);
    assert_eq!(service.cancelled_sessions().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_success_after_reset_is_discarded_and_cancelled() {
    let service = FakeWorkflow::new()
        .with_initialize_delay(Duration::from_millis(100))
        .into_arc();
    let sessions = coordinator(&service, Stage::ClientSearch);

    let pending = tokio::spawn({
        let sessions = sessions.clone();
        async move { sessions.ensure_session().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sessions.phase(), SessionPhase::Initializing);

    sessions.reset().await;
    let outcome = pending.await.expect("join");

    assert_eq!(
        outcome,
        Err(SessionError::Superseded {
            stage: Stage::ClientSearch
        })
    );
    assert_eq!(sessions.session_id(), None);
    assert_eq!(service.cancelled_sessions().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn adoption_supersedes_in_flight_initialization() {
    let service = FakeWorkflow::new()
        .with_initialize_delay(Duration::from_millis(100))
        .into_arc();
    let sessions = coordinator(&service, Stage::ItemPhotos);

    let pending = tokio::spawn({
        let sessions = sessions.clone();
        async move { sessions.ensure_session().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let parent = SessionId::new("item_manager-3");
    sessions.adopt_session(parent.clone());
    let outcome = pending.await.expect("join");

    assert!(matches!(outcome, Err(SessionError::Superseded { .. })));
    assert_eq!(sessions.session_id(), Some(parent));
}

#[tokio::test]
async fn complete_releases_the_session() {
    let service = FakeWorkflow::new().into_arc();
    let sessions = coordinator(&service, Stage::Order);
    let session_id = sessions.ensure_session().await.expect("session");

    let result = sessions.complete().await.expect("complete");

    assert_eq!(result.session_id, session_id);
    assert_eq!(sessions.session_id(), None);
    assert!(service.cancelled_sessions().await.is_empty());
}

#[tokio::test]
async fn remote_failures_surface_as_wizard_errors() {
    let sessions = SessionCoordinator::new(
        Stage::BranchSelection,
        Arc::new(crate::workflow::UnavailableWorkflowService),
    );

    let err = sessions.validate().await.expect_err("unavailable");
    assert!(matches!(err, WizardError::Session(SessionError::InitializeFailed { .. })));
    assert_eq!(sessions.phase(), SessionPhase::Uninitialized);
}

#[tokio::test]
async fn started_and_reset_are_announced_on_the_bus() {
    let service = FakeWorkflow::new().into_arc();
    let bus = EventBus::new();
    let started = Arc::new(AtomicUsize::new(0));
    let reset = Arc::new(AtomicUsize::new(0));
    for (event_type, counter) in [
        (event_types::SESSION_STARTED, started.clone()),
        (event_types::SESSION_RESET, reset.clone()),
    ] {
        bus.subscribe(
            event_type,
            handler_fn(move |_event| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
    }
    let sessions = SessionCoordinator::with_event_bus(Stage::Order, service.clone(), bus);

    sessions.ensure_session().await.expect("session");
    sessions.ensure_session().await.expect("cached");
    sessions.reset().await;

    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(reset.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn init_params_travel_with_every_initialize() {
    let service = FakeWorkflow::new().into_arc();
    let sessions = coordinator(&service, Stage::ItemManager)
        .with_init_params(json!({ "order_session_id": "order-1" }));

    sessions.ensure_session().await.expect("session");

    let requests = service.initialize_requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].stage, Stage::ItemManager);
    assert_eq!(requests[0].params, json!({ "order_session_id": "order-1" }));
}
