// Integration tests for the event dispatcher lifecycle
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ima_relayer::events::{listener, DispatchedEvent, EventDispatcher, Listener, DISPOSE_EVENT};

fn counter_listener(counter: &Arc<AtomicUsize>) -> Listener {
    let counter = counter.clone();
    listener(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// Register, dedup, dispose, dispatch after dispose, dispose twice
#[test]
fn test_register_dedup_and_dispose_scenario() {
    let dispatcher = EventDispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let l = counter_listener(&calls);

    dispatcher.add_event_listener("x", l.clone());
    dispatcher.dispatch_event(&DispatchedEvent::bare("x")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Same pair again: still a single invocation per dispatch
    dispatcher.add_event_listener("x", l.clone());
    dispatcher.dispatch_event(&DispatchedEvent::bare("x")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let disposals = Arc::new(AtomicUsize::new(0));
    dispatcher.on(DISPOSE_EVENT, counter_listener(&disposals));

    dispatcher.dispose().unwrap();
    assert_eq!(disposals.load(Ordering::SeqCst), 1);

    dispatcher.dispatch_event(&DispatchedEvent::bare("x")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    dispatcher.dispose().unwrap();
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
    assert!(dispatcher.is_disposed());
}

/// Events only reach listeners registered for their type
#[test]
fn test_dispatch_filters_by_type() {
    let dispatcher = EventDispatcher::new();
    let x_calls = Arc::new(AtomicUsize::new(0));
    let y_calls = Arc::new(AtomicUsize::new(0));
    dispatcher.on("x", counter_listener(&x_calls));
    dispatcher.on("y", counter_listener(&y_calls));

    dispatcher.dispatch_event(&DispatchedEvent::bare("x")).unwrap();
    dispatcher.dispatch_event(&DispatchedEvent::bare("unknown")).unwrap();

    assert_eq!(x_calls.load(Ordering::SeqCst), 1);
    assert_eq!(y_calls.load(Ordering::SeqCst), 0);
}

/// Removal by handle and by listener, including unknown ones
#[test]
fn test_removal_variants() {
    let dispatcher = EventDispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let a = counter_listener(&calls);
    let b = counter_listener(&calls);

    let a_id = dispatcher.on("x", a.clone());
    dispatcher.on("x", b.clone());
    assert!(dispatcher.has_event_listener("x", &a));
    assert!(dispatcher.has_event_listener("x", &b));

    dispatcher.remove_listener(a_id);
    assert!(!dispatcher.has_event_listener("x", &a));

    dispatcher.off("x", Some(&b));
    assert_eq!(dispatcher.listener_count(), 0);

    // Removing what is not there is a no-op
    dispatcher.off("x", Some(&a)).off("never-registered", None);
    dispatcher.remove_listener(a_id);
    assert_eq!(dispatcher.listener_count(), 0);
}

/// Listeners receive the dispatcher they were invoked by and the event payload
#[test]
fn test_listener_receives_dispatcher_and_detail() {
    let dispatcher = EventDispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    dispatcher.on(
        "payload",
        listener(move |d, event| {
            seen_clone
                .lock()
                .unwrap()
                .push((d.id(), event.detail["n"].as_u64().unwrap_or_default()));
            Ok(())
        }),
    );

    dispatcher
        .dispatch_event(&DispatchedEvent::new("payload", serde_json::json!({ "n": 5 })))
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(dispatcher.id(), 5)]);
}

/// remove_all clears every type
#[test]
fn test_remove_all_event_listeners() {
    let dispatcher = EventDispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));
    dispatcher.on("x", counter_listener(&calls));
    dispatcher.on("y", counter_listener(&calls));

    dispatcher.off_all();

    dispatcher.dispatch_event(&DispatchedEvent::bare("x")).unwrap();
    dispatcher.dispatch_event(&DispatchedEvent::bare("y")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // Not disposed: new registrations still work
    dispatcher.on("x", counter_listener(&calls));
    dispatcher.dispatch_event(&DispatchedEvent::bare("x")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
