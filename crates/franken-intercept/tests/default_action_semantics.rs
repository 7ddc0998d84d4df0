//! Integration tests for the default action contract, strict invariant
//! enforcement, and the dispatch event log.

use std::cell::Cell;
use std::rc::Rc;

use frankenengine_intercept::events::DispatchRoute;
use frankenengine_intercept::{
    DispatchConfig, HandlerNameOverrides, Interceptable, InterceptableClass, InvariantPolicy,
    JsValue, ObjectError, ObjectHeap, Operation, PropertyDescriptor, PropertyKey, TrapOutcome,
};

fn str_key(s: &str) -> PropertyKey {
    PropertyKey::String(s.to_string())
}

fn int_val(n: i64) -> JsValue {
    JsValue::Int(n)
}

fn no_overrides() -> HandlerNameOverrides {
    HandlerNameOverrides::new()
}

/// An instance whose target carries a frozen `x = 42`, with Get and Has
/// handlers that lie about it.
fn liar(heap: &mut ObjectHeap) -> Interceptable {
    let class = InterceptableClass::builder("Liar")
        .initializer(|heap, this, _| {
            heap.define_property(
                this.handle(),
                str_key("x"),
                PropertyDescriptor::data_frozen(int_val(42)),
            )?;
            Ok(())
        })
        .on(Operation::Get, |_, _, _| Ok(int_val(0).into()))
        .on(Operation::Has, |_, _, _| Ok(false.into()))
        .on(Operation::OwnKeys, |_, _, _| Ok(Vec::<PropertyKey>::new().into()))
        .build();
    heap.instantiate(&class, &no_overrides(), &[]).unwrap()
}

// ===========================================================================
// Laziness
// ===========================================================================

#[test]
fn default_runs_only_when_invoked() {
    let mut heap = ObjectHeap::new();
    let skipping = InterceptableClass::builder("Skipping")
        .on(Operation::Set, |_, _, _| Ok(true.into()))
        .build();
    let forwarding = InterceptableClass::builder("Forwarding")
        .on(Operation::Set, |heap, _, default| default.invoke(heap))
        .build();

    let skipped = heap.instantiate(&skipping, &no_overrides(), &[]).unwrap();
    assert!(heap.set_property(skipped.handle(), str_key("k"), int_val(1)).unwrap());
    assert!(heap.own_keys(skipped.handle()).unwrap().is_empty());

    let forwarded = heap.instantiate(&forwarding, &no_overrides(), &[]).unwrap();
    assert!(heap.set_property(forwarded.handle(), str_key("k"), int_val(1)).unwrap());
    assert_eq!(heap.own_keys(forwarded.handle()).unwrap(), vec![str_key("k")]);
}

#[test]
fn handler_observes_the_default_result_and_may_replace_it() {
    let mut heap = ObjectHeap::new();
    let class = InterceptableClass::builder("Incrementing")
        .on(Operation::Get, |heap, _, default| {
            match default.invoke(heap)? {
                TrapOutcome::Value(JsValue::Int(n)) => Ok(int_val(n + 1).into()),
                other => Ok(other),
            }
        })
        .build();
    let obj = heap.instantiate(&class, &no_overrides(), &[]).unwrap();
    heap.set_property(obj.handle(), str_key("n"), int_val(1)).unwrap();
    assert_eq!(heap.get_property(obj.handle(), &str_key("n")).unwrap(), int_val(2));
    assert_eq!(
        heap.get_property(obj.handle(), &str_key("missing")).unwrap(),
        JsValue::Undefined
    );
}

#[test]
fn default_failure_is_the_same_on_both_routes() {
    let mut heap = ObjectHeap::new();
    let forwarding = InterceptableClass::builder("InterceptableBase")
        .on(Operation::Apply, |heap, _, default| default.invoke(heap))
        .build();
    let with_handler = heap.instantiate(&forwarding, &no_overrides(), &[]).unwrap();
    let without = heap.instantiate_base(&no_overrides()).unwrap();

    let through_handler = heap
        .call(&with_handler.value(), &JsValue::Undefined, &[])
        .unwrap_err();
    let through_fallback = heap
        .call(&without.value(), &JsValue::Undefined, &[])
        .unwrap_err();
    assert_eq!(through_handler, through_fallback);
}

#[test]
fn default_reports_what_it_will_run() {
    let ops = Rc::new(Cell::new(None));
    let seen = Rc::clone(&ops);
    let mut heap = ObjectHeap::new();
    let class = InterceptableClass::builder("Peeking")
        .on(Operation::IsExtensible, move |heap, trap, default| {
            assert_eq!(default.args(), &trap.args);
            seen.set(Some(default.operation()));
            default.invoke(heap)
        })
        .build();
    let obj = heap.instantiate(&class, &no_overrides(), &[]).unwrap();
    assert!(heap.is_extensible(obj.handle()).unwrap());
    assert_eq!(ops.get(), Some(Operation::IsExtensible));
}

// ===========================================================================
// Invariant policy
// ===========================================================================

#[test]
fn lenient_policy_lets_handlers_lie() {
    let mut heap = ObjectHeap::new();
    let obj = liar(&mut heap);
    assert_eq!(heap.get_property(obj.handle(), &str_key("x")).unwrap(), int_val(0));
    assert!(!heap.has_property(obj.handle(), &str_key("x")).unwrap());
    assert!(heap.own_keys(obj.handle()).unwrap().is_empty());
}

#[test]
fn strict_policy_rejects_lying_handlers() {
    let mut heap = ObjectHeap::with_config(DispatchConfig::strict()).unwrap();
    assert_eq!(heap.config().invariant_policy, InvariantPolicy::Strict);
    let obj = liar(&mut heap);

    for err in [
        heap.get_property(obj.handle(), &str_key("x")).unwrap_err(),
        heap.has_property(obj.handle(), &str_key("x")).unwrap_err(),
        heap.own_keys(obj.handle()).unwrap_err(),
    ] {
        assert!(matches!(err, ObjectError::TypeError(_)), "got: {err}");
    }
    let violations = heap
        .events()
        .iter()
        .filter(|e| e.event == "invariant_violation")
        .count();
    assert_eq!(violations, 3);
}

#[test]
fn strict_policy_accepts_truthful_and_default_results() {
    let mut heap = ObjectHeap::with_config(DispatchConfig::strict()).unwrap();
    let obj = liar(&mut heap);
    // Unbound operations take the default route and are never checked.
    assert_eq!(
        heap.get_own_property_descriptor(obj.handle(), &str_key("x"))
            .unwrap()
            .and_then(|d| d.value().cloned()),
        Some(int_val(42))
    );
    assert!(!heap.delete_property(obj.handle(), &str_key("x")).unwrap());
    // Lies about properties the target does not pin are fine.
    assert_eq!(heap.get_property(obj.handle(), &str_key("y")).unwrap(), int_val(0));
}

// ===========================================================================
// Event log
// ===========================================================================

#[test]
fn events_record_route_and_outcome() {
    let mut heap = ObjectHeap::with_config(DispatchConfig::default().with_trace_id("trace-events")).unwrap();
    let class = InterceptableClass::builder("Mixed")
        .on(Operation::Get, |_, _, _| Err(ObjectError::thrown("boom")))
        .build();
    let obj = heap.instantiate(&class, &no_overrides(), &[]).unwrap();
    let _ = heap.get_property(obj.handle(), &str_key("x"));
    heap.has_property(obj.handle(), &str_key("x")).unwrap();

    let events: Vec<_> = heap.events().iter().cloned().collect();
    assert_eq!(events[0].event, "instantiate");
    assert!(events[0].detail.contains("bound=[get]"), "got: {}", events[0].detail);

    let failed = events
        .iter()
        .find(|e| e.operation == Some(Operation::Get))
        .unwrap();
    assert_eq!(failed.route, Some(DispatchRoute::Handler));
    assert_eq!(failed.outcome, "error");
    assert_eq!(failed.error_code, "FE-INTERCEPT-0005");
    assert_eq!(failed.handler.as_deref(), Some("__get__"));

    let defaulted = events
        .iter()
        .find(|e| e.event == "dispatch" && e.operation == Some(Operation::Has))
        .unwrap();
    assert_eq!(defaulted.route, Some(DispatchRoute::Default));
    assert_eq!(defaulted.outcome, "ok");
    assert!(events.iter().all(|e| e.trace_id == "trace-events"));

    let lines = heap.events().to_json_lines().unwrap();
    assert_eq!(lines.lines().count(), events.len());
}

#[test]
fn event_capacity_bounds_the_log() {
    let config = DispatchConfig::from_json(r#"{"event_capacity": 2}"#).unwrap();
    let mut heap = ObjectHeap::with_config(config).unwrap();
    let obj = heap.instantiate_base(&no_overrides()).unwrap();
    for _ in 0..3 {
        heap.is_extensible(obj.handle()).unwrap();
    }
    assert_eq!(heap.events().len(), 2);
    assert!(heap.events().dropped() > 0);
}
