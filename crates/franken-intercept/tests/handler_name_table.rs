//! Integration tests for handler-name resolution as seen through instances:
//! renames, aliases, symbol names, JSON-loaded overrides, and isolation
//! between instances.

use std::cell::RefCell;
use std::rc::Rc;

use frankenengine_intercept::object_model::SymbolId;
use frankenengine_intercept::{
    HandlerNameOverrides, HandlerNameTable, InterceptableClass, JsValue, ObjectHeap, Operation,
    PropertyKey, TrapArgs, TrapOutcome,
};

fn str_key(s: &str) -> PropertyKey {
    PropertyKey::String(s.to_string())
}

fn str_val(s: &str) -> JsValue {
    JsValue::Str(s.to_string())
}

/// A class answering Get from both its built-in and a custom member.
fn two_getters() -> Rc<InterceptableClass> {
    InterceptableClass::builder("TwoGetters")
        .member("__get__", |_, _, _| Ok(str_val("builtin").into()))
        .member("__fetch__", |_, _, _| Ok(str_val("custom").into()))
        .build()
}

// ===========================================================================
// Renames
// ===========================================================================

#[test]
fn renamed_operation_uses_the_new_member() {
    let mut heap = ObjectHeap::new();
    let overrides = HandlerNameOverrides::new().rename(Operation::Get, "__fetch__");
    let obj = heap.instantiate(&two_getters(), &overrides, &[]).unwrap();
    assert_eq!(
        heap.get_property(obj.handle(), &str_key("x")).unwrap(),
        str_val("custom")
    );
}

#[test]
fn renaming_one_operation_leaves_the_rest_on_builtin_names() {
    let mut heap = ObjectHeap::new();
    let class = InterceptableClass::builder("HasToo")
        .member("__fetch__", |_, _, _| Ok(str_val("custom").into()))
        .on(Operation::Has, |_, _, _| Ok(true.into()))
        .build();
    let overrides = HandlerNameOverrides::new().rename(Operation::Get, "__fetch__");
    let obj = heap.instantiate(&class, &overrides, &[]).unwrap();

    let names = heap.handler_names(obj).unwrap();
    assert_eq!(names.renamed_operations(), vec![Operation::Get]);
    for op in Operation::ALL.into_iter().filter(|op| *op != Operation::Get) {
        assert_eq!(
            names.name_for(op),
            &PropertyKey::from(op.default_handler_name())
        );
    }
    assert!(heap.has_property(obj.handle(), &str_key("anything")).unwrap());
}

#[test]
fn renaming_to_an_absent_member_falls_back_to_default() {
    let mut heap = ObjectHeap::new();
    let overrides = HandlerNameOverrides::new().rename(Operation::Get, "__nobody__");
    let obj = heap.instantiate(&two_getters(), &overrides, &[]).unwrap();
    heap.set_property(obj.handle(), str_key("x"), str_val("stored"))
        .unwrap();
    assert_eq!(
        heap.get_property(obj.handle(), &str_key("x")).unwrap(),
        str_val("stored")
    );
    assert!(heap.bound_operations(obj).unwrap().is_empty());
}

#[test]
fn instances_do_not_share_renames() {
    let mut heap = ObjectHeap::new();
    let class = two_getters();
    let renamed = heap
        .instantiate(
            &class,
            &HandlerNameOverrides::new().rename(Operation::Get, "__fetch__"),
            &[],
        )
        .unwrap();
    let plain = heap
        .instantiate(&class, &HandlerNameOverrides::new(), &[])
        .unwrap();

    assert_eq!(
        heap.get_property(renamed.handle(), &str_key("x")).unwrap(),
        str_val("custom")
    );
    assert_eq!(
        heap.get_property(plain.handle(), &str_key("x")).unwrap(),
        str_val("builtin")
    );
    assert_eq!(heap.handler_names(plain).unwrap(), &HandlerNameTable::defaults());
}

// ===========================================================================
// Aliases and symbol names
// ===========================================================================

#[test]
fn aliased_operations_share_one_member() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let mut heap = ObjectHeap::new();
    let class = InterceptableClass::builder("Access")
        .member("__access__", move |heap, trap, default| {
            log.borrow_mut().push(trap.operation);
            match &trap.args {
                TrapArgs::Get { .. } => Ok(str_val("read").into()),
                TrapArgs::Set { .. } => default.invoke(heap),
                _ => Ok(TrapOutcome::Unit),
            }
        })
        .build();
    let overrides = HandlerNameOverrides::new()
        .rename(Operation::Get, "__access__")
        .rename(Operation::Set, "__access__");
    let obj = heap.instantiate(&class, &overrides, &[]).unwrap();

    assert!(heap.set_property(obj.handle(), str_key("k"), str_val("v")).unwrap());
    assert_eq!(heap.get_property(obj.handle(), &str_key("k")).unwrap(), str_val("read"));
    assert_eq!(*seen.borrow(), vec![Operation::Set, Operation::Get]);

    let aliases = heap.handler_names(obj).unwrap().aliased_names();
    assert_eq!(
        aliases.get(&str_key("__access__")),
        Some(&vec![Operation::Get, Operation::Set])
    );
}

#[test]
fn symbol_names_bind_symbol_members() {
    let mut heap = ObjectHeap::new();
    let sym: SymbolId = heap.alloc_symbol();
    let class = InterceptableClass::builder("Symbolic")
        .member(sym, |_, _, _| Ok(true.into()))
        .build();
    let overrides = HandlerNameOverrides::new().rename(Operation::Has, sym);
    let obj = heap.instantiate(&class, &overrides, &[]).unwrap();
    assert!(heap.has_property(obj.handle(), &str_key("ghost")).unwrap());
    assert_eq!(heap.bound_operations(obj).unwrap(), vec![Operation::Has]);
}

// ===========================================================================
// Configuration input
// ===========================================================================

#[test]
fn json_overrides_drive_instantiation() {
    let mut heap = ObjectHeap::new();
    let overrides = HandlerNameOverrides::from_json(r#"{"get": "__fetch__"}"#).unwrap();
    let obj = heap.instantiate(&two_getters(), &overrides, &[]).unwrap();
    assert_eq!(
        heap.get_property(obj.handle(), &str_key("x")).unwrap(),
        str_val("custom")
    );
}

#[test]
fn resolved_table_round_trips_through_json() {
    let mut heap = ObjectHeap::new();
    let overrides = HandlerNameOverrides::new().rename(Operation::OwnKeys, "__keys__");
    let obj = heap.instantiate_base(&overrides).unwrap();
    let table = heap.handler_names(obj).unwrap().clone();
    let json = serde_json::to_string(&table).unwrap();
    let back: HandlerNameTable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, table);
    assert_eq!(back.name_for(Operation::OwnKeys), &str_key("__keys__"));

    let overrides_json = serde_json::to_string(&overrides).unwrap();
    let overrides_back: HandlerNameOverrides = serde_json::from_str(&overrides_json).unwrap();
    assert_eq!(overrides_back, overrides);
}
