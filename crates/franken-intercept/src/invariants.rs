//! Consistency checks between a handler's answer and the backing target.
//!
//! Only consulted under [`crate::config::InvariantPolicy::Strict`], and only
//! for results a handler produced; the default route cannot contradict the
//! target it just operated on.

use std::collections::BTreeSet;

use crate::object_model::{
    JsValue, ObjectError, ObjectHandle, OrdinaryObject, PropertyDescriptor, PropertyKey,
};
use crate::operation::Operation;

fn violation(operation: Operation, message: impl std::fmt::Display) -> ObjectError {
    ObjectError::type_error(format!("{operation} handler: {message}"))
}

/// A non-configurable, non-writable data property's value, if `key` has one.
fn frozen_value<'a>(target: &'a OrdinaryObject, key: &PropertyKey) -> Option<&'a JsValue> {
    match target.get_own_property(key)? {
        PropertyDescriptor::Data {
            value,
            writable: false,
            configurable: false,
            ..
        } => Some(value),
        _ => None,
    }
}

fn non_configurable(target: &OrdinaryObject, key: &PropertyKey) -> bool {
    target
        .get_own_property(key)
        .is_some_and(|desc| !desc.is_configurable())
}

pub struct TrapInvariantChecker;

impl TrapInvariantChecker {
    pub fn check_get(
        target: &OrdinaryObject,
        key: &PropertyKey,
        result: &JsValue,
    ) -> Result<(), ObjectError> {
        if let Some(value) = frozen_value(target, key)
            && !result.same_value(value)
        {
            return Err(violation(
                Operation::Get,
                format_args!("non-configurable read-only property '{key}' must report its value"),
            ));
        }
        if let Some(PropertyDescriptor::Accessor {
            get: None,
            configurable: false,
            ..
        }) = target.get_own_property(key)
            && !result.is_undefined()
        {
            return Err(violation(
                Operation::Get,
                format_args!("non-configurable accessor '{key}' without a getter must report undefined"),
            ));
        }
        Ok(())
    }

    pub fn check_set(
        target: &OrdinaryObject,
        key: &PropertyKey,
        value: &JsValue,
        result: bool,
    ) -> Result<(), ObjectError> {
        if !result {
            return Ok(());
        }
        if let Some(current) = frozen_value(target, key)
            && !value.same_value(current)
        {
            return Err(violation(
                Operation::Set,
                format_args!("cannot report success changing read-only property '{key}'"),
            ));
        }
        if let Some(PropertyDescriptor::Accessor {
            set: None,
            configurable: false,
            ..
        }) = target.get_own_property(key)
        {
            return Err(violation(
                Operation::Set,
                format_args!("cannot report success on accessor '{key}' without a setter"),
            ));
        }
        Ok(())
    }

    pub fn check_has(
        target: &OrdinaryObject,
        key: &PropertyKey,
        result: bool,
    ) -> Result<(), ObjectError> {
        if result {
            return Ok(());
        }
        if non_configurable(target, key) {
            return Err(violation(
                Operation::Has,
                format_args!("cannot hide non-configurable property '{key}'"),
            ));
        }
        if !target.extensible && target.has_own_property(key) {
            return Err(violation(
                Operation::Has,
                format_args!("cannot hide '{key}' on a non-extensible target"),
            ));
        }
        Ok(())
    }

    pub fn check_delete(
        target: &OrdinaryObject,
        key: &PropertyKey,
        result: bool,
    ) -> Result<(), ObjectError> {
        if result && non_configurable(target, key) {
            return Err(violation(
                Operation::DeleteProperty,
                format_args!("cannot report non-configurable property '{key}' as deleted"),
            ));
        }
        Ok(())
    }

    pub fn check_define_property(
        target: &OrdinaryObject,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
        result: bool,
    ) -> Result<(), ObjectError> {
        if !result {
            return Ok(());
        }
        let existing = target.get_own_property(key);
        if existing.is_none() && !target.extensible {
            return Err(violation(
                Operation::DefineProperty,
                format_args!("cannot add '{key}' to a non-extensible target"),
            ));
        }
        if !desc.is_configurable() && existing.is_none_or(|e| e.is_configurable()) {
            return Err(violation(
                Operation::DefineProperty,
                format_args!("cannot report '{key}' as non-configurable when the target's is not"),
            ));
        }
        Ok(())
    }

    pub fn check_get_own_property(
        target: &OrdinaryObject,
        key: &PropertyKey,
        result: &Option<PropertyDescriptor>,
    ) -> Result<(), ObjectError> {
        let op = Operation::GetOwnPropertyDescriptor;
        let existing = target.get_own_property(key);
        match (result, existing) {
            (None, Some(e)) if !e.is_configurable() => Err(violation(
                op,
                format_args!("cannot hide non-configurable property '{key}'"),
            )),
            (None, Some(_)) if !target.extensible => Err(violation(
                op,
                format_args!("cannot hide '{key}' on a non-extensible target"),
            )),
            (Some(_), None) if !target.extensible => Err(violation(
                op,
                format_args!("cannot invent '{key}' on a non-extensible target"),
            )),
            (Some(reported), existing) if !reported.is_configurable() => match existing {
                Some(e) if !e.is_configurable() => {
                    if let (Some(rv), Some(ev)) = (reported.value(), frozen_value(target, key))
                        && !reported.is_writable()
                        && !rv.same_value(ev)
                    {
                        return Err(violation(
                            op,
                            format_args!("read-only property '{key}' must keep its value"),
                        ));
                    }
                    Ok(())
                }
                _ => Err(violation(
                    op,
                    format_args!("cannot report '{key}' as non-configurable when the target's is not"),
                )),
            },
            _ => Ok(()),
        }
    }

    pub fn check_own_keys(target: &OrdinaryObject, result: &[PropertyKey]) -> Result<(), ObjectError> {
        let mut seen = BTreeSet::new();
        for key in result {
            if !seen.insert(key) {
                return Err(violation(Operation::OwnKeys, format_args!("duplicate key '{key}'")));
            }
        }
        for (key, desc) in &target.properties {
            if !desc.is_configurable() && !seen.contains(key) {
                return Err(violation(
                    Operation::OwnKeys,
                    format_args!("must list non-configurable property '{key}'"),
                ));
            }
        }
        if !target.extensible {
            let own: BTreeSet<&PropertyKey> = target.properties.keys().collect();
            if own != seen {
                return Err(violation(
                    Operation::OwnKeys,
                    "a non-extensible target requires its exact key set",
                ));
            }
        }
        Ok(())
    }

    pub fn check_get_prototype_of(
        target: &OrdinaryObject,
        result: Option<ObjectHandle>,
    ) -> Result<(), ObjectError> {
        if !target.extensible && result != target.prototype {
            return Err(violation(
                Operation::GetPrototypeOf,
                "a non-extensible target must report its own prototype",
            ));
        }
        Ok(())
    }

    pub fn check_set_prototype_of(
        target: &OrdinaryObject,
        proto: Option<ObjectHandle>,
        result: bool,
    ) -> Result<(), ObjectError> {
        if result && !target.extensible && proto != target.prototype {
            return Err(violation(
                Operation::SetPrototypeOf,
                "a non-extensible target keeps its prototype",
            ));
        }
        Ok(())
    }

    pub fn check_is_extensible(target: &OrdinaryObject, result: bool) -> Result<(), ObjectError> {
        if result != target.extensible {
            return Err(violation(
                Operation::IsExtensible,
                "must match the target's extensibility",
            ));
        }
        Ok(())
    }

    pub fn check_prevent_extensions(
        target: &OrdinaryObject,
        result: bool,
    ) -> Result<(), ObjectError> {
        if result && target.extensible {
            return Err(violation(
                Operation::PreventExtensions,
                "cannot report success while the target is still extensible",
            ));
        }
        Ok(())
    }
}
