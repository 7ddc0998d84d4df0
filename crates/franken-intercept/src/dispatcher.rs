//! Interceptable instances and operation dispatch.
//!
//! An instance owns a private backing target plus, per operation, the class
//! member its resolved handler name pointed at when it was constructed (or
//! nothing).  Every fundamental operation on the instance comes through
//! [`ObjectHeap::dispatch`]: a bound member gets the trap and a lazy
//! [`DefaultAction`]; an unbound operation runs the default directly.  Either
//! way the result (or failure) is returned untouched, then coerced to the
//! operation's result type.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::class::{Handler, InterceptableClass, Trap};
use crate::config::InvariantPolicy;
use crate::default_action::DefaultAction;
use crate::events::{COMPONENT, DispatchEvent, DispatchRoute};
use crate::handler_names::{HandlerNameOverrides, HandlerNameTable};
use crate::heap::{ManagedObject, ObjectHeap};
use crate::invariants::TrapInvariantChecker;
use crate::object_model::{
    JsValue, ObjectError, ObjectHandle, OrdinaryObject, PropertyDescriptor, PropertyKey,
};
use crate::operation::{Operation, TrapArgs, TrapOutcome};

// ---------------------------------------------------------------------------
// Interceptable: the caller-facing handle
// ---------------------------------------------------------------------------

/// Handle to an interceptable instance.  Use it anywhere an object is
/// expected via [`Interceptable::handle`] or [`Interceptable::value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interceptable(ObjectHandle);

impl Interceptable {
    pub fn handle(self) -> ObjectHandle {
        self.0
    }

    pub fn value(self) -> JsValue {
        JsValue::Object(self.0)
    }
}

impl From<Interceptable> for ObjectHandle {
    fn from(i: Interceptable) -> Self {
        i.0
    }
}

impl From<Interceptable> for JsValue {
    fn from(i: Interceptable) -> Self {
        JsValue::Object(i.0)
    }
}

// ---------------------------------------------------------------------------
// InterceptableObject: heap record
// ---------------------------------------------------------------------------

pub(crate) struct InterceptableObject {
    class: Rc<InterceptableClass>,
    names: HandlerNameTable,
    /// Bound at construction; later class changes are not observed.
    slots: BTreeMap<Operation, Handler>,
    pub(crate) target: ObjectHandle,
}

impl InterceptableObject {
    pub(crate) fn has_handler(&self, operation: Operation) -> bool {
        self.slots.contains_key(&operation)
    }
}

/// A dispatch result before coercion.
struct Dispatched {
    operation: Operation,
    route: DispatchRoute,
    target: ObjectHandle,
    outcome: TrapOutcome,
}

impl ObjectHeap {
    // -- Construction -------------------------------------------------------

    /// Construct an instance of `class`.  Handler names resolve from
    /// `overrides` over the built-in names; each operation's slot is bound to
    /// the member under its resolved name.  The class initializer then runs
    /// against the instance, so its writes are dispatched like any other.
    pub fn instantiate(
        &mut self,
        class: &Rc<InterceptableClass>,
        overrides: &HandlerNameOverrides,
        args: &[JsValue],
    ) -> Result<Interceptable, ObjectError> {
        let names = HandlerNameTable::resolve(overrides);
        let slots: BTreeMap<Operation, Handler> = Operation::ALL
            .into_iter()
            .filter_map(|op| class.member(names.name_for(op)).map(|h| (op, Rc::clone(h))))
            .collect();

        let call = class.call_body().cloned().map(|b| self.register_function(b));
        let construct = class
            .construct_body()
            .cloned()
            .map(|b| self.register_function(b));
        let target = self.alloc_object(OrdinaryObject {
            prototype: class.prototype(),
            class_tag: Some(class.name().to_string()),
            call,
            construct,
            ..OrdinaryObject::default()
        });

        let bound: Vec<&str> = slots.keys().map(|op| op.trap_name()).collect();
        let detail = format!("class={} bound=[{}]", class.name(), bound.join(","));
        let handle = self.push(ManagedObject::Interceptable(InterceptableObject {
            class: Rc::clone(class),
            names,
            slots,
            target,
        }));
        let instance = Interceptable(handle);

        let result = match class.initializer().cloned() {
            Some(init) => init(self, instance, args),
            None => Ok(()),
        };
        let event = DispatchEvent {
            detail: match &result {
                Ok(()) => detail,
                Err(err) => format!("{detail} initializer: {err}"),
            },
            ..self.draft("instantiate", handle, result.as_ref().err())
        };
        self.emit(event);
        result.map(|()| instance)
    }

    /// An instance of [`InterceptableClass::base`]: every operation defaults.
    pub fn instantiate_base(
        &mut self,
        overrides: &HandlerNameOverrides,
    ) -> Result<Interceptable, ObjectError> {
        self.instantiate(&InterceptableClass::base(), overrides, &[])
    }

    // -- Introspection ------------------------------------------------------

    fn record(&self, instance: ObjectHandle) -> Result<&InterceptableObject, ObjectError> {
        match self.managed(instance)? {
            ManagedObject::Interceptable(record) => Ok(record),
            ManagedObject::Ordinary(_) => Err(ObjectError::type_error(format!(
                "{instance} is not interceptable"
            ))),
        }
    }

    /// The instance's resolved handler names.
    pub fn handler_names(&self, instance: Interceptable) -> Result<&HandlerNameTable, ObjectError> {
        Ok(&self.record(instance.0)?.names)
    }

    pub fn class_of(&self, instance: Interceptable) -> Result<Rc<InterceptableClass>, ObjectError> {
        Ok(Rc::clone(&self.record(instance.0)?.class))
    }

    /// Operations that reach a class member on this instance.
    pub fn bound_operations(&self, instance: Interceptable) -> Result<Vec<Operation>, ObjectError> {
        Ok(self.record(instance.0)?.slots.keys().copied().collect())
    }

    /// Look up an existing instance by handle.
    pub fn as_interceptable(&self, handle: ObjectHandle) -> Option<Interceptable> {
        self.record(handle).ok().map(|_| Interceptable(handle))
    }

    // -- Dispatch -----------------------------------------------------------

    fn dispatch(
        &mut self,
        instance: ObjectHandle,
        args: TrapArgs,
    ) -> Result<Dispatched, ObjectError> {
        let operation = args.operation();
        let (target, handler, name) = {
            let record = self.record(instance)?;
            (
                record.target,
                record.slots.get(&operation).cloned(),
                record.names.name_for(operation).to_string(),
            )
        };

        let max = self.config().max_dispatch_depth;
        if self.dispatch_depth >= max {
            let err = ObjectError::DispatchDepthExceeded {
                depth: self.dispatch_depth.saturating_add(1),
                max,
            };
            let event = DispatchEvent {
                operation: Some(operation),
                handler: Some(name),
                detail: err.to_string(),
                ..self.draft("dispatch", instance, Some(&err))
            };
            self.emit(event);
            return Err(err);
        }

        let default = DefaultAction::new(target, instance, args.clone());
        self.dispatch_depth += 1;
        let (route, result) = match handler {
            Some(handler) => {
                let trap = Trap {
                    operation,
                    target,
                    instance,
                    args,
                };
                (DispatchRoute::Handler, handler(self, trap, default))
            }
            None => (DispatchRoute::Default, default.invoke(self)),
        };
        self.dispatch_depth -= 1;

        let event = DispatchEvent {
            operation: Some(operation),
            route: Some(route),
            handler: Some(name),
            detail: result
                .as_ref()
                .err()
                .map(ToString::to_string)
                .unwrap_or_default(),
            ..self.draft("dispatch", instance, result.as_ref().err())
        };
        self.emit(event);

        Ok(Dispatched {
            operation,
            route,
            target,
            outcome: result?,
        })
    }

    /// Under the strict policy, check a handler's answer against the target.
    fn enforce(
        &mut self,
        instance: ObjectHandle,
        dispatched: &Dispatched,
        check: impl FnOnce(&OrdinaryObject) -> Result<(), ObjectError>,
    ) -> Result<(), ObjectError> {
        if dispatched.route != DispatchRoute::Handler
            || self.config().invariant_policy != InvariantPolicy::Strict
        {
            return Ok(());
        }
        let result = check(self.ordinary(dispatched.target)?);
        if let Err(err) = &result {
            let event = DispatchEvent {
                operation: Some(dispatched.operation),
                route: Some(DispatchRoute::Handler),
                detail: err.to_string(),
                ..self.draft("invariant_violation", instance, Some(err))
            };
            self.emit(event);
        }
        result
    }

    // -- Typed entry points (called by the routed heap operations) ----------

    pub(crate) fn intercept_get(
        &mut self,
        instance: ObjectHandle,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, ObjectError> {
        let args = TrapArgs::Get {
            key: key.clone(),
            receiver: receiver.clone(),
        };
        let d = self.dispatch(instance, args)?;
        let value = d.outcome.clone().into_value(d.operation)?;
        self.enforce(instance, &d, |t| TrapInvariantChecker::check_get(t, key, &value))?;
        Ok(value)
    }

    pub(crate) fn intercept_set(
        &mut self,
        instance: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<bool, ObjectError> {
        let args = TrapArgs::Set {
            key: key.clone(),
            value: value.clone(),
            receiver: receiver.clone(),
        };
        let d = self.dispatch(instance, args)?;
        let ok = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_set(t, &key, &value, ok)
        })?;
        Ok(ok)
    }

    pub(crate) fn intercept_has(
        &mut self,
        instance: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::Has { key: key.clone() })?;
        let found = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| TrapInvariantChecker::check_has(t, key, found))?;
        Ok(found)
    }

    pub(crate) fn intercept_delete(
        &mut self,
        instance: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::DeleteProperty { key: key.clone() })?;
        let deleted = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_delete(t, key, deleted)
        })?;
        Ok(deleted)
    }

    pub(crate) fn intercept_define_property(
        &mut self,
        instance: ObjectHandle,
        key: PropertyKey,
        descriptor: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        let args = TrapArgs::DefineProperty {
            key: key.clone(),
            descriptor: descriptor.clone(),
        };
        let d = self.dispatch(instance, args)?;
        let defined = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_define_property(t, &key, &descriptor, defined)
        })?;
        Ok(defined)
    }

    pub(crate) fn intercept_get_own_property_descriptor(
        &mut self,
        instance: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::GetOwnPropertyDescriptor { key: key.clone() })?;
        let desc = d.outcome.clone().into_descriptor(d.operation)?;
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_get_own_property(t, key, &desc)
        })?;
        Ok(desc)
    }

    pub(crate) fn intercept_own_keys(
        &mut self,
        instance: ObjectHandle,
    ) -> Result<Vec<PropertyKey>, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::OwnKeys)?;
        let keys = d.outcome.clone().into_keys(d.operation)?;
        self.enforce(instance, &d, |t| TrapInvariantChecker::check_own_keys(t, &keys))?;
        Ok(keys)
    }

    pub(crate) fn intercept_get_prototype_of(
        &mut self,
        instance: ObjectHandle,
    ) -> Result<Option<ObjectHandle>, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::GetPrototypeOf)?;
        let proto = d.outcome.clone().into_prototype(d.operation)?;
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_get_prototype_of(t, proto)
        })?;
        Ok(proto)
    }

    pub(crate) fn intercept_set_prototype_of(
        &mut self,
        instance: ObjectHandle,
        proto: Option<ObjectHandle>,
    ) -> Result<bool, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::SetPrototypeOf { proto })?;
        let ok = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_set_prototype_of(t, proto, ok)
        })?;
        Ok(ok)
    }

    pub(crate) fn intercept_is_extensible(
        &mut self,
        instance: ObjectHandle,
    ) -> Result<bool, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::IsExtensible)?;
        let extensible = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_is_extensible(t, extensible)
        })?;
        Ok(extensible)
    }

    pub(crate) fn intercept_prevent_extensions(
        &mut self,
        instance: ObjectHandle,
    ) -> Result<bool, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::PreventExtensions)?;
        let ok = d.outcome.clone().into_bool();
        self.enforce(instance, &d, |t| {
            TrapInvariantChecker::check_prevent_extensions(t, ok)
        })?;
        Ok(ok)
    }

    pub(crate) fn intercept_apply(
        &mut self,
        instance: ObjectHandle,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> Result<JsValue, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::Apply { this, args })?;
        d.outcome.into_value(d.operation)
    }

    pub(crate) fn intercept_construct(
        &mut self,
        instance: ObjectHandle,
        args: Vec<JsValue>,
        new_target: ObjectHandle,
    ) -> Result<ObjectHandle, ObjectError> {
        let d = self.dispatch(instance, TrapArgs::Construct { args, new_target })?;
        d.outcome.into_object(d.operation)
    }

    // -- Events -------------------------------------------------------------

    fn draft(&self, event: &str, instance: ObjectHandle, error: Option<&ObjectError>) -> DispatchEvent {
        DispatchEvent {
            seq: 0,
            trace_id: self.config().trace_id.clone(),
            component: COMPONENT.to_string(),
            event: event.to_string(),
            outcome: if error.is_some() { "error" } else { "ok" }.to_string(),
            error_code: error.map(|e| e.stable_code().to_string()).unwrap_or_default(),
            instance,
            operation: None,
            route: None,
            handler: None,
            detail: String::new(),
        }
    }

    fn emit(&mut self, mut event: DispatchEvent) {
        if !self.config().record_events {
            return;
        }
        event.seq = self.events.next_seq();
        self.events.push(event);
    }

    pub(crate) fn record_default_invoked(
        &mut self,
        instance: ObjectHandle,
        operation: Operation,
        error: Option<&ObjectError>,
    ) {
        let event = DispatchEvent {
            operation: Some(operation),
            detail: error.map(ToString::to_string).unwrap_or_default(),
            ..self.draft("default_invoked", instance, error)
        };
        self.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_key(s: &str) -> PropertyKey {
        PropertyKey::String(s.to_string())
    }

    #[test]
    fn base_instance_behaves_like_its_target() {
        let mut heap = ObjectHeap::new();
        let obj = heap.instantiate_base(&HandlerNameOverrides::new()).unwrap();
        let h = obj.handle();
        assert!(heap.set_property(h, str_key("a"), JsValue::Int(1)).unwrap());
        assert_eq!(heap.get_property(h, &str_key("a")).unwrap(), JsValue::Int(1));
        assert!(heap.has_property(h, &str_key("a")).unwrap());
        assert_eq!(heap.own_keys(h).unwrap(), vec![str_key("a")]);
        assert!(heap.bound_operations(obj).unwrap().is_empty());
    }

    #[test]
    fn instances_are_interceptable_and_targets_are_not_exposed() {
        let mut heap = ObjectHeap::new();
        let obj = heap.instantiate_base(&HandlerNameOverrides::new()).unwrap();
        assert!(heap.is_interceptable(obj.handle()).unwrap());
        assert_eq!(heap.as_interceptable(obj.handle()), Some(obj));
        let plain = heap.alloc_plain();
        assert_eq!(heap.as_interceptable(plain), None);
        assert!(heap.handler_names(Interceptable(plain)).is_err());
    }

    #[test]
    fn slots_bind_by_resolved_name() {
        let mut heap = ObjectHeap::new();
        let class = InterceptableClass::builder("Renamed")
            .member("__fetch__", |_, _, _| Ok(JsValue::Int(7).into()))
            .on(Operation::Has, |_, _, _| Ok(true.into()))
            .build();
        let overrides = HandlerNameOverrides::new().rename(Operation::Get, "__fetch__");
        let obj = heap.instantiate(&class, &overrides, &[]).unwrap();
        assert_eq!(
            heap.bound_operations(obj).unwrap(),
            vec![Operation::Get, Operation::Has]
        );
        assert_eq!(
            heap.get_property(obj.handle(), &str_key("x")).unwrap(),
            JsValue::Int(7)
        );
    }

    #[test]
    fn dispatch_emits_route_events() {
        let mut heap = ObjectHeap::new();
        let class = InterceptableClass::builder("Evented")
            .on(Operation::Get, |heap, _, default| default.invoke(heap))
            .build();
        let obj = heap
            .instantiate(&class, &HandlerNameOverrides::new(), &[])
            .unwrap();
        heap.drain_events();

        heap.get_property(obj.handle(), &str_key("x")).unwrap();
        heap.has_property(obj.handle(), &str_key("x")).unwrap();
        let events = heap.drain_events();
        let kinds: Vec<(&str, Option<DispatchRoute>)> =
            events.iter().map(|e| (e.event.as_str(), e.route)).collect();
        assert_eq!(
            kinds,
            vec![
                ("default_invoked", None),
                ("dispatch", Some(DispatchRoute::Handler)),
                ("default_invoked", None),
                ("dispatch", Some(DispatchRoute::Default)),
            ]
        );
        assert_eq!(events[1].handler.as_deref(), Some("__get__"));
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[test]
    fn recording_can_be_disabled() {
        let config = crate::config::DispatchConfig {
            record_events: false,
            ..Default::default()
        };
        let mut heap = ObjectHeap::with_config(config).unwrap();
        let obj = heap.instantiate_base(&HandlerNameOverrides::new()).unwrap();
        heap.get_property(obj.handle(), &str_key("x")).unwrap();
        assert!(heap.events().is_empty());
    }
}
