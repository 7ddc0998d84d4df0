//! Derived classes: the member table handlers are looked up in.
//!
//! A class is built once and shared (`Rc`) by every instance made from it.
//! Members are keyed by name, not by operation; which operations reach a
//! member is decided per instance by its [`crate::handler_names::HandlerNameTable`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::default_action::DefaultAction;
use crate::dispatcher::Interceptable;
use crate::heap::{NativeFn, ObjectHeap};
use crate::object_model::{JsValue, ObjectError, ObjectHandle, PropertyKey};
use crate::operation::{Operation, TrapArgs, TrapOutcome};

/// A handler member.  Receives the trap and the deferred default; whatever it
/// returns (or raises) is what the intercepted operation returns (or raises).
pub type Handler = Rc<dyn Fn(&mut ObjectHeap, Trap, DefaultAction) -> Result<TrapOutcome, ObjectError>>;

/// Derived-class constructor body.  Runs against the instance, after the
/// handler slots are bound, so its field writes are dispatched.
pub type Initializer = Rc<dyn Fn(&mut ObjectHeap, Interceptable, &[JsValue]) -> Result<(), ObjectError>>;

/// One intercepted operation as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    pub operation: Operation,
    /// The backing target.  Handlers may read and mutate it freely.
    pub target: ObjectHandle,
    /// The instance the operation was performed on.
    pub instance: ObjectHandle,
    pub args: TrapArgs,
}

impl Trap {
    pub fn key(&self) -> Option<&PropertyKey> {
        self.args.key()
    }
}

pub struct InterceptableClass {
    name: String,
    members: BTreeMap<PropertyKey, Handler>,
    initializer: Option<Initializer>,
    call_body: Option<NativeFn>,
    construct_body: Option<NativeFn>,
    prototype: Option<ObjectHandle>,
}

impl fmt::Debug for InterceptableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptableClass")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("initializer", &self.initializer.is_some())
            .field("call_body", &self.call_body.is_some())
            .field("construct_body", &self.construct_body.is_some())
            .field("prototype", &self.prototype)
            .finish()
    }
}

impl InterceptableClass {
    pub fn builder(name: impl Into<String>) -> InterceptableClassBuilder {
        InterceptableClassBuilder {
            class: Self {
                name: name.into(),
                members: BTreeMap::new(),
                initializer: None,
                call_body: None,
                construct_body: None,
                prototype: None,
            },
        }
    }

    /// The bare base: no members, no bodies.  Every operation takes its
    /// default path.
    pub fn base() -> Rc<Self> {
        Self::builder("InterceptableBase").build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &PropertyKey) -> Option<&Handler> {
        self.members.get(name)
    }

    pub fn has_member(&self, name: &PropertyKey) -> bool {
        self.members.contains_key(name)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &PropertyKey> {
        self.members.keys()
    }

    pub(crate) fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    pub(crate) fn call_body(&self) -> Option<&NativeFn> {
        self.call_body.as_ref()
    }

    pub(crate) fn construct_body(&self) -> Option<&NativeFn> {
        self.construct_body.as_ref()
    }

    pub fn prototype(&self) -> Option<ObjectHandle> {
        self.prototype
    }
}

pub struct InterceptableClassBuilder {
    class: InterceptableClass,
}

impl InterceptableClassBuilder {
    /// Define a member under `name`.  It handles whichever operations resolve
    /// to `name`; redefining a name replaces the earlier member.
    pub fn member<F>(mut self, name: impl Into<PropertyKey>, handler: F) -> Self
    where
        F: Fn(&mut ObjectHeap, Trap, DefaultAction) -> Result<TrapOutcome, ObjectError> + 'static,
    {
        self.class.members.insert(name.into(), Rc::new(handler));
        self
    }

    /// Shorthand for a member under `operation`'s built-in name.
    pub fn on<F>(self, operation: Operation, handler: F) -> Self
    where
        F: Fn(&mut ObjectHeap, Trap, DefaultAction) -> Result<TrapOutcome, ObjectError> + 'static,
    {
        self.member(operation.default_handler_name(), handler)
    }

    pub fn initializer<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut ObjectHeap, Interceptable, &[JsValue]) -> Result<(), ObjectError> + 'static,
    {
        self.class.initializer = Some(Rc::new(init));
        self
    }

    /// Makes targets callable: `(heap, this, args)`.
    pub fn call_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut ObjectHeap, &JsValue, &[JsValue]) -> Result<JsValue, ObjectError> + 'static,
    {
        self.class.call_body = Some(Rc::new(body));
        self
    }

    /// Makes targets constructors.  The body runs with the freshly allocated
    /// object as `this`.
    pub fn construct_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut ObjectHeap, &JsValue, &[JsValue]) -> Result<JsValue, ObjectError> + 'static,
    {
        self.class.construct_body = Some(Rc::new(body));
        self
    }

    /// `[[Prototype]]` for every target made from this class.
    pub fn prototype(mut self, proto: ObjectHandle) -> Self {
        self.class.prototype = Some(proto);
        self
    }

    pub fn build(self) -> Rc<InterceptableClass> {
        Rc::new(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_model::SymbolId;

    #[test]
    fn base_has_no_members() {
        let base = InterceptableClass::base();
        assert_eq!(base.name(), "InterceptableBase");
        assert_eq!(base.member_names().count(), 0);
        assert!(base.call_body().is_none());
    }

    #[test]
    fn members_are_keyed_by_name() {
        let sym = SymbolId(30);
        let class = InterceptableClass::builder("Named")
            .on(Operation::Get, |_, _, _| Ok(TrapOutcome::Unit))
            .member(sym, |_, _, _| Ok(TrapOutcome::Bool(true)))
            .build();
        assert!(class.has_member(&PropertyKey::from("__get__")));
        assert!(class.has_member(&PropertyKey::Symbol(sym)));
        assert!(!class.has_member(&PropertyKey::from("__set__")));
    }

    #[test]
    fn redefining_a_member_replaces_it() {
        let class = InterceptableClass::builder("Twice")
            .member("__has__", |_, _, _| Ok(TrapOutcome::Bool(false)))
            .member("__has__", |_, _, _| Ok(TrapOutcome::Bool(true)))
            .build();
        assert_eq!(class.member_names().count(), 1);
    }

    #[test]
    fn debug_lists_member_names() {
        let class = InterceptableClass::builder("Dbg")
            .on(Operation::OwnKeys, |_, _, _| Ok(TrapOutcome::Keys(vec![])))
            .build();
        let dbg = format!("{class:?}");
        assert!(dbg.contains("__ownKeys__"), "got: {dbg}");
        assert!(dbg.contains("Dbg"), "got: {dbg}");
    }
}
