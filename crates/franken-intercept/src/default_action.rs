//! The deferred platform behavior handed to every handler.
//!
//! Building a [`DefaultAction`] performs nothing.  [`DefaultAction::invoke`]
//! consumes it, so the default runs at most once per dispatch, and only if the
//! handler asks.  When no handler is bound the dispatcher invokes it itself.

use crate::heap::ObjectHeap;
use crate::object_model::{ObjectError, ObjectHandle};
use crate::operation::{Operation, TrapArgs, TrapOutcome};
use crate::reflect::Reflect;

#[derive(Debug)]
pub struct DefaultAction {
    target: ObjectHandle,
    instance: ObjectHandle,
    args: TrapArgs,
}

impl DefaultAction {
    pub(crate) fn new(target: ObjectHandle, instance: ObjectHandle, args: TrapArgs) -> Self {
        Self {
            target,
            instance,
            args,
        }
    }

    pub fn operation(&self) -> Operation {
        self.args.operation()
    }

    /// The arguments the default will run with (the intercepted ones).
    pub fn args(&self) -> &TrapArgs {
        &self.args
    }

    /// Run the platform behavior against the target.  Failures are the
    /// platform's failures, unchanged.
    pub fn invoke(self, heap: &mut ObjectHeap) -> Result<TrapOutcome, ObjectError> {
        let operation = self.operation();
        let (instance, target) = (self.instance, self.target);
        let result = perform(heap, target, self.args);
        heap.record_default_invoked(instance, operation, result.as_ref().err());
        result
    }
}

fn perform(
    heap: &mut ObjectHeap,
    target: ObjectHandle,
    args: TrapArgs,
) -> Result<TrapOutcome, ObjectError> {
    let outcome: TrapOutcome = match args {
        TrapArgs::Apply { this, args } => Reflect::apply(heap, target, &this, &args)?.into(),
        TrapArgs::Construct { args, new_target } => {
            Reflect::construct(heap, target, &args, Some(new_target))?.into()
        }
        TrapArgs::DefineProperty { key, descriptor } => {
            Reflect::define_property(heap, target, key, descriptor)?.into()
        }
        TrapArgs::DeleteProperty { key } => Reflect::delete_property(heap, target, &key)?.into(),
        TrapArgs::Get { key, receiver } => Reflect::get(heap, target, &key, &receiver)?.into(),
        TrapArgs::GetOwnPropertyDescriptor { key } => {
            Reflect::get_own_property_descriptor(heap, target, &key)?.into()
        }
        TrapArgs::GetPrototypeOf => Reflect::get_prototype_of(heap, target)?.into(),
        TrapArgs::Has { key } => Reflect::has(heap, target, &key)?.into(),
        TrapArgs::IsExtensible => Reflect::is_extensible(heap, target)?.into(),
        TrapArgs::OwnKeys => Reflect::own_keys(heap, target)?.into(),
        TrapArgs::PreventExtensions => Reflect::prevent_extensions(heap, target)?.into(),
        TrapArgs::Set {
            key,
            value,
            receiver,
        } => Reflect::set(heap, target, key, value, &receiver)?.into(),
        TrapArgs::SetPrototypeOf { proto } => Reflect::set_prototype_of(heap, target, proto)?.into(),
    };
    Ok(outcome)
}
