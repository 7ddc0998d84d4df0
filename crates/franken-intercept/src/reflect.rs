//! `Reflect`: the platform operations as plain functions.
//!
//! Each function performs the named operation on `target` through the heap's
//! routed entry points, so an interceptable `target` still dispatches.  Default
//! actions call these on their backing target.

use crate::heap::ObjectHeap;
use crate::object_model::{JsValue, ObjectError, ObjectHandle, PropertyDescriptor, PropertyKey};

pub struct Reflect;

impl Reflect {
    pub fn apply(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, ObjectError> {
        heap.call(&JsValue::Object(target), this, args)
    }

    pub fn construct(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        args: &[JsValue],
        new_target: Option<ObjectHandle>,
    ) -> Result<JsValue, ObjectError> {
        heap.construct(&JsValue::Object(target), args, new_target)
    }

    pub fn define_property(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        heap.define_property(target, key, desc)
    }

    pub fn delete_property(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        heap.delete_property(target, key)
    }

    pub fn get(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, ObjectError> {
        heap.get_property_with_receiver(target, key, receiver)
    }

    pub fn get_own_property_descriptor(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        heap.get_own_property_descriptor(target, key)
    }

    pub fn get_prototype_of(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
    ) -> Result<Option<ObjectHandle>, ObjectError> {
        heap.get_prototype_of(target)
    }

    pub fn has(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        heap.has_property(target, key)
    }

    pub fn is_extensible(heap: &mut ObjectHeap, target: ObjectHandle) -> Result<bool, ObjectError> {
        heap.is_extensible(target)
    }

    pub fn own_keys(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
    ) -> Result<Vec<PropertyKey>, ObjectError> {
        heap.own_keys(target)
    }

    pub fn prevent_extensions(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
    ) -> Result<bool, ObjectError> {
        heap.prevent_extensions(target)
    }

    pub fn set(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<bool, ObjectError> {
        heap.set_property_with_receiver(target, key, value, receiver)
    }

    pub fn set_prototype_of(
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        proto: Option<ObjectHandle>,
    ) -> Result<bool, ObjectError> {
        heap.set_prototype_of(target, proto)
    }
}
