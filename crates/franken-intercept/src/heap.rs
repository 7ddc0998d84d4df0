//! The managed object heap.
//!
//! Holds ordinary objects, interceptable instances, and native function
//! bodies.  The public operations (`get_property`, `call`, ...) route by object
//! kind: ordinary objects get the platform semantics implemented here, and
//! interceptable instances go through the dispatcher.  The platform semantics
//! are also what every [`crate::default_action::DefaultAction`] falls back to.
//!
//! Prototype walks may cross interceptable instances; when one is reached the
//! walk hands the rest of the lookup to that instance's dispatched operation.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::config::{ConfigError, DispatchConfig};
use crate::dispatcher::InterceptableObject;
use crate::events::EventLog;
use crate::object_model::{
    FunctionId, JsValue, ObjectError, ObjectHandle, OrdinaryObject, PropertyDescriptor,
    PropertyKey, SymbolId,
};
use crate::operation::Operation;

/// Native function body: `(heap, this, args)`.
pub type NativeFn = Rc<dyn Fn(&mut ObjectHeap, &JsValue, &[JsValue]) -> Result<JsValue, ObjectError>>;

/// First symbol id handed out by [`ObjectHeap::alloc_symbol`].
const FIRST_SYMBOL_ID: u32 = 1;

pub(crate) enum ManagedObject {
    Ordinary(OrdinaryObject),
    Interceptable(InterceptableObject),
}

pub struct ObjectHeap {
    objects: Vec<ManagedObject>,
    functions: Vec<NativeFn>,
    next_symbol: u32,
    config: DispatchConfig,
    pub(crate) events: EventLog,
    pub(crate) dispatch_depth: u32,
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("objects", &self.objects.len())
            .field("functions", &self.functions.len())
            .field("config", &self.config)
            .field("events", &self.events.len())
            .finish()
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

/// What an own-property lookup found, detached from the heap borrow.
enum Lookup {
    Value(JsValue),
    Getter(Option<ObjectHandle>),
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::unchecked(DispatchConfig::default())
    }

    /// Validates `config` first; a zero dispatch bound would fail every
    /// dispatch.
    pub fn with_config(config: DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::unchecked(config))
    }

    fn unchecked(config: DispatchConfig) -> Self {
        Self {
            objects: Vec::new(),
            functions: Vec::new(),
            next_symbol: FIRST_SYMBOL_ID,
            events: EventLog::new(config.event_capacity),
            config,
            dispatch_depth: 0,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<crate::events::DispatchEvent> {
        self.events.drain()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // -- Allocation ---------------------------------------------------------

    /// Allocate an ordinary object with the given prototype.
    pub fn alloc(&mut self, proto: Option<ObjectHandle>) -> ObjectHandle {
        self.alloc_object(OrdinaryObject::with_prototype(proto))
    }

    pub fn alloc_plain(&mut self) -> ObjectHandle {
        self.alloc(None)
    }

    pub fn alloc_object(&mut self, object: OrdinaryObject) -> ObjectHandle {
        self.push(ManagedObject::Ordinary(object))
    }

    pub(crate) fn push(&mut self, object: ManagedObject) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        self.objects.push(object);
        handle
    }

    pub fn alloc_symbol(&mut self) -> SymbolId {
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        id
    }

    pub(crate) fn register_function(&mut self, body: NativeFn) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(body);
        id
    }

    /// Allocate a callable object.
    pub fn alloc_function<F>(&mut self, body: F) -> ObjectHandle
    where
        F: Fn(&mut ObjectHeap, &JsValue, &[JsValue]) -> Result<JsValue, ObjectError> + 'static,
    {
        let id = self.register_function(Rc::new(body));
        self.alloc_object(OrdinaryObject {
            call: Some(id),
            ..OrdinaryObject::default()
        })
    }

    /// Allocate a constructor with a fresh `prototype` object.  The body runs
    /// with the newly allocated instance as `this`; returning an object
    /// replaces that instance.
    pub fn alloc_constructor<F>(&mut self, body: F) -> ObjectHandle
    where
        F: Fn(&mut ObjectHeap, &JsValue, &[JsValue]) -> Result<JsValue, ObjectError> + 'static,
    {
        let id = self.register_function(Rc::new(body));
        let prototype = self.alloc_plain();
        let mut ctor = OrdinaryObject {
            call: Some(id),
            construct: Some(id),
            ..OrdinaryObject::default()
        };
        ctor.properties.insert(
            PropertyKey::from("prototype"),
            PropertyDescriptor::Data {
                value: JsValue::Object(prototype),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        self.alloc_object(ctor)
    }

    /// Array-like object: index keys plus `length`.
    pub fn alloc_array(&mut self, values: Vec<JsValue>) -> ObjectHandle {
        let mut array = OrdinaryObject {
            class_tag: Some("Array".to_string()),
            ..OrdinaryObject::default()
        };
        let len = values.len() as i64;
        for (i, value) in values.into_iter().enumerate() {
            array
                .properties
                .insert(PropertyKey::from(i.to_string()), PropertyDescriptor::data(value));
        }
        array.properties.insert(
            PropertyKey::from("length"),
            PropertyDescriptor::Data {
                value: JsValue::Int(len),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        self.alloc_object(array)
    }

    // -- Access -------------------------------------------------------------

    pub(crate) fn managed(&self, handle: ObjectHandle) -> Result<&ManagedObject, ObjectError> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    pub(crate) fn managed_mut(
        &mut self,
        handle: ObjectHandle,
    ) -> Result<&mut ManagedObject, ObjectError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    pub(crate) fn ordinary(&self, handle: ObjectHandle) -> Result<&OrdinaryObject, ObjectError> {
        match self.managed(handle)? {
            ManagedObject::Ordinary(o) => Ok(o),
            ManagedObject::Interceptable(_) => Err(ObjectError::type_error(format!(
                "{handle} is interceptable; its storage is not directly reachable"
            ))),
        }
    }

    pub(crate) fn ordinary_mut(
        &mut self,
        handle: ObjectHandle,
    ) -> Result<&mut OrdinaryObject, ObjectError> {
        match self.managed_mut(handle)? {
            ManagedObject::Ordinary(o) => Ok(o),
            ManagedObject::Interceptable(_) => Err(ObjectError::type_error(format!(
                "{handle} is interceptable; its storage is not directly reachable"
            ))),
        }
    }

    pub fn is_interceptable(&self, handle: ObjectHandle) -> Result<bool, ObjectError> {
        Ok(matches!(
            self.managed(handle)?,
            ManagedObject::Interceptable(_)
        ))
    }

    /// Would `call` reach a body (or an apply handler) rather than fail?
    pub fn is_callable(&self, handle: ObjectHandle) -> Result<bool, ObjectError> {
        match self.managed(handle)? {
            ManagedObject::Ordinary(o) => Ok(o.is_callable()),
            ManagedObject::Interceptable(record) => Ok(record
                .has_handler(Operation::Apply)
                || self.ordinary(record.target)?.is_callable()),
        }
    }

    pub fn is_constructor(&self, handle: ObjectHandle) -> Result<bool, ObjectError> {
        match self.managed(handle)? {
            ManagedObject::Ordinary(o) => Ok(o.is_constructor()),
            ManagedObject::Interceptable(record) => Ok(record
                .has_handler(Operation::Construct)
                || self.ordinary(record.target)?.is_constructor()),
        }
    }

    /// `typeof`.
    pub fn type_of(&self, value: &JsValue) -> Result<&'static str, ObjectError> {
        match value {
            JsValue::Object(h) if self.is_callable(*h)? => Ok("function"),
            other => Ok(other.type_name()),
        }
    }

    // -- Routed operations --------------------------------------------------

    /// `[[Get]](O, P, O)`.
    pub fn get_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<JsValue, ObjectError> {
        self.get_property_with_receiver(handle, key, &JsValue::Object(handle))
    }

    /// `[[Get]](O, P, Receiver)`.  Getters run with `receiver` as `this`.
    pub fn get_property_with_receiver(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_get(handle, key, receiver)
        } else {
            self.ordinary_get(handle, key, receiver)
        }
    }

    /// `[[Set]](O, P, V, O)`.
    pub fn set_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ObjectError> {
        self.set_property_with_receiver(handle, key, value, &JsValue::Object(handle))
    }

    /// `[[Set]](O, P, V, Receiver)`.  Setters run with `receiver` as `this`.
    pub fn set_property_with_receiver(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_set(handle, key, value, receiver)
        } else {
            self.ordinary_set(handle, key, value, receiver)
        }
    }

    pub fn has_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_has(handle, key)
        } else {
            self.ordinary_has(handle, key)
        }
    }

    pub fn delete_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_delete(handle, key)
        } else {
            Ok(self.ordinary_mut(handle)?.delete(key))
        }
    }

    pub fn define_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_define_property(handle, key, desc)
        } else {
            self.ordinary_mut(handle)?.define_own_property(key, desc)
        }
    }

    pub fn get_own_property_descriptor(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_get_own_property_descriptor(handle, key)
        } else {
            Ok(self.ordinary(handle)?.get_own_property(key).cloned())
        }
    }

    /// `[[OwnPropertyKeys]]`.
    pub fn own_keys(&mut self, handle: ObjectHandle) -> Result<Vec<PropertyKey>, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_own_keys(handle)
        } else {
            Ok(self.ordinary(handle)?.own_property_keys())
        }
    }

    pub fn get_prototype_of(
        &mut self,
        handle: ObjectHandle,
    ) -> Result<Option<ObjectHandle>, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_get_prototype_of(handle)
        } else {
            Ok(self.ordinary(handle)?.prototype)
        }
    }

    pub fn set_prototype_of(
        &mut self,
        handle: ObjectHandle,
        proto: Option<ObjectHandle>,
    ) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_set_prototype_of(handle, proto)
        } else {
            self.ordinary_set_prototype_of(handle, proto)
        }
    }

    pub fn is_extensible(&mut self, handle: ObjectHandle) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_is_extensible(handle)
        } else {
            Ok(self.ordinary(handle)?.extensible)
        }
    }

    pub fn prevent_extensions(&mut self, handle: ObjectHandle) -> Result<bool, ObjectError> {
        if self.is_interceptable(handle)? {
            self.intercept_prevent_extensions(handle)
        } else {
            Ok(self.ordinary_mut(handle)?.prevent_extensions())
        }
    }

    /// `[[Call]]`.
    pub fn call(
        &mut self,
        callee: &JsValue,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, ObjectError> {
        let Some(handle) = callee.as_object() else {
            return Err(ObjectError::type_error(format!(
                "{} is not a function",
                callee.type_name()
            )));
        };
        if self.is_interceptable(handle)? {
            self.intercept_apply(handle, this.clone(), args.to_vec())
        } else {
            self.ordinary_call(handle, this, args)
        }
    }

    /// `[[Construct]]`.  `new_target` defaults to the callee.
    pub fn construct(
        &mut self,
        callee: &JsValue,
        args: &[JsValue],
        new_target: Option<ObjectHandle>,
    ) -> Result<JsValue, ObjectError> {
        let Some(handle) = callee.as_object() else {
            return Err(ObjectError::type_error(format!(
                "{} is not a constructor",
                callee.type_name()
            )));
        };
        let new_target = new_target.unwrap_or(handle);
        if self.is_interceptable(handle)? {
            self.intercept_construct(handle, args.to_vec(), new_target)
                .map(JsValue::Object)
        } else {
            self.ordinary_construct(handle, args, new_target)
        }
    }

    // -- Derived helpers (observe interception) -----------------------------

    /// `Object.keys`: enumerable own string keys.
    pub fn keys(&mut self, handle: ObjectHandle) -> Result<Vec<String>, ObjectError> {
        let mut result = Vec::new();
        for key in self.own_keys(handle)? {
            let PropertyKey::String(name) = &key else {
                continue;
            };
            if let Some(desc) = self.get_own_property_descriptor(handle, &key)?
                && desc.is_enumerable()
            {
                result.push(name.clone());
            }
        }
        Ok(result)
    }

    /// `Object.getOwnPropertyNames`: every own string key.
    pub fn get_own_property_names(
        &mut self,
        handle: ObjectHandle,
    ) -> Result<Vec<String>, ObjectError> {
        Ok(self
            .own_keys(handle)?
            .into_iter()
            .filter_map(|k| match k {
                PropertyKey::String(s) => Some(s),
                PropertyKey::Symbol(_) => None,
            })
            .collect())
    }

    /// `value instanceof ctor`, walking `[[GetPrototypeOf]]`.
    pub fn instance_of(&mut self, value: &JsValue, ctor: ObjectHandle) -> Result<bool, ObjectError> {
        let Some(start) = value.as_object() else {
            return Ok(false);
        };
        let JsValue::Object(target_proto) =
            self.get_property(ctor, &PropertyKey::from("prototype"))?
        else {
            return Err(ObjectError::type_error(format!(
                "{ctor} has no object-valued prototype"
            )));
        };

        let max = self.config.max_prototype_chain_depth;
        let mut visited = BTreeSet::new();
        let mut depth: u32 = 0;
        let mut current = self.get_prototype_of(start)?;
        while let Some(h) = current {
            if h == target_proto {
                return Ok(true);
            }
            Self::chain_step(&mut visited, h, depth, max)?;
            current = self.get_prototype_of(h)?;
            depth += 1;
        }
        Ok(false)
    }

    // -- Ordinary semantics -------------------------------------------------

    fn chain_step(
        visited: &mut BTreeSet<ObjectHandle>,
        handle: ObjectHandle,
        depth: u32,
        max: u32,
    ) -> Result<(), ObjectError> {
        if depth > max {
            return Err(ObjectError::PrototypeChainTooDeep { depth, max });
        }
        if !visited.insert(handle) {
            return Err(ObjectError::PrototypeCycleDetected);
        }
        Ok(())
    }

    fn ordinary_get(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, ObjectError> {
        let max = self.config.max_prototype_chain_depth;
        let mut visited = BTreeSet::new();
        let mut depth: u32 = 0;
        let mut current = handle;

        loop {
            Self::chain_step(&mut visited, current, depth, max)?;
            let obj = match self.managed(current)? {
                ManagedObject::Ordinary(o) => o,
                ManagedObject::Interceptable(_) => {
                    return self.get_property_with_receiver(current, key, receiver);
                }
            };
            let found = obj.get_own_property(key).map(|desc| match desc {
                PropertyDescriptor::Data { value, .. } => Lookup::Value(value.clone()),
                PropertyDescriptor::Accessor { get, .. } => Lookup::Getter(*get),
            });
            match found {
                Some(Lookup::Value(v)) => return Ok(v),
                Some(Lookup::Getter(Some(getter))) => {
                    return self.call(&JsValue::Object(getter), receiver, &[]);
                }
                Some(Lookup::Getter(None)) => return Ok(JsValue::Undefined),
                None => {}
            }
            match obj.prototype {
                Some(p) => current = p,
                None => return Ok(JsValue::Undefined),
            }
            depth += 1;
        }
    }

    fn ordinary_set(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<bool, ObjectError> {
        let own = self.ordinary(handle)?.get_own_property(&key).cloned();
        let existing = match own {
            Some(desc) => Some(desc),
            None => match self.ordinary(handle)?.prototype {
                Some(proto) => self.find_inherited(proto, &key)?,
                None => None,
            },
        };
        let is_own = self.ordinary(handle)?.has_own_property(&key);

        match existing {
            Some(PropertyDescriptor::Data { writable: false, .. }) => Ok(false),
            Some(PropertyDescriptor::Accessor { set: None, .. }) => Ok(false),
            Some(PropertyDescriptor::Accessor {
                set: Some(setter), ..
            }) => {
                self.call(&JsValue::Object(setter), receiver, &[value])?;
                Ok(true)
            }
            Some(PropertyDescriptor::Data { .. }) if is_own => {
                if let Some(PropertyDescriptor::Data { value: slot, .. }) =
                    self.ordinary_mut(handle)?.properties.get_mut(&key)
                {
                    *slot = value;
                }
                Ok(true)
            }
            // Absent, or inherited writable data: create an own property.
            _ => {
                let obj = self.ordinary_mut(handle)?;
                if !obj.extensible {
                    return Ok(false);
                }
                obj.properties.insert(key, PropertyDescriptor::data(value));
                Ok(true)
            }
        }
    }

    /// First descriptor for `key` along the chain starting at `start`.
    fn find_inherited(
        &mut self,
        start: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        let max = self.config.max_prototype_chain_depth;
        let mut visited = BTreeSet::new();
        let mut depth: u32 = 0;
        let mut current = Some(start);
        while let Some(h) = current {
            Self::chain_step(&mut visited, h, depth, max)?;
            if let Some(desc) = self.get_own_property_descriptor(h, key)? {
                return Ok(Some(desc));
            }
            current = self.get_prototype_of(h)?;
            depth += 1;
        }
        Ok(None)
    }

    fn ordinary_has(&mut self, handle: ObjectHandle, key: &PropertyKey) -> Result<bool, ObjectError> {
        let max = self.config.max_prototype_chain_depth;
        let mut visited = BTreeSet::new();
        let mut depth: u32 = 0;
        let mut current = handle;

        loop {
            Self::chain_step(&mut visited, current, depth, max)?;
            let obj = match self.managed(current)? {
                ManagedObject::Ordinary(o) => o,
                ManagedObject::Interceptable(_) => return self.has_property(current, key),
            };
            if obj.has_own_property(key) {
                return Ok(true);
            }
            match obj.prototype {
                Some(p) => current = p,
                None => return Ok(false),
            }
            depth += 1;
        }
    }

    fn ordinary_set_prototype_of(
        &mut self,
        handle: ObjectHandle,
        proto: Option<ObjectHandle>,
    ) -> Result<bool, ObjectError> {
        if let Some(p) = proto {
            let mut current = Some(p);
            let mut visited = BTreeSet::new();
            visited.insert(handle);
            while let Some(h) = current {
                if !visited.insert(h) {
                    return Err(ObjectError::PrototypeCycleDetected);
                }
                current = match self.managed(h)? {
                    ManagedObject::Ordinary(o) => o.prototype,
                    // An unhooked instance reports its target's prototype, so
                    // the walk continues through the target.
                    ManagedObject::Interceptable(record)
                        if !record.has_handler(Operation::GetPrototypeOf) =>
                    {
                        if !visited.insert(record.target) {
                            return Err(ObjectError::PrototypeCycleDetected);
                        }
                        self.ordinary(record.target)?.prototype
                    }
                    // Past a getPrototypeOf handler the chain is whatever it
                    // reports; nested dispatch depth bounds any loop.
                    ManagedObject::Interceptable(_) => None,
                };
            }
        }

        let obj = self.ordinary_mut(handle)?;
        if obj.prototype == proto {
            return Ok(true);
        }
        if !obj.extensible {
            return Ok(false);
        }
        obj.prototype = proto;
        Ok(true)
    }

    fn ordinary_call(
        &mut self,
        handle: ObjectHandle,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, ObjectError> {
        let Some(body) = self.ordinary(handle)?.call else {
            return Err(ObjectError::type_error(format!(
                "{} is not a function",
                self.describe(handle)
            )));
        };
        self.invoke_function(body, this, args)
    }

    fn ordinary_construct(
        &mut self,
        handle: ObjectHandle,
        args: &[JsValue],
        new_target: ObjectHandle,
    ) -> Result<JsValue, ObjectError> {
        let Some(body) = self.ordinary(handle)?.construct else {
            return Err(ObjectError::type_error(format!(
                "{} is not a constructor",
                self.describe(handle)
            )));
        };
        let proto = self
            .get_property(new_target, &PropertyKey::from("prototype"))?
            .as_object();
        let this = self.alloc(proto);
        let result = self.invoke_function(body, &JsValue::Object(this), args)?;
        if result.is_object() {
            Ok(result)
        } else {
            Ok(JsValue::Object(this))
        }
    }

    fn invoke_function(
        &mut self,
        id: FunctionId,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, ObjectError> {
        let body = self
            .functions
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| ObjectError::type_error(format!("function#{} not found", id.0)))?;
        body(self, this, args)
    }

    /// `class_tag` when present, else the handle.
    fn describe(&self, handle: ObjectHandle) -> String {
        match self.ordinary(handle) {
            Ok(OrdinaryObject {
                class_tag: Some(tag),
                ..
            }) => tag.clone(),
            _ => handle.to_string(),
        }
    }
}
