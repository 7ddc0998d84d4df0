//! Value and storage layer of the interceptable object model.
//!
//! Everything here is plain data: property keys, runtime values, property
//! descriptors, and the [`OrdinaryObject`] that backs every target.  Operations
//! that need the heap (prototype walks, calls, dispatch) live in
//! [`crate::heap`] and [`crate::dispatcher`].
//!
//! `BTreeMap` keeps own-property storage deterministically ordered.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serialize `BTreeMap<PropertyKey, PropertyDescriptor>` as a sequence of
/// `[key, descriptor]` pairs; JSON maps need string keys and `PropertyKey`
/// is an enum.
mod properties_as_seq {
    use super::{BTreeMap, PropertyDescriptor, PropertyKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<PropertyKey, PropertyDescriptor>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&PropertyKey, &PropertyDescriptor)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<PropertyKey, PropertyDescriptor>, D::Error> {
        let pairs: Vec<(PropertyKey, PropertyDescriptor)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// PropertyKey: string or symbol
// ---------------------------------------------------------------------------

/// Unique symbol identifier, allocated by [`crate::heap::ObjectHeap::alloc_symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// A property key: either a string or a symbol.
///
/// Handler names are property keys too, so a derived class may hide its
/// handlers behind symbols.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    String(String),
    Symbol(SymbolId),
}

impl PropertyKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Symbol(_) => None,
        }
    }

    /// Canonical array index, if this key is one (`"0"`, `"17"`, not `"01"`).
    pub fn array_index(&self) -> Option<u64> {
        let s = self.as_str()?;
        let n = s.parse::<u64>().ok()?;
        (n.to_string() == s).then_some(n)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<SymbolId> for PropertyKey {
    fn from(id: SymbolId) -> Self {
        Self::Symbol(id)
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque handle referencing an object on the managed heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Index into the heap's native function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

// ---------------------------------------------------------------------------
// JsValue
// ---------------------------------------------------------------------------

/// Runtime value.  Callability is a property of the referenced object, not
/// of the value: see [`crate::heap::ObjectHeap::is_callable`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Symbol(SymbolId),
    Object(ObjectHandle),
}

impl JsValue {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Self::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "number",
            Self::Str(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
        }
    }

    /// SameValue comparison.
    pub fn same_value(&self, other: &Self) -> bool {
        self == other
    }

    /// ToBoolean.
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => !s.is_empty(),
            Self::Symbol(_) | Self::Object(_) => true,
        }
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
            Self::Object(h) => write!(f, "[object#{}]", h.0),
        }
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for JsValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<ObjectHandle> for JsValue {
    fn from(h: ObjectHandle) -> Self {
        Self::Object(h)
    }
}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// Property descriptor.  Accessor `get`/`set` reference callable objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyDescriptor {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<ObjectHandle>,
        set: Option<ObjectHandle>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Writable, enumerable, configurable data descriptor (plain assignment).
    pub fn data(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Non-writable, non-enumerable, non-configurable data descriptor.
    pub fn data_frozen(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    pub fn accessor(get: Option<ObjectHandle>, set: Option<ObjectHandle>) -> Self {
        Self::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn value(&self) -> Option<&JsValue> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Data descriptor with `writable = true`.  Accessors are never writable.
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { writable, .. } => *writable,
            Self::Accessor { .. } => false,
        }
    }

    pub fn set_non_configurable(&mut self) {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => {
                *configurable = false;
            }
        }
    }

    pub fn set_non_writable(&mut self) {
        if let Self::Data { writable, .. } = self {
            *writable = false;
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectError
// ---------------------------------------------------------------------------

/// Errors from object operations, whether raised by the platform defaults or
/// by user handlers.  The dispatcher forwards every variant untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ObjectError {
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("{0} not found")]
    ObjectNotFound(ObjectHandle),
    #[error("TypeError: prototype chain cycle detected")]
    PrototypeCycleDetected,
    #[error("TypeError: prototype chain depth {depth} exceeds max {max}")]
    PrototypeChainTooDeep { depth: u32, max: u32 },
    /// A value raised by user code (handler, initializer, native body).
    #[error("uncaught {0}")]
    Thrown(JsValue),
    #[error("RangeError: dispatch depth {depth} exceeds max {max}")]
    DispatchDepthExceeded { depth: u32, max: u32 },
}

impl ObjectError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn thrown(value: impl Into<JsValue>) -> Self {
        Self::Thrown(value.into())
    }

    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::TypeError(_) => "FE-INTERCEPT-0001",
            Self::ObjectNotFound(_) => "FE-INTERCEPT-0002",
            Self::PrototypeCycleDetected => "FE-INTERCEPT-0003",
            Self::PrototypeChainTooDeep { .. } => "FE-INTERCEPT-0004",
            Self::Thrown(_) => "FE-INTERCEPT-0005",
            Self::DispatchDepthExceeded { .. } => "FE-INTERCEPT-0006",
        }
    }
}

// ---------------------------------------------------------------------------
// OrdinaryObject
// ---------------------------------------------------------------------------

/// An ordinary object: own storage plus the internal slots the default
/// operations consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinaryObject {
    /// `[[Prototype]]` (None ends the chain).
    pub prototype: Option<ObjectHandle>,
    /// `[[Extensible]]`.
    pub extensible: bool,
    #[serde(with = "properties_as_seq")]
    pub properties: BTreeMap<PropertyKey, PropertyDescriptor>,
    /// Debug tag, e.g. the name of the derived class backing a target.
    pub class_tag: Option<String>,
    /// `[[Call]]` body.
    pub call: Option<FunctionId>,
    /// `[[Construct]]` body.
    pub construct: Option<FunctionId>,
}

impl Default for OrdinaryObject {
    fn default() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: BTreeMap::new(),
            class_tag: None,
            call: None,
            construct: None,
        }
    }
}

impl OrdinaryObject {
    pub fn with_prototype(proto: Option<ObjectHandle>) -> Self {
        Self {
            prototype: proto,
            ..Self::default()
        }
    }

    pub fn is_callable(&self) -> bool {
        self.call.is_some()
    }

    pub fn is_constructor(&self) -> bool {
        self.construct.is_some()
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// `[[DefineOwnProperty]](P, Desc)`.
    ///
    /// `Ok(false)` when the change is rejected: a new key on a non-extensible
    /// object, or an incompatible change to a non-configurable property.
    pub fn define_own_property(
        &mut self,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        let Some(current) = self.properties.get(&key) else {
            if !self.extensible {
                return Ok(false);
            }
            self.properties.insert(key, desc);
            return Ok(true);
        };

        if !current.is_configurable() {
            if desc.is_configurable()
                || desc.is_enumerable() != current.is_enumerable()
                || current.is_data() != desc.is_data()
            {
                return Ok(false);
            }
            match (current, &desc) {
                (
                    PropertyDescriptor::Data {
                        value: cur_value,
                        writable: false,
                        ..
                    },
                    PropertyDescriptor::Data {
                        value: new_value,
                        writable: new_writable,
                        ..
                    },
                ) if *new_writable || !cur_value.same_value(new_value) => return Ok(false),
                (
                    PropertyDescriptor::Accessor {
                        get: cur_get,
                        set: cur_set,
                        ..
                    },
                    PropertyDescriptor::Accessor {
                        get: new_get,
                        set: new_set,
                        ..
                    },
                ) if cur_get != new_get || cur_set != new_set => return Ok(false),
                _ => {}
            }
        }
        self.properties.insert(key, desc);
        Ok(true)
    }

    /// `[[Delete]](P)`.  Absent keys delete vacuously; non-configurable keys
    /// refuse.
    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.properties.get(key) {
            None => true,
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                self.properties.remove(key);
                true
            }
        }
    }

    /// `[[OwnPropertyKeys]]()`: array indices ascending, then string keys,
    /// then symbols.
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut index_keys: Vec<(u64, PropertyKey)> = Vec::new();
        let mut string_keys: Vec<PropertyKey> = Vec::new();
        let mut symbol_keys: Vec<PropertyKey> = Vec::new();

        for key in self.properties.keys() {
            match (key.array_index(), key) {
                (Some(n), _) => index_keys.push((n, key.clone())),
                (None, PropertyKey::String(_)) => string_keys.push(key.clone()),
                (None, PropertyKey::Symbol(_)) => symbol_keys.push(key.clone()),
            }
        }

        index_keys.sort_by_key(|(n, _)| *n);
        let mut keys: Vec<PropertyKey> = index_keys.into_iter().map(|(_, k)| k).collect();
        keys.extend(string_keys);
        keys.extend(symbol_keys);
        keys
    }

    /// `[[PreventExtensions]]()`.  Always succeeds on ordinary objects.
    pub fn prevent_extensions(&mut self) -> bool {
        self.extensible = false;
        true
    }

    /// Non-extensible with every own property non-configurable and every data
    /// property non-writable.
    pub fn freeze(&mut self) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.set_non_configurable();
            desc.set_non_writable();
        }
    }
}
