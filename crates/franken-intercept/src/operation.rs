//! The closed set of interceptable operations, their argument shapes, and the
//! uniform result type handlers return.
//!
//! One handler may be bound to several operations (see
//! [`crate::handler_names`]), so handlers receive a tagged [`TrapArgs`] and
//! return an untyped [`TrapOutcome`].  The dispatcher coerces the outcome to the
//! operation's result type with the `into_*` methods below.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object_model::{JsValue, ObjectError, ObjectHandle, PropertyDescriptor, PropertyKey};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Fundamental object operation.  Fixed at 13 kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Apply,
    Construct,
    DefineProperty,
    DeleteProperty,
    Get,
    GetOwnPropertyDescriptor,
    GetPrototypeOf,
    Has,
    IsExtensible,
    OwnKeys,
    PreventExtensions,
    Set,
    SetPrototypeOf,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Self::Apply,
        Self::Construct,
        Self::DefineProperty,
        Self::DeleteProperty,
        Self::Get,
        Self::GetOwnPropertyDescriptor,
        Self::GetPrototypeOf,
        Self::Has,
        Self::IsExtensible,
        Self::OwnKeys,
        Self::PreventExtensions,
        Self::Set,
        Self::SetPrototypeOf,
    ];

    /// Trap name, as used in configuration files and event records.
    pub fn trap_name(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Construct => "construct",
            Self::DefineProperty => "defineProperty",
            Self::DeleteProperty => "deleteProperty",
            Self::Get => "get",
            Self::GetOwnPropertyDescriptor => "getOwnPropertyDescriptor",
            Self::GetPrototypeOf => "getPrototypeOf",
            Self::Has => "has",
            Self::IsExtensible => "isExtensible",
            Self::OwnKeys => "ownKeys",
            Self::PreventExtensions => "preventExtensions",
            Self::Set => "set",
            Self::SetPrototypeOf => "setPrototypeOf",
        }
    }

    pub fn from_trap_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.trap_name() == name)
    }

    /// Built-in handler member name (`"get"` → `"__get__"`).
    pub fn default_handler_name(self) -> &'static str {
        match self {
            Self::Apply => "__apply__",
            Self::Construct => "__construct__",
            Self::DefineProperty => "__defineProperty__",
            Self::DeleteProperty => "__deleteProperty__",
            Self::Get => "__get__",
            Self::GetOwnPropertyDescriptor => "__getOwnPropertyDescriptor__",
            Self::GetPrototypeOf => "__getPrototypeOf__",
            Self::Has => "__has__",
            Self::IsExtensible => "__isExtensible__",
            Self::OwnKeys => "__ownKeys__",
            Self::PreventExtensions => "__preventExtensions__",
            Self::Set => "__set__",
            Self::SetPrototypeOf => "__setPrototypeOf__",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trap_name())
    }
}

// ---------------------------------------------------------------------------
// TrapArgs
// ---------------------------------------------------------------------------

/// Operation arguments, excluding the target (which the [`crate::class::Trap`]
/// carries separately).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapArgs {
    Apply {
        this: JsValue,
        args: Vec<JsValue>,
    },
    Construct {
        args: Vec<JsValue>,
        new_target: ObjectHandle,
    },
    DefineProperty {
        key: PropertyKey,
        descriptor: PropertyDescriptor,
    },
    DeleteProperty {
        key: PropertyKey,
    },
    Get {
        key: PropertyKey,
        receiver: JsValue,
    },
    GetOwnPropertyDescriptor {
        key: PropertyKey,
    },
    GetPrototypeOf,
    Has {
        key: PropertyKey,
    },
    IsExtensible,
    OwnKeys,
    PreventExtensions,
    Set {
        key: PropertyKey,
        value: JsValue,
        receiver: JsValue,
    },
    SetPrototypeOf {
        proto: Option<ObjectHandle>,
    },
}

impl TrapArgs {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Apply { .. } => Operation::Apply,
            Self::Construct { .. } => Operation::Construct,
            Self::DefineProperty { .. } => Operation::DefineProperty,
            Self::DeleteProperty { .. } => Operation::DeleteProperty,
            Self::Get { .. } => Operation::Get,
            Self::GetOwnPropertyDescriptor { .. } => Operation::GetOwnPropertyDescriptor,
            Self::GetPrototypeOf => Operation::GetPrototypeOf,
            Self::Has { .. } => Operation::Has,
            Self::IsExtensible => Operation::IsExtensible,
            Self::OwnKeys => Operation::OwnKeys,
            Self::PreventExtensions => Operation::PreventExtensions,
            Self::Set { .. } => Operation::Set,
            Self::SetPrototypeOf { .. } => Operation::SetPrototypeOf,
        }
    }

    /// The property key, for the operations that take one.
    pub fn key(&self) -> Option<&PropertyKey> {
        match self {
            Self::DefineProperty { key, .. }
            | Self::DeleteProperty { key }
            | Self::Get { key, .. }
            | Self::GetOwnPropertyDescriptor { key }
            | Self::Has { key }
            | Self::Set { key, .. } => Some(key),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TrapOutcome
// ---------------------------------------------------------------------------

/// What a handler (or a [`crate::default_action::DefaultAction`]) produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapOutcome {
    /// Handler returned nothing.  Reads as `undefined` / `false`.
    Unit,
    Value(JsValue),
    Bool(bool),
    Keys(Vec<PropertyKey>),
    Descriptor(Option<PropertyDescriptor>),
    Prototype(Option<ObjectHandle>),
}

impl TrapOutcome {
    /// Coerce for Get and Apply.
    pub fn into_value(self, operation: Operation) -> Result<JsValue, ObjectError> {
        match self {
            Self::Unit => Ok(JsValue::Undefined),
            Self::Value(v) => Ok(v),
            Self::Bool(b) => Ok(JsValue::Bool(b)),
            Self::Prototype(Some(h)) => Ok(JsValue::Object(h)),
            Self::Prototype(None) => Ok(JsValue::Null),
            Self::Keys(_) | Self::Descriptor(_) => Err(Self::shape_error(operation, "a value")),
        }
    }

    /// Coerce for Construct: the result must be an object.
    pub fn into_object(self, operation: Operation) -> Result<ObjectHandle, ObjectError> {
        match self.into_value(operation)? {
            JsValue::Object(h) => Ok(h),
            other => Err(ObjectError::type_error(format!(
                "{operation} handler must return an object, got {}",
                other.type_name()
            ))),
        }
    }

    /// ToBoolean coercion for the predicate-style operations.
    pub fn into_bool(self) -> bool {
        match self {
            Self::Unit => false,
            Self::Value(v) => v.to_boolean(),
            Self::Bool(b) => b,
            Self::Keys(_) => true,
            Self::Descriptor(d) => d.is_some(),
            Self::Prototype(p) => p.is_some(),
        }
    }

    pub fn into_keys(self, operation: Operation) -> Result<Vec<PropertyKey>, ObjectError> {
        match self {
            Self::Keys(keys) => Ok(keys),
            _ => Err(Self::shape_error(operation, "a key list")),
        }
    }

    pub fn into_descriptor(
        self,
        operation: Operation,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        match self {
            Self::Descriptor(d) => Ok(d),
            Self::Unit | Self::Value(JsValue::Undefined) => Ok(None),
            _ => Err(Self::shape_error(operation, "a descriptor or undefined")),
        }
    }

    pub fn into_prototype(self, operation: Operation) -> Result<Option<ObjectHandle>, ObjectError> {
        match self {
            Self::Prototype(p) => Ok(p),
            Self::Value(JsValue::Object(h)) => Ok(Some(h)),
            Self::Value(JsValue::Null) => Ok(None),
            _ => Err(Self::shape_error(operation, "an object or null")),
        }
    }

    fn shape_error(operation: Operation, expected: &str) -> ObjectError {
        ObjectError::type_error(format!("{operation} handler must return {expected}"))
    }
}

impl From<JsValue> for TrapOutcome {
    fn from(v: JsValue) -> Self {
        Self::Value(v)
    }
}

impl From<bool> for TrapOutcome {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<PropertyKey>> for TrapOutcome {
    fn from(keys: Vec<PropertyKey>) -> Self {
        Self::Keys(keys)
    }
}

impl From<Option<PropertyDescriptor>> for TrapOutcome {
    fn from(d: Option<PropertyDescriptor>) -> Self {
        Self::Descriptor(d)
    }
}

impl From<Option<ObjectHandle>> for TrapOutcome {
    fn from(p: Option<ObjectHandle>) -> Self {
        Self::Prototype(p)
    }
}
