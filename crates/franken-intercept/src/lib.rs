#![forbid(unsafe_code)]

//! Interceptable objects: instances whose fundamental operations are routed
//! through conventionally named handler members of their class, falling back to
//! ordinary object semantics when a member is absent.
//!
//! ```text
//! caller ─▶ ObjectHeap::get_property ─▶ dispatch ─┬─▶ class member (Trap, DefaultAction)
//!                                                └─▶ DefaultAction::invoke ─▶ Reflect ─▶ target
//! ```

pub mod class;
pub mod config;
pub mod default_action;
pub mod dispatcher;
pub mod events;
pub mod handler_names;
pub mod heap;
pub mod invariants;
pub mod object_model;
pub mod operation;
pub mod reflect;

pub use class::{Handler, InterceptableClass, InterceptableClassBuilder, Trap};
pub use config::{ConfigError, DispatchConfig, InvariantPolicy};
pub use default_action::DefaultAction;
pub use dispatcher::Interceptable;
pub use handler_names::{HandlerNameOverrides, HandlerNameTable};
pub use heap::ObjectHeap;
pub use object_model::{JsValue, ObjectError, ObjectHandle, PropertyDescriptor, PropertyKey};
pub use operation::{Operation, TrapArgs, TrapOutcome};
pub use reflect::Reflect;
