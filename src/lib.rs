//! Ferry: use a foreign runtime's functions, classes and objects as if
//! they were local.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               host (ferry)               │
//! │                                          │
//! │  Bridge     - transport, caches, lifting │
//! │  Object     - proxy for one handle       │
//! │  Class      - descriptor + ancestor set  │
//! │  Function   - descriptor + binding       │
//! │  Namespace  - lazy path traversal        │
//! │                                          │
//! ├────────────── ferry-wire ────────────────┤
//! │   Value / Envelope / Command / Transport │
//! ├────────────── ferry-guest ───────────────┤
//! │   Dispatcher ─▶ ForeignRuntime           │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use ferry::{Bridge, Value};
//! use ferry_guest::memory::MemoryRuntime;
//!
//! let bridge = Bridge::in_process(MemoryRuntime::new())?;
//! let upper = bridge.function("strtoupper")?.call(vec!["hi".into()])?;
//! assert_eq!(upper, Value::from("HI"));
//!
//! let array = bridge.class("ArrayObject")?.new(vec![Value::from(vec![1, 2])])?;
//! assert_eq!(array.len()?, 2);
//! ```
//!
//! Foreign handles are never released: every object the host has seen
//! stays registered on both sides until the bridge is dropped.

mod binding;
mod bridge;
mod class;
mod error;
mod exception;
mod function;
mod handles;
mod namespace;
mod object;
mod value;

pub mod config;

pub use binding::{bind, BindingError};
pub use bridge::Bridge;
pub use class::Class;
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use exception::{ErrorKind, ForeignError};
pub use function::Function;
pub use handles::HandleRegistry;
pub use namespace::{Kind, Namespace};
pub use object::{Object, ObjectIter, Resource};
pub use value::Value;

// The protocol crate, for callers that build transports or raw commands
pub use ferry_wire as wire;
