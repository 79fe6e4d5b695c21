//! Foreign side of a ferry bridge
//!
//! A [`Dispatcher`] reads command frames from a [`Transport`], runs each one
//! against a [`ForeignRuntime`] and writes back exactly one envelope per
//! command. The runtime trait is the only thing a host language needs to
//! implement; [`memory::MemoryRuntime`] is a complete in-process one.
//!
//! ```ignore
//! use ferry_guest::{memory::MemoryRuntime, Dispatcher};
//! use ferry_wire::LineTransport;
//!
//! let stdin = std::io::stdin().lock();
//! let mut transport = LineTransport::new(stdin, std::io::stdout());
//! Dispatcher::new(MemoryRuntime::new()).serve(&mut transport)?;
//! ```
//!
//! [`Transport`]: ferry_wire::Transport

mod commands;
mod dispatcher;
mod error;
mod helpers;
pub mod memory;
mod runtime;

pub use dispatcher::{Dispatcher, Handler};
pub use error::GuestError;
pub use helpers::{format_double, to_output, truthy};
pub use runtime::{ForeignRuntime, Target};
