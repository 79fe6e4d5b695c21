//! Ferry wire protocol
//!
//! Everything that crosses the process boundary between a host and a
//! foreign runtime goes through this crate:
//!
//! ```text
//! host                                   foreign runtime
//! ────                                   ───────────────
//! Command {cmd, data}  ── one line ──▶   dispatcher
//!                      ◀── one line ──   Envelope {type, value}
//! ```
//!
//! - [`Value`] is the data model shared by both sides
//! - [`marshal`] turns values into tagged [`Envelope`]s and back
//! - [`Transport`] frames one JSON document per line
//! - [`info`] holds the introspection records used to build proxies
//!
//! The protocol is strictly request/response with one request in flight.
//! There are no correlation identifiers, so a transport must never be
//! shared by two concurrent callers.

pub mod envelope;
pub mod error;
pub mod info;
pub mod marshal;
pub mod transport;
mod value;

pub use envelope::{Command, Envelope, FaultKind, ProtocolFault, Thrown};
pub use error::{ConversionError, DecodeError, EncodingError, TransportError};
pub use info::{ClassInfo, FunctionInfo, MethodInfo, ParamInfo, PropertyInfo, TypeInfo};
pub use marshal::{decode, encode, from_value, to_value};
pub use transport::{ChannelTransport, LineTransport, Transport};
pub use value::{FromValue, ObjectRef, ResourceRef, Value};
