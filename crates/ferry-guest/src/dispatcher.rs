//! Command registry and serve loop
//!
//! Every frame read from the transport is answered with exactly one
//! envelope, in order. Nothing a handler does can end the loop; only the
//! host closing its side of the stream does.

use crate::commands;
use crate::{ForeignRuntime, GuestError};
use ferry_wire::{encode, Command, Envelope, ProtocolFault, Thrown, Transport, TransportError, Value};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// A command implementation: receives the raw `data` payload.
pub type Handler<R> = fn(&mut R, serde_json::Value) -> Result<Value, GuestError>;

/// Maps command names to handlers and runs them against a runtime.
pub struct Dispatcher<R> {
    runtime: R,
    handlers: HashMap<String, Handler<R>>,
}

impl<R: ForeignRuntime> Dispatcher<R> {
    /// A dispatcher with the full built-in command set registered.
    pub fn new(runtime: R) -> Self {
        let mut dispatcher = Self::bare(runtime);
        commands::register_builtins(&mut dispatcher);
        dispatcher
    }

    /// A dispatcher that knows no commands yet.
    pub fn bare(runtime: R) -> Self {
        Self {
            runtime,
            handlers: HashMap::new(),
        }
    }

    /// Register a command, returning the handler it replaces.
    pub fn register(&mut self, name: impl Into<String>, handler: Handler<R>) -> Option<Handler<R>> {
        self.handlers.insert(name.into(), handler)
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// Run one command and produce its response envelope.
    pub fn handle(&mut self, command: Command) -> Envelope {
        let Some(handler) = self.handlers.get(&command.cmd).copied() else {
            tracing::warn!(cmd = %command.cmd, "unknown command");
            return Envelope::fault(&ProtocolFault::unknown_command(&command.cmd));
        };

        tracing::debug!(cmd = %command.cmd, "dispatching");
        let runtime = &mut self.runtime;
        let data = command.data;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(runtime, data)));

        match outcome {
            Ok(Ok(value)) => encode(&value).unwrap_or_else(|err| {
                tracing::warn!(cmd = %command.cmd, error = %err, "result not encodable");
                Envelope::thrown(&Thrown::new("Error", format!("{}: {}", command.cmd, err)))
            }),
            Ok(Err(err)) => {
                tracing::debug!(cmd = %command.cmd, error = %err, "command failed");
                Envelope::thrown(&err.into_thrown(&command.cmd))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(cmd = %command.cmd, %message, "handler panicked");
                Envelope::thrown(&Thrown::new(
                    "Error",
                    format!("{}: internal failure: {}", command.cmd, message),
                ))
            }
        }
    }

    /// Parse one raw frame and run it.
    pub fn handle_frame(&mut self, frame: &str) -> Envelope {
        match serde_json::from_str::<Command>(frame) {
            Ok(command) => self.handle(command),
            Err(err) => {
                tracing::warn!(error = %err, "malformed request frame");
                Envelope::fault(&ProtocolFault::malformed_frame(err))
            }
        }
    }

    /// Answer frames until the host closes the stream.
    ///
    /// An unreadable frame is answered with a fault and skipped. Only I/O
    /// failures end the loop early. Returns the number of frames answered.
    pub fn serve<T: Transport>(&mut self, transport: &mut T) -> Result<usize, TransportError> {
        let mut served = 0;
        loop {
            let response = match transport.receive() {
                Ok(Some(frame)) => self.handle_frame(&frame),
                Ok(None) => break,
                Err(TransportError::MalformedFrame(reason)) => {
                    tracing::warn!(%reason, "unreadable request frame");
                    Envelope::fault(&ProtocolFault::malformed_frame(reason))
                }
                Err(e) => return Err(e),
            };
            transport.send_json(&response)?;
            served += 1;
        }
        tracing::debug!(served, "host closed the stream");
        Ok(served)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
