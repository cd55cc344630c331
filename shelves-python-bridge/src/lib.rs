//! Python bridge for the Shelves harness
//!
//! This crate handles:
//! 1. The callback contract of the external module (`initialize`,
//!    `set_callbacks`, `set_log_callback`, `run_loop`)
//! 2. Running that module in a child interpreter, or embedded via PyO3 with
//!    the `embedded` feature
//! 3. Marshalling the module's callbacks onto the UI thread, including the
//!    blocking hand-off for input requests

mod bridge;
mod contract;
mod dispatch;
mod module;
mod process;
mod protocol;
#[cfg(feature = "embedded")]
mod runtime;
mod slot;

pub use bridge::InteropBridge;
pub use contract::{Callbacks, HostError, InputFn, MessageFn, ScriptHost, StatusAction, StatusFn};
pub use dispatch::{channel, UiDispatcher, UiEvent, UiEvents};
pub use module::ModuleSpec;
pub use process::{ProcessCommand, ProcessHost};
pub use protocol::{HostCommand, HostMessage};
#[cfg(feature = "embedded")]
pub use runtime::EmbeddedHost;
pub use slot::InputSlot;

/// Re-export pyo3 for consumers
#[cfg(feature = "embedded")]
pub use pyo3;
