//! The callback contract shared by every script host
//!
//! The external module sees four callables: output, input, status and log.
//! A host is anything that can load the module, hand it those callables and
//! then give up its thread to the module's loop.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Script host not initialized")]
    NotInitialized,

    #[error("Callbacks must be registered before run_loop")]
    CallbacksMissing,

    #[error("Failed to spawn script host {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("Failed to import module {module}: {error}")]
    ImportError { module: String, error: String },

    #[error("Script raised an error: {0}")]
    Script(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed host message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Script host exited with {0}")]
    Exited(ExitStatus),

    #[error("Input request abandoned: the input slot was closed")]
    InputClosed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "embedded")]
    #[error("Python error: {0}")]
    Python(#[from] pyo3::PyErr),
}

/// `(message) -> ()`, used for both the output and log callbacks
pub type MessageFn = Arc<dyn Fn(&str) + Send + Sync>;

/// `(prompt) -> value`, blocks until the user answers
pub type InputFn = Arc<dyn Fn(&str) -> Result<String, HostError> + Send + Sync>;

/// `(state) -> ()`, receives the raw status string from the module
pub type StatusFn = Arc<dyn Fn(&str) + Send + Sync>;

/// The three callables passed to `set_callbacks`
#[derive(Clone)]
pub struct Callbacks {
    pub output: MessageFn,
    pub input: InputFn,
    pub status: StatusFn,
}

/// Busy state requested by the module's status callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Start,
    Stop,
}

impl StatusAction {
    /// Only the literal `"start"` starts the spinner; anything else stops it.
    pub fn from_wire(state: &str) -> Self {
        if state == "start" {
            Self::Start
        } else {
            Self::Stop
        }
    }
}

/// A loaded instance of the external module's API object
pub trait ScriptHost: Send {
    /// Load the module, construct the API object and call its `initialize()`.
    fn initialize(&mut self) -> Result<(), HostError>;

    fn set_callbacks(&mut self, callbacks: Callbacks) -> Result<(), HostError>;

    fn set_log_callback(&mut self, log: MessageFn) -> Result<(), HostError>;

    /// Hand control to the module. Normally this never returns.
    fn run_loop(&mut self) -> Result<(), HostError>;
}

impl<H: ScriptHost + ?Sized> ScriptHost for Box<H> {
    fn initialize(&mut self) -> Result<(), HostError> {
        (**self).initialize()
    }

    fn set_callbacks(&mut self, callbacks: Callbacks) -> Result<(), HostError> {
        (**self).set_callbacks(callbacks)
    }

    fn set_log_callback(&mut self, log: MessageFn) -> Result<(), HostError> {
        (**self).set_log_callback(log)
    }

    fn run_loop(&mut self) -> Result<(), HostError> {
        (**self).run_loop()
    }
}
