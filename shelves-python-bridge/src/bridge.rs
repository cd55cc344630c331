//! Interop bridge
//!
//! Wires the module's callback contract to the UI: every callback either
//! posts a [`UiEvent`] or, for input requests, blocks on the [`InputSlot`]
//! until the user answers.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::dispatch::{UiDispatcher, UiEvent};
use crate::slot::InputSlot;
use crate::{Callbacks, HostError, MessageFn, ScriptHost, StatusAction};

const WORKER_THREAD_NAME: &str = "interop-bridge";

/// Builds the callbacks and drives a host through its lifecycle
#[derive(Debug, Clone)]
pub struct InteropBridge {
    dispatcher: UiDispatcher,
    slot: Arc<InputSlot>,
}

impl InteropBridge {
    pub fn new(dispatcher: UiDispatcher, slot: Arc<InputSlot>) -> Self {
        Self { dispatcher, slot }
    }

    /// The output, input-request and status callbacks
    pub fn callbacks(&self) -> Callbacks {
        let output = {
            let dispatcher = self.dispatcher.clone();
            Arc::new(move |message: &str| {
                dispatcher.post(UiEvent::Output(message.to_string()));
            })
        };

        let input = {
            let dispatcher = self.dispatcher.clone();
            let slot = Arc::clone(&self.slot);
            Arc::new(move |prompt: &str| {
                debug!("Waiting for input: {}", prompt);
                let value = slot.request(|| {
                    dispatcher.post(UiEvent::AwaitingInput(prompt.to_string()));
                });
                match value {
                    Some(value) => Ok(value),
                    None => {
                        warn!("Input request abandoned: {}", prompt);
                        Err(HostError::InputClosed)
                    }
                }
            })
        };

        let status = {
            let dispatcher = self.dispatcher.clone();
            Arc::new(move |state: &str| {
                dispatcher.post(UiEvent::Status(StatusAction::from_wire(state)));
            })
        };

        Callbacks {
            output,
            input,
            status,
        }
    }

    /// The callback registered through `set_log_callback`
    pub fn log_callback(&self) -> MessageFn {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |message: &str| {
            dispatcher.post(UiEvent::Log(message.to_string()));
        })
    }

    /// Initialize the host, register callbacks and enter its loop.
    ///
    /// Returns only when the module's loop ends or fails.
    pub fn run<H: ScriptHost + ?Sized>(&self, host: &mut H) -> Result<(), HostError> {
        host.initialize()?;
        host.set_callbacks(self.callbacks())?;
        host.set_log_callback(self.log_callback())?;
        info!("Callbacks registered, entering module loop");
        host.run_loop()
    }

    /// Run the bridge on a dedicated background worker.
    ///
    /// Errors end the worker; they are logged here and returned through the
    /// join handle, but nothing is shown in the UI.
    pub fn spawn<H>(self, mut host: H) -> io::Result<JoinHandle<Result<(), HostError>>>
    where
        H: ScriptHost + 'static,
    {
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                info!("Interop bridge worker started");
                let result = self.run(&mut host);
                match &result {
                    Ok(()) => info!("Module loop returned, bridge worker exiting"),
                    Err(e) => error!("Bridge worker stopped: {}", e),
                }
                result
            })
    }
}
