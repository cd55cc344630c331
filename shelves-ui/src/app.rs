//! Main COSMIC Application
//!
//! Implements the cosmic::Application trait for the Shelves harness. The
//! bridge worker posts events into a channel; `update` drains it in arrival
//! order so every widget mutation happens on the UI thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use cosmic::app::{Core, Task};
use cosmic::iced::widget::scrollable::{self, RelativeOffset};
use cosmic::iced::Length;
use cosmic::widget::{self, container};
use cosmic::{Application, Element};
use shelves_python_bridge::{
    HostError, InputSlot, InteropBridge, ProcessHost, ScriptHost, UiEvent, UiEvents,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::{HarnessConfig, HostKind};
use crate::shell::{Shell, SPINNER_INTERVAL};
use crate::widgets::{self as harness_widgets, LogViewer};

/// Application ID following reverse-DNS convention
const APP_ID: &str = "io.github.shelves.Harness";

const OUTPUT_HEADING: &str = "Output:";
const ENTRY_PLACEHOLDER: &str = "Type here...";
const ANSWER_PLACEHOLDER: &str = "Type your answer and press Send";
const SEND_LABEL: &str = "Send";

/// Application state
pub struct App {
    /// COSMIC runtime core
    core: Core,
    /// Log, entry text and spinner
    shell: Shell,
    /// Receiving end of the bridge dispatch channel
    events: EventStream,
    /// Conversation log scrollable, kept at the newest entry
    log_scroll: widget::Id,
    /// Background worker running the module loop
    worker: Option<JoinHandle<Result<(), HostError>>>,
}

/// Shared handle so the receiver can travel inside tasks
#[derive(Debug, Clone)]
pub struct EventStream(Arc<Mutex<UiEvents>>);

/// Application messages
#[derive(Debug, Clone)]
pub enum Message {
    // User actions
    EntryChanged(String),
    Send,

    // Bridge events; `None` once the worker has dropped its dispatcher
    Bridge(Option<UiEvent>),

    // Spinner animation frame for the given generation
    SpinnerTick(u64),

    // System
    CloseRequested,
}

/// Application startup flags
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub config: HarnessConfig,
}

impl Application for App {
    type Executor = cosmic::executor::Default;
    type Flags = Flags;
    type Message = Message;

    const APP_ID: &'static str = APP_ID;

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, flags: Self::Flags) -> (Self, Task<Self::Message>) {
        let slot = Arc::new(InputSlot::new());
        let (dispatcher, events) = shelves_python_bridge::channel();

        // Start the bridge in background
        let bridge = InteropBridge::new(dispatcher, Arc::clone(&slot));
        let worker = match bridge.spawn(create_host(&flags.config)) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start bridge worker: {}", e);
                None
            }
        };

        let events = EventStream(Arc::new(Mutex::new(events)));
        let app = Self {
            core,
            shell: Shell::new(slot),
            events: events.clone(),
            log_scroll: widget::Id::unique(),
            worker,
        };

        (app, next_event(events))
    }

    fn header_center(&self) -> Vec<Element<'_, Self::Message>> {
        vec![widget::text("S.H.E.L.V.E.S. Harness").size(16).into()]
    }

    fn view(&self) -> Element<'_, Self::Message> {
        let output = LogViewer::new(self.shell.log(), self.log_scroll.clone()).view();

        let placeholder = if self.shell.is_awaiting() {
            ANSWER_PLACEHOLDER
        } else {
            ENTRY_PLACEHOLDER
        };
        let entry = widget::text_input(placeholder, self.shell.entry())
            .on_input(Message::EntryChanged)
            .width(Length::Fill);

        let send = widget::button::suggested(SEND_LABEL).on_press(Message::Send);

        let mut content = widget::column()
            .push(widget::text::heading(OUTPUT_HEADING))
            .push(output)
            .push(entry)
            .push(send)
            .spacing(8);

        if self.shell.spinner().is_visible() {
            content = content.push(harness_widgets::spinner::view(self.shell.spinner()));
        }

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(16)
            .into()
    }

    fn update(&mut self, message: Self::Message) -> Task<Self::Message> {
        match message {
            Message::EntryChanged(text) => {
                self.shell.set_entry(text);
            }

            Message::Send => {
                self.shell.send();
            }

            Message::Bridge(Some(event)) => {
                // The pump task has released the receiver; take whatever
                // else is already queued in the same update
                let mut batch = vec![event];
                if let Ok(mut events) = self.events.0.try_lock() {
                    batch.extend(events.drain());
                }

                let applied = self.shell.apply_all(batch);
                let mut tasks = vec![next_event(self.events.clone())];
                if let Some(generation) = applied.animate {
                    tasks.push(spinner_tick(generation));
                }
                if applied.log_grew {
                    tasks.push(scrollable::snap_to(
                        self.log_scroll.clone(),
                        RelativeOffset::END,
                    ));
                }
                return Task::batch(tasks);
            }

            Message::Bridge(None) => {
                info!("Bridge channel closed; no further updates");
                self.reap_worker();
            }

            Message::SpinnerTick(generation) => {
                if self.shell.tick_spinner(generation) {
                    return spinner_tick(generation);
                }
            }

            Message::CloseRequested => {
                debug!("Window closing, abandoning pending input");
                self.shell.close_input();
            }
        }

        Task::none()
    }

    fn on_close_requested(&self, _id: cosmic::iced::window::Id) -> Option<Message> {
        Some(Message::CloseRequested)
    }
}

impl App {
    /// Collect the worker's result once it has dropped its dispatcher
    fn reap_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.join() {
            Ok(Ok(())) => info!("Bridge worker finished"),
            // Already logged by the worker
            Ok(Err(e)) => debug!("Bridge worker ended with error: {}", e),
            Err(_) => error!("Bridge worker panicked"),
        }
    }
}

/// Build the configured script host
fn create_host(config: &HarnessConfig) -> Box<dyn ScriptHost> {
    info!(
        "Hosting {} from {}",
        config.module.qualified_name(),
        config.module.search_path.display()
    );
    match config.host {
        HostKind::Process => Box::new(ProcessHost::python(&config.python, &config.module)),
        #[cfg(feature = "embedded")]
        HostKind::Embedded => Box::new(shelves_python_bridge::EmbeddedHost::new(
            config.module.clone(),
        )),
        #[cfg(not(feature = "embedded"))]
        HostKind::Embedded => {
            tracing::warn!("Embedded host requested but this build lacks the `embedded` feature; using a child interpreter");
            Box::new(ProcessHost::python(&config.python, &config.module))
        }
    }
}

/// Wait for the next bridge event
fn next_event(stream: EventStream) -> Task<Message> {
    Task::perform(
        async move {
            let mut events = stream.0.lock().await;
            events.next().await
        },
        |event| cosmic::Action::App(Message::Bridge(event)),
    )
}

/// Schedule the next spinner frame
fn spinner_tick(generation: u64) -> Task<Message> {
    Task::perform(tokio::time::sleep(SPINNER_INTERVAL), move |_| {
        cosmic::Action::App(Message::SpinnerTick(generation))
    })
}
