//! UI shell state
//!
//! Everything the window shows, kept apart from widget types. Only the UI
//! thread mutates it, by applying bridge events in arrival order.

use std::sync::Arc;
use std::time::Duration;

use shelves_python_bridge::{InputSlot, StatusAction, UiEvent};
use tracing::debug;

/// Marker for lines that came through the module's log callback
pub const LOG_PREFIX: &str = "[LOG] ";

/// Marker for prompts the module is blocked on
pub const INPUT_WAIT_PREFIX: &str = "[input wait] ";

/// Delay between spinner frames
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(400);

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

/// Append-only conversation text
#[derive(Debug, Default)]
pub struct ConversationLog {
    text: String,
}

impl ConversationLog {
    /// Append one entry followed by a line break
    pub fn append(&mut self, entry: &str) {
        self.text.push_str(entry);
        self.text.push('\n');
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Busy indicator
///
/// Each start bumps `generation`; ticks carrying an older generation belong
/// to a previous animation and are dropped.
#[derive(Debug, Default)]
pub struct Spinner {
    visible: bool,
    running: bool,
    frame: usize,
    generation: u64,
}

impl Spinner {
    /// Apply a status change. Returns the generation to animate when this
    /// call started the spinner.
    pub fn set(&mut self, action: StatusAction) -> Option<u64> {
        match action {
            StatusAction::Start if self.running => None,
            StatusAction::Start => {
                self.visible = true;
                self.running = true;
                self.frame = 0;
                self.generation += 1;
                Some(self.generation)
            }
            StatusAction::Stop => {
                self.visible = false;
                self.running = false;
                None
            }
        }
    }

    /// Advance one frame. Returns whether the animation should continue.
    pub fn tick(&mut self, generation: u64) -> bool {
        if !self.running || generation != self.generation {
            return false;
        }
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        true
    }

    pub fn glyph(&self) -> &'static str {
        SPINNER_FRAMES[self.frame]
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// What a batch of bridge events changed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Applied {
    /// At least one line was appended to the log
    pub log_grew: bool,
    /// Spinner generation to animate. Earlier starts in the same batch are
    /// already stale.
    pub animate: Option<u64>,
}

/// State behind the four widgets
#[derive(Debug)]
pub struct Shell {
    log: ConversationLog,
    spinner: Spinner,
    entry: String,
    awaiting: bool,
    slot: Arc<InputSlot>,
}

impl Shell {
    pub fn new(slot: Arc<InputSlot>) -> Self {
        Self {
            log: ConversationLog::default(),
            spinner: Spinner::default(),
            entry: String::new(),
            awaiting: false,
            slot,
        }
    }

    /// Apply one bridge event. Returns a spinner generation to animate.
    pub fn apply(&mut self, event: UiEvent) -> Option<u64> {
        match event {
            UiEvent::Output(message) => self.log.append(&message),
            UiEvent::Log(message) => self.log.append(&format!("{LOG_PREFIX}{message}")),
            UiEvent::AwaitingInput(prompt) => {
                self.log.append(&format!("{INPUT_WAIT_PREFIX}{prompt}"));
                self.awaiting = true;
            }
            UiEvent::Status(action) => return self.spinner.set(action),
        }
        None
    }

    /// Apply events in order
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = UiEvent>) -> Applied {
        let mut applied = Applied::default();
        for event in events {
            applied.log_grew |= event.appends_to_log();
            if let Some(generation) = self.apply(event) {
                applied.animate = Some(generation);
            }
        }
        applied
    }

    pub fn set_entry(&mut self, text: String) {
        self.entry = text;
    }

    /// Send-button activation: hand the entry text to a waiting request.
    ///
    /// A no-op unless the prompt is on screen. A request the worker has
    /// made but whose prompt is still queued behind earlier events is not
    /// answerable yet.
    pub fn send(&mut self) -> bool {
        if !self.awaiting {
            debug!("Send ignored: no prompt is shown");
            return false;
        }
        let delivered = self.slot.submit(&self.entry);
        if delivered {
            debug!("Delivered input ({} chars)", self.entry.chars().count());
            self.awaiting = false;
        }
        delivered
    }

    pub fn tick_spinner(&mut self, generation: u64) -> bool {
        self.spinner.tick(generation)
    }

    /// Abandon any pending request; later requests fail immediately.
    pub fn close_input(&mut self) {
        self.slot.close();
        self.awaiting = false;
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn spinner(&self) -> &Spinner {
        &self.spinner
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Whether a prompt is on screen and unanswered
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }
}
