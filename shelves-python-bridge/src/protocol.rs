//! Line-delimited JSON messages exchanged with the host process

use serde::{Deserialize, Serialize};

use crate::HostError;

/// Host process → harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Module imported and `initialize()` returned
    Ready,
    Output { message: String },
    Input { prompt: String },
    Status { state: String },
    Log { message: String },
    /// Uncaught exception in the module, with its traceback
    Error { message: String },
}

/// Harness → host process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Enter `run_loop()`
    Run,
    InputReply { value: String },
}

/// Parse one line from the host. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<HostMessage>, HostError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Serialize a command as a single newline-terminated line.
pub fn encode_command(command: &HostCommand) -> Result<String, HostError> {
    let mut line = serde_json::to_string(command)?;
    line.push('\n');
    Ok(line)
}
