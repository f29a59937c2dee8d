//! Line framing for the socket transport: one `{"event", "data"}` JSON object per line

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{ChannelError, ChannelEvent, Command};
use crate::state::StatusMessage;

pub const STATUS_UPDATE: &str = "statusUpdate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<Command> for Frame {
    fn from(command: Command) -> Self {
        let data = match command {
            Command::Start { seconds } => Some(json!(seconds)),
            Command::AddTime { delta } => Some(json!(delta)),
            Command::Pause | Command::Stop | Command::RequestStatus => None,
        };
        Self {
            event: command.event_name().to_string(),
            data,
        }
    }
}

/// Encode a command as a single line, newline included
pub fn encode(command: Command) -> Result<String, ChannelError> {
    let mut line = serde_json::to_string(&Frame::from(command))?;
    line.push('\n');
    Ok(line)
}

/// Decode one inbound line. Events the core does not consume yield `None`.
pub fn decode(line: &str) -> Result<Option<ChannelEvent>, ChannelError> {
    let frame: Frame = serde_json::from_str(line.trim())?;

    if frame.event != STATUS_UPDATE {
        debug!("Ignoring inbound event '{}'", frame.event);
        return Ok(None);
    }

    let data = frame.data.unwrap_or(Value::Null);
    Ok(Some(ChannelEvent::Status(StatusMessage::from_value(&data))))
}
