//! Messages exchanged with the game client.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tankrl_core::ControlCommand;

/// Envelope of every message on the wire.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Envelope {
    /// Name of the event.
    pub event: String,

    /// Payload of the event.
    #[serde(default)]
    pub data: Value,
}

/// Payload of a control event.
///
/// The game client reads every field as a string.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ControlData {
    /// Command code, `0` to move and `1` to fire.
    pub action: String,

    /// Target column.
    pub pos_x: String,

    /// Target row.
    pub pos_y: String,
}

impl From<&ControlCommand> for ControlData {
    fn from(c: &ControlCommand) -> Self {
        Self {
            action: c.command.code().to_string(),
            pos_x: c.pos.0.to_string(),
            pos_y: c.pos.1.to_string(),
        }
    }
}

impl Envelope {
    /// Wraps a control command into a control event.
    pub fn control(event: &str, command: &ControlCommand) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(ControlData::from(command))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tankrl_core::Command;

    #[test]
    fn test_control_envelope() -> serde_json::Result<()> {
        let command = ControlCommand::new(Command::Fire, (3, -7));
        let envelope = Envelope::control("control", &command)?;
        assert_eq!(
            serde_json::to_value(&envelope)?,
            json!({"event": "control", "data": {"action": "1", "pos_x": "3", "pos_y": "-7"}})
        );

        let command = ControlCommand::new(Command::MoveTo, (0, 12));
        let data = ControlData::from(&command);
        assert_eq!(data.action, "0");
        assert_eq!(data.pos_y, "12");
        Ok(())
    }

    #[test]
    fn test_envelope_without_data() -> serde_json::Result<()> {
        let envelope: Envelope = serde_json::from_str(r#"{"event": "ping"}"#)?;
        assert_eq!(envelope.event, "ping");
        assert!(envelope.data.is_null());
        Ok(())
    }
}
