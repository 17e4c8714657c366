//! Control sink writing to the latest WebSocket session.
use crate::Envelope;
use anyhow::Result;
use log::{debug, info, warn};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tankrl_core::{ControlCommand, ControlSink};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

struct Session {
    id: u64,
    tx: UnboundedSender<Message>,
}

/// Sends control commands to the most recently connected client.
///
/// Commands emitted while no client is connected are dropped with a warning.
pub struct WsControlSink {
    control_event: String,
    session: Mutex<Option<Session>>,
}

impl WsControlSink {
    /// Constructs a sink emitting events named `control_event`.
    pub fn new(control_event: impl Into<String>) -> Self {
        Self {
            control_event: control_event.into(),
            session: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `id` the session receiving commands.
    pub(crate) fn register(&self, id: u64, tx: UnboundedSender<Message>) {
        let mut session = self.lock();
        if let Some(prev) = session.as_ref() {
            info!("Session {} replaces session {} for control", id, prev.id);
        }
        *session = Some(Session { id, tx });
    }

    /// Forgets `id` if it is still the session receiving commands.
    pub(crate) fn unregister(&self, id: u64) {
        let mut session = self.lock();
        if session.as_ref().map(|s| s.id) == Some(id) {
            *session = None;
        }
    }

    /// Id of the session receiving commands.
    pub fn session_id(&self) -> Option<u64> {
        self.lock().as_ref().map(|s| s.id)
    }
}

impl ControlSink for WsControlSink {
    fn emit_control(&self, command: &ControlCommand) -> Result<()> {
        let text = serde_json::to_string(&Envelope::control(&self.control_event, command)?)?;
        match self.lock().as_ref() {
            Some(session) => {
                if session.tx.send(Message::Text(text)).is_err() {
                    warn!("Session {} is closing, dropped {}", session.id, command);
                } else {
                    debug!("Sent {} to session {}", command, session.id);
                }
            }
            None => warn!("No client connected, dropped {}", command),
        }
        Ok(())
    }
}
