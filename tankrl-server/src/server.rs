//! WebSocket server feeding telemetry to the bridge.
use crate::{Envelope, ServerConfig, WsControlSink};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::{net::SocketAddr, sync::Arc};
use tankrl_core::{Bridge, EnvCodec};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, watch},
};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// WebSocket server connecting the game client to a [`Bridge`].
///
/// [`TankServer::bind`] installs a [`WsControlSink`] in the bridge, so
/// commands sent by the trainer reach the latest connected client.
pub struct TankServer<C: EnvCodec> {
    config: ServerConfig,
    listener: TcpListener,
    bridge: Arc<Bridge<C>>,
    sink: Arc<WsControlSink>,
}

impl<C: EnvCodec + 'static> TankServer<C> {
    /// Binds the listening socket and installs the control sink in the bridge.
    pub async fn bind(config: ServerConfig, bridge: Arc<Bridge<C>>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr())
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
        let sink = Arc::new(WsControlSink::new(config.control_event.clone()));
        bridge.set_control_sink(sink.clone());
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            bridge,
            sink,
        })
    }

    /// Address the server listens on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The control sink installed in the bridge.
    pub fn sink(&self) -> Arc<WsControlSink> {
        self.sink.clone()
    }

    /// Accepts clients until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Open sessions are closed on shutdown as well.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut n_sessions = 0u64;
        while !*shutdown.borrow() {
            tokio::select! {
                res = self.listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            warn!("Failed to accept a connection: {}", e);
                            continue;
                        }
                    };
                    n_sessions += 1;
                    let session = Session {
                        id: n_sessions,
                        peer,
                        telemetry_event: self.config.telemetry_event.clone(),
                        bridge: self.bridge.clone(),
                        sink: self.sink.clone(),
                    };
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        let id = session.id;
                        if let Err(e) = session.run(stream, shutdown).await {
                            warn!("Session {} closed with error: {:#}", id, e);
                        }
                    });
                }
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Server stopped");
        Ok(())
    }
}

struct Session<C: EnvCodec> {
    id: u64,
    peer: SocketAddr,
    telemetry_event: String,
    bridge: Arc<Bridge<C>>,
    sink: Arc<WsControlSink>,
}

impl<C: EnvCodec> Session<C> {
    async fn run(self, stream: TcpStream, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let ws = accept_async(stream).await?;
        let (mut writer, mut reader) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if writer.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = writer.close().await;
        });
        self.on_connect(tx.clone());

        let res = loop {
            tokio::select! {
                msg = reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.on_text(&text),
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(e.into()),
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break Ok(());
                    }
                }
            }
        };

        self.sink.unregister(self.id);
        drop(tx);
        let _ = writer_task.await;
        info!("Disconnected session {} ({})", self.id, self.peer);
        res
    }

    fn on_connect(&self, tx: mpsc::UnboundedSender<Message>) {
        info!("Connected session {} ({})", self.id, self.peer);
        self.sink.register(self.id, tx);
    }

    fn on_text(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Session {}: dropped a malformed message: {}", self.id, e);
                return;
            }
        };
        if envelope.event == self.telemetry_event {
            self.on_telemetry(envelope.data);
        } else {
            debug!("Session {}: ignored event {}", self.id, envelope.event);
        }
    }

    fn on_telemetry(&self, payload: serde_json::Value) {
        if let Err(e) = self.bridge.ingest(payload) {
            warn!("Session {}: dropped telemetry: {:#}", self.id, e);
        }
    }
}
