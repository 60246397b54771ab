//! WebSocket Game Server
//!
//! Accepts WebSocket connections and runs the match task. Connection tasks
//! decode frames and forward them to the match task over an mpsc channel;
//! the match task owns the `MatchSession` and drives its timers. Outgoing
//! messages fan out through the session's broadcast channel.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior, Sleep};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::game::session::SessionTransition;
use crate::world::schema::MapError;

use super::protocol::{decode_controller, ClientMessage};
use super::session::{ConnectionId, Envelope, MatchSession, SessionError};

/// Outgoing messages buffered per connection before it lags.
const OUTBOX_CAPACITY: usize = 1024;

/// Commands queued for the match task.
const COMMAND_CAPACITY: usize = 1024;

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid map: {0}")]
    Map(#[from] MapError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Work for the match task.
#[derive(Debug)]
enum MatchCommand {
    Connect(ConnectionId),
    Message(ConnectionId, ClientMessage),
    Disconnect(ConnectionId),
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    shutdown_tx: broadcast::Sender<()>,
    connections: Arc<AtomicUsize>,
    next_connection: Arc<AtomicU64>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            shutdown_tx,
            connections: Arc::new(AtomicUsize::new(0)),
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GameServerError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Bind and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Build the match and serve connections from `listener` until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        self.config.level.validate()?;
        let layout = self.config.load_layout()?;
        let seed = self.config.resolve_seed();

        let (outbox, _) = broadcast::channel(OUTBOX_CAPACITY);
        let session = MatchSession::new(&self.config, layout, seed, outbox.clone())?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let match_handle = tokio::spawn(run_match(
            session,
            command_rx,
            self.config.clone(),
            self.shutdown_tx.subscribe(),
        ));

        info!(addr = %listener.local_addr()?, seed, "game server listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
                                warn!(%addr, "connection limit reached, rejecting");
                                continue;
                            }

                            let connection = self.next_connection.fetch_add(1, Ordering::SeqCst);
                            info!(%addr, connection, "new connection");
                            self.handle_connection(stream, connection, &outbox, &command_tx);
                        }
                        Err(e) => {
                            error!(error = %e, "accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        if let Err(e) = match_handle.await {
            error!(error = %e, "match task failed");
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(
        &self,
        stream: TcpStream,
        connection: ConnectionId,
        outbox: &broadcast::Sender<Envelope>,
        commands: &mpsc::Sender<MatchCommand>,
    ) {
        let connections = self.connections.clone();
        let commands = commands.clone();
        let mut outgoing = outbox.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!(connection, error = %e, "WebSocket handshake failed");
                    connections.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();

            if commands.send(MatchCommand::Connect(connection)).await.is_err() {
                connections.fetch_sub(1, Ordering::SeqCst);
                return;
            }

            // Forward envelopes for this connection to the socket
            let sender_task = tokio::spawn(async move {
                loop {
                    match outgoing.recv().await {
                        Ok(envelope) if envelope.is_for(connection) => {
                            let text = match envelope.message.to_json() {
                                Ok(t) => t,
                                Err(e) => {
                                    error!(error = %e, "failed to serialize message");
                                    continue;
                                }
                            };
                            if ws_sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(connection, skipped, "client lagging, messages dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        let command = match msg {
                            Some(Ok(Message::Text(text))) => match ClientMessage::from_json(&text) {
                                Ok(m) => MatchCommand::Message(connection, m),
                                Err(e) => {
                                    debug!(connection, error = %e, "ignoring malformed message");
                                    continue;
                                }
                            },
                            Some(Ok(Message::Binary(data))) => match decode_controller(&data) {
                                Ok(controller) => MatchCommand::Message(
                                    connection,
                                    ClientMessage::UpdateActorController(controller),
                                ),
                                Err(e) => {
                                    debug!(connection, error = %e, "ignoring malformed binary frame");
                                    continue;
                                }
                            },
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(connection, "client disconnected");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!(connection, error = %e, "WebSocket error");
                                break;
                            }
                            _ => continue,
                        };
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            let _ = commands.send(MatchCommand::Disconnect(connection)).await;
            connections.fetch_sub(1, Ordering::SeqCst);
            info!(connection, "connection closed");
        });
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Sender that triggers shutdown, for signal handlers.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

// =============================================================================
// MATCH TASK
// =============================================================================

/// Drive one match: tick timer, session poll, restart delay and commands.
#[instrument(skip_all)]
async fn run_match(
    mut session: MatchSession,
    mut commands: mpsc::Receiver<MatchCommand>,
    config: ServerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let started = Instant::now();

    let mut tick_interval = interval(Duration::from_millis(config.tick_ms));
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll_interval = interval(Duration::from_millis(config.session_poll_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut restart: Option<Pin<Box<Sleep>>> = None;

    session.start();

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                session.tick();
            }
            _ = poll_interval.tick() => {
                if let Some(SessionTransition::Finished { win_team }) = session.poll_session() {
                    info!(%win_team, delay_ms = config.restart_delay_ms, "round over, restart scheduled");
                    restart = Some(Box::pin(sleep(Duration::from_millis(config.restart_delay_ms))));
                }
            }
            _ = wait_restart(&mut restart) => {
                restart = None;
                if let Err(e) = session.restart() {
                    error!(error = %e, "restart failed, stopping match");
                    break;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let now_ms = started.elapsed().as_millis() as u64;
                match command {
                    MatchCommand::Connect(connection) => session.connect(connection),
                    MatchCommand::Message(connection, message) => {
                        session.handle_message(connection, message, now_ms);
                    }
                    MatchCommand::Disconnect(connection) => {
                        session.disconnect(connection);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    session.stop();
    info!(round = session.round(), "match stopped");
}

async fn wait_restart(restart: &mut Option<Pin<Box<Sleep>>>) {
    match restart {
        Some(delay) => delay.await,
        None => std::future::pending().await,
    }
}
