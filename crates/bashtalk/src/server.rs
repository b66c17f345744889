//! `ChatServer` builder and accept loop (the listener).
//!
//! This is the entry point for running a BashTalk server. It ties
//! together all the layers: transport → protocol → session → cache.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bashtalk_cache::MessageCache;
use bashtalk_protocol::reserved;
use bashtalk_session::{AuthGate, Registry};
use bashtalk_transport::{Connection, TcpLineConnection, TcpLineTransport, Transport};
use tokio::sync::{Mutex, Semaphore};

use crate::config::{ConfigError, ServerConfig};
use crate::handler::handle_connection;
use crate::BashTalkError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
///
/// Lock order: `cache` before `registry`. Paths that need both (plain
/// chat, join) take them in that order.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) cache: Mutex<MessageCache>,
    pub(crate) auth: AuthGate,
    pub(crate) password_timeout: Duration,
}

/// Builder for configuring and starting a chat server.
///
/// # Example
///
/// ```rust,no_run
/// use bashtalk::prelude::*;
///
/// # async fn start() -> Result<(), BashTalkError> {
/// let server = ChatServer::builder()
///     .bind("127.0.0.1:9898")
///     .max_clients(10)
///     .build(AuthGate::from_secret("letmein"))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChatServerBuilder {
    bind_addr: String,
    max_clients: usize,
    max_cache_size: usize,
    password_timeout: Duration,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates a builder from a loaded configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            max_clients: config.max_clients,
            max_cache_size: config.max_cache_size,
            password_timeout: config.password_timeout(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the connection limit (pending handshakes included).
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Sets how many chat lines are kept for replay.
    pub fn max_cache_size(mut self, max: usize) -> Self {
        self.max_cache_size = max;
        self
    }

    /// Sets how long a password challenge waits for its reply.
    pub fn password_timeout(mut self, timeout: Duration) -> Self {
        self.password_timeout = timeout;
        self
    }

    /// Binds the listener and returns a server ready to run.
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] for a zero client limit or a zero
    /// password timeout; a transport error if binding fails.
    pub async fn build(self, auth: AuthGate) -> Result<ChatServer, BashTalkError> {
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_clients".into(),
                value: "0".into(),
            }
            .into());
        }
        if self.password_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "password_timeout".into(),
                value: "0".into(),
            }
            .into());
        }

        let transport = TcpLineTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(Registry::new(self.max_clients)),
            cache: Mutex::new(MessageCache::new(self.max_cache_size)),
            auth,
            password_timeout: self.password_timeout,
        });

        Ok(ChatServer {
            transport,
            state,
            admission: Arc::new(Semaphore::new(self.max_clients)),
        })
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound chat server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct ChatServer {
    transport: TcpLineTransport,
    state: Arc<ServerState>,
    /// One permit per admitted connection, held until its task ends.
    admission: Arc<Semaphore>,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs until Ctrl-C, then broadcasts the shutdown line.
    pub async fn run(self) -> Result<(), BashTalkError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each admitted connection gets its own task. Accept errors and
    /// handler errors are logged; neither stops the loop. On shutdown
    /// every registered session is sent `"shutdown"` and the listening
    /// socket is released. Handlers still running are not awaited.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), BashTalkError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "BashTalk server running");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(conn) => self.admit(conn),
                Err(e) => tracing::error!(error = %e, "accept failed"),
            }
        }

        let delivered = self.state.registry.lock().await.broadcast(reserved::SHUTDOWN);
        tracing::info!(delivered, "shutdown broadcast sent");
        Ok(())
    }

    /// Spawns a session for `conn`, or turns it away if the server is full.
    ///
    /// Taking the permit here, in the accept loop, makes the capacity
    /// check and the spawn a single step.
    fn admit(&self, conn: TcpLineConnection) {
        match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => {
                let state = Arc::clone(&self.state);
                tokio::spawn(async move {
                    let _permit = permit;
                    let conn_id = conn.id();
                    if let Err(e) = handle_connection(conn, state).await {
                        tracing::debug!(%conn_id, error = %e, "connection ended with error");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(addr = %conn.peer_addr(), "rejecting connection: server full");
                // Off the accept loop so a slow peer can't stall it.
                tokio::spawn(async move {
                    if let Err(e) = conn.send(reserved::MAX_CLIENTS_REACHED).await {
                        tracing::debug!(error = %e, "capacity notice not delivered");
                    }
                    if let Err(e) = conn.close().await {
                        tracing::debug!(error = %e, "close after capacity notice failed");
                    }
                });
            }
        }
    }
}
