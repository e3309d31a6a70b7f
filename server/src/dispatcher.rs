use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use common::err::{DbError, DbResult};
use common::server::Server;

use crate::handler::{ConnectionHandler, SharedServices};
use crate::registry::ConnectionHandle;

/// Accept loop + admission control. One handler task per accepted
/// connection, executed on the runtime's worker pool; the pool size is
/// the configured `worker_pool_size` (set when the runtime is built).
pub struct Dispatcher {
    shared: Arc<SharedServices>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Binds the configured port immediately so a bind failure
    /// surfaces before any state is shared.
    pub async fn bind(shared: Arc<SharedServices>) -> DbResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", shared.config.port)).await?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Dispatcher {
            shared,
            listener: Some(listener),
            local_addr,
            shutdown_tx,
            accept_handle: None,
        })
    }

    /// The actual bound address; useful when the configured port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shared(&self) -> &Arc<SharedServices> {
        &self.shared
    }

    async fn accept_loop(
        listener: TcpListener,
        shared: Arc<SharedServices>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("accept loop stopping");
                    return;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => Self::admit(stream, peer_addr, &shared),
                        Err(e) => warn!("accept failed: {}", e),
                    }
                }
            }
        }
    }

    fn admit(stream: TcpStream, peer_addr: SocketAddr, shared: &Arc<SharedServices>) {
        let registry = &shared.registry;
        if registry.active_count() >= shared.config.max_connections {
            // admission control: closing the socket is the only signal
            warn!(
                "connection limit {} reached, refusing {}",
                shared.config.max_connections, peer_addr
            );
            drop(stream);
            return;
        }

        let id = registry.generate_connection_id();
        let handle = ConnectionHandle::new(id, peer_addr);
        let close_signal = handle.close_signal();
        registry.register(handle);
        info!("connection {} accepted from {}", id, peer_addr);

        let handler = ConnectionHandler::new(id, stream, close_signal, Arc::clone(shared));
        tokio::spawn(handler.run());
    }
}

#[async_trait]
impl Server for Dispatcher {
    async fn start(&mut self) -> Result<(), DbError> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| DbError::Internal("dispatcher already started".to_string()))?;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let shared = Arc::clone(&self.shared);
        self.accept_handle = Some(tokio::spawn(Self::accept_loop(
            listener, shared, shutdown_rx,
        )));
        Ok(())
    }

    async fn shutdown(&mut self, graceful: bool) -> Result<(), DbError> {
        // stop accepting first, then drain the live connections
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.await;
        }
        let timeout = if graceful {
            self.shared.config.shutdown_timeout_ms
        } else {
            0
        };
        self.shared.registry.close_all(timeout).await;

        if let Some(pool) = &self.shared.buffer_pool {
            let stats = pool.stats();
            info!(
                "buffer pool at shutdown: {} pages ({} dirty), hit rate {:.2}",
                stats.total_pages, stats.dirty_pages, stats.hit_rate
            );
        }
        info!("dispatcher stopped");
        Ok(())
    }
}
