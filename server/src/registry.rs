use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::warn;

/// Shared view of one live connection: enough to observe it and ask
/// its handler to close.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: u64,
    pub peer_addr: SocketAddr,
    close_signal: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        ConnectionHandle {
            id,
            peer_addr,
            close_signal: Arc::new(Notify::new()),
        }
    }

    pub fn close_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.close_signal)
    }

    /// Wakes the handler out of its blocking read so it cleans up.
    /// The permit is stored, so a handler between reads still sees it.
    pub fn request_close(&self) {
        self.close_signal.notify_one();
    }
}

/// Active-connection map plus the id source. Ids are strictly
/// increasing and never reused within a process lifetime, no matter
/// how many connections unregister in between.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: DashMap<u64, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
        }
    }

    pub fn generate_connection_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn register(&self, handle: ConnectionHandle) {
        self.connections.insert(handle.id, handle);
    }

    pub fn unregister(&self, id: u64) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn get(&self, id: u64) -> Option<ConnectionHandle> {
        self.connections.get(&id).map(|h| h.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.connections.len()
    }

    pub fn get_all_connections(&self) -> Vec<ConnectionHandle> {
        self.connections.iter().map(|h| h.value().clone()).collect()
    }

    /// Asks every handler to close, polls in 100 ms steps until the
    /// map drains or the timeout elapses, then force-clears stragglers.
    pub async fn close_all(&self, graceful_timeout_ms: u64) {
        for handle in self.connections.iter() {
            handle.request_close();
        }
        let deadline = Instant::now() + Duration::from_millis(graceful_timeout_ms);
        while self.active_count() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let stragglers = self.active_count();
        if stragglers > 0 {
            warn!(
                "force-clearing {} connections after the grace period",
                stragglers
            );
            self.connections.clear();
        }
    }
}
