use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::config::ServerConfig;
use common::server::Server;
use server::bootstrap;
use server::dispatcher::Dispatcher;
use server::response::SqlResponse;

/// Boots a full server on an ephemeral port over the given storage
/// directory.
pub async fn start_server(storage_dir: &Path) -> Dispatcher {
    start_server_with(storage_dir, |_| {}).await
}

pub async fn start_server_with<F>(storage_dir: &Path, tweak: F) -> Dispatcher
where
    F: FnOnce(&mut ServerConfig),
{
    let mut config = ServerConfig {
        port: 0,
        storage_directory: storage_dir.to_string_lossy().to_string(),
        shutdown_timeout_ms: 1_000,
        ..ServerConfig::default()
    };
    tweak(&mut config);

    let mut dispatcher = bootstrap::build_dispatcher(config).await.unwrap();
    dispatcher.start().await.unwrap();
    dispatcher
}

/// Frame-level client: u32 big-endian length + UTF-8 payload both ways.
pub struct TestClient {
    stream: TcpStream,
    pub greeting: String,
}

/// The dispatcher binds the wildcard address; clients dial loopback.
pub async fn connect_raw(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap()
}

impl TestClient {
    /// Connects and consumes the greeting frame.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut stream = connect_raw(addr).await;
        let greeting = read_frame(&mut stream).await.unwrap();
        assert!(greeting.contains("ready"));
        TestClient { stream, greeting }
    }

    pub async fn send(&mut self, sql: &str) -> SqlResponse {
        let bytes = sql.as_bytes();
        self.stream.write_u32(bytes.len() as u32).await.unwrap();
        self.stream.write_all(bytes).await.unwrap();
        let raw = read_frame(&mut self.stream).await.unwrap();
        serde_json::from_str(&raw).unwrap()
    }
}

pub async fn read_frame(stream: &mut TcpStream) -> std::io::Result<String> {
    let len = stream.read_u32().await?;
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8(buf).expect("response frames are UTF-8"))
}

/// Fresh scratch directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dbserver_test_{}", tag));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
