use crate::err::DbError;

/// Server have start / shutdown functions
#[async_trait::async_trait]
pub trait Server: Send {
    async fn start(&mut self) -> Result<(), DbError>;

    /// `graceful` waits for in-flight work before tearing state down.
    async fn shutdown(&mut self, graceful: bool) -> Result<(), DbError>;
}
