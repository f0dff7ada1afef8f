//! Network and runtime primitives
//!
//! Thin layer over tokio used by the connection manager and the scheduler,
//! kept in one place so timeouts and deadline sleeps share a single idiom.

use std::future::Future;

pub use tokio::net::{TcpListener, TcpStream};

/// Runtime abstraction for common operations
pub struct Runtime;

impl Runtime {
    /// Run a future with a timeout
    ///
    /// # Errors
    ///
    /// Returns `TimeoutError` if the future does not complete within the
    /// specified duration.
    pub async fn timeout<F, T>(duration: std::time::Duration, future: F) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(duration, future)
            .await
            .map_err(|_| TimeoutError)
    }
}

/// Timeout error
#[derive(Debug, Clone, Copy)]
pub struct TimeoutError;

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// TCP listener helper
///
/// # Errors
///
/// Returns the underlying I/O error if the bind fails.
pub async fn bind_listener(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port)).await
}

/// Spawn a task
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future)
}
