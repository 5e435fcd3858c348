//! Network availability checks for URL entries.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Online when a TCP connection to a well-known host succeeds in time.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    target: String,
    timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

impl Default for TcpConnectivity {
    fn default() -> Self {
        Self::new("1.1.1.1:53", Duration::from_secs(2))
    }
}

#[async_trait]
impl Connectivity for TcpConnectivity {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(target = %self.target, error = %e, "Connectivity check failed");
                false
            }
            Err(_) => {
                tracing::debug!(target = %self.target, "Connectivity check timed out");
                false
            }
        }
    }
}
