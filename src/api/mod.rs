pub mod hermes;
pub mod jupiter;
pub mod solana_rpc;

pub use hermes::{HermesClient, OraclePrice, SOL_USD_FEED_ID, SOL_USD_SYMBOL};
pub use jupiter::{JupiterClient, Quote};
pub use solana_rpc::{Cluster, SolanaRpcClient};

use reqwest::Client;
use std::time::Duration;

/// Upper bound on any single HTTP request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client settings for every API client
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client ({}), using defaults", e);
            Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_times_out_stalled_server() {
        // Accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let started = std::time::Instant::now();
        let result = http_client().get(format!("http://{}/", addr)).send().await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= HTTP_TIMEOUT);
        server.abort();
    }
}
