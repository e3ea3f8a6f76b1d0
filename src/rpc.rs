//! The daemon RPC seam.
//!
//! The distributor only ever needs two calls against a Deluge daemon: list
//! the hashes it currently holds, and hand it a named torrent file. Those two
//! calls are the [`RpcClient`] trait; [`Connector`] produces connected
//! clients. The shipped transport speaks the Deluge web JSON-RPC
//! (`POST /json` with `{"method", "params", "id"}` and a cookie session), but
//! everything above this module is written against the traits, which is also
//! how the tests stand up fake daemons.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Default per-call timeout for the HTTP transport.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RpcError {
    /// The daemon could not be reached: timeout, connection refused, reset,
    /// broken pipe. Recoverable by skipping the host for this cycle.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// The daemon answered, but with an error or an unexpected payload.
    #[error("protocol failure: {0}")]
    Protocol(String),
}

/// One entry from the hostlist: where a daemon lives and how to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.address, self.port)
    }
}

/// The two daemon calls the distributor relies on.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Hashes of every torrent the daemon currently holds.
    async fn torrent_hashes(&self) -> Result<Vec<String>, RpcError>;

    /// Submit a base64-encoded torrent file; returns the hash the daemon
    /// reports for it.
    async fn add_torrent_file(&self, filename: &str, filedump: &str) -> Result<String, RpcError>;
}

/// Produces connected [`RpcClient`]s. The registry drops any host whose
/// connect fails; it never retains one in a failed state.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &HostAddress) -> Result<Box<dyn RpcClient>, RpcError>;
}

/// Connects to daemons over the Deluge web JSON-RPC.
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, host: &HostAddress) -> Result<Box<dyn RpcClient>, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| RpcError::Unreachable(err.to_string()))?;
        let rpc = HttpRpcClient::new(
            format!("http://{}:{}/json", host.address, host.port),
            client,
        );
        let session = rpc.call("auth.login", json!([host.password])).await?;
        if session != Value::Bool(true) {
            return Err(RpcError::Protocol(format!("login rejected for {host}")));
        }
        Ok(Box::new(rpc))
    }
}

/// A logged-in Deluge web JSON-RPC session.
pub struct HttpRpcClient {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    fn new(endpoint: String, client: reqwest::Client) -> Self {
        Self {
            endpoint,
            client,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "method": method, "params": params, "id": id }))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(RpcError::Protocol(format!("HTTP {}", response.status())));
        }
        let body: Value = response.json().await.map_err(transport_error)?;
        if let Some(error) = body.get("error").filter(|error| !error.is_null()) {
            return Err(RpcError::Protocol(error.to_string()));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn transport_error(err: reqwest::Error) -> RpcError {
    if err.is_decode() {
        RpcError::Protocol(err.to_string())
    } else {
        RpcError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn torrent_hashes(&self) -> Result<Vec<String>, RpcError> {
        // Status of every torrent with an empty field list; only the keys
        // (hashes) matter.
        let result = self
            .call("core.get_torrents_status", json!([{}, []]))
            .await?;
        let Value::Object(torrents) = result else {
            return Err(RpcError::Protocol(format!(
                "unexpected torrent listing: {result}"
            )));
        };
        Ok(torrents.keys().cloned().collect())
    }

    async fn add_torrent_file(&self, filename: &str, filedump: &str) -> Result<String, RpcError> {
        let result = self
            .call("core.add_torrent_file", json!([filename, filedump, {}]))
            .await?;
        match result {
            Value::String(hash) => Ok(hash),
            other => Err(RpcError::Protocol(format!(
                "daemon returned no hash for {filename}: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> HttpRpcClient {
        HttpRpcClient::new(server.url("/json"), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_torrent_hashes_returns_listing_keys() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body_partial(r#"{"method": "core.get_torrents_status"}"#);
            then.status(200)
                .json_body(json!({ "result": { "aa11": {}, "bb22": {} }, "error": null, "id": 1 }));
        });

        let mut hashes = client_for(&server).torrent_hashes().await.unwrap();
        mock.assert();
        hashes.sort();
        assert_eq!(hashes, vec!["aa11".to_string(), "bb22".to_string()]);
    }

    #[tokio::test]
    async fn test_add_torrent_file_returns_reported_hash() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body_partial(r#"{"method": "core.add_torrent_file"}"#);
            then.status(200)
                .json_body(json!({ "result": "deadbeef", "error": null, "id": 1 }));
        });

        let hash = client_for(&server)
            .add_torrent_file("a.torrent", "ZHVtcA==")
            .await
            .unwrap();
        assert_eq!(hash, "deadbeef");
    }

    #[tokio::test]
    async fn test_error_payload_is_protocol_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/json");
            then.status(200).json_body(
                json!({ "result": null, "error": { "message": "not authenticated" }, "id": 1 }),
            );
        });

        let result = client_for(&server).torrent_hashes().await;
        assert!(matches!(result, Err(RpcError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Nothing listens on this address.
        let rpc = HttpRpcClient::new(
            "http://127.0.0.1:1/json".to_string(),
            reqwest::Client::new(),
        );
        let result = rpc.torrent_hashes().await;
        assert!(matches!(result, Err(RpcError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_failed_login() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body_partial(r#"{"method": "auth.login"}"#);
            then.status(200)
                .json_body(json!({ "result": false, "error": null, "id": 1 }));
        });

        let host = HostAddress {
            address: server.host(),
            port: server.port(),
            username: "deluge".to_string(),
            password: "wrong".to_string(),
        };
        let result = HttpConnector::default().connect(&host).await;
        assert!(matches!(result, Err(RpcError::Protocol(_))));
    }
}
