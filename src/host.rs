//! A single Deluge daemon and its cached backlog.

use crate::error::Error;
use crate::infohash::InfoHash;
use crate::rpc::{HostAddress, RpcClient, RpcError};
use base64::Engine;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One connected daemon.
///
/// The hash listing is memoized: the first query issues the RPC, later ones
/// serve the cache, and a successful submission clears it so the next listing
/// reflects the new torrent. The connection itself is established by the
/// registry before the host is constructed.
pub struct TorrentHost {
    address: HostAddress,
    client: Box<dyn RpcClient>,
    cached_hashes: Option<HashSet<InfoHash>>,
}

impl TorrentHost {
    pub fn new(address: HostAddress, client: Box<dyn RpcClient>) -> Self {
        Self {
            address,
            client,
            cached_hashes: None,
        }
    }

    pub fn address(&self) -> &HostAddress {
        &self.address
    }

    /// The set of hashes this daemon currently holds.
    ///
    /// An `Err` means the backlog is *unknown* (the daemon did not answer),
    /// which callers must keep distinct from an empty backlog.
    pub async fn torrent_hashes(&mut self) -> Result<&HashSet<InfoHash>, RpcError> {
        if self.cached_hashes.is_none() {
            let listed = self.client.torrent_hashes().await?;
            let mut hashes = HashSet::with_capacity(listed.len());
            for raw in listed {
                match InfoHash::parse(&raw) {
                    Some(hash) => {
                        hashes.insert(hash);
                    }
                    None => warn!(
                        host = %self.address,
                        hash = raw.as_str(),
                        "ignoring malformed hash in listing"
                    ),
                }
            }
            debug!(host = %self.address, count = hashes.len(), "fetched torrent listing");
            self.cached_hashes = Some(hashes);
        }
        Ok(self.cached_hashes.get_or_insert_with(HashSet::new))
    }

    /// Backlog size, or `None` while the daemon is unreachable.
    pub async fn torrent_count(&mut self) -> Option<usize> {
        match self.torrent_hashes().await {
            Ok(hashes) => Some(hashes.len()),
            Err(err) => {
                warn!(host = %self.address, error = %err, "backlog unknown");
                None
            }
        }
    }

    /// Submit a torrent file to this daemon.
    ///
    /// Returns `Ok(false)` when the daemon is unreachable for this call — the
    /// host is merely offline right now, not misbehaving. A reported hash that
    /// disagrees with the locally computed one is [`Error::HashMismatch`];
    /// that submission must never pass as success.
    pub async fn add_torrent(&mut self, bytes: &[u8], filename: &str) -> Result<bool, Error> {
        let expected = InfoHash::of_torrent(bytes)?;
        let filedump = base64::engine::general_purpose::STANDARD.encode(bytes);
        let reported = match self.client.add_torrent_file(filename, &filedump).await {
            Ok(reported) => reported,
            Err(RpcError::Unreachable(reason)) => {
                warn!(
                    host = %self.address,
                    error = reason.as_str(),
                    "host offline, submission skipped"
                );
                return Ok(false);
            }
            Err(err) => {
                return Err(Error::Rpc {
                    host: self.address.to_string(),
                    source: err,
                });
            }
        };
        if reported.to_ascii_lowercase() != expected.as_str() {
            return Err(Error::HashMismatch { expected, reported });
        }
        // The next listing must see the new torrent.
        self.cached_hashes = None;
        debug!(host = %self.address, hash = %expected, torrent = filename, "torrent accepted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const TORRENT: &[u8] = b"d4:infod6:lengthi100e4:name1:aee";
    const TORRENT_HASH: &str = "3879bbe825b276e22a28d63835105e231ce5880a";

    #[derive(Default)]
    struct FakeDaemon {
        hashes: Mutex<Vec<String>>,
        report: Mutex<Option<String>>,
        offline: Mutex<bool>,
        list_calls: AtomicUsize,
        add_calls: AtomicUsize,
    }

    struct FakeClient(Arc<FakeDaemon>);

    #[async_trait]
    impl RpcClient for FakeClient {
        async fn torrent_hashes(&self) -> Result<Vec<String>, RpcError> {
            self.0.list_calls.fetch_add(1, Ordering::SeqCst);
            if *self.0.offline.lock().unwrap() {
                return Err(RpcError::Unreachable("connection reset".to_string()));
            }
            Ok(self.0.hashes.lock().unwrap().clone())
        }

        async fn add_torrent_file(
            &self,
            _filename: &str,
            _filedump: &str,
        ) -> Result<String, RpcError> {
            self.0.add_calls.fetch_add(1, Ordering::SeqCst);
            if *self.0.offline.lock().unwrap() {
                return Err(RpcError::Unreachable("connection refused".to_string()));
            }
            self.0
                .report
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| RpcError::Protocol("add rejected".to_string()))
        }
    }

    fn host_for(daemon: &Arc<FakeDaemon>) -> TorrentHost {
        TorrentHost::new(
            HostAddress {
                address: "tracker-a".to_string(),
                port: 8112,
                username: "deluge".to_string(),
                password: "secret".to_string(),
            },
            Box::new(FakeClient(Arc::clone(daemon))),
        )
    }

    fn hex_hash(n: usize) -> String {
        format!("{n:040x}")
    }

    #[test]
    fn test_address_display() {
        let address = HostAddress {
            address: "tracker-a".to_string(),
            port: 8112,
            username: "deluge".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(address.to_string(), "deluge@tracker-a:8112");
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let daemon = Arc::new(FakeDaemon::default());
        daemon.hashes.lock().unwrap().push(hex_hash(1));
        let mut host = host_for(&daemon);

        assert_eq!(host.torrent_hashes().await.unwrap().len(), 1);
        assert_eq!(host.torrent_count().await, Some(1));
        assert_eq!(host.torrent_count().await, Some(1));
        assert_eq!(daemon.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_listing_is_unknown_not_empty() {
        let daemon = Arc::new(FakeDaemon::default());
        *daemon.offline.lock().unwrap() = true;
        let mut host = host_for(&daemon);

        assert!(host.torrent_hashes().await.is_err());
        assert_eq!(host.torrent_count().await, None);
    }

    #[tokio::test]
    async fn test_add_invalidates_cache() {
        let daemon = Arc::new(FakeDaemon::default());
        *daemon.report.lock().unwrap() = Some(TORRENT_HASH.to_string());
        let mut host = host_for(&daemon);

        assert_eq!(host.torrent_count().await, Some(0));
        assert!(host.add_torrent(TORRENT, "a.torrent").await.unwrap());

        // Cache was cleared; the next count refetches and sees the new state.
        daemon.hashes.lock().unwrap().push(TORRENT_HASH.to_string());
        assert_eq!(host.torrent_count().await, Some(1));
        assert_eq!(daemon.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_add_hash_mismatch_is_fatal() {
        let daemon = Arc::new(FakeDaemon::default());
        *daemon.report.lock().unwrap() = Some(hex_hash(99));
        let mut host = host_for(&daemon);

        let result = host.add_torrent(TORRENT, "a.torrent").await;
        assert!(matches!(result, Err(Error::HashMismatch { .. })));
    }

    #[tokio::test]
    async fn test_add_uppercase_report_still_matches() {
        let daemon = Arc::new(FakeDaemon::default());
        *daemon.report.lock().unwrap() = Some(TORRENT_HASH.to_ascii_uppercase());
        let mut host = host_for(&daemon);

        assert!(host.add_torrent(TORRENT, "a.torrent").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_to_offline_host_returns_false() {
        let daemon = Arc::new(FakeDaemon::default());
        *daemon.offline.lock().unwrap() = true;
        let mut host = host_for(&daemon);

        assert!(!host.add_torrent(TORRENT, "a.torrent").await.unwrap());
        assert_eq!(daemon.add_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_protocol_failure_is_rpc_error() {
        let daemon = Arc::new(FakeDaemon::default());
        let mut host = host_for(&daemon);

        let result = host.add_torrent(TORRENT, "a.torrent").await;
        assert!(matches!(result, Err(Error::Rpc { .. })));
    }

    #[tokio::test]
    async fn test_malformed_listing_entries_are_dropped() {
        let daemon = Arc::new(FakeDaemon::default());
        {
            let mut hashes = daemon.hashes.lock().unwrap();
            hashes.push(hex_hash(1));
            hashes.push("not-a-hash".to_string());
        }
        let mut host = host_for(&daemon);

        assert_eq!(host.torrent_count().await, Some(1));
    }
}
