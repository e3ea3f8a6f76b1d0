//! The per-cycle host registry.
//!
//! Built fresh for every distribution cycle from Deluge's own hostlist file
//! (`hostlist.conf.1.2` in the config directory). The file is not one JSON
//! document but a stream of them concatenated back to back; only documents
//! carrying a top-level `"hosts"` key contribute entries. Hosts that fail to
//! connect are logged and dropped — one dead daemon never aborts a load.

use crate::error::Error;
use crate::host::TorrentHost;
use crate::infohash::InfoHash;
use crate::rpc::{Connector, HostAddress};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Hostlist file name used by Deluge 1.2+.
pub const HOSTLIST_FILENAME: &str = "hostlist.conf.1.2";

/// The connected daemons for one distribution cycle, plus the per-host
/// torrent ceiling.
pub struct HostRegistry {
    hosts: Vec<TorrentHost>,
    max_torrents: usize,
}

impl HostRegistry {
    pub fn new(hosts: Vec<TorrentHost>, max_torrents: usize) -> Self {
        Self {
            hosts,
            max_torrents,
        }
    }

    /// Parse the hostlist under `config_path` and connect to every entry
    /// whose address matches `host_filter` (searched, not anchored).
    ///
    /// A missing hostlist yields an empty registry. Unreachable hosts are
    /// dropped with a warning.
    pub async fn load(
        config_path: &Path,
        host_filter: &str,
        max_torrents: usize,
        connector: &dyn Connector,
    ) -> Result<Self, Error> {
        let filter = Regex::new(host_filter)?;
        let hostlist = config_path.join(HOSTLIST_FILENAME);
        let mut hosts = Vec::new();
        if hostlist.is_file() {
            let document = fs::read_to_string(&hostlist)?;
            for address in parse_hostlist(&document, &filter) {
                match connector.connect(&address).await {
                    Ok(client) => hosts.push(TorrentHost::new(address, client)),
                    Err(err) => {
                        warn!(host = %address, error = %err, "dropping unreachable host")
                    }
                }
            }
        } else {
            debug!(path = %hostlist.display(), "no hostlist found");
        }
        debug!(hosts = hosts.len(), "registry loaded");
        Ok(Self::new(hosts, max_torrents))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn max_torrents(&self) -> usize {
        self.max_torrents
    }

    pub fn hosts_mut(&mut self) -> &mut [TorrentHost] {
        &mut self.hosts
    }

    /// The union of every host's backlog.
    ///
    /// The same hash on two hosts is [`Error::DuplicateTorrent`] — the
    /// no-overlap invariant is broken and an operator has to untangle it. A
    /// host whose listing call fails right now is skipped for this cycle.
    pub async fn all_hashes(&mut self) -> Result<HashSet<InfoHash>, Error> {
        let mut union = HashSet::new();
        for host in &mut self.hosts {
            let label = host.address().to_string();
            let hashes = match host.torrent_hashes().await {
                Ok(hashes) => hashes,
                Err(_) => {
                    warn!(host = label.as_str(), "skipping unreachable host in aggregate listing");
                    continue;
                }
            };
            for hash in hashes {
                if !union.insert(hash.clone()) {
                    return Err(Error::DuplicateTorrent {
                        host: label,
                        hash: hash.clone(),
                    });
                }
            }
        }
        Ok(union)
    }

    /// Total number of torrents across all reachable hosts.
    pub async fn total_count(&mut self) -> Result<usize, Error> {
        Ok(self.all_hashes().await?.len())
    }
}

/// Extract matching host entries from a concatenated-JSON hostlist.
///
/// Each contributing document is `{"hosts": [[id, address, port, username,
/// password], ...]}`; documents without a `"hosts"` key are ignored, as are
/// entries that do not fit the tuple shape. A malformed document ends the
/// scan — everything decoded before it still counts.
pub fn parse_hostlist(document: &str, filter: &Regex) -> Vec<HostAddress> {
    let mut entries = Vec::new();
    let stream = serde_json::Deserializer::from_str(document).into_iter::<Value>();
    for doc in stream {
        let doc = match doc {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, "stopping hostlist scan at malformed document");
                break;
            }
        };
        let Some(raw_hosts) = doc.get("hosts").and_then(Value::as_array) else {
            continue;
        };
        for raw in raw_hosts {
            match parse_entry(raw) {
                Some(address) if filter.is_match(&address.address) => {
                    info!(host = %address, "found host");
                    entries.push(address);
                }
                Some(address) => debug!(host = %address, "host filtered out"),
                None => warn!(entry = %raw, "skipping malformed hostlist entry"),
            }
        }
    }
    entries
}

/// One hostlist entry: `[id, address, port, username, password]`. The leading
/// id is Deluge's own and is ignored here.
fn parse_entry(raw: &Value) -> Option<HostAddress> {
    let entry = raw.as_array()?;
    if entry.len() < 5 {
        return None;
    }
    Some(HostAddress {
        address: entry[1].as_str()?.to_string(),
        port: u16::try_from(entry[2].as_u64()?).ok()?,
        username: entry[3].as_str()?.to_string(),
        password: entry[4].as_str()?.to_string(),
    })
}
