//! Torrent placement.
//!
//! One torrent goes to exactly one host: the least-loaded one, with ties
//! broken by hostlist order so placement is deterministic. Before any host is
//! even considered the hash is checked against every backlog in the registry,
//! so a torrent that is already seeded anywhere is never submitted twice.

use crate::error::Error;
use crate::infohash::InfoHash;
use crate::registry::HostRegistry;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// What happened to one torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Placed on a host.
    Added { host: String, hash: InfoHash },
    /// Some host already holds this hash; nothing was submitted.
    AlreadyPresent { hash: InfoHash },
    /// The registry has no usable hosts.
    NoHosts,
    /// The least-loaded host is at the ceiling, so every host is.
    AllFull,
    /// The chosen host went offline between selection and submission; worth
    /// retrying on a later cycle, not a capacity problem.
    HostOffline { host: String },
}

/// Distribute the torrent file at `path` to the best host in the registry.
pub async fn add_torrent(registry: &mut HostRegistry, path: &Path) -> Result<AddOutcome, Error> {
    let bytes = fs::read(path)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed.torrent".to_string());
    add_torrent_bytes(registry, &bytes, &filename).await
}

/// [`add_torrent`] on raw bytes.
pub async fn add_torrent_bytes(
    registry: &mut HostRegistry,
    bytes: &[u8],
    filename: &str,
) -> Result<AddOutcome, Error> {
    let hash = InfoHash::of_torrent(bytes)?;

    // Registry-wide duplicate check before any selection.
    if registry.all_hashes().await?.contains(&hash) {
        return Ok(AddOutcome::AlreadyPresent { hash });
    }

    if registry.is_empty() {
        return Ok(AddOutcome::NoHosts);
    }

    // Least backlog wins; strict less keeps the first host on ties. Hosts
    // with an unknown backlog are not candidates.
    let mut best: Option<(usize, usize)> = None;
    for (idx, host) in registry.hosts_mut().iter_mut().enumerate() {
        match host.torrent_count().await {
            Some(count) => {
                if best.map_or(true, |(_, best_count)| count < best_count) {
                    best = Some((idx, count));
                }
            }
            None => warn!(host = %host.address(), "not a placement candidate this cycle"),
        }
    }
    let Some((idx, count)) = best else {
        warn!("no host reported a usable backlog");
        return Ok(AddOutcome::NoHosts);
    };

    if count >= registry.max_torrents() {
        return Ok(AddOutcome::AllFull);
    }

    let host = &mut registry.hosts_mut()[idx];
    let label = host.address().to_string();
    info!(torrent = filename, host = label.as_str(), backlog = count, "placing torrent");
    if host.add_torrent(bytes, filename).await? {
        Ok(AddOutcome::Added { host: label, hash })
    } else {
        Ok(AddOutcome::HostOffline { host: label })
    }
}
