//! The polling loop.
//!
//! Every cycle sleeps, rebuilds a fresh registry from the hostlist (registries
//! are per-cycle values, never mutated in place), scans the watch directory
//! for `.torrent` files, and runs each through the distributor. Whether a file
//! survives to the next cycle depends on its outcome: placed and
//! already-present torrents are deleted, capacity and offline outcomes keep
//! the file around for a retry, and a malformed file is deleted because no
//! amount of retrying will fix it.

use crate::distributor::{self, AddOutcome};
use crate::error::Error;
use crate::notify::SlackNotifier;
use crate::registry::HostRegistry;
use crate::rpc::Connector;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub struct WatchOptions {
    pub config_path: PathBuf,
    pub watch_path: PathBuf,
    pub host_filter: String,
    pub max_torrents: usize,
    pub sleep_time: u64,
}

/// Run distribution cycles forever. Returns only on an error that needs an
/// operator (a broken cross-host invariant, an unreadable hostlist).
pub async fn run(
    options: &WatchOptions,
    connector: &dyn Connector,
    notifier: Option<&SlackNotifier>,
) -> Result<(), Error> {
    loop {
        debug!(seconds = options.sleep_time, "sleeping");
        tokio::time::sleep(Duration::from_secs(options.sleep_time)).await;
        run_cycle(options, connector, notifier).await?;
    }
}

/// One distribution cycle over the current contents of the watch directory.
pub async fn run_cycle(
    options: &WatchOptions,
    connector: &dyn Connector,
    notifier: Option<&SlackNotifier>,
) -> Result<(), Error> {
    let mut registry = HostRegistry::load(
        &options.config_path,
        &options.host_filter,
        options.max_torrents,
        connector,
    )
    .await?;

    let torrents = find_torrents(&options.watch_path);
    if torrents.is_empty() {
        return Ok(());
    }
    info!(count = torrents.len(), ".torrent files found");
    if let Some(notifier) = notifier {
        notifier
            .send(&format!("{} .torrent files found", torrents.len()))
            .await;
    }

    for path in torrents {
        match distributor::add_torrent(&mut registry, &path).await {
            Ok(AddOutcome::Added { host, hash }) => {
                info!(torrent = %path.display(), host = host.as_str(), hash = %hash, "torrent placed");
                if let Some(notifier) = notifier {
                    notifier
                        .send(&format!("Added {} to {host}", path.display()))
                        .await;
                }
                remove(&path);
            }
            Ok(AddOutcome::AlreadyPresent { hash }) => {
                warn!(torrent = %path.display(), hash = %hash, "already present on a host");
                remove(&path);
            }
            Ok(AddOutcome::NoHosts) => {
                warn!(torrent = %path.display(), "no usable hosts, keeping for next cycle");
            }
            Ok(AddOutcome::AllFull) => {
                warn!(torrent = %path.display(), "all hosts full, keeping for next cycle");
            }
            Ok(AddOutcome::HostOffline { host }) => {
                warn!(
                    torrent = %path.display(),
                    host = host.as_str(),
                    "host went offline, keeping for next cycle"
                );
            }
            Err(Error::MalformedTorrent { reason }) => {
                // Retrying a broken file can never succeed.
                error!(torrent = %path.display(), reason = reason.as_str(), "malformed torrent, discarding");
                remove(&path);
            }
            Err(err @ Error::DuplicateTorrent { .. }) => {
                error!(error = %err, "cross-host invariant broken, stopping");
                return Err(err);
            }
            Err(err) => {
                error!(torrent = %path.display(), error = %err, "submission failed, keeping for next cycle");
            }
        }
    }
    Ok(())
}

/// Every `.torrent` file under the watch directory, sorted for deterministic
/// processing order.
pub fn find_torrents(watch_path: &Path) -> Vec<PathBuf> {
    let mut torrents: Vec<PathBuf> = WalkDir::new(watch_path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "watch scan error");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("torrent"))
        })
        .map(|entry| entry.into_path())
        .collect();
    torrents.sort();
    torrents
}

fn remove(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(torrent = %path.display(), error = %err, "could not remove file");
    }
}
