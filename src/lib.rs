//! Deluge Distributor
//!
//! Watches a directory for `.torrent` files and distributes them across a
//! fleet of Deluge daemons: least-loaded host first, one host per torrent,
//! deduplicated by info-hash across the whole fleet.
//!
//! ## Module Structure
//!
//! - `bencode`: the torrent wire format with canonical re-encoding
//! - `infohash`: content fingerprints over the `info` dictionary
//! - `rpc`: the daemon RPC seam and the Deluge web JSON-RPC transport
//! - `host`: a single daemon with its memoized backlog
//! - `registry`: hostlist parsing and the per-cycle host set
//! - `distributor`: placement and its outcomes
//! - `watch`: the polling loop
//! - `notify`: Slack announcements
//! - `error`: the failure taxonomy
//! - `util`: shared helpers

pub mod bencode;
pub mod distributor;
pub mod error;
pub mod host;
pub mod infohash;
pub mod notify;
pub mod registry;
pub mod rpc;
pub mod util;
pub mod watch;

pub use distributor::{add_torrent, add_torrent_bytes, AddOutcome};
pub use error::Error;
pub use host::TorrentHost;
pub use infohash::InfoHash;
pub use notify::SlackNotifier;
pub use registry::HostRegistry;
pub use rpc::{Connector, HostAddress, HttpConnector, RpcClient, RpcError};
