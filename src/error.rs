//! Failure taxonomy for the distributor.
//!
//! Transport-level trouble (`RpcError::Unreachable`) is recovered locally —
//! hosts get dropped, skipped, or retried — and only surfaces here wrapped in
//! context when a call that did reach a daemon went wrong.

use crate::bencode::BencodeError;
use crate::infohash::InfoHash;
use crate::rpc::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The torrent file could not be decoded, or it has no `info` dictionary.
    /// Fatal for that one file only.
    #[error("malformed torrent: {reason}")]
    MalformedTorrent { reason: String },

    /// The same info-hash is present on two hosts at once. A prior placement
    /// race or manual intervention broke the no-overlap invariant; this needs
    /// an operator, not automatic resolution.
    #[error("hash {hash} on {host} is already present on another host")]
    DuplicateTorrent { host: String, hash: InfoHash },

    /// The daemon accepted a submission but reported a different hash than
    /// the one computed locally. Never treated as success.
    #[error("host reported hash {reported}, expected {expected}")]
    HashMismatch { expected: InfoHash, reported: String },

    /// An RPC call reached the daemon but failed at the protocol level.
    #[error("rpc call to {host} failed")]
    Rpc {
        host: String,
        #[source]
        source: RpcError,
    },

    #[error("invalid host filter: {0}")]
    InvalidHostFilter(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<BencodeError> for Error {
    fn from(err: BencodeError) -> Self {
        Error::MalformedTorrent {
            reason: err.to_string(),
        }
    }
}
