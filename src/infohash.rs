//! Info-hash computation.
//!
//! A torrent's identity is the SHA-1 digest of its canonically re-encoded
//! `info` dictionary. Deluge computes the same digest when it accepts a
//! torrent, which is what lets this tool deduplicate across daemons without
//! asking any of them about a specific file.

use crate::bencode::{self, Value};
use crate::error::Error;
use sha1::{Digest, Sha1};
use std::fmt;

/// A 40-character lowercase hex SHA-1 over the canonical `info` dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash(String);

impl InfoHash {
    /// Compute the info-hash of a raw `.torrent` file.
    ///
    /// Fails with [`Error::MalformedTorrent`] if the bytes do not decode, the
    /// top level is not a dictionary, or there is no `info` key.
    pub fn of_torrent(bytes: &[u8]) -> Result<Self, Error> {
        let value = bencode::decode(bytes)?;
        let Value::Dict(top) = value else {
            return Err(Error::MalformedTorrent {
                reason: "top-level value is not a dictionary".to_string(),
            });
        };
        let info = top.get(b"info".as_slice()).ok_or(Error::MalformedTorrent {
            reason: "no top-level 'info' dictionary".to_string(),
        })?;
        let digest = Sha1::digest(bencode::encode(info));
        Ok(Self(hex::encode(digest)))
    }

    /// Validate a hash string reported by a daemon. Normalizes to lowercase;
    /// anything that is not 40 hex characters is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != 40 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
