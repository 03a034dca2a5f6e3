use super::error::MetainfoError;
use crate::constants::PIECE_HASH_LEN;
use sha1::{Digest, Sha1};
use std::fmt;

/// BitTorrent v1 info hash: SHA-1 of the bencoded `info` dictionary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; PIECE_HASH_LEN]);

impl InfoHash {
    /// Hashes an already bencoded `info` dictionary.
    pub fn of_info(raw_info: &[u8]) -> Self {
        InfoHash(Sha1::digest(raw_info).into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetainfoError> {
        <[u8; PIECE_HASH_LEN]>::try_from(bytes)
            .map(InfoHash)
            .map_err(|_| MetainfoError::InvalidInfoHashLength)
    }

    pub fn from_hex(s: &str) -> Result<Self, MetainfoError> {
        let bytes = hex_decode(s).ok_or(MetainfoError::InvalidInfoHashLength)?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
        s
    })
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
