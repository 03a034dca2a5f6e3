use super::error::StoreError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A content digest as written in manifests, e.g. `sha256:4f2a…`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Parses `<algorithm>:<hex>`.
    ///
    /// A bare hex string is taken to be SHA-256, which is what every blob in
    /// the store is keyed by today.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let (algorithm, hex) = s.split_once(':').unwrap_or(("sha256", s));

        if algorithm.is_empty() || !algorithm.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(StoreError::InvalidDigest(s.to_string()));
        }
        if hex.is_empty() || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(StoreError::InvalidDigest(s.to_string()));
        }

        let expected_len = match algorithm {
            "sha256" => Some(64),
            "sha512" => Some(128),
            _ => None,
        };
        if expected_len.is_some_and(|len| hex.len() != len) {
            return Err(StoreError::InvalidDigest(s.to_string()));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Name of the blob file holding this content (`sha256-<hex>`).
    pub fn blob_file_name(&self) -> String {
        format!("{}-{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}
