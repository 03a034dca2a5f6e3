use super::error::MetainfoError;
use super::info_hash::InfoHash;
use super::pieces::PieceHashes;
use crate::bencode::{decode, encode, Value};
use crate::constants::PIECE_HASH_LEN;

/// A multi-file torrent as written to disk.
///
/// Field order in the serialized form is fixed by bencode's sorted keys, so
/// two descriptors that compare equal always encode to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentDescriptor {
    pub announce: String,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    /// Unix timestamp; the only field allowed to differ between rebuilds.
    pub creation_date: Option<i64>,
    pub encoding: Option<String>,
    pub info: InfoDict,
}

/// The `info` dictionary; its SHA-1 is the torrent's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoDict {
    /// Name of the directory the files are placed in.
    pub name: String,
    pub piece_length: u64,
    pub pieces: PieceHashes,
    pub files: Vec<FileEntry>,
    /// Restricts clients to the announce URL (no DHT, no peer exchange).
    pub private: bool,
}

/// One entry of `info.files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub length: u64,
    pub path: Vec<String>,
}

impl InfoDict {
    pub fn total_length(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    /// Number of pieces the file list requires: `ceil(total / piece length)`.
    pub fn expected_piece_count(&self) -> u64 {
        if self.piece_length == 0 {
            return 0;
        }
        self.total_length().div_ceil(self.piece_length)
    }

    /// Checks every structural invariant of the dictionary.
    pub fn validate(&self) -> Result<(), MetainfoError> {
        if self.name.is_empty() || !valid_component(&self.name) {
            return Err(MetainfoError::encoding("invalid torrent name"));
        }
        if self.files.is_empty() {
            return Err(MetainfoError::encoding("file list is empty"));
        }
        if self.piece_length == 0 {
            return Err(MetainfoError::encoding("piece length must be positive"));
        }

        let mut total = 0u64;
        for file in &self.files {
            if file.path.is_empty() || !file.path.iter().all(|c| valid_component(c)) {
                return Err(MetainfoError::encoding(format!(
                    "invalid file path {:?}",
                    file.path
                )));
            }
            total = total
                .checked_add(file.length)
                .filter(|&t| i64::try_from(t).is_ok())
                .ok_or_else(|| MetainfoError::encoding("total length exceeds i64"))?;
        }

        if self.piece_length > total {
            return Err(MetainfoError::encoding(format!(
                "piece length {} exceeds content length {total}",
                self.piece_length
            )));
        }

        let expected = total.div_ceil(self.piece_length);
        if self.pieces.len() as u64 != expected {
            return Err(MetainfoError::encoding(format!(
                "{} piece hashes for {total} bytes at piece length {} (expected {expected})",
                self.pieces.len(),
                self.piece_length
            )));
        }

        Ok(())
    }

    pub fn to_value(&self) -> Result<Value, MetainfoError> {
        self.validate()?;

        let files = self
            .files
            .iter()
            .map(|file| {
                let length = Value::uint(file.length)
                    .map_err(|e| MetainfoError::encoding(e.to_string()))?;
                let path = file.path.iter().map(|c| Value::string(c)).collect();
                Ok([("length", length), ("path", Value::List(path))]
                    .into_iter()
                    .collect())
            })
            .collect::<Result<Vec<Value>, MetainfoError>>()?;

        let piece_length = Value::uint(self.piece_length)
            .map_err(|e| MetainfoError::encoding(e.to_string()))?;

        let mut entries = vec![
            ("files", Value::List(files)),
            ("name", Value::string(&self.name)),
            ("piece length", piece_length),
            ("pieces", Value::Bytes(self.pieces.to_blob())),
        ];
        if self.private {
            entries.push(("private", Value::Integer(1)));
        }

        Ok(entries.into_iter().collect())
    }

    pub fn info_hash(&self) -> Result<InfoHash, MetainfoError> {
        Ok(InfoHash::of_info(&encode(&self.to_value()?)))
    }
}

fn valid_component(c: &str) -> bool {
    !c.is_empty() && c != "." && c != ".." && !c.contains(['/', '\\', '\0'])
}

impl TorrentDescriptor {
    pub fn to_value(&self) -> Result<Value, MetainfoError> {
        if self.announce.is_empty() {
            return Err(MetainfoError::encoding("announce URL is empty"));
        }

        let mut entries = vec![
            ("announce", Value::string(&self.announce)),
            ("info", self.info.to_value()?),
        ];
        if let Some(ref comment) = self.comment {
            entries.push(("comment", Value::string(comment)));
        }
        if let Some(ref created_by) = self.created_by {
            entries.push(("created by", Value::string(created_by)));
        }
        if let Some(date) = self.creation_date {
            entries.push(("creation date", Value::Integer(date)));
        }
        if let Some(ref encoding) = self.encoding {
            entries.push(("encoding", Value::string(encoding)));
        }

        Ok(entries.into_iter().collect())
    }

    /// Serializes the descriptor with canonical bencode.
    pub fn encode(&self) -> Result<Vec<u8>, MetainfoError> {
        Ok(encode(&self.to_value()?))
    }

    pub fn info_hash(&self) -> Result<InfoHash, MetainfoError> {
        self.info.info_hash()
    }

    /// Parses a torrent file.
    ///
    /// Single-file torrents (`info.length`) are read as one entry named after
    /// the torrent; multi-file torrents keep their `path` lists as-is.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let root = decode(data)?;
        if root.as_dict().is_none() {
            return Err(MetainfoError::InvalidField("root"));
        }

        let info = parse_info(root.get(b"info").ok_or(MetainfoError::MissingField("info"))?)?;

        let announce = root
            .get(b"announce")
            .and_then(Value::as_str)
            .ok_or(MetainfoError::MissingField("announce"))?
            .to_string();

        let text = |key: &[u8]| root.get(key).and_then(Value::as_str).map(String::from);

        Ok(Self {
            announce,
            comment: text(b"comment"),
            created_by: text(b"created by"),
            creation_date: root.get(b"creation date").and_then(Value::as_integer),
            encoding: text(b"encoding"),
            info,
        })
    }
}

fn parse_info(value: &Value) -> Result<InfoDict, MetainfoError> {
    if value.as_dict().is_none() {
        return Err(MetainfoError::InvalidField("info"));
    }

    let name = value
        .get(b"name")
        .and_then(Value::as_str)
        .ok_or(MetainfoError::MissingField("name"))?
        .to_string();

    let piece_length = value
        .get(b"piece length")
        .ok_or(MetainfoError::MissingField("piece length"))?
        .as_uint()
        .ok_or(MetainfoError::InvalidField("piece length"))?;

    let blob = value
        .get(b"pieces")
        .and_then(Value::as_bytes)
        .ok_or(MetainfoError::MissingField("pieces"))?;
    if blob.len() % PIECE_HASH_LEN != 0 {
        return Err(MetainfoError::InvalidField("pieces"));
    }
    let pieces = PieceHashes::from_blob(blob).ok_or(MetainfoError::InvalidField("pieces"))?;

    let private = value.get(b"private").and_then(Value::as_integer) == Some(1);

    let files = if let Some(length) = value.get(b"length") {
        let length = length.as_uint().ok_or(MetainfoError::InvalidField("length"))?;
        vec![FileEntry {
            length,
            path: vec![name.clone()],
        }]
    } else {
        let list = value
            .get(b"files")
            .and_then(Value::as_list)
            .ok_or(MetainfoError::MissingField("length or files"))?;

        list.iter()
            .map(|entry| {
                let length = entry
                    .get(b"length")
                    .ok_or(MetainfoError::MissingField("file length"))?
                    .as_uint()
                    .ok_or(MetainfoError::InvalidField("file length"))?;
                let path = entry
                    .get(b"path")
                    .and_then(Value::as_list)
                    .ok_or(MetainfoError::MissingField("file path"))?
                    .iter()
                    .map(|c| c.as_str().map(String::from))
                    .collect::<Option<Vec<_>>>()
                    .ok_or(MetainfoError::InvalidField("file path"))?;
                Ok(FileEntry { length, path })
            })
            .collect::<Result<Vec<_>, MetainfoError>>()?
    };

    Ok(InfoDict {
        name,
        piece_length,
        pieces,
        files,
        private,
    })
}
