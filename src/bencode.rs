//! Bencode encoding and decoding ([BEP-3]).
//!
//! Torrent artifacts are bencoded dictionaries. The encoder here is canonical:
//! integers carry no leading zeros, byte strings are length-prefixed and
//! dictionary keys are emitted in lexicographic byte order, so equal values
//! always produce equal bytes.
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! The decoder is strict and only accepts canonical input; it is used to read
//! previously written artifacts back.
//!
//! ```
//! use modelseed::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d3:cow3:moo4:spami42ee").unwrap();
//! assert_eq!(value.get(b"spam").and_then(Value::as_integer), Some(42));
//! assert_eq!(encode(&value), b"d3:cow3:moo4:spami42ee");
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::decode;
pub use encode::{encode, encode_into};
pub use error::BencodeError;
pub use value::Value;
