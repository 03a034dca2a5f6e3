use super::value::Value;

/// Encodes a bencode value into a freshly allocated buffer.
///
/// Dictionaries are backed by a `BTreeMap`, so keys always come out sorted and
/// the output is canonical.
///
/// ```
/// use modelseed::bencode::{encode, Value};
///
/// let list = Value::List(vec![Value::Integer(1), Value::string("two")]);
/// assert_eq!(encode(&list), b"li1e3:twoe");
/// ```
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    buf
}

/// Appends the encoding of `value` to `buf`.
pub fn encode_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Integer(i) => {
            buf.push(b'i');
            buf.extend_from_slice(i.to_string().as_bytes());
            buf.push(b'e');
        }
        Value::Bytes(b) => encode_bytes(b, buf),
        Value::List(items) => {
            buf.push(b'l');
            for item in items {
                encode_into(item, buf);
            }
            buf.push(b'e');
        }
        Value::Dict(entries) => {
            buf.push(b'd');
            for (key, val) in entries {
                encode_bytes(key, buf);
                encode_into(val, buf);
            }
            buf.push(b'e');
        }
    }
}

fn encode_bytes(bytes: &[u8], buf: &mut Vec<u8>) {
    buf.extend_from_slice(bytes.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(bytes);
}
