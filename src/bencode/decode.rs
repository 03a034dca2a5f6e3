use super::error::BencodeError;
use super::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

const MAX_DEPTH: usize = 64;

/// Decodes exactly one canonical bencode value from `data`.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder { data, pos: 0 };
    let value = decoder.value(0)?;

    if decoder.pos != data.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            c => Err(BencodeError::UnexpectedChar(c as char, self.pos)),
        }
    }

    /// Returns the slice up to (not including) `terminator` and moves past it.
    fn take_until(&mut self, terminator: u8) -> Result<&'a [u8], BencodeError> {
        let data = self.data;
        let rest = &data[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == terminator)
            .ok_or(BencodeError::UnexpectedEof)?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let digits = self.take_until(b'e')?;

        let text = std::str::from_utf8(digits)
            .map_err(|_| BencodeError::InvalidInteger("invalid utf8".into()))?;

        if text.is_empty() {
            return Err(BencodeError::InvalidInteger("empty".into()));
        }
        if text.starts_with("-0") || (text.starts_with('0') && text.len() > 1) {
            return Err(BencodeError::InvalidInteger(text.into()));
        }

        text.parse()
            .map(Value::Integer)
            .map_err(|_| BencodeError::InvalidInteger(text.into()))
    }

    fn bytes(&mut self) -> Result<Bytes, BencodeError> {
        let digits = self.take_until(b':')?;
        if digits.len() > 1 && digits[0] == b'0' {
            return Err(BencodeError::InvalidStringLength);
        }
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(BencodeError::UnexpectedEof)?;

        let bytes = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }

        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut entries = BTreeMap::new();
        let mut last_key: Option<Bytes> = None;

        while self.peek()? != b'e' {
            let key_pos = self.pos;
            let key = match self.peek()? {
                b'0'..=b'9' => self.bytes()?,
                c => return Err(BencodeError::UnexpectedChar(c as char, key_pos)),
            };

            if last_key.as_ref().is_some_and(|last| *last >= key) {
                return Err(BencodeError::UnsortedKeys(key_pos));
            }

            let value = self.value(depth + 1)?;
            last_key = Some(key.clone());
            entries.insert(key, value);
        }

        self.pos += 1;
        Ok(Value::Dict(entries))
    }
}
