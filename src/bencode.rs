//! Bencode decoding and canonical encoding.
//!
//! The torrent wire format: length-prefixed byte strings (`4:spam`), integers
//! (`i42e`), lists (`l...e`) and dictionaries (`d...e`) whose keys are byte
//! strings in lexicographic order. Decoding is strict — trailing bytes,
//! truncated input, and non-minimal integers are rejected — so that encoding a
//! decoded value reproduces the input byte for byte. That round-trip guarantee
//! is what makes info-hashes computed here match the ones Deluge computes.

use std::collections::BTreeMap;
use thiserror::Error;

/// Real torrents nest a handful of levels; anything deeper is hostile input,
/// and unbounded recursion would blow the stack before it hit end-of-input.
const MAX_DEPTH: usize = 32;

/// A decoded bencode value.
///
/// Dictionary keys live in a `BTreeMap`, which sorts them lexicographically by
/// byte value — exactly the canonical bencode key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Int(i64),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("unexpected byte {byte:#04x} at offset {offset}")]
    UnexpectedByte { byte: u8, offset: usize },
    #[error("invalid integer at offset {0}")]
    InvalidInt(usize),
    #[error("invalid string length at offset {0}")]
    InvalidLength(usize),
    #[error("dictionary key is not a byte string at offset {0}")]
    NonStringKey(usize),
    #[error("nesting deeper than {MAX_DEPTH} levels at offset {0}")]
    TooDeep(usize),
    #[error("trailing data after value at offset {0}")]
    TrailingData(usize),
}

/// Decode a complete bencode value, rejecting trailing bytes.
pub fn decode(input: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder {
        input,
        pos: 0,
        depth: 0,
    };
    let value = decoder.value()?;
    if decoder.pos != input.len() {
        return Err(BencodeError::TrailingData(decoder.pos));
    }
    Ok(value)
}

/// Encode a value in canonical form.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bytes(bytes) => {
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(bytes);
        }
        Value::Int(n) => {
            out.push(b'i');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b'e');
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(entries) => {
            out.push(b'd');
            for (key, item) in entries {
                out.extend_from_slice(key.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(key);
                encode_into(item, out);
            }
            out.push(b'e');
        }
    }
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Decoder<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof(self.pos))
    }

    fn bump(&mut self) -> Result<u8, BencodeError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn value(&mut self) -> Result<Value, BencodeError> {
        match self.peek()? {
            b'i' => self.int(),
            b'l' => self.list(),
            b'd' => self.dict(),
            b'0'..=b'9' => Ok(Value::Bytes(self.bytes()?)),
            byte => Err(BencodeError::UnexpectedByte {
                byte,
                offset: self.pos,
            }),
        }
    }

    fn int(&mut self) -> Result<Value, BencodeError> {
        let start = self.pos;
        self.bump()?; // 'i'
        let negative = if self.peek()? == b'-' {
            self.bump()?;
            true
        } else {
            false
        };
        let digits_start = self.pos;
        while self.peek()? != b'e' {
            let byte = self.bump()?;
            if !byte.is_ascii_digit() {
                return Err(BencodeError::InvalidInt(start));
            }
        }
        let digits = &self.input[digits_start..self.pos];
        self.bump()?; // 'e'
        if digits.is_empty() {
            return Err(BencodeError::InvalidInt(start));
        }
        // Minimal form only: no leading zeros, no "-0".
        if digits.len() > 1 && digits[0] == b'0' {
            return Err(BencodeError::InvalidInt(start));
        }
        if negative && digits == b"0" {
            return Err(BencodeError::InvalidInt(start));
        }
        let mut n: i64 = 0;
        for &digit in digits {
            n = n
                .checked_mul(10)
                .and_then(|n| n.checked_add(i64::from(digit - b'0')))
                .ok_or(BencodeError::InvalidInt(start))?;
        }
        Ok(Value::Int(if negative { -n } else { n }))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.pos;
        let mut len: usize = 0;
        while self.peek()? != b':' {
            let byte = self.bump()?;
            if !byte.is_ascii_digit() {
                return Err(BencodeError::InvalidLength(start));
            }
            len = len
                .checked_mul(10)
                .and_then(|len| len.checked_add(usize::from(byte - b'0')))
                .ok_or(BencodeError::InvalidLength(start))?;
        }
        let digits = self.pos - start;
        if digits == 0 || (digits > 1 && self.input[start] == b'0') {
            return Err(BencodeError::InvalidLength(start));
        }
        self.bump()?; // ':'
        // len can be near usize::MAX here; never add it to pos.
        if len > self.input.len() - self.pos {
            return Err(BencodeError::UnexpectedEof(self.input.len()));
        }
        let bytes = self.input[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    fn descend(&mut self) -> Result<(), BencodeError> {
        if self.depth == MAX_DEPTH {
            return Err(BencodeError::TooDeep(self.pos));
        }
        self.depth += 1;
        Ok(())
    }

    fn list(&mut self) -> Result<Value, BencodeError> {
        self.descend()?;
        self.bump()?; // 'l'
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value()?);
        }
        self.bump()?; // 'e'
        self.depth -= 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self) -> Result<Value, BencodeError> {
        self.descend()?;
        self.bump()?; // 'd'
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key_offset = self.pos;
            if !self.peek()?.is_ascii_digit() {
                return Err(BencodeError::NonStringKey(key_offset));
            }
            let key = self.bytes()?;
            let value = self.value()?;
            entries.insert(key, value);
        }
        self.bump()?; // 'e'
        self.depth -= 1;
        Ok(Value::Dict(entries))
    }
}
