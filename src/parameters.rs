//! Parameter map: per-call options and worker load-time configuration.
//!
//! A `Parameter` is a tagged union of four value kinds. `ParameterMap` is
//! ordered (`BTreeMap`-backed) so it has a stable iteration order and can be
//! used as a map key itself (the endpoint registry dedupes worker instances
//! by `(kind, Parameters)` pair, per spec §4.1).
//!
//! The wire format mirrors `RequestParameters::serialize`/`deserialize` from
//! the original server: a `usize` count, then one `(type_tag, key_len,
//! value_len)` triple per entry, then the concatenated key bytes followed by
//! value bytes. Variant order is fixed (`Bool, Int32, Double, String`) since
//! the tag is a plain index into that order, not a named discriminant.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Bool(bool),
    Int32(i32),
    Double(f64),
    String(String),
}

impl Parameter {
    fn tag(&self) -> u64 {
        match self {
            Parameter::Bool(_) => 0,
            Parameter::Int32(_) => 1,
            Parameter::Double(_) => 2,
            Parameter::String(_) => 3,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self {
            Parameter::Bool(v) => vec![if *v { 1 } else { 0 }],
            Parameter::Int32(v) => v.to_le_bytes().to_vec(),
            Parameter::Double(v) => v.to_le_bytes().to_vec(),
            Parameter::String(v) => v.as_bytes().to_vec(),
        }
    }

    /// A total order over values so `ParameterMap` itself can be ordered
    /// (needed for endpoint dedup via `BTreeMap<ParameterMap, String>`).
    fn cmp_key(&self) -> (u64, u64, Vec<u8>) {
        let bits = match self {
            Parameter::Bool(v) => *v as u64,
            Parameter::Int32(v) => *v as i64 as u64,
            Parameter::Double(v) => v.to_bits(),
            Parameter::String(_) => 0,
        };
        (self.tag(), bits, self.value_bytes())
    }
}

impl Eq for Parameter {}

impl PartialOrd for Parameter {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Parameter {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.cmp_key().cmp(&other.cmp_key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParameterMap {
    entries: BTreeMap<String, Parameter>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Parameter>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn erase(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.entries.get(key)
    }

    pub fn get_int32(&self, key: &str) -> Option<i32> {
        match self.entries.get(key) {
            Some(Parameter::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(Parameter::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Parameter)> {
        self.entries.iter()
    }

    /// Serialized byte length, matching `RequestParameters::serializeSize`:
    /// one header `usize` plus three header `usize`s per entry, plus the
    /// concatenated key and value bytes.
    pub fn serialize_size(&self) -> usize {
        const WORD: usize = std::mem::size_of::<usize>();
        let mut size = (self.entries.len() * 3 + 1) * WORD;
        for (key, value) in &self.entries {
            size += key.len();
            size += value.value_bytes().len();
        }
        size
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialize_size());
        out.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        for (key, value) in &self.entries {
            out.extend_from_slice(&value.tag().to_le_bytes());
            out.extend_from_slice(&(key.len() as u64).to_le_bytes());
            out.extend_from_slice(&(value.value_bytes().len() as u64).to_le_bytes());
        }
        for (key, value) in &self.entries {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(&value.value_bytes());
        }
        out
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        const WORD: usize = std::mem::size_of::<u64>();
        let read_u64 = |buf: &[u8], off: usize| -> Result<u64> {
            let slice = buf
                .get(off..off + WORD)
                .ok_or_else(|| Error::runtime("truncated parameter map"))?;
            Ok(u64::from_le_bytes(slice.try_into().unwrap()))
        };

        let mut offset = 0usize;
        let count = read_u64(data, offset)? as usize;
        offset += WORD;

        let mut headers = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = read_u64(data, offset)?;
            offset += WORD;
            let key_len = read_u64(data, offset)? as usize;
            offset += WORD;
            let val_len = read_u64(data, offset)? as usize;
            offset += WORD;
            headers.push((tag, key_len, val_len));
        }

        let mut entries = BTreeMap::new();
        for (tag, key_len, val_len) in headers {
            let key_bytes = data
                .get(offset..offset + key_len)
                .ok_or_else(|| Error::runtime("truncated parameter key"))?;
            let key = String::from_utf8_lossy(key_bytes).into_owned();
            offset += key_len;

            let val_bytes = data
                .get(offset..offset + val_len)
                .ok_or_else(|| Error::runtime("truncated parameter value"))?;
            offset += val_len;

            let value = match tag {
                0 => Parameter::Bool(val_bytes.first().copied().unwrap_or(0) != 0),
                1 => Parameter::Int32(i32::from_le_bytes(
                    val_bytes
                        .try_into()
                        .map_err(|_| Error::runtime("bad int32 parameter"))?,
                )),
                2 => Parameter::Double(f64::from_le_bytes(
                    val_bytes
                        .try_into()
                        .map_err(|_| Error::runtime("bad double parameter"))?,
                )),
                3 => Parameter::String(String::from_utf8_lossy(val_bytes).into_owned()),
                other => return Err(Error::runtime(format!("unknown parameter tag {other}"))),
            };
            entries.insert(key, value);
        }

        Ok(ParameterMap { entries })
    }
}

impl From<bool> for Parameter {
    fn from(v: bool) -> Self {
        Parameter::Bool(v)
    }
}
impl From<i32> for Parameter {
    fn from(v: i32) -> Self {
        Parameter::Int32(v)
    }
}
impl From<f64> for Parameter {
    fn from(v: f64) -> Self {
        Parameter::Double(v)
    }
}
impl From<String> for Parameter {
    fn from(v: String) -> Self {
        Parameter::String(v)
    }
}
impl From<&str> for Parameter {
    fn from(v: &str) -> Self {
        Parameter::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_full_map() {
        let mut params = ParameterMap::new();
        params.put("batchers", 2i32);
        params.put("timeout_ms", 100i32);
        params.put("ratio", 0.5f64);
        params.put("name", "echo");
        params.put("enabled", true);

        let bytes = params.serialize();
        assert_eq!(bytes.len(), params.serialize_size());

        let back = ParameterMap::deserialize(&bytes).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.get_int32("batchers"), Some(2));
        assert_eq!(back.get_str("name"), Some("echo"));
    }

    #[test]
    fn empty_map_round_trips() {
        let params = ParameterMap::new();
        let bytes = params.serialize();
        let back = ParameterMap::deserialize(&bytes).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn equal_maps_compare_equal_regardless_of_insertion_order() {
        let mut a = ParameterMap::new();
        a.put("x", 1i32);
        a.put("y", 2i32);

        let mut b = ParameterMap::new();
        b.put("y", 2i32);
        b.put("x", 1i32);

        assert_eq!(a, b);
    }

    #[test]
    fn differing_value_breaks_equality() {
        let mut a = ParameterMap::new();
        a.put("cfg", 1i32);
        let mut b = ParameterMap::new();
        b.put("cfg", 2i32);
        assert_ne!(a, b);
    }
}
