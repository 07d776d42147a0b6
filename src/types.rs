//! Primitive tensor element types.
//!
//! Mirrors `amdinfer::DataType`: a closed enum with a byte size and a
//! canonical uppercase wire name used by KServe-compatible clients
//! (`"FP32"`, `"INT64"`, etc).

use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
    String,
}

impl DataType {
    /// Byte size of a single element. `String` elements are variable-length
    /// and length-prefixed on the wire, so this returns the size of the
    /// length prefix itself (a `u32`), not a per-element constant.
    pub const fn size(self) -> usize {
        match self {
            DataType::Bool => 1,
            DataType::U8 => 1,
            DataType::U16 => 2,
            DataType::U32 => 4,
            DataType::U64 => 8,
            DataType::I8 => 1,
            DataType::I16 => 2,
            DataType::I32 => 4,
            DataType::I64 => 8,
            DataType::F16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::String => 4,
        }
    }

    pub const fn is_fixed_size(self) -> bool {
        !matches!(self, DataType::String)
    }

    /// Canonical KServe v2 wire name, e.g. `"FP32"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::U8 => "UINT8",
            DataType::U16 => "UINT16",
            DataType::U32 => "UINT32",
            DataType::U64 => "UINT64",
            DataType::I8 => "INT8",
            DataType::I16 => "INT16",
            DataType::I32 => "INT32",
            DataType::I64 => "INT64",
            DataType::F16 => "FP16",
            DataType::F32 => "FP32",
            DataType::F64 => "FP64",
            DataType::String => "STRING",
        }
    }

    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "BOOL" => Ok(DataType::Bool),
            "UINT8" => Ok(DataType::U8),
            "UINT16" => Ok(DataType::U16),
            "UINT32" => Ok(DataType::U32),
            "UINT64" => Ok(DataType::U64),
            "INT8" => Ok(DataType::I8),
            "INT16" => Ok(DataType::I16),
            "INT32" => Ok(DataType::I32),
            "INT64" => Ok(DataType::I64),
            "FP16" => Ok(DataType::F16),
            "FP32" => Ok(DataType::F32),
            "FP64" => Ok(DataType::F64),
            "STRING" => Ok(DataType::String),
            other => Err(Error::invalid_argument(format!("unknown datatype: {other}"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let all = [
            DataType::Bool,
            DataType::U8,
            DataType::U16,
            DataType::U32,
            DataType::U64,
            DataType::I8,
            DataType::I16,
            DataType::I32,
            DataType::I64,
            DataType::F16,
            DataType::F32,
            DataType::F64,
            DataType::String,
        ];
        for dt in all {
            assert_eq!(DataType::from_str(dt.as_str()).unwrap(), dt);
        }
    }

    #[test]
    fn rejects_unknown_name() {
        assert!(DataType::from_str("FP128").is_err());
    }

    #[test]
    fn sizes_match_element_width() {
        assert_eq!(DataType::F64.size(), 8);
        assert_eq!(DataType::Bool.size(), 1);
        assert!(!DataType::String.is_fixed_size());
    }
}
