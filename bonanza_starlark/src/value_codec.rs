use starlark::collections::SmallMap;
use starlark::values::dict::Dict;
use starlark::values::dict::DictRef;
use starlark::values::Heap;
use starlark::values::Value;

use crate::error::StarlarkBridgeError;

/// An intermediate, storage-safe mirror of a Starlark value (spec §4.6
/// "encode/decode of Starlark values as stored structured data"). Only
/// the structural subset a schema-typed key/value is expected to carry
/// -- `None`/`bool`/`int`/`float`/`str`/list/dict-of-string-keys -- is
/// supported; anything else (functions, providers, unresolved lazy
/// attrs) is rejected by [`to_encoded`] rather than silently dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodedValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<EncodedValue>),
    Dict(Vec<(String, EncodedValue)>),
}

const TAG_NONE: u8 = 0;
const TAG_BOOL_FALSE: u8 = 1;
const TAG_BOOL_TRUE: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_LIST: u8 = 6;
const TAG_DICT: u8 = 7;

/// Converts a live Starlark `Value` into its storage-safe mirror.
pub fn to_encoded(value: Value) -> Result<EncodedValue, StarlarkBridgeError> {
    if value.is_none() {
        return Ok(EncodedValue::None);
    }
    if let Some(b) = value.unpack_bool() {
        return Ok(EncodedValue::Bool(b));
    }
    if let Some(i) = value.unpack_i32() {
        return Ok(EncodedValue::Int(i as i64));
    }
    if let Some(s) = value.unpack_str() {
        return Ok(EncodedValue::Str(s.to_owned()));
    }
    if let Some(dict) = DictRef::from_value(value) {
        let mut entries = Vec::with_capacity(dict.len());
        for (k, v) in dict.iter() {
            let key = k
                .unpack_str()
                .ok_or_else(|| StarlarkBridgeError::UnencodableValue("dict key is not a string".to_string()))?
                .to_owned();
            entries.push((key, to_encoded(v)?));
        }
        return Ok(EncodedValue::Dict(entries));
    }
    if let Ok(iter) = value.iterate(&Heap::new()) {
        let mut items = Vec::new();
        for item in iter {
            items.push(to_encoded(item)?);
        }
        return Ok(EncodedValue::List(items));
    }
    Err(StarlarkBridgeError::UnencodableValue(format!("{:?} is not one of the supported structural shapes", value)))
}

/// Allocates a live Starlark value on `heap` from its storage-safe
/// mirror -- the inverse of [`to_encoded`].
pub fn from_encoded<'v>(encoded: &EncodedValue, heap: &'v Heap) -> Value<'v> {
    match encoded {
        EncodedValue::None => Value::new_none(),
        EncodedValue::Bool(b) => Value::new_bool(*b),
        EncodedValue::Int(i) => heap.alloc(*i as i32),
        EncodedValue::Float(f) => heap.alloc(*f),
        EncodedValue::Str(s) => heap.alloc(s.as_str()),
        EncodedValue::List(items) => {
            let allocated: Vec<Value> = items.iter().map(|item| from_encoded(item, heap)).collect();
            heap.alloc(allocated)
        }
        EncodedValue::Dict(entries) => {
            let mut map = SmallMap::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(heap.alloc_str(k).to_value(), from_encoded(v, heap));
            }
            heap.alloc(Dict::new(map))
        }
    }
}

/// Serialises an [`EncodedValue`] to the tagged varint/length-prefixed
/// wire form used to store it as a Merkle object payload.
pub fn write_encoded(out: &mut Vec<u8>, value: &EncodedValue) {
    match value {
        EncodedValue::None => out.push(TAG_NONE),
        EncodedValue::Bool(false) => out.push(TAG_BOOL_FALSE),
        EncodedValue::Bool(true) => out.push(TAG_BOOL_TRUE),
        EncodedValue::Int(i) => {
            out.push(TAG_INT);
            write_varint(out, zigzag(*i));
        }
        EncodedValue::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_le_bytes());
        }
        EncodedValue::Str(s) => {
            out.push(TAG_STR);
            write_varint(out, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        EncodedValue::List(items) => {
            out.push(TAG_LIST);
            write_varint(out, items.len() as u64);
            for item in items {
                write_encoded(out, item);
            }
        }
        EncodedValue::Dict(entries) => {
            out.push(TAG_DICT);
            write_varint(out, entries.len() as u64);
            for (k, v) in entries {
                write_varint(out, k.len() as u64);
                out.extend_from_slice(k.as_bytes());
                write_encoded(out, v);
            }
        }
    }
}

/// Reads one [`EncodedValue`] from the front of `bytes`, returning it
/// along with the number of bytes consumed.
pub fn read_encoded(bytes: &[u8]) -> Result<(EncodedValue, usize), StarlarkBridgeError> {
    let mut cursor = 0usize;
    let value = read_encoded_at(bytes, &mut cursor)?;
    Ok((value, cursor))
}

fn read_encoded_at(bytes: &[u8], cursor: &mut usize) -> Result<EncodedValue, StarlarkBridgeError> {
    let tag = take_byte(bytes, cursor)?;
    match tag {
        TAG_NONE => Ok(EncodedValue::None),
        TAG_BOOL_FALSE => Ok(EncodedValue::Bool(false)),
        TAG_BOOL_TRUE => Ok(EncodedValue::Bool(true)),
        TAG_INT => {
            let raw = read_varint(bytes, cursor)?;
            Ok(EncodedValue::Int(unzigzag(raw)))
        }
        TAG_FLOAT => {
            let slice = take_slice(bytes, cursor, 8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(slice);
            Ok(EncodedValue::Float(f64::from_le_bytes(buf)))
        }
        TAG_STR => {
            let len = read_varint(bytes, cursor)? as usize;
            let slice = take_slice(bytes, cursor, len)?;
            let s = std::str::from_utf8(slice)
                .map_err(|e| StarlarkBridgeError::MalformedEncoding(format!("non-utf8 string: {e}")))?;
            Ok(EncodedValue::Str(s.to_string()))
        }
        TAG_LIST => {
            let len = read_varint(bytes, cursor)? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(read_encoded_at(bytes, cursor)?);
            }
            Ok(EncodedValue::List(items))
        }
        TAG_DICT => {
            let len = read_varint(bytes, cursor)? as usize;
            let mut entries = Vec::with_capacity(len);
            for _ in 0..len {
                let klen = read_varint(bytes, cursor)? as usize;
                let kslice = take_slice(bytes, cursor, klen)?;
                let key = std::str::from_utf8(kslice)
                    .map_err(|e| StarlarkBridgeError::MalformedEncoding(format!("non-utf8 dict key: {e}")))?
                    .to_string();
                let value = read_encoded_at(bytes, cursor)?;
                entries.push((key, value));
            }
            Ok(EncodedValue::Dict(entries))
        }
        other => Err(StarlarkBridgeError::MalformedEncoding(format!("unknown tag {other}"))),
    }
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u64, StarlarkBridgeError> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = take_byte(bytes, cursor)?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(StarlarkBridgeError::MalformedEncoding("varint too long".to_string()));
        }
    }
}

fn take_byte(bytes: &[u8], cursor: &mut usize) -> Result<u8, StarlarkBridgeError> {
    let byte = *bytes
        .get(*cursor)
        .ok_or_else(|| StarlarkBridgeError::MalformedEncoding("unexpected end of input".to_string()))?;
    *cursor += 1;
    Ok(byte)
}

fn take_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], StarlarkBridgeError> {
    let end = *cursor + len;
    let slice = bytes
        .get(*cursor..end)
        .ok_or_else(|| StarlarkBridgeError::MalformedEncoding("unexpected end of input".to_string()))?;
    *cursor = end;
    Ok(slice)
}
