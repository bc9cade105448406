//! Property value codec: inline blocks, overflow strings and arrays.

use crate::primitives::store::DynamicStore;
use crate::types::{BatchError, Result};

use super::record::BlockValue;
use super::stores::PropertyStores;
use super::types::PropValue;

pub const ARRAY_BOOL: u8 = 1;
pub const ARRAY_INT: u8 = 2;
pub const ARRAY_FLOAT: u8 = 3;
pub const ARRAY_STR: u8 = 4;

/// Encodes `value` into a block, spilling long payloads into the dynamic stores.
pub fn encode_value(value: &PropValue, stores: &mut PropertyStores) -> Result<BlockValue> {
    let limit = stores.short_string_max_bytes;
    Ok(match value {
        PropValue::Bool(v) => BlockValue::Bool(*v),
        PropValue::Int(v) => BlockValue::Int(*v),
        PropValue::Float(v) => BlockValue::Float(v.to_bits()),
        PropValue::Str(s) if s.len() <= limit => BlockValue::ShortStr(s.clone()),
        PropValue::Str(s) => BlockValue::LongStr {
            first: stores.strings.allocate_chain(s.as_bytes())?,
        },
        PropValue::Bytes(b) if b.len() <= limit => BlockValue::ShortBytes(b.clone()),
        PropValue::Bytes(b) => BlockValue::LongBytes {
            first: stores.strings.allocate_chain(b)?,
        },
        array => {
            let mut bytes = Vec::new();
            encode_array(array, &mut bytes)?;
            BlockValue::Array {
                first: stores.arrays.allocate_chain(&bytes)?,
            }
        }
    })
}

/// Decodes a block back into a value.
pub fn decode_value(value: &BlockValue, stores: &PropertyStores) -> Result<PropValue> {
    Ok(match value {
        BlockValue::Bool(v) => PropValue::Bool(*v),
        BlockValue::Int(v) => PropValue::Int(*v),
        BlockValue::Float(bits) => PropValue::Float(f64::from_bits(*bits)),
        BlockValue::ShortStr(s) => PropValue::Str(s.clone()),
        BlockValue::ShortBytes(b) => PropValue::Bytes(b.clone()),
        BlockValue::LongStr { first } => {
            let bytes = stores.strings.read_chain(*first)?;
            PropValue::Str(utf8(bytes)?)
        }
        BlockValue::LongBytes { first } => PropValue::Bytes(stores.strings.read_chain(*first)?),
        BlockValue::Array { first } => decode_array(&stores.arrays.read_chain(*first)?)?,
    })
}

/// Frees the overflow records of `value`, if it has any.
pub fn release_value(value: &BlockValue, stores: &mut PropertyStores) -> Result<()> {
    match value {
        BlockValue::LongStr { first } | BlockValue::LongBytes { first } => {
            stores.strings.free_chain(*first)?;
        }
        BlockValue::Array { first } => {
            stores.arrays.free_chain(*first)?;
        }
        _ => {}
    }
    Ok(())
}

/// Writes `name` into a name store and returns the first record id.
pub fn write_name(store: &mut DynamicStore, name: &str) -> Result<u64> {
    store.allocate_chain(name.as_bytes())
}

/// Reads a name written by [`write_name`].
pub fn read_name(store: &DynamicStore, first: u64) -> Result<String> {
    utf8(store.read_chain(first)?)
}

/// Canonical byte form of a value, used as an index key component.
pub fn value_key(value: &PropValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        PropValue::Bool(v) => {
            out.push(0x10);
            out.push(u8::from(*v));
        }
        PropValue::Int(v) => {
            out.push(0x20);
            write_var_i64(*v, out);
        }
        PropValue::Float(v) => {
            out.push(0x30);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        PropValue::Str(s) => {
            out.push(0x40);
            write_var_u64(s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
        PropValue::Bytes(b) => {
            out.push(0x50);
            write_var_u64(b.len() as u64, out);
            out.extend_from_slice(b);
        }
        array => {
            out.push(0x60);
            encode_array(array, out)?;
        }
    }
    Ok(())
}

fn encode_array(value: &PropValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        PropValue::BoolArray(items) => {
            out.push(ARRAY_BOOL);
            write_var_u64(items.len() as u64, out);
            out.extend(items.iter().map(|v| u8::from(*v)));
        }
        PropValue::IntArray(items) => {
            out.push(ARRAY_INT);
            write_var_u64(items.len() as u64, out);
            for v in items {
                write_var_i64(*v, out);
            }
        }
        PropValue::FloatArray(items) => {
            out.push(ARRAY_FLOAT);
            write_var_u64(items.len() as u64, out);
            for v in items {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        PropValue::StrArray(items) => {
            out.push(ARRAY_STR);
            write_var_u64(items.len() as u64, out);
            for s in items {
                write_var_u64(s.len() as u64, out);
                out.extend_from_slice(s.as_bytes());
            }
        }
        scalar => {
            return Err(BatchError::Invalid(format!(
                "{} is not an array value",
                scalar.type_name()
            )))
        }
    }
    Ok(())
}

fn decode_array(buf: &[u8]) -> Result<PropValue> {
    let Some((&tag, _)) = buf.split_first() else {
        return Err(BatchError::corruption("array payload empty"));
    };
    let mut cursor = 1usize;
    let len = read_var_u64(buf, &mut cursor)? as usize;
    if len > buf.len() {
        return Err(BatchError::corruption("array length exceeds payload"));
    }
    let value = match tag {
        ARRAY_BOOL => {
            let bytes = take(buf, &mut cursor, len)?;
            PropValue::BoolArray(bytes.iter().map(|b| *b != 0).collect())
        }
        ARRAY_INT => {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(read_var_i64(buf, &mut cursor)?);
            }
            PropValue::IntArray(items)
        }
        ARRAY_FLOAT => {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(take(buf, &mut cursor, 8)?);
                items.push(f64::from_le_bytes(raw));
            }
            PropValue::FloatArray(items)
        }
        ARRAY_STR => {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let n = read_var_u64(buf, &mut cursor)? as usize;
                items.push(utf8(take(buf, &mut cursor, n)?.to_vec())?);
            }
            PropValue::StrArray(items)
        }
        other => {
            return Err(BatchError::corruption(format!(
                "unknown array tag 0x{other:02X}"
            )))
        }
    };
    if cursor != buf.len() {
        return Err(BatchError::corruption("trailing bytes after array"));
    }
    Ok(value)
}

fn take<'a>(buf: &'a [u8], cursor: &mut usize, n: usize) -> Result<&'a [u8]> {
    let end = cursor
        .checked_add(n)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| BatchError::corruption("array payload truncated"))?;
    let out = &buf[*cursor..end];
    *cursor = end;
    Ok(out)
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| BatchError::corruption("string value not valid UTF-8"))
}

pub(crate) fn write_var_u64(mut v: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            break;
        } else {
            out.push(byte | 0x80);
        }
    }
}

fn write_var_i64(v: i64, out: &mut Vec<u8>) {
    let zigzag = ((v << 1) ^ (v >> 63)) as u64;
    write_var_u64(zigzag, out);
}

pub(crate) fn read_var_u64(buf: &[u8], cursor: &mut usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for _ in 0..10 {
        if *cursor >= buf.len() {
            return Err(BatchError::corruption("varint truncated"));
        }
        let byte = buf[*cursor];
        *cursor += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if (byte & 0x80) == 0 {
            return Ok(result);
        }
        shift += 7;
    }
    Err(BatchError::corruption("varint too long"))
}

fn read_var_i64(buf: &[u8], cursor: &mut usize) -> Result<i64> {
    let raw = read_var_u64(buf, cursor)?;
    Ok(((raw >> 1) as i64) ^ (-((raw & 1) as i64)))
}
