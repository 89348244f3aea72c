//! Row encoding/decoding for storage
//!
//! Key format: `t:{table_name}:r:{row_id}` where `row_id` is the table's
//! integer key with the sign bit flipped, stored big-endian, so byte order
//! equals numeric key order (negative keys included).
//!
//! Value format: `[num_cols:u16 LE]` followed by one `[tag:u8][data...]`
//! per column.

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

const SIGN_BIT: u64 = 1 << 63;

/// Map a signed table key onto an order-preserving row id
pub fn key_to_row_id(key: i64) -> u64 {
    (key as u64) ^ SIGN_BIT
}

/// Inverse of [`key_to_row_id`]
pub fn row_id_to_key(row_id: u64) -> i64 {
    (row_id ^ SIGN_BIT) as i64
}

/// Encode a table row key
pub fn encode_row_key(table: &str, key: i64) -> Vec<u8> {
    let mut out = table_key_prefix(table);
    out.extend_from_slice(&key_to_row_id(key).to_be_bytes());
    out
}

/// Decode a table row key into `(table_name, key)`
pub fn decode_row_key(key: &[u8]) -> ExecutorResult<(String, i64)> {
    let body = key
        .strip_prefix(b"t:")
        .ok_or_else(|| ExecutorError::Encoding("invalid key prefix".to_string()))?;
    if body.len() < 3 + 8 {
        return Err(ExecutorError::Encoding("row key too short".to_string()));
    }
    let (head, id_bytes) = body.split_at(body.len() - 8);
    let table = head
        .strip_suffix(b":r:")
        .ok_or_else(|| ExecutorError::Encoding("missing :r: separator".to_string()))?;
    let table = String::from_utf8(table.to_vec())
        .map_err(|_| ExecutorError::Encoding("invalid table name encoding".to_string()))?;
    let row_id = u64::from_be_bytes(fixed::<8>(id_bytes)?);
    Ok((table, row_id_to_key(row_id)))
}

/// Key prefix shared by all rows of a table
pub fn table_key_prefix(table: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(table.len() + 13);
    prefix.extend_from_slice(b"t:");
    prefix.extend_from_slice(table.as_bytes());
    prefix.extend_from_slice(b":r:");
    prefix
}

/// Exclusive end key for scanning all rows in a table
pub fn table_key_end(table: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(table.len() + 5);
    end.extend_from_slice(b"t:");
    end.extend_from_slice(table.as_bytes());
    end.extend_from_slice(b":s"); // 's' > 'r'
    end
}

/// Half-open storage range covering keys in `low..=high`
///
/// Returns `None` when the range is empty.
pub fn key_range(table: &str, low: Option<i64>, high: Option<i64>) -> Option<(Vec<u8>, Vec<u8>)> {
    let start = match low {
        Some(lo) => encode_row_key(table, lo),
        None => table_key_prefix(table),
    };
    let end = match high {
        Some(i64::MAX) | None => table_key_end(table),
        Some(hi) => encode_row_key(table, hi + 1),
    };
    (start < end).then_some((start, end))
}

// Datum type tags
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;

/// Encode a row value
pub fn encode_row(row: &Row) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(row.len() as u16).to_le_bytes());
    for datum in row.iter() {
        encode_datum(&mut buf, datum);
    }
    buf
}

fn encode_datum(buf: &mut Vec<u8>, datum: &Datum) {
    match datum {
        Datum::Null => buf.push(TAG_NULL),
        Datum::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Datum::Int(i) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Datum::Float(f) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Datum::String(s) => {
            buf.push(TAG_STRING);
            encode_len_prefixed(buf, s.as_bytes());
        }
    }
}

fn encode_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Decode a row value
pub fn decode_row(data: &[u8]) -> ExecutorResult<Row> {
    let mut reader = Reader { data };
    let num_cols = u16::from_le_bytes(reader.array::<2>("column count")?) as usize;
    let mut values = Vec::with_capacity(num_cols);
    for _ in 0..num_cols {
        values.push(reader.datum()?);
    }
    if !reader.data.is_empty() {
        return Err(ExecutorError::Encoding(format!(
            "{} trailing bytes after row",
            reader.data.len()
        )));
    }
    Ok(Row::new(values))
}

fn fixed<const N: usize>(bytes: &[u8]) -> ExecutorResult<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| ExecutorError::Encoding(format!("expected {} bytes", N)))
}

/// Forward-only cursor over an encoded row
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> ExecutorResult<&'a [u8]> {
        if self.data.len() < n {
            return Err(ExecutorError::Encoding(format!("{} data too short", what)));
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, what: &str) -> ExecutorResult<[u8; N]> {
        fixed::<N>(self.take(N, what)?)
    }

    fn len_prefixed(&mut self, what: &str) -> ExecutorResult<&'a [u8]> {
        let len = u32::from_le_bytes(self.array::<4>(what)?) as usize;
        self.take(len, what)
    }

    fn datum(&mut self) -> ExecutorResult<Datum> {
        let [tag] = self.array::<1>("datum tag")?;
        match tag {
            TAG_NULL => Ok(Datum::Null),
            TAG_BOOL => {
                let [b] = self.array::<1>("bool")?;
                Ok(Datum::Bool(b != 0))
            }
            TAG_INT => Ok(Datum::Int(i64::from_le_bytes(self.array("int")?))),
            TAG_FLOAT => Ok(Datum::Float(f64::from_le_bytes(self.array("float")?))),
            TAG_STRING => {
                let bytes = self.len_prefixed("string")?;
                String::from_utf8(bytes.to_vec())
                    .map(Datum::String)
                    .map_err(|_| ExecutorError::Encoding("invalid utf8 in string".to_string()))
            }
            _ => Err(ExecutorError::Encoding(format!("unknown datum tag: {}", tag))),
        }
    }
}
