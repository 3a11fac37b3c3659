//! Fixed-layout binary records and the table file format.
//!
//! Every record type spells out its own field order and width; nothing
//! depends on in-memory layout.
//!
//! Table file format:
//! ```text
//! [record_count: i32 LE]                      // 4 bytes
//! [records: RECORD_SIZE bytes x record_count] // one contiguous block
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Result, TableError};

/// Size of the record-count header.
pub const COUNT_HEADER_SIZE: usize = 4;

/// A value with a fixed-width little-endian encoding.
pub trait FixedRecord: Copy + Default {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encode into `out` (exactly `SIZE` bytes).
    fn encode(&self, out: &mut [u8]);

    /// Decode from `bytes` (at least `SIZE` bytes).
    fn decode(bytes: &[u8]) -> Result<Self>;
}

macro_rules! impl_fixed_record_for_int {
    ($($ty:ty),*) => {
        $(
            impl FixedRecord for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..Self::SIZE]);
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_fixed_record_for_int!(u8, u16, u32, u64, i32, i64);

/// Encode `records` into one contiguous buffer, including the count header.
pub fn encode_records<T: FixedRecord>(records: &[T]) -> Result<Vec<u8>> {
    let count = i32::try_from(records.len()).map_err(|_| {
        TableError::FormatMismatch(format!(
            "{} records exceed the i32 record count header",
            records.len()
        ))
    })?;

    let mut buf = vec![0u8; COUNT_HEADER_SIZE + records.len() * T::SIZE];
    buf[..COUNT_HEADER_SIZE].copy_from_slice(&count.to_le_bytes());
    for (record, chunk) in records
        .iter()
        .zip(buf[COUNT_HEADER_SIZE..].chunks_exact_mut(T::SIZE))
    {
        record.encode(chunk);
    }
    Ok(buf)
}

/// Decode a buffer produced by [`encode_records`].
///
/// The declared record count must match the byte length exactly.
pub fn decode_records<T: FixedRecord>(bytes: &[u8]) -> Result<Vec<T>> {
    if bytes.len() < COUNT_HEADER_SIZE {
        return Err(TableError::FormatMismatch(format!(
            "table file too small: {} bytes",
            bytes.len()
        )));
    }

    let mut header = [0u8; COUNT_HEADER_SIZE];
    header.copy_from_slice(&bytes[..COUNT_HEADER_SIZE]);
    let declared = i32::from_le_bytes(header);
    if declared < 0 {
        return Err(TableError::FormatMismatch(format!(
            "negative record count {}",
            declared
        )));
    }

    let count = declared as usize;
    let body = &bytes[COUNT_HEADER_SIZE..];
    if body.len() != count * T::SIZE {
        return Err(TableError::FormatMismatch(format!(
            "declared {} records of {} bytes, found {} bytes",
            count,
            T::SIZE,
            body.len()
        )));
    }

    let mut records = Vec::with_capacity(count);
    for chunk in body.chunks_exact(T::SIZE) {
        records.push(T::decode(chunk)?);
    }
    Ok(records)
}

/// Write `records` to `directory/name`, replacing any existing file.
pub fn save_records<T: FixedRecord>(directory: &Path, name: &str, records: &[T]) -> Result<()> {
    let buf = encode_records(records)?;
    let path = directory.join(name);
    let mut file = File::create(&path)?;
    file.write_all(&buf)?;
    file.flush()?;
    tracing::debug!(file = name, records = records.len(), bytes = buf.len(), "saved table");
    Ok(())
}

/// Read the records stored at `directory/name` (memory-mapped).
pub fn load_records<T: FixedRecord>(directory: &Path, name: &str) -> Result<Vec<T>> {
    let path = directory.join(name);
    let file = File::open(&path)?;
    let len = file.metadata()?.len() as usize;
    if len < COUNT_HEADER_SIZE {
        return Err(TableError::FormatMismatch(format!(
            "{}: table file too small: {} bytes",
            name, len
        )));
    }

    // Safety: the file is opened read-only and only read during this call.
    let mmap = unsafe { Mmap::map(&file) }?;
    let records = decode_records(&mmap).map_err(|e| match e {
        TableError::FormatMismatch(msg) => TableError::FormatMismatch(format!("{}: {}", name, msg)),
        other => other,
    })?;
    tracing::debug!(file = name, records = records.len(), "loaded table");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_layout() {
        let buf = encode_records(&[1u32, 0x0102_0304]).unwrap();
        assert_eq!(buf.len(), 4 + 2 * 4);
        assert_eq!(&buf[0..4], &2i32.to_le_bytes());
        assert_eq!(&buf[4..8], &1u32.to_le_bytes());
        assert_eq!(&buf[8..12], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let buf = encode_records::<i64>(&[]).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
        let decoded: Vec<i64> = decode_records(&buf).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_negative_values_roundtrip() {
        let buf = encode_records(&[-1i64, i64::MIN, 5]).unwrap();
        let decoded: Vec<i64> = decode_records(&buf).unwrap();
        assert_eq!(decoded, vec![-1, i64::MIN, 5]);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut buf = encode_records(&[1u32, 2, 3]).unwrap();
        buf.truncate(buf.len() - 1);
        let err = decode_records::<u32>(&buf).unwrap_err();
        assert!(matches!(err, TableError::FormatMismatch(_)), "{}", err);

        let mut buf = encode_records(&[1u32]).unwrap();
        buf[0..4].copy_from_slice(&5i32.to_le_bytes());
        let err = decode_records::<u32>(&buf).unwrap_err();
        assert!(err.to_string().contains("declared 5 records"), "{}", err);
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut buf = encode_records(&[9u8]).unwrap();
        buf.push(0);
        assert!(decode_records::<u8>(&buf).is_err());
    }

    #[test]
    fn test_negative_count_rejected() {
        let buf = (-1i32).to_le_bytes();
        let err = decode_records::<u32>(&buf).unwrap_err();
        assert!(err.to_string().contains("negative record count"));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        save_records(dir.path(), "values.bin", &[10u64, 20, 30]).unwrap();
        let loaded: Vec<u64> = load_records(dir.path(), "values.bin").unwrap();
        assert_eq!(loaded, vec![10, 20, 30]);
    }

    #[test]
    fn test_load_tiny_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tiny.bin"), [1u8, 2]).unwrap();
        let err = load_records::<u32>(dir.path(), "tiny.bin").unwrap_err();
        assert!(err.to_string().contains("tiny.bin"), "{}", err);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_records::<u32>(dir.path(), "missing.bin").unwrap_err();
        assert!(matches!(err, TableError::Io(_)));
    }
}
