//! Entity ids and fixed-layout records of the build graph.

use std::fmt;

use crate::error::{Result, TableError};
use crate::table::{FixedRecord, NameId, StringId};

crate::define_id!(
    /// A pip (one unit of build work).
    PipId
);
crate::define_id!(
    /// A file read or written by pips.
    FileId
);
crate::define_id!(
    /// A directory produced or consumed by pips.
    DirectoryId
);
crate::define_id!(
    /// A build worker machine.
    WorkerId
);

// ── Pip type ───────────────────────────────────────────────────────

/// Kind of pip. Stored as one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PipType {
    #[default]
    WriteFile = 0,
    CopyFile = 1,
    Process = 2,
    Ipc = 3,
    Value = 4,
    SpecFile = 5,
    Module = 6,
    HashSourceFile = 7,
    SealDirectory = 8,
}

impl PipType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::WriteFile),
            1 => Some(Self::CopyFile),
            2 => Some(Self::Process),
            3 => Some(Self::Ipc),
            4 => Some(Self::Value),
            5 => Some(Self::SpecFile),
            6 => Some(Self::Module),
            7 => Some(Self::HashSourceFile),
            8 => Some(Self::SealDirectory),
            _ => None,
        }
    }
}

impl fmt::Display for PipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FixedRecord for PipType {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut [u8]) {
        out[0] = *self as u8;
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_u8(bytes[0])
            .ok_or_else(|| TableError::FormatMismatch(format!("unknown pip type tag {}", bytes[0])))
    }
}

// ── Content flags ──────────────────────────────────────────────────

/// How a file's content came to exist, in increasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum ContentFlags {
    #[default]
    None = 0,
    Materialized = 1,
    MaterializedFromCache = 2,
    Produced = 3,
}

impl ContentFlags {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Materialized),
            2 => Some(Self::MaterializedFromCache),
            3 => Some(Self::Produced),
            _ => None,
        }
    }

    /// Keep the higher-precedence flag.
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    /// Both flags are set and say different things.
    pub fn conflicts_with(self, other: Self) -> bool {
        self != Self::None && other != Self::None && self != other
    }
}

impl FixedRecord for ContentFlags {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut [u8]) {
        out[0] = *self as u8;
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_u8(bytes[0])
            .ok_or_else(|| TableError::FormatMismatch(format!("unknown content flags {}", bytes[0])))
    }
}

// ── Records ────────────────────────────────────────────────────────

/// Pip table record, 13 bytes on disk.
///
/// ```text
/// Offset  Size  Field
/// 0       8     semi_stable_hash: i64
/// 8       4     name: NameId
/// 12      1     pip_type: u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipEntry {
    pub semi_stable_hash: i64,
    pub name: NameId,
    pub pip_type: PipType,
}

impl FixedRecord for PipEntry {
    const SIZE: usize = 13;

    fn encode(&self, out: &mut [u8]) {
        self.semi_stable_hash.encode(&mut out[0..8]);
        self.name.encode(&mut out[8..12]);
        self.pip_type.encode(&mut out[12..13]);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            semi_stable_hash: i64::decode(&bytes[0..8])?,
            name: NameId::decode(&bytes[8..12])?,
            pip_type: PipType::decode(&bytes[12..13])?,
        })
    }
}

/// File table record, 17 bytes on disk.
///
/// ```text
/// Offset  Size  Field
/// 0       4     path: NameId
/// 4       8     size_in_bytes: i64
/// 12      4     producer_pip: PipId (0 = none)
/// 16      1     content_flags: u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileEntry {
    pub path: NameId,
    pub size_in_bytes: i64,
    pub producer_pip: PipId,
    pub content_flags: ContentFlags,
}

impl FixedRecord for FileEntry {
    const SIZE: usize = 17;

    fn encode(&self, out: &mut [u8]) {
        self.path.encode(&mut out[0..4]);
        self.size_in_bytes.encode(&mut out[4..12]);
        self.producer_pip.encode(&mut out[12..16]);
        self.content_flags.encode(&mut out[16..17]);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            path: NameId::decode(&bytes[0..4])?,
            size_in_bytes: i64::decode(&bytes[4..12])?,
            producer_pip: PipId::decode(&bytes[12..16])?,
            content_flags: ContentFlags::decode(&bytes[16..17])?,
        })
    }
}

/// Directory table record, 9 bytes on disk.
///
/// ```text
/// Offset  Size  Field
/// 0       4     path: NameId
/// 4       4     producer_pip: PipId (0 = none)
/// 8       1     content_flags: u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    pub path: NameId,
    pub producer_pip: PipId,
    pub content_flags: ContentFlags,
}

impl FixedRecord for DirectoryEntry {
    const SIZE: usize = 9;

    fn encode(&self, out: &mut [u8]) {
        self.path.encode(&mut out[0..4]);
        self.producer_pip.encode(&mut out[4..8]);
        self.content_flags.encode(&mut out[8..9]);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            path: NameId::decode(&bytes[0..4])?,
            producer_pip: PipId::decode(&bytes[4..8])?,
            content_flags: ContentFlags::decode(&bytes[8..9])?,
        })
    }
}

/// Per-pip execution data, derived over the pip table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipExecutionEntry {
    pub worker: WorkerId,
}

impl FixedRecord for PipExecutionEntry {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        self.worker.encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            worker: WorkerId::decode(bytes)?,
        })
    }
}

/// Worker table value: the worker's machine name.
pub type WorkerEntry = StringId;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::record::{decode_records, encode_records};

    #[test]
    fn test_pip_type_tags() {
        for v in 0..=8u8 {
            let t = PipType::from_u8(v).unwrap();
            assert_eq!(t as u8, v);
        }
        assert!(PipType::from_u8(9).is_none());
        assert_eq!(PipType::Process.to_string(), "Process");
    }

    #[test]
    fn test_content_flags_precedence() {
        use ContentFlags::*;
        assert_eq!(None.merge(Materialized), Materialized);
        assert_eq!(Produced.merge(MaterializedFromCache), Produced);
        assert_eq!(MaterializedFromCache.merge(Materialized), MaterializedFromCache);
        assert!(Produced.conflicts_with(Materialized));
        assert!(!None.conflicts_with(Produced));
        assert!(!Produced.conflicts_with(Produced));
    }

    #[test]
    fn test_pip_entry_layout() {
        let entry = PipEntry {
            semi_stable_hash: -2,
            name: NameId::new(5),
            pip_type: PipType::SealDirectory,
        };
        let buf = encode_records(&[entry]).unwrap();
        assert_eq!(buf.len(), 4 + 13);
        assert_eq!(&buf[4..12], &(-2i64).to_le_bytes());
        assert_eq!(&buf[12..16], &5u32.to_le_bytes());
        assert_eq!(buf[16], 8);
        assert_eq!(decode_records::<PipEntry>(&buf).unwrap(), vec![entry]);
    }

    #[test]
    fn test_unknown_pip_type_rejected() {
        let entry = PipEntry::default();
        let mut buf = encode_records(&[entry]).unwrap();
        buf[16] = 42;
        let err = decode_records::<PipEntry>(&buf).unwrap_err();
        assert!(matches!(err, TableError::FormatMismatch(_)), "{}", err);
    }

    #[test]
    fn test_file_entry_layout() {
        let entry = FileEntry {
            path: NameId::new(3),
            size_in_bytes: 1 << 40,
            producer_pip: PipId::new(7),
            content_flags: ContentFlags::Produced,
        };
        let buf = encode_records(&[entry]).unwrap();
        assert_eq!(buf.len(), 4 + 17);
        assert_eq!(buf[20], 3);
        assert_eq!(decode_records::<FileEntry>(&buf).unwrap(), vec![entry]);
    }
}
