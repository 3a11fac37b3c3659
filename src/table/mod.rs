//! Packed tables: typed ID spaces over contiguous, bulk-serializable storage.
//!
//! Every table defines (or shares) an ID space `[1, count]`. ID value 0 is
//! reserved as "no id" in every space, so a default-initialized id can never
//! be mistaken for a real entry.

pub mod spannable;
pub mod record;
pub mod single_value;
pub mod derived;
pub mod relation;
pub mod string_table;
pub mod name_table;

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;
use std::path::Path;

use crate::error::{Result, TableError};

pub use derived::DerivedTable;
pub use name_table::{NameEntry, NameId, NameTable, NameTableBuilder};
pub use record::FixedRecord;
pub use relation::{RelationBuilder, RelationTable};
pub use single_value::{CachingBuilder, SingleValueTable};
pub use spannable::SpannableList;
pub use string_table::{StringId, StringTable, StringTableBuilder};

// ── Identifiers ────────────────────────────────────────────────────

/// Conversion between a typed id and its raw 1-based value.
///
/// The raw value is still 1-based; subtract 1 to get a zero-based index.
/// Every id is itself a 4-byte record, so id columns persist directly.
pub trait Id: Copy + Eq + Ord + Hash + Default + Debug + Display + FixedRecord {
    /// Display name of the id kind, used in error messages.
    const KIND: &'static str;

    fn from_raw(value: u32) -> Self;

    fn to_raw(self) -> u32;

    /// Zero-based storage index. Only meaningful for non-sentinel ids.
    #[inline]
    fn index(self) -> usize {
        (self.to_raw() as usize).wrapping_sub(1)
    }

    #[inline]
    fn is_sentinel(self) -> bool {
        self.to_raw() == 0
    }
}

/// Define a newtype id. Ids of different kinds never unify.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl $crate::table::Id for $name {
            const KIND: &'static str = stringify!($name);

            #[inline]
            fn from_raw(value: u32) -> Self {
                Self(value)
            }

            #[inline]
            fn to_raw(self) -> u32 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}[{}]", stringify!($name), self.0)
            }
        }

        impl $crate::table::FixedRecord for $name {
            const SIZE: usize = 4;

            fn encode(&self, out: &mut [u8]) {
                <u32 as $crate::table::FixedRecord>::encode(&self.0, out);
            }

            fn decode(bytes: &[u8]) -> $crate::error::Result<Self> {
                Ok(Self(<u32 as $crate::table::FixedRecord>::decode(bytes)?))
            }
        }
    };
}

/// Lazy ascending sequence of the ids `[1, count]`. Cloning restarts it.
#[derive(Debug, Clone)]
pub struct IdRange<TId> {
    next: u32,
    end: u32,
    _marker: PhantomData<TId>,
}

impl<TId: Id> IdRange<TId> {
    pub fn new(count: usize) -> Self {
        Self {
            next: 1,
            end: count as u32,
            _marker: PhantomData,
        }
    }
}

impl<TId: Id> Iterator for IdRange<TId> {
    type Item = TId;

    fn next(&mut self) -> Option<TId> {
        if self.next > self.end {
            return None;
        }
        let id = TId::from_raw(self.next);
        self.next += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl<TId: Id> ExactSizeIterator for IdRange<TId> {}

// ── Table ──────────────────────────────────────────────────────────

/// An ID space plus its persistence contract.
pub trait Table {
    type Id: Id;

    /// Number of ids currently allocated (the sentinel is not counted).
    fn count(&self) -> usize;

    /// The ids `[1, count]` in ascending order.
    fn ids(&self) -> IdRange<Self::Id> {
        IdRange::new(self.count())
    }

    fn is_valid(&self, id: Self::Id) -> bool {
        let raw = id.to_raw() as usize;
        raw > 0 && raw <= self.count()
    }

    fn check_valid(&self, id: Self::Id) -> Result<()> {
        if self.is_valid(id) {
            Ok(())
        } else {
            Err(invalid_id(id, self.count()))
        }
    }

    /// Save the contents under `directory/name`.
    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()>;

    /// Load the contents from `directory/name`, discarding current contents.
    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()>;
}

pub(crate) fn invalid_id<TId: Id>(id: TId, count: usize) -> TableError {
    TableError::InvalidId {
        id: format!("{}[{}]", TId::KIND, id.to_raw()),
        count,
    }
}

/// Insert `suffix` before the extension of `name`.
///
/// `insert_suffix("PipTable.bin", "PipNameTable")` is
/// `"PipTable.PipNameTable.bin"`. Names without an extension get the suffix
/// appended.
pub fn insert_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}.{}{}", &name[..dot], suffix, &name[dot..]),
        None => format!("{}.{}", name, suffix),
    }
}
