//! Extra columns over another table's id space.

use std::marker::PhantomData;
use std::path::Path;

use super::record::{load_records, save_records, FixedRecord};
use super::spannable::SpannableList;
use super::{Id, Table};
use crate::error::Result;

/// A column keyed by the ids of a base table it does not own.
///
/// Storage index is `id - 1` (no sentinel slot). Storage may lag behind the
/// base table; ids past the end read as `TValue::default()` until a `set`
/// or [`sync_with`](Self::sync_with) pads it out.
#[derive(Debug, Clone)]
pub struct DerivedTable<TId, TValue> {
    values: SpannableList<TValue>,
    _marker: PhantomData<TId>,
}

impl<TId: Id, TValue: Copy + Default> DerivedTable<TId, TValue> {
    pub fn new() -> Self {
        Self {
            values: SpannableList::new(),
            _marker: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            values: SpannableList::with_capacity(capacity)?,
            _marker: PhantomData,
        })
    }

    /// Number of stored slots. May be less than the base count.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pad storage with defaults up to `base.count()`.
    pub fn sync_with<B: Table<Id = TId>>(&mut self, base: &B) {
        let target = base.count();
        if self.values.len() < target {
            self.values.fill(target - self.values.len(), TValue::default());
        }
    }

    pub fn set<B: Table<Id = TId>>(&mut self, base: &B, id: TId, value: TValue) -> Result<()> {
        base.check_valid(id)?;
        self.sync_with(base);
        self.values.set(id.index(), value)
    }

    /// The stored value, or the default for ids never set.
    pub fn get<B: Table<Id = TId>>(&self, base: &B, id: TId) -> Result<TValue> {
        base.check_valid(id)?;
        Ok(self
            .values
            .as_slice()
            .get(id.index())
            .copied()
            .unwrap_or_default())
    }

    /// Stored values in id order, starting at id 1.
    pub fn values(&self) -> &[TValue] {
        self.values.as_slice()
    }
}

impl<TId: Id, TValue: Copy + Default> Default for DerivedTable<TId, TValue> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TId: Id, TValue: FixedRecord> Table for DerivedTable<TId, TValue> {
    type Id = TId;

    fn count(&self) -> usize {
        self.values.len()
    }

    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()> {
        save_records(directory, name, self.values.as_slice())
    }

    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()> {
        let records: Vec<TValue> = load_records(directory, name)?;
        self.values = SpannableList::from(records);
        Ok(())
    }
}
