//! Base tables: one dense value per id, plus a deduplicating builder.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::path::Path;

use super::record::{load_records, save_records, FixedRecord};
use super::spannable::SpannableList;
use super::{Id, Table};
use crate::error::Result;

/// One value per id. Slot 0 permanently holds `TValue::default()`, so the
/// storage index of an id is its raw value.
#[derive(Debug, Clone)]
pub struct SingleValueTable<TId, TValue> {
    values: SpannableList<TValue>,
    _marker: PhantomData<TId>,
}

impl<TId: Id, TValue: FixedRecord> SingleValueTable<TId, TValue> {
    pub fn new() -> Self {
        let mut values = SpannableList::new();
        values.push(TValue::default());
        Self {
            values,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut values = SpannableList::with_capacity(capacity)?;
        values.push(TValue::default());
        Ok(Self {
            values,
            _marker: PhantomData,
        })
    }

    /// Append `value` and return its newly allocated id.
    pub fn add(&mut self, value: TValue) -> TId {
        self.values.push(value);
        TId::from_raw((self.values.len() - 1) as u32)
    }

    pub fn get(&self, id: TId) -> Result<TValue> {
        self.check_valid(id)?;
        self.values.get(id.to_raw() as usize)
    }

    /// Overwrite the value stored for an existing id.
    pub fn set(&mut self, id: TId, value: TValue) -> Result<()> {
        self.check_valid(id)?;
        self.values.set(id.to_raw() as usize, value)
    }

    /// The values for ids `[1, count]`, in id order.
    pub fn values(&self) -> &[TValue] {
        &self.values.as_slice()[1..]
    }

    /// `(id, value)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (TId, TValue)> + '_ {
        self.values()
            .iter()
            .enumerate()
            .map(|(i, v)| (TId::from_raw(i as u32 + 1), *v))
    }

    fn reset(&mut self) {
        self.values.clear();
        self.values.push(TValue::default());
    }
}

impl<TId: Id, TValue: FixedRecord> Default for SingleValueTable<TId, TValue> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TId: Id, TValue: FixedRecord> Table for SingleValueTable<TId, TValue> {
    type Id = TId;

    fn count(&self) -> usize {
        self.values.len() - 1
    }

    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()> {
        save_records(directory, name, self.values())
    }

    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()> {
        let records: Vec<TValue> = load_records(directory, name)?;
        self.reset();
        self.values.extend_from_slice(&records);
        Ok(())
    }
}

// ── Caching builder ────────────────────────────────────────────────

/// Deduplicating writer over a [`SingleValueTable`].
///
/// Values are identified by `key(value)`. Existing entries are replayed into
/// the lookup on construction, so building on top of a loaded table keeps
/// previously allocated ids.
pub struct CachingBuilder<'a, TId, TValue, K> {
    table: &'a mut SingleValueTable<TId, TValue>,
    key: fn(&TValue) -> K,
    lookup: HashMap<K, TId>,
}

impl<'a, TId, TValue, K> CachingBuilder<'a, TId, TValue, K>
where
    TId: Id,
    TValue: FixedRecord,
    K: Eq + Hash,
{
    pub fn new(table: &'a mut SingleValueTable<TId, TValue>, key: fn(&TValue) -> K) -> Self {
        let mut lookup = HashMap::with_capacity(table.values().len());
        for (id, value) in table.iter() {
            lookup.entry(key(&value)).or_insert(id);
        }
        Self { table, key, lookup }
    }

    /// Id of the entry with the same key as `value`, adding it if absent.
    pub fn get_or_add(&mut self, value: TValue) -> TId {
        let k = (self.key)(&value);
        if let Some(&id) = self.lookup.get(&k) {
            return id;
        }
        let id = self.table.add(value);
        self.lookup.insert(k, id);
        id
    }

    /// Like [`get_or_add`](Self::get_or_add), but an existing entry is
    /// replaced with `merge(existing, value)`.
    pub fn get_or_add_with<F>(&mut self, value: TValue, merge: F) -> Result<TId>
    where
        F: FnOnce(TValue, TValue) -> TValue,
    {
        let k = (self.key)(&value);
        if let Some(&id) = self.lookup.get(&k) {
            let existing = self.table.get(id)?;
            self.table.set(id, merge(existing, value))?;
            return Ok(id);
        }
        let id = self.table.add(value);
        self.lookup.insert(k, id);
        Ok(id)
    }

    /// Append unconditionally. The lookup now resolves the key to the new id.
    pub fn add(&mut self, value: TValue) -> TId {
        let id = self.table.add(value);
        self.lookup.insert((self.key)(&value), id);
        id
    }

    pub fn get(&self, id: TId) -> Result<TValue> {
        self.table.get(id)
    }

    /// The underlying table, read-only.
    pub fn table(&self) -> &SingleValueTable<TId, TValue> {
        self.table
    }

    pub fn set(&mut self, id: TId, value: TValue) -> Result<()> {
        self.table.set(id, value)
    }

    /// Id previously recorded for `value`'s key, without adding.
    pub fn find(&self, value: &TValue) -> Option<TId> {
        self.lookup.get(&(self.key)(value)).copied()
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use tempfile::TempDir;

    crate::define_id!(ValueId);

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Pair {
        key: u32,
        weight: i64,
    }

    impl FixedRecord for Pair {
        const SIZE: usize = 12;

        fn encode(&self, out: &mut [u8]) {
            self.key.encode(&mut out[..4]);
            self.weight.encode(&mut out[4..12]);
        }

        fn decode(bytes: &[u8]) -> Result<Self> {
            Ok(Self {
                key: u32::decode(&bytes[..4])?,
                weight: i64::decode(&bytes[4..12])?,
            })
        }
    }

    fn pair_key(p: &Pair) -> u32 {
        p.key
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = SingleValueTable::<ValueId, u32>::new();
        assert_eq!(table.count(), 0);
        assert_eq!(table.ids().count(), 0);
        assert!(!table.is_valid(ValueId::new(0)));
        assert!(!table.is_valid(ValueId::new(1)));
    }

    #[test]
    fn test_add_allocates_sequential_ids() {
        let mut table = SingleValueTable::<ValueId, u32>::new();
        assert_eq!(table.add(10), ValueId::new(1));
        assert_eq!(table.add(20), ValueId::new(2));
        assert_eq!(table.count(), 2);
        assert_eq!(table.get(ValueId::new(2)).unwrap(), 20);
        assert_eq!(table.values(), &[10, 20]);
    }

    #[test]
    fn test_sentinel_is_invalid() {
        let mut table = SingleValueTable::<ValueId, u32>::new();
        table.add(1);
        let err = table.get(ValueId::new(0)).unwrap_err();
        assert!(matches!(err, TableError::InvalidId { count: 1, .. }), "{}", err);
        assert!(table.get(ValueId::new(2)).is_err());
    }

    #[test]
    fn test_set_overwrites() {
        let mut table = SingleValueTable::<ValueId, i64>::new();
        let id = table.add(1);
        table.set(id, -5).unwrap();
        assert_eq!(table.get(id).unwrap(), -5);
        assert!(table.set(ValueId::new(9), 0).is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(SingleValueTable::<ValueId, u32>::with_capacity(0).is_err());
        let table = SingleValueTable::<ValueId, u32>::with_capacity(1).unwrap();
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut table = SingleValueTable::<ValueId, u64>::new();
        table.add(7);
        table.add(8);
        table.add(9);
        table.save_to_file(dir.path(), "Values.bin").unwrap();

        let mut loaded = SingleValueTable::<ValueId, u64>::new();
        loaded.add(100);
        loaded.load_from_file(dir.path(), "Values.bin").unwrap();
        assert_eq!(loaded.count(), 3);
        assert_eq!(loaded.values(), table.values());
        assert_eq!(loaded.get(ValueId::new(1)).unwrap(), 7);
    }

    #[test]
    fn test_caching_builder_dedups() {
        let mut table = SingleValueTable::<ValueId, Pair>::new();
        let mut builder = CachingBuilder::new(&mut table, pair_key);
        let a = builder.get_or_add(Pair { key: 1, weight: 10 });
        let b = builder.get_or_add(Pair { key: 2, weight: 20 });
        let again = builder.get_or_add(Pair { key: 1, weight: 99 });
        assert_eq!(a, again);
        assert_ne!(a, b);
        // first value wins without a merge
        assert_eq!(builder.get(a).unwrap().weight, 10);
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_caching_builder_merge() {
        let mut table = SingleValueTable::<ValueId, Pair>::new();
        let mut builder = CachingBuilder::new(&mut table, pair_key);
        let id = builder
            .get_or_add_with(Pair { key: 3, weight: 5 }, |_, new| new)
            .unwrap();
        let same = builder
            .get_or_add_with(Pair { key: 3, weight: 2 }, |old, new| Pair {
                key: old.key,
                weight: old.weight.max(new.weight),
            })
            .unwrap();
        assert_eq!(id, same);
        assert_eq!(builder.get(id).unwrap().weight, 5);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_caching_builder_replays_existing() {
        let mut table = SingleValueTable::<ValueId, Pair>::new();
        let existing = table.add(Pair { key: 4, weight: 1 });

        let mut builder = CachingBuilder::new(&mut table, pair_key);
        assert_eq!(builder.find(&Pair { key: 4, weight: 0 }), Some(existing));
        assert_eq!(builder.get_or_add(Pair { key: 4, weight: 2 }), existing);
        let added = builder.get_or_add(Pair { key: 5, weight: 2 });
        assert_eq!(added, ValueId::new(2));
    }
}
