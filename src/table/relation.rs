//! One-to-many relations in compressed sparse row (CSR) layout.
//!
//! For a from-space of size F the table keeps:
//! - `counts[f]`: number of related ids of from-id `f + 1`
//! - `offsets[f]`: start of that row in `relations`, with `offsets[0] = 0`
//!   and `offsets[f + 1] = offsets[f] + counts[f]`
//! - `relations`: every row concatenated, each row strictly ascending
//!
//! Rows are appended in from-id order, exactly once each. Only counts and
//! the flat relation array are persisted; offsets are recomputed on load.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;

use super::record::{load_records, save_records};
use super::spannable::SpannableList;
use super::{insert_suffix, invalid_id, Id, Table};
use crate::error::{Result, TableError};

/// Suffix token of the side-file holding the flat relation array.
const RELATIONS_SUFFIX: &str = "Relations";

#[derive(Debug, Clone)]
pub struct RelationTable<TFrom, TTo> {
    base_count: usize,
    related_count: usize,
    counts: SpannableList<u32>,
    offsets: SpannableList<u32>,
    relations: SpannableList<TTo>,
    _marker: PhantomData<TFrom>,
}

impl<TFrom: Id, TTo: Id> RelationTable<TFrom, TTo> {
    /// An empty relation from a space of `base_count` ids into a space of
    /// `related_count` ids. Both sizes are fixed for the table's lifetime.
    pub fn new(base_count: usize, related_count: usize) -> Self {
        Self {
            base_count,
            related_count,
            counts: SpannableList::new(),
            offsets: SpannableList::new(),
            relations: SpannableList::new(),
            _marker: PhantomData,
        }
    }

    /// Size the table from the two tables it relates.
    pub fn between<B, R>(base: &B, related: &R) -> Self
    where
        B: Table<Id = TFrom>,
        R: Table<Id = TTo>,
    {
        Self::new(base.count(), related.count())
    }

    pub fn base_count(&self) -> usize {
        self.base_count
    }

    pub fn related_count(&self) -> usize {
        self.related_count
    }

    /// Number of rows appended so far.
    pub fn filled_count(&self) -> usize {
        self.counts.len()
    }

    fn check_related(&self, id: TTo) -> Result<()> {
        let raw = id.to_raw() as usize;
        if raw == 0 || raw > self.related_count {
            return Err(invalid_id(id, self.related_count));
        }
        Ok(())
    }

    /// Append the related ids of `from`, which must be the next unfilled id.
    ///
    /// `to` must be strictly ascending and every id valid in the related
    /// space. Nothing is modified unless every check passes.
    pub fn add_relations(&mut self, from: TFrom, to: &[TTo]) -> Result<()> {
        for (index, pair) in to.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(TableError::UnsortedOrDuplicateRelation {
                    index,
                    previous: pair[0].to_raw(),
                    current: pair[1].to_raw(),
                });
            }
        }

        for &id in to {
            self.check_related(id)?;
        }

        let expected = self.counts.len() as u32 + 1;
        if from.to_raw() != expected {
            return Err(TableError::OutOfOrderAppend {
                expected,
                actual: from.to_raw(),
            });
        }
        self.check_valid(from)?;

        self.offsets.push(self.relations.len() as u32);
        self.counts.push(to.len() as u32);
        self.relations.extend_from_slice(to);
        Ok(())
    }

    /// Related ids of `from`, ascending. Empty for rows not yet filled.
    pub fn get_relations(&self, from: TFrom) -> Result<&[TTo]> {
        self.check_valid(from)?;
        let index = from.index();
        if index >= self.counts.len() {
            return Ok(&[]);
        }
        let start = self.offsets.as_slice()[index] as usize;
        let len = self.counts.as_slice()[index] as usize;
        Ok(&self.relations.as_slice()[start..start + len])
    }

    pub fn relation_count(&self, from: TFrom) -> Result<usize> {
        self.check_valid(from)?;
        Ok(self
            .counts
            .as_slice()
            .get(from.index())
            .map_or(0, |&c| c as usize))
    }

    /// Length of the flat relation array.
    pub fn total_relations(&self) -> usize {
        self.relations.len()
    }

    /// `(from, related)` for every from-id, including unfilled rows.
    pub fn iter(&self) -> impl Iterator<Item = (TFrom, &[TTo])> + '_ {
        self.ids().map(move |id| {
            let rows = self.get_relations(id).unwrap_or(&[]);
            (id, rows)
        })
    }

    /// The transpose: `t -> [f]` for every `f -> [.., t, ..]`.
    ///
    /// Every row of the result is strictly ascending, so inverting twice
    /// reproduces the original table.
    pub fn invert(&self) -> Result<RelationTable<TTo, TFrom>> {
        let mut result = RelationTable::<TTo, TFrom>::new(self.related_count, self.base_count);
        let related = self.related_count;

        // Count pass.
        result.counts.fill(related, 0);
        for &to in self.relations.iter() {
            result.counts.as_mut_slice()[to.index()] += 1;
        }

        // Offset pass.
        result.offsets.fill(related, 0);
        let mut sum: u32 = 0;
        for (offset, &count) in result
            .offsets
            .as_mut_slice()
            .iter_mut()
            .zip(result.counts.as_slice())
        {
            *offset = sum;
            sum += count;
        }

        // Scatter pass.
        result.relations.set_capacity(sum as usize);
        result.relations.fill(sum as usize, TFrom::default());
        let mut positions = vec![0u32; related];
        for from_index in 0..self.counts.len() {
            let from = TFrom::from_raw(from_index as u32 + 1);
            let start = self.offsets.as_slice()[from_index] as usize;
            let len = self.counts.as_slice()[from_index] as usize;
            for &to in &self.relations.as_slice()[start..start + len] {
                let t = to.index();
                let count = result.counts.as_slice()[t];
                let offset = result.offsets.as_slice()[t] as usize;
                let position = positions[t];
                if position >= count {
                    return Err(TableError::InvertInvariant {
                        id: to.to_raw(),
                        position: position + 1,
                        count,
                    });
                }
                result.relations.as_mut_slice()[offset + position as usize] = from;
                positions[t] = position + 1;
                if positions[t] == count {
                    result.relations.as_mut_slice()[offset..offset + count as usize].sort_unstable();
                }
            }
        }

        Ok(result)
    }

    fn recompute_offsets(&mut self) {
        self.offsets.clear();
        let mut sum: u32 = 0;
        for &count in self.counts.as_slice() {
            self.offsets.push(sum);
            sum += count;
        }
    }
}

impl<TFrom: Id, TTo: Id> Table for RelationTable<TFrom, TTo> {
    type Id = TFrom;

    fn count(&self) -> usize {
        self.base_count
    }

    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()> {
        save_records(directory, name, self.counts.as_slice())?;
        save_records(
            directory,
            &insert_suffix(name, RELATIONS_SUFFIX),
            self.relations.as_slice(),
        )
    }

    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()> {
        let counts: Vec<u32> = load_records(directory, name)?;
        let relations: Vec<TTo> =
            load_records(directory, &insert_suffix(name, RELATIONS_SUFFIX))?;

        if counts.len() > self.base_count {
            return Err(TableError::FormatMismatch(format!(
                "{}: {} rows for a from-space of {} ids",
                name,
                counts.len(),
                self.base_count
            )));
        }
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total != relations.len() as u64 {
            return Err(TableError::FormatMismatch(format!(
                "{}: counts sum to {} but {} relations stored",
                name,
                total,
                relations.len()
            )));
        }
        if let Some(bad) = relations
            .iter()
            .find(|id| id.is_sentinel() || id.to_raw() as usize > self.related_count)
        {
            return Err(TableError::FormatMismatch(format!(
                "{}: related id {} outside a space of {} ids",
                name, bad, self.related_count
            )));
        }

        let mut start = 0;
        for (index, &count) in counts.iter().enumerate() {
            let end = start + count as usize;
            if relations[start..end].windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(TableError::FormatMismatch(format!(
                    "{}: row {} is not strictly ascending",
                    name,
                    index + 1
                )));
            }
            start = end;
        }

        self.counts = SpannableList::from(counts);
        self.relations = SpannableList::from(relations);
        self.recompute_offsets();
        Ok(())
    }
}

// ── Relation builder ───────────────────────────────────────────────

/// Collects `(from, to)` pairs in any order, then appends every row of the
/// target table at once.
#[derive(Debug, Default)]
pub struct RelationBuilder<TFrom, TTo> {
    pairs: BTreeMap<TFrom, Vec<TTo>>,
}

impl<TFrom: Id, TTo: Id> RelationBuilder<TFrom, TTo> {
    pub fn new() -> Self {
        Self {
            pairs: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, from: TFrom, to: TTo) {
        self.pairs.entry(from).or_default().push(to);
    }

    /// Sort and deduplicate every row and append rows `[filled + 1, base]`
    /// to `table`, empty rows included.
    ///
    /// Every row is checked before the first one is appended, so a failure
    /// leaves `table` untouched.
    pub fn complete(mut self, table: &mut RelationTable<TFrom, TTo>) -> Result<()> {
        let first = table.filled_count() + 1;
        if let Some((&from, _)) = self.pairs.iter().next() {
            if (from.to_raw() as usize) < first {
                return Err(TableError::OutOfOrderAppend {
                    expected: first as u32,
                    actual: from.to_raw(),
                });
            }
        }
        if let Some((&last, _)) = self.pairs.iter().next_back() {
            table.check_valid(last)?;
        }
        for row in self.pairs.values_mut() {
            row.sort_unstable();
            row.dedup();
            for &to in row.iter() {
                table.check_related(to)?;
            }
        }

        for raw in first..=table.base_count() {
            let from = TFrom::from_raw(raw as u32);
            let row = self.pairs.remove(&from).unwrap_or_default();
            table.add_relations(from, &row)?;
        }
        Ok(())
    }
}
