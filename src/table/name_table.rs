//! Hierarchical names with maximal prefix sharing.
//!
//! A name like `a.b.c` is stored as a chain of entries, each pairing the id
//! of its prefix with one atom from the string pool:
//!
//! ```text
//! 1: (0, "a")
//! 2: (1, "b")
//! 3: (2, "c")
//! ```
//!
//! Adding `a.b.d` afterwards reuses entries 1 and 2 and adds one entry.

use std::path::Path;

use super::record::FixedRecord;
use super::single_value::{CachingBuilder, SingleValueTable};
use super::string_table::{StringId, StringTable, StringTableBuilder};
use super::{Id, Table};
use crate::error::{Result, TableError};

crate::define_id!(
    /// Handle of a hierarchical name.
    NameId
);

/// One link of a name chain. `prefix` is the sentinel for root atoms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NameEntry {
    pub prefix: NameId,
    pub atom: StringId,
}

impl NameEntry {
    pub fn new(prefix: NameId, atom: StringId) -> Self {
        Self { prefix, atom }
    }
}

impl FixedRecord for NameEntry {
    const SIZE: usize = 8;

    fn encode(&self, out: &mut [u8]) {
        self.prefix.encode(&mut out[0..4]);
        self.atom.encode(&mut out[4..8]);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            prefix: NameId::decode(&bytes[0..4])?,
            atom: StringId::decode(&bytes[4..8])?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NameTable {
    separator: char,
    entries: SingleValueTable<NameId, NameEntry>,
}

impl NameTable {
    pub fn new(separator: char) -> Self {
        Self {
            separator,
            entries: SingleValueTable::new(),
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn get(&self, id: NameId) -> Result<NameEntry> {
        self.entries.get(id)
    }

    /// Atoms of `id`, leaf first.
    fn atoms_leaf_first(&self, id: NameId) -> Result<Vec<StringId>> {
        let mut atoms = Vec::new();
        let mut current = id;
        while !current.is_sentinel() {
            let entry = self.entries.get(current)?;
            if entry.prefix >= current {
                return Err(TableError::FormatMismatch(format!(
                    "name entry {} has prefix {} that does not precede it",
                    current, entry.prefix
                )));
            }
            atoms.push(entry.atom);
            current = entry.prefix;
        }
        Ok(atoms)
    }

    /// Byte length of the full text of `id`, without building it.
    ///
    /// The sentinel id has length 0.
    pub fn length(&self, id: NameId, strings: &StringTable) -> Result<usize> {
        let mut len = 0;
        let mut atoms = 0;
        let mut current = id;
        while !current.is_sentinel() {
            let entry = self.entries.get(current)?;
            if entry.prefix >= current {
                return Err(TableError::FormatMismatch(format!(
                    "name entry {} has prefix {} that does not precede it",
                    current, entry.prefix
                )));
            }
            len += strings.byte_len(entry.atom)?;
            atoms += 1;
            current = entry.prefix;
        }
        if atoms > 1 {
            len += (atoms - 1) * self.separator.len_utf8();
        }
        Ok(len)
    }

    /// Append the text of `id` to `out`, root atom first.
    pub fn write_text(&self, id: NameId, strings: &StringTable, out: &mut String) -> Result<()> {
        let atoms = self.atoms_leaf_first(id)?;
        for (i, &atom) in atoms.iter().rev().enumerate() {
            if i > 0 {
                out.push(self.separator);
            }
            out.push_str(strings.get(atom)?);
        }
        Ok(())
    }

    /// Full text of `id`. The sentinel id reads as the empty string.
    pub fn get_text(&self, id: NameId, strings: &StringTable) -> Result<String> {
        let mut out = String::with_capacity(self.length(id, strings)?);
        self.write_text(id, strings, &mut out)?;
        Ok(out)
    }

    /// Id of `name` if its whole chain is already present. Linear in the
    /// table size; intended for lookups on a loaded table.
    pub fn find(&self, name: &str, strings: &StringTable) -> Option<NameId> {
        let mut prefix = NameId::default();
        for atom in name.split(self.separator).filter(|s| !s.is_empty()) {
            let parent = prefix;
            // children are always stored after their prefix
            prefix = self
                .entries
                .iter()
                .skip(parent.to_raw() as usize)
                .find(|(_, e)| e.prefix == parent && strings.get(e.atom).is_ok_and(|s| s == atom))
                .map(|(id, _)| id)?;
        }
        Some(prefix)
    }

    /// Entries in id order.
    pub fn entries(&self) -> &[NameEntry] {
        self.entries.values()
    }

    fn validate(&self) -> Result<()> {
        for (id, entry) in self.entries.iter() {
            if entry.prefix >= id {
                return Err(TableError::FormatMismatch(format!(
                    "name entry {} has prefix {} that does not precede it",
                    id, entry.prefix
                )));
            }
            if entry.atom.is_sentinel() {
                return Err(TableError::FormatMismatch(format!(
                    "name entry {} has no atom",
                    id
                )));
            }
        }
        Ok(())
    }
}

impl Table for NameTable {
    type Id = NameId;

    fn count(&self) -> usize {
        self.entries.count()
    }

    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()> {
        self.entries.save_to_file(directory, name)
    }

    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()> {
        self.entries.load_from_file(directory, name)?;
        if let Err(e) = self.validate() {
            self.entries = SingleValueTable::new();
            return Err(e);
        }
        Ok(())
    }
}

fn entry_key(entry: &NameEntry) -> NameEntry {
    *entry
}

// ── Builder ────────────────────────────────────────────────────────

/// Adds names to a [`NameTable`], interning atoms into a shared string pool.
pub struct NameTableBuilder<'a> {
    separator: char,
    entries: CachingBuilder<'a, NameId, NameEntry, NameEntry>,
}

impl<'a> NameTableBuilder<'a> {
    pub fn new(table: &'a mut NameTable) -> Self {
        Self {
            separator: table.separator,
            entries: CachingBuilder::new(&mut table.entries, entry_key),
        }
    }

    /// Id of `name`, adding any missing suffix of its chain.
    ///
    /// Empty segments are skipped, so `"a..b"` and `"/a/b/"` name the same
    /// chains as `"a.b"` and `"a/b"`. A name with no atoms yields the
    /// sentinel id.
    pub fn get_or_add(&mut self, strings: &mut StringTableBuilder<'_>, name: &str) -> Result<NameId> {
        let mut prefix = NameId::default();
        for atom in name.split(self.separator).filter(|s| !s.is_empty()) {
            let atom = strings.get_or_add(atom)?;
            prefix = self.entries.get_or_add(NameEntry::new(prefix, atom));
        }
        Ok(prefix)
    }

    pub fn separator(&self) -> char {
        self.separator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_or_add_and_text() {
        let mut strings = StringTable::new();
        let mut names = NameTable::new('.');
        let id = {
            let mut sb = StringTableBuilder::new(&mut strings);
            let mut nb = NameTableBuilder::new(&mut names);
            nb.get_or_add(&mut sb, "a.b.c").unwrap()
        };
        assert_eq!(names.count(), 3);
        assert_eq!(names.get_text(id, &strings).unwrap(), "a.b.c");
        assert_eq!(names.length(id, &strings).unwrap(), 5);
    }

    #[test]
    fn test_prefix_sharing() {
        let mut strings = StringTable::new();
        let mut names = NameTable::new('.');
        let mut sb = StringTableBuilder::new(&mut strings);
        let mut nb = NameTableBuilder::new(&mut names);
        let abc = nb.get_or_add(&mut sb, "a.b.c").unwrap();
        let abd = nb.get_or_add(&mut sb, "a.b.d").unwrap();
        let again = nb.get_or_add(&mut sb, "a.b.c").unwrap();
        drop(nb);
        drop(sb);

        assert_eq!(abc, again);
        assert_ne!(abc, abd);
        assert_eq!(names.count(), 4);
        assert_eq!(names.get(abc).unwrap().prefix, names.get(abd).unwrap().prefix);
    }

    #[test]
    fn test_empty_segments_skipped() {
        let mut strings = StringTable::new();
        let mut names = NameTable::new('/');
        let mut sb = StringTableBuilder::new(&mut strings);
        let mut nb = NameTableBuilder::new(&mut names);
        let plain = nb.get_or_add(&mut sb, "src/lib.rs").unwrap();
        let rooted = nb.get_or_add(&mut sb, "/src//lib.rs/").unwrap();
        let empty = nb.get_or_add(&mut sb, "//").unwrap();
        drop(nb);
        drop(sb);

        assert_eq!(plain, rooted);
        assert!(empty.is_sentinel());
        assert_eq!(names.get_text(empty, &strings).unwrap(), "");
        assert_eq!(names.length(empty, &strings).unwrap(), 0);
    }

    #[test]
    fn test_write_text_appends() {
        let mut strings = StringTable::new();
        let mut names = NameTable::new('/');
        let id = {
            let mut sb = StringTableBuilder::new(&mut strings);
            let mut nb = NameTableBuilder::new(&mut names);
            nb.get_or_add(&mut sb, "out/bin/tool").unwrap()
        };
        let mut buf = String::from("path: ");
        names.write_text(id, &strings, &mut buf).unwrap();
        assert_eq!(buf, "path: out/bin/tool");
    }

    #[test]
    fn test_multibyte_length() {
        let mut strings = StringTable::new();
        let mut names = NameTable::new('.');
        let id = {
            let mut sb = StringTableBuilder::new(&mut strings);
            let mut nb = NameTableBuilder::new(&mut names);
            nb.get_or_add(&mut sb, "é.ü").unwrap()
        };
        let text = names.get_text(id, &strings).unwrap();
        assert_eq!(text, "é.ü");
        assert_eq!(names.length(id, &strings).unwrap(), text.len());
    }

    #[test]
    fn test_find() {
        let mut strings = StringTable::new();
        let mut names = NameTable::new('.');
        let id = {
            let mut sb = StringTableBuilder::new(&mut strings);
            let mut nb = NameTableBuilder::new(&mut names);
            nb.get_or_add(&mut sb, "x.y").unwrap();
            nb.get_or_add(&mut sb, "y.x").unwrap();
            nb.get_or_add(&mut sb, "x.y").unwrap()
        };
        assert_eq!(names.find("x.y", &strings), Some(id));
        assert!(names.find("x.z", &strings).is_none());
        assert!(names.find("x.y.z", &strings).is_none());
        assert_eq!(names.get_text(names.find("y.x", &strings).unwrap(), &strings).unwrap(), "y.x");
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let mut strings = StringTable::new();
        let mut names = NameTable::new('.');
        let ids: Vec<NameId> = {
            let mut sb = StringTableBuilder::new(&mut strings);
            let mut nb = NameTableBuilder::new(&mut names);
            ["Pip.One", "Pip.Two", "Other"]
                .iter()
                .map(|n| nb.get_or_add(&mut sb, n).unwrap())
                .collect()
        };
        names.save_to_file(dir.path(), "Names.bin").unwrap();

        let mut loaded = NameTable::new('.');
        loaded.load_from_file(dir.path(), "Names.bin").unwrap();
        assert_eq!(loaded.entries(), names.entries());
        assert_eq!(loaded.get_text(ids[1], &strings).unwrap(), "Pip.Two");
    }

    #[test]
    fn test_load_rejects_forward_prefix() {
        let dir = TempDir::new().unwrap();
        let bad = [NameEntry::new(NameId::new(1), StringId::new(1))];
        crate::table::record::save_records(dir.path(), "Names.bin", &bad).unwrap();
        let mut names = NameTable::new('.');
        let err = names.load_from_file(dir.path(), "Names.bin").unwrap_err();
        assert!(matches!(err, TableError::FormatMismatch(_)), "{}", err);
        assert_eq!(names.count(), 0);
    }
}
