//! Interned string pool.
//!
//! Strings are stored back to back in one byte buffer with an
//! `(offset, length)` entry per id. Entry 0 is the empty sentinel.
//!
//! File format: UTF-8 text, one string per line in id order, starting with
//! the sentinel (so the file always begins with a blank line). Strings
//! containing line breaks cannot be stored.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::{invalid_id, Id, Table};
use crate::error::{Result, TableError};

crate::define_id!(
    /// Handle of an interned string.
    StringId
);

#[derive(Debug, Clone)]
pub struct StringTable {
    /// Concatenated UTF-8 bytes of every string.
    data: Vec<u8>,
    /// `(offset, length)` into `data`, indexed by raw id.
    entries: Vec<(u32, u32)>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            entries: vec![(0, 0)],
        }
    }

    /// Append `text` without deduplication. Use [`StringTableBuilder`] to
    /// intern.
    pub fn add(&mut self, text: &str) -> Result<StringId> {
        if text.contains(['\n', '\r']) {
            return Err(TableError::LineBreakInString(text.to_string()));
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(text.as_bytes());
        self.entries.push((offset, text.len() as u32));
        Ok(StringId::from_raw(self.count() as u32))
    }

    pub fn get(&self, id: StringId) -> Result<&str> {
        if !self.is_valid(id) {
            return Err(invalid_id(id, self.count()));
        }
        let (offset, length) = self.entries[id.to_raw() as usize];
        let start = offset as usize;
        let bytes = &self.data[start..start + length as usize];
        std::str::from_utf8(bytes).map_err(|e| TableError::FormatMismatch(e.to_string()))
    }

    /// Byte length of the string `id`.
    pub fn byte_len(&self, id: StringId) -> Result<usize> {
        if !self.is_valid(id) {
            return Err(invalid_id(id, self.count()));
        }
        Ok(self.entries[id.to_raw() as usize].1 as usize)
    }

    /// Total bytes of string data.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// `(id, text)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (StringId, &str)> + '_ {
        self.ids()
            .filter_map(move |id| self.get(id).ok().map(|text| (id, text)))
    }

    fn parse(&mut self, text: &str) -> Result<()> {
        let rest = text.strip_prefix('\n').ok_or_else(|| {
            TableError::FormatMismatch("string table must start with a blank sentinel line".into())
        })?;
        if !rest.is_empty() && !rest.ends_with('\n') {
            return Err(TableError::FormatMismatch(
                "string table must end with a line break".into(),
            ));
        }

        self.data.clear();
        self.entries.clear();
        self.entries.push((0, 0));
        for line in rest.split_terminator('\n') {
            if line.contains('\r') {
                return Err(TableError::FormatMismatch(format!(
                    "carriage return in string entry {:?}",
                    line
                )));
            }
            let offset = self.data.len() as u32;
            self.data.extend_from_slice(line.as_bytes());
            self.entries.push((offset, line.len() as u32));
        }
        Ok(())
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for StringTable {
    type Id = StringId;

    fn count(&self) -> usize {
        self.entries.len() - 1
    }

    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()> {
        let mut buf = Vec::with_capacity(self.data.len() + self.entries.len());
        for &(offset, length) in &self.entries {
            let start = offset as usize;
            buf.extend_from_slice(&self.data[start..start + length as usize]);
            buf.push(b'\n');
        }
        let mut file = fs::File::create(directory.join(name))?;
        file.write_all(&buf)?;
        file.flush()?;
        tracing::debug!(file = name, strings = self.count(), bytes = buf.len(), "saved string table");
        Ok(())
    }

    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()> {
        let text = fs::read_to_string(directory.join(name))?;
        self.parse(&text).map_err(|e| match e {
            TableError::FormatMismatch(msg) => TableError::FormatMismatch(format!("{}: {}", name, msg)),
            other => other,
        })?;
        tracing::debug!(file = name, strings = self.count(), "loaded string table");
        Ok(())
    }
}

// ── Builder ────────────────────────────────────────────────────────

/// Interning writer over a [`StringTable`]. Lookup is exact and
/// case-sensitive.
pub struct StringTableBuilder<'a> {
    table: &'a mut StringTable,
    lookup: HashMap<String, StringId>,
}

impl<'a> StringTableBuilder<'a> {
    pub fn new(table: &'a mut StringTable) -> Self {
        let mut lookup = HashMap::with_capacity(table.count());
        for (id, text) in table.iter() {
            lookup.entry(text.to_string()).or_insert(id);
        }
        Self { table, lookup }
    }

    pub fn get_or_add(&mut self, text: &str) -> Result<StringId> {
        if let Some(&id) = self.lookup.get(text) {
            return Ok(id);
        }
        let id = self.table.add(text)?;
        self.lookup.insert(text.to_string(), id);
        Ok(id)
    }

    pub fn get(&self, id: StringId) -> Result<&str> {
        self.table.get(id)
    }

    pub fn find(&self, text: &str) -> Option<StringId> {
        self.lookup.get(text).copied()
    }

    pub fn table(&self) -> &StringTable {
        self.table
    }
}
