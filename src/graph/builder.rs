//! Write access to the entity tables of a [`PackedGraph`].

use crate::error::Result;
use crate::table::{
    invalid_id, CachingBuilder, DerivedTable, Id, NameId, NameTableBuilder, StringId,
    StringTableBuilder, Table,
};

use super::types::{
    ContentFlags, DirectoryEntry, DirectoryId, FileEntry, FileId, PipEntry, PipExecutionEntry,
    PipId, PipType, WorkerId,
};
use super::PackedGraph;

fn pip_key(entry: &PipEntry) -> i64 {
    entry.semi_stable_hash
}

fn file_key(entry: &FileEntry) -> NameId {
    entry.path
}

fn directory_key(entry: &DirectoryEntry) -> NameId {
    entry.path
}

fn worker_key(name: &StringId) -> StringId {
    *name
}

fn merge_file(old: FileEntry, new: FileEntry) -> FileEntry {
    if old.content_flags.conflicts_with(new.content_flags) {
        tracing::warn!(
            path = %old.path,
            existing = ?old.content_flags,
            incoming = ?new.content_flags,
            "Conflicting content flags for file; keeping higher precedence"
        );
    }
    FileEntry {
        path: old.path,
        size_in_bytes: if new.size_in_bytes != 0 {
            new.size_in_bytes
        } else {
            old.size_in_bytes
        },
        producer_pip: if new.producer_pip.is_sentinel() {
            old.producer_pip
        } else {
            new.producer_pip
        },
        content_flags: old.content_flags.merge(new.content_flags),
    }
}

fn merge_directory(old: DirectoryEntry, new: DirectoryEntry) -> DirectoryEntry {
    if old.content_flags.conflicts_with(new.content_flags) {
        tracing::warn!(
            path = %old.path,
            existing = ?old.content_flags,
            incoming = ?new.content_flags,
            "Conflicting content flags for directory; keeping higher precedence"
        );
    }
    DirectoryEntry {
        path: old.path,
        producer_pip: if new.producer_pip.is_sentinel() {
            old.producer_pip
        } else {
            new.producer_pip
        },
        content_flags: old.content_flags.merge(new.content_flags),
    }
}

/// Populates pips, files, directories and workers, interning every name
/// into the graph's string pool.
///
/// Holds disjoint mutable borrows of the graph's tables; drop it before
/// constructing relation tables.
pub struct PackedGraphBuilder<'a> {
    strings: StringTableBuilder<'a>,
    pip_names: NameTableBuilder<'a>,
    paths: NameTableBuilder<'a>,
    pips: CachingBuilder<'a, PipId, PipEntry, i64>,
    files: CachingBuilder<'a, FileId, FileEntry, NameId>,
    directories: CachingBuilder<'a, DirectoryId, DirectoryEntry, NameId>,
    workers: CachingBuilder<'a, WorkerId, StringId, StringId>,
    pip_executions: &'a mut DerivedTable<PipId, PipExecutionEntry>,
}

impl<'a> PackedGraphBuilder<'a> {
    pub fn new(graph: &'a mut PackedGraph) -> Self {
        let PackedGraph {
            strings,
            pips,
            paths,
            files,
            directories,
            workers,
            pip_executions,
            ..
        } = graph;

        Self {
            strings: StringTableBuilder::new(strings),
            pip_names: NameTableBuilder::new(&mut pips.names),
            paths: NameTableBuilder::new(paths),
            pips: CachingBuilder::new(&mut pips.entries, pip_key),
            files: CachingBuilder::new(files, file_key),
            directories: CachingBuilder::new(directories, directory_key),
            workers: CachingBuilder::new(workers, worker_key),
            pip_executions,
        }
    }

    /// The shared string pool.
    pub fn strings(&mut self) -> &mut StringTableBuilder<'a> {
        &mut self.strings
    }

    /// Add a pip, or return the pip already registered under `semi_stable_hash`.
    pub fn add_pip(&mut self, semi_stable_hash: i64, name: &str, pip_type: PipType) -> Result<PipId> {
        if let Some(existing) = self.pips.find(&PipEntry {
            semi_stable_hash,
            ..PipEntry::default()
        }) {
            return Ok(existing);
        }

        let name = self.pip_names.get_or_add(&mut self.strings, name)?;
        if name.is_sentinel() {
            return Err(invalid_id(name, 0));
        }
        Ok(self.pips.get_or_add(PipEntry {
            semi_stable_hash,
            name,
            pip_type,
        }))
    }

    /// Add a file, or merge into the file already registered at `path`.
    ///
    /// A merge keeps the higher-precedence content flags, a non-zero size
    /// and a non-sentinel producer from the incoming values.
    pub fn get_or_add_file(
        &mut self,
        path: &str,
        size_in_bytes: i64,
        producer_pip: PipId,
        content_flags: ContentFlags,
    ) -> Result<FileId> {
        self.check_producer(producer_pip)?;
        let path = self.path_id(path)?;
        self.files.get_or_add_with(
            FileEntry {
                path,
                size_in_bytes,
                producer_pip,
                content_flags,
            },
            merge_file,
        )
    }

    /// Add a directory, or merge into the directory already registered at
    /// `path`.
    pub fn get_or_add_directory(
        &mut self,
        path: &str,
        producer_pip: PipId,
        content_flags: ContentFlags,
    ) -> Result<DirectoryId> {
        self.check_producer(producer_pip)?;
        let path = self.path_id(path)?;
        self.directories.get_or_add_with(
            DirectoryEntry {
                path,
                producer_pip,
                content_flags,
            },
            merge_directory,
        )
    }

    pub fn get_or_add_worker(&mut self, machine_name: &str) -> Result<WorkerId> {
        let name = self.strings.get_or_add(machine_name)?;
        Ok(self.workers.get_or_add(name))
    }

    /// Record the pip that produced `file`.
    pub fn set_file_producer(&mut self, file: FileId, producer_pip: PipId) -> Result<()> {
        self.pips.table().check_valid(producer_pip)?;
        let entry = self.files.get(file)?;
        self.files.set(
            file,
            FileEntry {
                producer_pip,
                ..entry
            },
        )
    }

    /// Record the worker `pip` executed on.
    pub fn set_pip_worker(&mut self, pip: PipId, worker: WorkerId) -> Result<()> {
        self.workers.table().check_valid(worker)?;
        self.pip_executions
            .set(self.pips.table(), pip, PipExecutionEntry { worker })
    }

    pub fn pip_count(&self) -> usize {
        self.pips.table().count()
    }

    pub fn file_count(&self) -> usize {
        self.files.table().count()
    }

    pub fn directory_count(&self) -> usize {
        self.directories.table().count()
    }

    fn path_id(&mut self, path: &str) -> Result<NameId> {
        let id = self.paths.get_or_add(&mut self.strings, path)?;
        if id.is_sentinel() {
            return Err(invalid_id(id, 0));
        }
        Ok(id)
    }

    fn check_producer(&self, producer_pip: PipId) -> Result<()> {
        if producer_pip.is_sentinel() {
            return Ok(());
        }
        self.pips.table().check_valid(producer_pip)
    }
}
