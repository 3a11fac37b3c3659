//! The packed build graph: every entity table, the relations between them,
//! and the string pool they share.
//!
//! # Storage Layout
//!
//! ```text
//! <graph dir>/
//! +-- graph_config.json                  # GraphConfig
//! +-- StringTable.bin                    # newline-delimited string pool
//! +-- PipTable.bin                       # PipEntry records
//! +-- PipTable.PipNameTable.bin          # pip name chains
//! +-- PipTable.PipExecutionTable.bin     # per-pip worker
//! +-- PathTable.bin                      # shared file/directory path chains
//! +-- FileTable.bin
//! +-- DirectoryTable.bin
//! +-- WorkerTable.bin
//! +-- PipDependencies.bin                # relation counts, only after
//! +-- PipDependencies.Relations.bin      # construct_relation_tables()
//! +-- ...                                # other relation tables
//! ```

pub mod builder;
pub mod types;

use std::path::Path;

use crate::config::GraphConfig;
use crate::error::{Result, TableError};
use crate::table::{
    insert_suffix, DerivedTable, Id, NameId, NameTable, RelationTable, SingleValueTable,
    StringTable, Table,
};

pub use builder::PackedGraphBuilder;
pub use types::{
    ContentFlags, DirectoryEntry, DirectoryId, FileEntry, FileId, PipEntry, PipExecutionEntry,
    PipId, PipType, WorkerEntry, WorkerId,
};

pub const STRING_TABLE_FILE: &str = "StringTable.bin";
pub const PIP_TABLE_FILE: &str = "PipTable.bin";
pub const PATH_TABLE_FILE: &str = "PathTable.bin";
pub const FILE_TABLE_FILE: &str = "FileTable.bin";
pub const DIRECTORY_TABLE_FILE: &str = "DirectoryTable.bin";
pub const WORKER_TABLE_FILE: &str = "WorkerTable.bin";
pub const PIP_DEPENDENCIES_FILE: &str = "PipDependencies.bin";
pub const DECLARED_INPUT_FILES_FILE: &str = "DeclaredInputFiles.bin";
pub const DECLARED_INPUT_DIRECTORIES_FILE: &str = "DeclaredInputDirectories.bin";
pub const CONSUMED_FILES_FILE: &str = "ConsumedFiles.bin";
pub const DIRECTORY_CONTENTS_FILE: &str = "DirectoryContents.bin";

const PIP_NAME_SUFFIX: &str = "PipNameTable";
const PIP_EXECUTION_SUFFIX: &str = "PipExecutionTable";

pub type FileTable = SingleValueTable<FileId, FileEntry>;
pub type DirectoryTable = SingleValueTable<DirectoryId, DirectoryEntry>;
pub type WorkerTable = SingleValueTable<WorkerId, WorkerEntry>;
pub type PipExecutionTable = DerivedTable<PipId, PipExecutionEntry>;

// ── Pip table ──────────────────────────────────────────────────────

/// Pips plus the name table their names live in.
#[derive(Debug, Clone)]
pub struct PipTable {
    pub(crate) entries: SingleValueTable<PipId, PipEntry>,
    pub(crate) names: NameTable,
}

impl PipTable {
    pub fn new(name_separator: char) -> Self {
        Self {
            entries: SingleValueTable::new(),
            names: NameTable::new(name_separator),
        }
    }

    pub fn get(&self, id: PipId) -> Result<PipEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> &SingleValueTable<PipId, PipEntry> {
        &self.entries
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// First pip with the given semi-stable hash.
    pub fn find_by_hash(&self, hash: i64) -> Option<PipId> {
        self.entries
            .iter()
            .find(|(_, e)| e.semi_stable_hash == hash)
            .map(|(id, _)| id)
    }
}

impl Table for PipTable {
    type Id = PipId;

    fn count(&self) -> usize {
        self.entries.count()
    }

    fn save_to_file(&self, directory: &Path, name: &str) -> Result<()> {
        self.entries.save_to_file(directory, name)?;
        self.names
            .save_to_file(directory, &insert_suffix(name, PIP_NAME_SUFFIX))
    }

    fn load_from_file(&mut self, directory: &Path, name: &str) -> Result<()> {
        self.entries.load_from_file(directory, name)?;
        self.names
            .load_from_file(directory, &insert_suffix(name, PIP_NAME_SUFFIX))
    }
}

// ── Relations ──────────────────────────────────────────────────────

/// Every relation table of the graph. Sized from the entity tables when
/// constructed, so they exist only once those are fully populated.
#[derive(Debug, Clone)]
pub struct RelationTables {
    /// Pip -> pips it depends on.
    pub pip_dependencies: RelationTable<PipId, PipId>,
    /// Pip -> files it declares as inputs.
    pub declared_input_files: RelationTable<PipId, FileId>,
    /// Pip -> directories it declares as inputs.
    pub declared_input_directories: RelationTable<PipId, DirectoryId>,
    /// Pip -> files it actually read.
    pub consumed_files: RelationTable<PipId, FileId>,
    /// Directory -> files it contains.
    pub directory_contents: RelationTable<DirectoryId, FileId>,
}

impl RelationTables {
    fn new(pips: usize, files: usize, directories: usize) -> Self {
        Self {
            pip_dependencies: RelationTable::new(pips, pips),
            declared_input_files: RelationTable::new(pips, files),
            declared_input_directories: RelationTable::new(pips, directories),
            consumed_files: RelationTable::new(pips, files),
            directory_contents: RelationTable::new(directories, files),
        }
    }

    fn save(&self, directory: &Path) -> Result<()> {
        self.pip_dependencies
            .save_to_file(directory, PIP_DEPENDENCIES_FILE)?;
        self.declared_input_files
            .save_to_file(directory, DECLARED_INPUT_FILES_FILE)?;
        self.declared_input_directories
            .save_to_file(directory, DECLARED_INPUT_DIRECTORIES_FILE)?;
        self.consumed_files
            .save_to_file(directory, CONSUMED_FILES_FILE)?;
        self.directory_contents
            .save_to_file(directory, DIRECTORY_CONTENTS_FILE)
    }

    fn load(&mut self, directory: &Path) -> Result<()> {
        self.pip_dependencies
            .load_from_file(directory, PIP_DEPENDENCIES_FILE)?;
        self.declared_input_files
            .load_from_file(directory, DECLARED_INPUT_FILES_FILE)?;
        self.declared_input_directories
            .load_from_file(directory, DECLARED_INPUT_DIRECTORIES_FILE)?;
        self.consumed_files
            .load_from_file(directory, CONSUMED_FILES_FILE)?;
        self.directory_contents
            .load_from_file(directory, DIRECTORY_CONTENTS_FILE)
    }

    pub fn total_relations(&self) -> usize {
        self.pip_dependencies.total_relations()
            + self.declared_input_files.total_relations()
            + self.declared_input_directories.total_relations()
            + self.consumed_files.total_relations()
            + self.directory_contents.total_relations()
    }
}

// ── Packed graph ───────────────────────────────────────────────────

/// All tables of one build graph.
///
/// Populate entity tables through a [`PackedGraphBuilder`], then call
/// [`construct_relation_tables`](Self::construct_relation_tables) and fill
/// the relations. After that the graph is read-only data.
#[derive(Debug, Clone)]
pub struct PackedGraph {
    config: GraphConfig,
    pub(crate) strings: StringTable,
    pub(crate) pips: PipTable,
    pub(crate) paths: NameTable,
    pub(crate) files: FileTable,
    pub(crate) directories: DirectoryTable,
    pub(crate) workers: WorkerTable,
    pub(crate) pip_executions: PipExecutionTable,
    relations: Option<RelationTables>,
}

impl PackedGraph {
    pub fn new() -> Self {
        Self::from_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.initial_capacity;
        let mut graph = Self::from_config(config);
        graph.pips.entries = SingleValueTable::with_capacity(capacity)?;
        graph.files = SingleValueTable::with_capacity(capacity)?;
        graph.directories = SingleValueTable::with_capacity(capacity)?;
        graph.pip_executions = DerivedTable::with_capacity(capacity)?;
        Ok(graph)
    }

    fn from_config(config: GraphConfig) -> Self {
        Self {
            strings: StringTable::new(),
            pips: PipTable::new(config.pip_name_separator),
            paths: NameTable::new(config.path_separator),
            files: SingleValueTable::new(),
            directories: SingleValueTable::new(),
            workers: SingleValueTable::new(),
            pip_executions: DerivedTable::new(),
            relations: None,
            config,
        }
    }

    /// Load a graph saved with [`save_to_directory`](Self::save_to_directory).
    pub fn open(directory: &Path) -> Result<Self> {
        let mut graph = Self::new();
        graph.load_from_directory(directory)?;
        Ok(graph)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn pips(&self) -> &PipTable {
        &self.pips
    }

    pub fn paths(&self) -> &NameTable {
        &self.paths
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn directories(&self) -> &DirectoryTable {
        &self.directories
    }

    pub fn workers(&self) -> &WorkerTable {
        &self.workers
    }

    pub fn pip_executions(&self) -> &PipExecutionTable {
        &self.pip_executions
    }

    /// Builder over the entity tables. Relation tables are not touched.
    pub fn builder(&mut self) -> PackedGraphBuilder<'_> {
        PackedGraphBuilder::new(self)
    }

    /// Create empty relation tables sized to the current entity counts.
    ///
    /// Replaces any relation tables constructed earlier.
    pub fn construct_relation_tables(&mut self) {
        self.pip_executions.sync_with(&self.pips);
        self.relations = Some(RelationTables::new(
            self.pips.count(),
            self.files.count(),
            self.directories.count(),
        ));
    }

    pub fn has_relations(&self) -> bool {
        self.relations.is_some()
    }

    pub fn relations(&self) -> Result<&RelationTables> {
        self.relations.as_ref().ok_or(TableError::RelationsNotConstructed)
    }

    pub fn relations_mut(&mut self) -> Result<&mut RelationTables> {
        self.relations.as_mut().ok_or(TableError::RelationsNotConstructed)
    }

    // ── Lookups ────────────────────────────────────────────────────

    pub fn pip_name(&self, pip: PipId) -> Result<String> {
        let entry = self.pips.get(pip)?;
        self.pips.names.get_text(entry.name, &self.strings)
    }

    pub fn file_path(&self, file: FileId) -> Result<String> {
        let entry = self.files.get(file)?;
        self.paths.get_text(entry.path, &self.strings)
    }

    pub fn directory_path(&self, directory: DirectoryId) -> Result<String> {
        let entry = self.directories.get(directory)?;
        self.paths.get_text(entry.path, &self.strings)
    }

    pub fn worker_name(&self, worker: WorkerId) -> Result<&str> {
        self.strings.get(self.workers.get(worker)?)
    }

    /// Worker a pip ran on, if recorded.
    pub fn pip_worker(&self, pip: PipId) -> Result<Option<WorkerId>> {
        let entry = self.pip_executions.get(&self.pips, pip)?;
        Ok(Some(entry.worker).filter(|w| !w.is_sentinel()))
    }

    /// Pip whose full name is `name`.
    pub fn find_pip(&self, name: &str) -> Option<PipId> {
        let name_id = self.pips.names.find(name, &self.strings)?;
        self.find_pip_by_name_id(name_id)
    }

    fn find_pip_by_name_id(&self, name_id: NameId) -> Option<PipId> {
        self.pips
            .entries
            .iter()
            .find(|(_, e)| e.name == name_id)
            .map(|(id, _)| id)
    }

    /// File whose full path is `path`.
    pub fn find_file(&self, path: &str) -> Option<FileId> {
        let path_id = self.paths.find(path, &self.strings)?;
        self.files
            .iter()
            .find(|(_, e)| e.path == path_id)
            .map(|(id, _)| id)
    }

    pub fn find_directory(&self, path: &str) -> Option<DirectoryId> {
        let path_id = self.paths.find(path, &self.strings)?;
        self.directories
            .iter()
            .find(|(_, e)| e.path == path_id)
            .map(|(id, _)| id)
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Write every table to `directory`, creating it if needed.
    pub fn save_to_directory(&self, directory: &Path) -> Result<()> {
        std::fs::create_dir_all(directory)?;
        self.config.write_to(directory)?;

        self.strings.save_to_file(directory, STRING_TABLE_FILE)?;
        self.pips.save_to_file(directory, PIP_TABLE_FILE)?;
        self.pip_executions.save_to_file(
            directory,
            &insert_suffix(PIP_TABLE_FILE, PIP_EXECUTION_SUFFIX),
        )?;
        self.paths.save_to_file(directory, PATH_TABLE_FILE)?;
        self.files.save_to_file(directory, FILE_TABLE_FILE)?;
        self.directories.save_to_file(directory, DIRECTORY_TABLE_FILE)?;
        self.workers.save_to_file(directory, WORKER_TABLE_FILE)?;

        if let Some(relations) = &self.relations {
            relations.save(directory)?;
        }

        tracing::info!(
            dir = %directory.display(),
            strings = self.strings.count(),
            pips = self.pips.count(),
            files = self.files.count(),
            directories = self.directories.count(),
            relations = self.relations.as_ref().map_or(0, |r| r.total_relations()),
            "Saved packed graph"
        );
        Ok(())
    }

    /// Replace the contents of this graph with the tables in `directory`.
    ///
    /// Relation tables are loaded only when the directory has them.
    pub fn load_from_directory(&mut self, directory: &Path) -> Result<()> {
        let config = GraphConfig::read_from(directory)?.unwrap_or_default();
        let mut graph = Self::from_config(config);

        graph.strings.load_from_file(directory, STRING_TABLE_FILE)?;
        graph.pips.load_from_file(directory, PIP_TABLE_FILE)?;
        graph.pip_executions.load_from_file(
            directory,
            &insert_suffix(PIP_TABLE_FILE, PIP_EXECUTION_SUFFIX),
        )?;
        graph.paths.load_from_file(directory, PATH_TABLE_FILE)?;
        graph.files.load_from_file(directory, FILE_TABLE_FILE)?;
        graph.directories.load_from_file(directory, DIRECTORY_TABLE_FILE)?;
        graph.workers.load_from_file(directory, WORKER_TABLE_FILE)?;
        graph.check_references()?;

        if directory.join(PIP_DEPENDENCIES_FILE).exists() {
            let mut relations = RelationTables::new(
                graph.pips.count(),
                graph.files.count(),
                graph.directories.count(),
            );
            relations.load(directory)?;
            graph.relations = Some(relations);
        }

        tracing::info!(
            dir = %directory.display(),
            strings = graph.strings.count(),
            pips = graph.pips.count(),
            files = graph.files.count(),
            directories = graph.directories.count(),
            relations = graph.has_relations(),
            "Loaded packed graph"
        );
        *self = graph;
        Ok(())
    }

    /// Cross-table id checks for freshly loaded tables.
    fn check_references(&self) -> Result<()> {
        let mismatch = |what: &str, id: &dyn std::fmt::Display, target: &dyn std::fmt::Display| {
            TableError::FormatMismatch(format!("{} {} references missing {}", what, id, target))
        };

        for (id, pip) in self.pips.entries.iter() {
            if !self.pips.names.is_valid(pip.name) {
                return Err(mismatch("pip", &id, &pip.name));
            }
        }
        for (id, file) in self.files.iter() {
            if !self.paths.is_valid(file.path) {
                return Err(mismatch("file", &id, &file.path));
            }
            if !file.producer_pip.is_sentinel() && !self.pips.is_valid(file.producer_pip) {
                return Err(mismatch("file", &id, &file.producer_pip));
            }
        }
        for (id, dir) in self.directories.iter() {
            if !self.paths.is_valid(dir.path) {
                return Err(mismatch("directory", &id, &dir.path));
            }
            if !dir.producer_pip.is_sentinel() && !self.pips.is_valid(dir.producer_pip) {
                return Err(mismatch("directory", &id, &dir.producer_pip));
            }
        }
        for (id, name) in self.workers.iter() {
            if !self.strings.is_valid(name) {
                return Err(mismatch("worker", &id, &name));
            }
        }
        if self.pip_executions.len() > self.pips.count() {
            return Err(TableError::FormatMismatch(format!(
                "{} pip execution entries for {} pips",
                self.pip_executions.len(),
                self.pips.count()
            )));
        }
        for (index, exec) in self.pip_executions.values().iter().enumerate() {
            if !exec.worker.is_sentinel() && !self.workers.is_valid(exec.worker) {
                return Err(mismatch("pip execution", &(index + 1), &exec.worker));
            }
        }
        for entry in self.pips.names.entries().iter().chain(self.paths.entries()) {
            if !self.strings.is_valid(entry.atom) {
                return Err(mismatch("name entry atom", &entry.prefix, &entry.atom));
            }
        }
        Ok(())
    }
}

impl Default for PackedGraph {
    fn default() -> Self {
        Self::new()
    }
}
