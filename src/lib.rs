//! Packed table storage for flattened build-dependency graphs.
//!
//! Entities (pips, files, directories, workers) live in dense id-indexed
//! tables; one-to-many relations live in CSR relation tables; names and
//! paths share one interned string pool through prefix-sharing name
//! tables. A whole [`PackedGraph`] saves to and loads from one directory
//! of flat binary files.
//!
//! ```no_run
//! use packed_graph::{ContentFlags, PackedGraph, PipType};
//!
//! # fn main() -> packed_graph::Result<()> {
//! let mut graph = PackedGraph::new();
//! let (a, b) = {
//!     let mut builder = graph.builder();
//!     let a = builder.add_pip(1, "Build.A", PipType::Process)?;
//!     let b = builder.add_pip(2, "Build.B", PipType::Process)?;
//!     builder.get_or_add_file("out/a.o", 10, a, ContentFlags::Produced)?;
//!     (a, b)
//! };
//! graph.construct_relation_tables();
//! graph.relations_mut()?.pip_dependencies.add_relations(a, &[b])?;
//! graph.save_to_directory(std::path::Path::new("/tmp/graph"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod table;

pub use config::GraphConfig;
pub use error::{Result, TableError};
pub use graph::{
    ContentFlags, DirectoryEntry, DirectoryId, FileEntry, FileId, PackedGraph, PackedGraphBuilder,
    PipEntry, PipExecutionEntry, PipId, PipTable, PipType, RelationTables, WorkerId,
};
pub use table::{Id, IdRange, Table};
