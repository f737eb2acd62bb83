//! Generic table transfer
//!
//! Exports any table of the primary store to CSV and imports CSV back into a
//! table. Nothing here knows about patients or invoices: the column list is
//! always reflected from the store at call time, and the same ordered list
//! drives both the CSV header and the insert statement.
//!
//! - `reflect`: the query/insert seams and [`SchemaReflector`]
//! - `export`: [`TableExporter`], table to CSV artifact
//! - `import`: [`TableImporter`], CSV artifact to table, all-or-nothing

pub mod export;
pub mod import;
pub mod reflect;

pub use export::{CsvArtifact, TableExporter};
pub use import::{ImportReport, TableImporter};
pub use reflect::{
    Affinity, ColumnType, InsertCapability, QueryCapability, QueryResult, SchemaReflector,
    TableData, TableSchema, Value,
};
