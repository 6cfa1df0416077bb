//! Resident directory: remote source, local snapshot, and the resolver that
//! merges them into one in-memory table.

pub mod cache;
pub mod resolver;
pub mod source;
pub mod table;

pub use cache::{DirectoryCache, FileDirectoryCache};
pub use resolver::{DirectoryError, DirectoryResolver};
pub use source::{DirectorySource, SheetsDirectory, SourceRow};
pub use table::{normalize, DirectoryRecord, DirectoryTable, RecordType};
