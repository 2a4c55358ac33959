//! Backing resources and the catalog they are discovered from
//!
//! A backing resource is a flat, row-addressable table. Row 0 is the header;
//! column 0 of every data row is the record id. Nothing here locks: two
//! writers racing on the same row get last-writer-wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod fs;
pub mod memory;

pub use fs::{CsvCatalog, CsvWorkbook};
pub use memory::{MemoryCatalog, MemoryWorkbook};

/// An opened table
pub trait Table {
    /// Every row, header included
    fn rows(&self) -> Result<Vec<Vec<String>>>;

    /// Append one row after the last one
    fn append_row(&mut self, row: Vec<String>) -> Result<()>;

    /// Overwrite the cells of the row at `index`
    fn write_row(&mut self, index: usize, row: Vec<String>) -> Result<()>;

    /// Remove the row at `index`; later rows shift up
    fn delete_row(&mut self, index: usize) -> Result<()>;

    /// Insert a row above row 0
    fn insert_row_at_top(&mut self, row: Vec<String>) -> Result<()>;
}

/// Opens tables by address
pub trait Workbook: Send + Sync {
    fn open(&self, address: &str) -> Result<Box<dyn Table + '_>>;
}

/// One candidate resource in a catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub address: String,
    pub name: String,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub trashed: bool,
}

/// Lists candidate resources
pub trait ResourceCatalog: Send + Sync {
    /// Candidates whose name contains `query`, in listing order. This is a
    /// coarse filter; callers narrow it further.
    fn search(&self, query: &str) -> Result<Vec<CatalogEntry>>;

    /// Identities the resource is shared with for editing
    fn editors(&self, address: &str) -> Result<Vec<String>>;
}
