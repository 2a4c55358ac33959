//! In-memory workbook and catalog
//!
//! Used for tests and embedding. Writes to a document can be made to fail on
//! demand, which is how the checkout rollback path is exercised.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::{CatalogEntry, ResourceCatalog, Table, Workbook};
use crate::error::{CirculationError, Result};

#[derive(Debug, Default, Clone)]
struct Document {
    rows: Vec<Vec<String>>,
    fail_writes: bool,
}

/// Documents keyed by address
#[derive(Debug, Default, Clone)]
pub struct MemoryWorkbook {
    documents: Arc<RwLock<HashMap<String, Document>>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the document at `address`
    pub fn insert(&self, address: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| CirculationError::LockPoisoned("workbook insert"))?;
        documents.insert(
            address.to_string(),
            Document {
                rows,
                fail_writes: false,
            },
        );
        Ok(())
    }

    /// Drop the document, so later opens fail
    pub fn remove(&self, address: &str) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| CirculationError::LockPoisoned("workbook remove"))?;
        documents.remove(address);
        Ok(())
    }

    /// Make every mutation of `address` fail until switched off again
    pub fn fail_writes(&self, address: &str, fail: bool) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| CirculationError::LockPoisoned("workbook fail_writes"))?;
        match documents.get_mut(address) {
            Some(doc) => {
                doc.fail_writes = fail;
                Ok(())
            }
            None => Err(CirculationError::Storage(format!(
                "No document at address '{}'",
                address
            ))),
        }
    }

    /// Snapshot of a document's rows
    pub fn rows_of(&self, address: &str) -> Result<Vec<Vec<String>>> {
        self.open(address)?.rows()
    }
}

impl Workbook for MemoryWorkbook {
    fn open(&self, address: &str) -> Result<Box<dyn Table + '_>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| CirculationError::LockPoisoned("workbook open"))?;
        if !documents.contains_key(address) {
            return Err(CirculationError::Storage(format!(
                "No document at address '{}'",
                address
            )));
        }
        Ok(Box::new(MemoryTable {
            documents: &self.documents,
            address: address.to_string(),
        }))
    }
}

struct MemoryTable<'a> {
    documents: &'a RwLock<HashMap<String, Document>>,
    address: String,
}

impl MemoryTable<'_> {
    fn mutate<F>(&mut self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Vec<String>>) -> Result<()>,
    {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| CirculationError::LockPoisoned(operation))?;
        let doc = documents.get_mut(&self.address).ok_or_else(|| {
            CirculationError::Storage(format!("Document '{}' disappeared", self.address))
        })?;
        if doc.fail_writes {
            return Err(CirculationError::Storage(format!(
                "{} rejected by document '{}'",
                operation, self.address
            )));
        }
        f(&mut doc.rows)
    }
}

fn out_of_range(index: usize, len: usize) -> CirculationError {
    CirculationError::Storage(format!("Row {} out of range ({} rows)", index, len))
}

impl Table for MemoryTable<'_> {
    fn rows(&self) -> Result<Vec<Vec<String>>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| CirculationError::LockPoisoned("table read"))?;
        documents
            .get(&self.address)
            .map(|doc| doc.rows.clone())
            .ok_or_else(|| CirculationError::Storage(format!("Document '{}' disappeared", self.address)))
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<()> {
        self.mutate("append", |rows| {
            rows.push(row);
            Ok(())
        })
    }

    fn write_row(&mut self, index: usize, row: Vec<String>) -> Result<()> {
        self.mutate("write", |rows| {
            let len = rows.len();
            let slot = rows.get_mut(index).ok_or_else(|| out_of_range(index, len))?;
            *slot = row;
            Ok(())
        })
    }

    fn delete_row(&mut self, index: usize) -> Result<()> {
        self.mutate("delete", |rows| {
            if index >= rows.len() {
                return Err(out_of_range(index, rows.len()));
            }
            rows.remove(index);
            Ok(())
        })
    }

    fn insert_row_at_top(&mut self, row: Vec<String>) -> Result<()> {
        self.mutate("insert", |rows| {
            rows.insert(0, row);
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
struct CatalogRecord {
    entry: CatalogEntry,
    editors: Vec<String>,
}

/// Catalog listing in insertion order
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    entries: Arc<RwLock<Vec<CatalogRecord>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, address: &str, name: &str, modified: DateTime<Utc>) -> Result<()> {
        self.push(CatalogEntry {
            address: address.to_string(),
            name: name.to_string(),
            modified,
            trashed: false,
        })
    }

    pub fn add_trashed(&self, address: &str, name: &str, modified: DateTime<Utc>) -> Result<()> {
        self.push(CatalogEntry {
            address: address.to_string(),
            name: name.to_string(),
            modified,
            trashed: true,
        })
    }

    /// Grant `identity` edit rights on `address`
    pub fn share(&self, address: &str, identity: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CirculationError::LockPoisoned("catalog share"))?;
        for record in entries.iter_mut().filter(|r| r.entry.address == address) {
            record.editors.push(identity.to_string());
        }
        Ok(())
    }

    fn push(&self, entry: CatalogEntry) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CirculationError::LockPoisoned("catalog add"))?;
        entries.push(CatalogRecord {
            entry,
            editors: Vec::new(),
        });
        Ok(())
    }
}

impl ResourceCatalog for MemoryCatalog {
    fn search(&self, query: &str) -> Result<Vec<CatalogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CirculationError::LockPoisoned("catalog search"))?;
        Ok(entries
            .iter()
            .filter(|r| r.entry.name.contains(query))
            .map(|r| r.entry.clone())
            .collect())
    }

    fn editors(&self, address: &str) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CirculationError::LockPoisoned("catalog editors"))?;
        entries
            .iter()
            .find(|r| r.entry.address == address)
            .map(|r| r.editors.clone())
            .ok_or_else(|| CirculationError::Storage(format!("Unknown resource '{}'", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_open_unknown_address_fails() {
        let workbook = MemoryWorkbook::new();
        assert!(workbook.open("missing").is_err());
    }

    #[test]
    fn test_positional_edits() {
        let workbook = MemoryWorkbook::new();
        workbook
            .insert("doc", vec![row(&["a"]), row(&["b"]), row(&["c"])])
            .unwrap();

        let mut table = workbook.open("doc").unwrap();
        table.delete_row(1).unwrap();
        table.insert_row_at_top(row(&["h"])).unwrap();
        table.write_row(2, row(&["C"])).unwrap();
        table.append_row(row(&["d"])).unwrap();

        assert_eq!(
            workbook.rows_of("doc").unwrap(),
            vec![row(&["h"]), row(&["a"]), row(&["C"]), row(&["d"])]
        );
        assert!(table.write_row(9, row(&["x"])).is_err());
    }

    #[test]
    fn test_injected_write_failure() {
        let workbook = MemoryWorkbook::new();
        workbook.insert("doc", vec![row(&["a"])]).unwrap();
        workbook.fail_writes("doc", true).unwrap();

        let mut table = workbook.open("doc").unwrap();
        assert!(table.append_row(row(&["b"])).is_err());
        assert_eq!(table.rows().unwrap().len(), 1);
    }

    #[test]
    fn test_catalog_search_is_substring() {
        let catalog = MemoryCatalog::new();
        let now = Utc::now();
        catalog.add("1", "Items", now).unwrap();
        catalog.add("2", "Old Items", now).unwrap();
        catalog.add("3", "Members", now).unwrap();

        let names: Vec<_> = catalog
            .search("Items")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Items", "Old Items"]);
    }
}
