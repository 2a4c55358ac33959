//! CSV documents in a directory
//!
//! Each resource is a `<name>.csv` file somewhere under the root; its
//! address is the path relative to the root. Files below a `.trash`
//! directory are listed as trashed. Edit rights live in an optional
//! `<name>.editors` file next to the CSV, one identity per line.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;
use walkdir::WalkDir;

use super::{CatalogEntry, ResourceCatalog, Table, Workbook};
use crate::error::{CirculationError, Result};

const TRASH_DIR: &str = ".trash";

/// Opens CSV files relative to a root directory
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    root: PathBuf,
}

impl CsvWorkbook {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty `<name>.csv` at the root and return its address
    pub fn create(&self, name: &str) -> Result<String> {
        fs::create_dir_all(&self.root)?;
        let address = format!("{}.csv", name);
        let path = self.root.join(&address);
        if path.exists() {
            return Err(CirculationError::Storage(format!(
                "{} already exists",
                path.display()
            )));
        }
        fs::write(&path, "")?;
        Ok(address)
    }
}

impl Workbook for CsvWorkbook {
    fn open(&self, address: &str) -> Result<Box<dyn Table + '_>> {
        let path = self.root.join(address);
        if !path.is_file() {
            return Err(CirculationError::Storage(format!(
                "{} does not exist",
                path.display()
            )));
        }
        Ok(Box::new(CsvTable { path }))
    }
}

/// One CSV file. Appends go to the end of the file; positional edits
/// rewrite a sibling `.tmp` file and rename it over the original.
struct CsvTable {
    path: PathBuf,
}

impl CsvTable {
    fn save(&self, rows: &[Vec<String>]) -> Result<()> {
        let staging = self.path.with_extension("csv.tmp");
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&staging)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Vec<String>>) -> Result<()>,
    {
        let mut rows = self.rows()?;
        f(&mut rows)?;
        self.save(&rows)
    }

    /// Whether the file has content that does not end in a newline
    fn missing_final_newline(&self) -> Result<bool> {
        let mut file = File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }
}

fn out_of_range(index: usize, len: usize) -> CirculationError {
    CirculationError::Storage(format!("Row {} out of range ({} rows)", index, len))
}

impl Table for CsvTable {
    fn rows(&self) -> Result<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }
        Ok(rows)
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<()> {
        let needs_newline = self.missing_final_newline()?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }

    fn write_row(&mut self, index: usize, row: Vec<String>) -> Result<()> {
        self.modify(|rows| {
            let len = rows.len();
            let slot = rows.get_mut(index).ok_or_else(|| out_of_range(index, len))?;
            *slot = row;
            Ok(())
        })
    }

    fn delete_row(&mut self, index: usize) -> Result<()> {
        self.modify(|rows| {
            if index >= rows.len() {
                return Err(out_of_range(index, rows.len()));
            }
            rows.remove(index);
            Ok(())
        })
    }

    fn insert_row_at_top(&mut self, row: Vec<String>) -> Result<()> {
        self.modify(|rows| {
            rows.insert(0, row);
            Ok(())
        })
    }
}

/// Lists every CSV file under a root directory
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    root: PathBuf,
}

impl CsvCatalog {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ResourceCatalog for CsvCatalog {
    fn search(&self, query: &str) -> Result<Vec<CatalogEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %self.root.display(), "skipping unreadable catalog entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map(|ext| ext != "csv").unwrap_or(true) {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !name.contains(query) {
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let trashed = relative.components().any(|c| c.as_os_str() == TRASH_DIR);
            let metadata = entry
                .metadata()
                .map_err(|e| CirculationError::Storage(format!("{}: {}", path.display(), e)))?;
            let modified: DateTime<Utc> = metadata.modified()?.into();

            entries.push(CatalogEntry {
                address: relative.to_string_lossy().replace('\\', "/"),
                name,
                modified,
                trashed,
            });
        }
        Ok(entries)
    }

    fn editors(&self, address: &str) -> Result<Vec<String>> {
        let sidecar = self.root.join(address).with_extension("editors");
        if !sidecar.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&sidecar)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}
