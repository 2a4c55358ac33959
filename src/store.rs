//! Generic Record Store
//!
//! Treats one backing table as a store of [`Record`]s laid out by an ordered
//! field list. Lookups are linear scans over column 0; the first matching row
//! wins. Updates read the stored row, overlay the new values and write the
//! whole row back in place. Nothing guards against another writer touching
//! the same row between the read and the write.
//!
//! Rows with fewer cells than the field list are treated as malformed and
//! skipped by every read.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Table, Workbook};
use crate::error::{CirculationError, Result};
use crate::locator::ResourceLocator;
use crate::record::{Entity, Record};
use crate::schema::EntityKind;

/// What [`RecordStore::ensure_headers`] had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderRepair {
    /// The header row was already correct
    Unchanged,
    /// The table was empty; a header row was written
    Written,
    /// Row 0 did not match; a header row was inserted above it
    Inserted,
}

/// Record access for one entity kind
#[derive(Clone)]
pub struct RecordStore {
    kind: EntityKind,
    fields: &'static [&'static str],
    locator: ResourceLocator,
    workbook: Arc<dyn Workbook>,
}

impl RecordStore {
    /// Store laid out by the kind's standard field list
    pub fn new(kind: EntityKind, locator: ResourceLocator, workbook: Arc<dyn Workbook>) -> Self {
        Self::with_fields(kind, kind.fields(), locator, workbook)
    }

    /// Store laid out by an explicit field list; `fields[0]` must be `id`
    pub fn with_fields(
        kind: EntityKind,
        fields: &'static [&'static str],
        locator: ResourceLocator,
        workbook: Arc<dyn Workbook>,
    ) -> Self {
        Self {
            kind,
            fields,
            locator,
            workbook,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    fn table(&self) -> Result<Box<dyn Table + '_>> {
        let address = self.locator.address(self.kind)?;
        self.workbook.open(&address).map_err(|e| {
            CirculationError::unavailable(self.kind, format!("cannot open '{}': {}", address, e))
        })
    }

    fn read(&self, table: &dyn Table) -> Result<Vec<Vec<String>>> {
        table
            .rows()
            .map_err(|e| CirculationError::unavailable(self.kind, format!("cannot read rows: {}", e)))
    }

    fn header(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.to_string()).collect()
    }

    /// Position and contents of the first well-formed row whose id matches
    fn position(&self, rows: &[Vec<String>], id: &str) -> Option<(usize, Record)> {
        rows.iter()
            .enumerate()
            .skip(1)
            .filter(|(_, row)| row.first().map(String::as_str) == Some(id))
            .find_map(|(index, row)| Record::from_row(self.fields, row).map(|r| (index, r)))
    }

    /// Every well-formed data row
    pub fn get_all(&self) -> Result<Vec<Record>> {
        let table = self.table()?;
        let rows = self.read(table.as_ref())?;
        let mut records = Vec::with_capacity(rows.len().saturating_sub(1));
        for (index, row) in rows.iter().enumerate().skip(1) {
            match Record::from_row(self.fields, row) {
                Some(record) => records.push(record),
                None => warn!(
                    kind = %self.kind,
                    row = index,
                    cells = row.len(),
                    expected = self.fields.len(),
                    "skipping malformed row"
                ),
            }
        }
        Ok(records)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Record> {
        let table = self.table()?;
        let rows = self.read(table.as_ref())?;
        self.position(&rows, id)
            .map(|(_, record)| record)
            .ok_or_else(|| CirculationError::not_found(self.kind.label(), id))
    }

    /// Records matching `predicate`
    pub fn find<F>(&self, predicate: F) -> Result<Vec<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        Ok(self.get_all()?.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Append a new record under a freshly generated id. Any `id` in
    /// `values` is ignored. An empty table gets its header row first, so the
    /// new record never lands in row 0.
    pub fn create(&self, values: Record) -> Result<Record> {
        let mut table = self.table()?;
        if self.read(table.as_ref())?.is_empty() {
            table.append_row(self.header())?;
            warn!(kind = %self.kind, "header row written before first record");
        }

        let mut record = Record::new().with("id", new_id());
        record.merge(&values, self.fields);
        for field in self.fields {
            if !record.contains(field) {
                record.set(field, "");
            }
        }

        table.append_row(record.to_row(self.fields))?;
        info!(kind = %self.kind, id = %record.id(), "record created");
        Ok(record)
    }

    /// Overlay `partial` onto the stored record and write it back in place
    pub fn update(&self, id: &str, partial: &Record) -> Result<Record> {
        let mut table = self.table()?;
        let rows = self.read(table.as_ref())?;
        let (index, mut record) = self
            .position(&rows, id)
            .ok_or_else(|| CirculationError::not_found(self.kind.label(), id))?;

        record.merge(partial, self.fields);
        table.write_row(index, record.to_row(self.fields))?;
        debug!(kind = %self.kind, id = %id, row = index, "record updated");
        Ok(record)
    }

    /// Remove the record's row; later rows move up
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut table = self.table()?;
        let rows = self.read(table.as_ref())?;
        let (index, _) = self
            .position(&rows, id)
            .ok_or_else(|| CirculationError::not_found(self.kind.label(), id))?;

        table.delete_row(index)?;
        info!(kind = %self.kind, id = %id, row = index, "record deleted");
        Ok(())
    }

    /// Make sure row 0 is the header. Mismatched rows are left in place and a
    /// fresh header is inserted above them.
    pub fn ensure_headers(&self) -> Result<HeaderRepair> {
        let mut table = self.table()?;
        let rows = self.read(table.as_ref())?;
        let header = self.header();

        let repair = match rows.first() {
            None => {
                table.append_row(header)?;
                HeaderRepair::Written
            }
            Some(first) if *first == header => HeaderRepair::Unchanged,
            Some(_) => {
                table.insert_row_at_top(header)?;
                HeaderRepair::Inserted
            }
        };
        if repair != HeaderRepair::Unchanged {
            warn!(kind = %self.kind, ?repair, "header row repaired");
        }
        Ok(repair)
    }

    /// Typed lookup
    pub fn load<E: Entity>(&self, id: &str) -> Result<E> {
        E::from_record(&self.get_by_id(id)?)
    }

    /// Typed listing. Records that do not parse as `E` are skipped.
    pub fn load_all<E: Entity>(&self) -> Result<Vec<E>> {
        let mut entities = Vec::new();
        for record in self.get_all()? {
            match E::from_record(&record) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(kind = %self.kind, "skipping unreadable record: {}", e),
            }
        }
        Ok(entities)
    }
}

/// Random record id
fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
