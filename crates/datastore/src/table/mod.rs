//! Tables and their backing stores.
//!
//! [DataTable] is the interface every store implements.  The public `*_records` methods normalize and deduplicate
//! their input and then hand a [Batch] to the store's `*_batch` method.  Nothing else can build a [Batch], so stores
//! never see malformed input.
//!
//! Batches are best-effort: rows that collide on create, or are absent on update/delete, are logged and skipped, and
//! the returned keys say exactly which rows were touched.
mod memory;
mod sqlite;

use std::collections::HashSet;

use log::*;

pub use memory::*;
pub use sqlite::*;

use crate::errors::*;
use crate::normalize::normalize_records;
use crate::{Frame, Key, TableDescriptor};

#[enum_dispatch::enum_dispatch(Table)]
pub trait DataTable {
    fn descriptor(&self) -> &TableDescriptor;

    /// Insert rows whose keys aren't present yet, skipping the rest.
    ///
    /// Returns the inserted keys in batch order.
    fn create_batch(&mut self, batch: Batch) -> Result<Vec<Key>>;

    /// Patch the non-null values of rows whose keys are present, skipping the rest.
    fn update_batch(&mut self, batch: Batch) -> Result<Vec<Key>>;

    /// Remove rows whose keys are present, skipping the rest.  Only the batch's index matters.
    fn delete_batch(&mut self, batch: Batch) -> Result<Vec<Key>>;

    /// Snapshot of the table, indexed by the key columns and sorted by key.
    fn dataframe(&self) -> Result<Frame>;

    /// Every key in the table, sorted.
    fn index(&self) -> Result<Vec<Key>>;

    fn len(&self) -> Result<usize> {
        Ok(self.index()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Create records.  Records whose keys already exist are left alone and not returned.
    fn create_records(&mut self, records: Frame) -> Result<Vec<Key>> {
        let batch = prepare_batch(self.descriptor(), "create", records, true)?;
        self.create_batch(batch)
    }

    /// Update existing records.  Null values in `records` leave the stored value alone.
    fn update_records(&mut self, records: Frame) -> Result<Vec<Key>> {
        let batch = prepare_batch(self.descriptor(), "update", records, true)?;
        self.update_batch(batch)
    }

    /// Delete records.  Columns other than the key columns are ignored.
    fn delete_records(&mut self, records: Frame) -> Result<Vec<Key>> {
        let batch = prepare_batch(self.descriptor(), "delete", records, false)?;
        self.delete_batch(batch)
    }
}

/// Records that were normalized against a table and had repeated keys removed.
///
/// Only [DataTable]'s `*_records` methods make these, so a store's `*_batch` methods can't be handed raw input:
///
/// ```compile_fail
/// let frame = roster_datastore::Frame::new(vec!["a".to_string()]).unwrap();
/// let batch = roster_datastore::Batch { frame };
/// ```
#[derive(Debug)]
pub struct Batch {
    frame: Frame,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub(crate) fn into_rows(self) -> Vec<crate::FrameRow> {
        self.frame.into_rows()
    }
}

#[enum_dispatch::enum_dispatch]
pub enum Table {
    Memory(MemoryTable),
    Sqlite(SqliteTable),
}

/// Normalize a batch and drop repeated keys, keeping the first occurrence.
fn prepare_batch(
    table: &TableDescriptor,
    operation: &str,
    records: Frame,
    normalize_value_columns: bool,
) -> Result<Batch> {
    let normalized = normalize_records(table, records, normalize_value_columns)?;
    let requested = normalized.len();

    let (index_names, columns, rows) = normalized.into_parts();
    let mut seen = HashSet::with_capacity(rows.len());
    let rows = rows
        .into_iter()
        .filter(|r| seen.insert(r.index.clone()))
        .collect::<Vec<_>>();

    if rows.len() != requested {
        info!(
            "Specified records repeat some keys. Keeping the first of each table={} operation={} requested={} duplicates={}",
            table.get_name(),
            operation,
            requested,
            requested - rows.len()
        );
    }
    info!(
        "Attempting to {} records table={} count={}",
        operation,
        table.get_name(),
        rows.len()
    );

    Ok(Batch {
        frame: Frame::from_parts(index_names, columns, rows),
    })
}

/// Split a batch into rows that pass `keep` and the count of those that don't, logging the latter.
fn partition_batch(
    table: &TableDescriptor,
    batch: Batch,
    reason: &str,
    mut keep: impl FnMut(&Key) -> Result<bool>,
) -> Result<Vec<crate::FrameRow>> {
    let requested = batch.len();
    let mut kept = Vec::with_capacity(requested);
    for row in batch.into_rows() {
        if keep(&row.index)? {
            kept.push(row);
        }
    }

    if kept.len() != requested {
        info!(
            "Of the specified records, some have key values that {}. Ignoring these table={} requested={} ignored={}",
            reason,
            table.get_name(),
            requested,
            requested - kept.len()
        );
    }
    Ok(kept)
}
