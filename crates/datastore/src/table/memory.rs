use std::collections::BTreeMap;

use log::*;

use super::{partition_batch, Batch, DataTable};
use crate::errors::*;
use crate::{Frame, FrameRow, Key, TableDescriptor, Value};

/// A table held entirely in memory.
///
/// Rows live in a `BTreeMap`, so they are always sorted by key.
#[derive(Debug)]
pub struct MemoryTable {
    descriptor: TableDescriptor,
    rows: BTreeMap<Key, Vec<Value>>,
}

impl MemoryTable {
    pub fn new(descriptor: TableDescriptor) -> MemoryTable {
        info!(
            "Initializing data table table={} key_columns={:?} value_columns={:?}",
            descriptor.get_name(),
            descriptor.key_column_names(),
            descriptor.value_column_names()
        );
        MemoryTable {
            descriptor,
            rows: Default::default(),
        }
    }

    /// The stored values of one row, in value column order.
    pub fn get(&self, key: &Key) -> Option<&[Value]> {
        self.rows.get(key).map(|v| &v[..])
    }
}

impl DataTable for MemoryTable {
    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn create_batch(&mut self, batch: Batch) -> Result<Vec<Key>> {
        let rows = partition_batch(
            &self.descriptor,
            batch,
            "are already in the data table",
            |k| Ok(!self.rows.contains_key(k)),
        )?;

        let mut ret = Vec::with_capacity(rows.len());
        for FrameRow { index, values } in rows {
            ret.push(index.clone());
            self.rows.insert(index, values);
        }

        info!(
            "Created records table={} created={}",
            self.descriptor.get_name(),
            ret.len()
        );
        Ok(ret)
    }

    fn update_batch(&mut self, batch: Batch) -> Result<Vec<Key>> {
        let rows = partition_batch(
            &self.descriptor,
            batch,
            "are not in the data table",
            |k| Ok(self.rows.contains_key(k)),
        )?;

        let mut ret = Vec::with_capacity(rows.len());
        for FrameRow { index, values } in rows {
            let existing = self
                .rows
                .get_mut(&index)
                .expect("Partitioning only keeps existing keys");
            for (slot, v) in existing.iter_mut().zip(values) {
                if !v.is_null() {
                    *slot = v;
                }
            }
            ret.push(index);
        }

        info!(
            "Updated records table={} updated={}",
            self.descriptor.get_name(),
            ret.len()
        );
        Ok(ret)
    }

    fn delete_batch(&mut self, batch: Batch) -> Result<Vec<Key>> {
        let rows = partition_batch(
            &self.descriptor,
            batch,
            "are not in the data table",
            |k| Ok(self.rows.contains_key(k)),
        )?;

        let mut ret = Vec::with_capacity(rows.len());
        for r in rows {
            self.rows.remove(&r.index);
            ret.push(r.index);
        }

        info!(
            "Deleted records table={} deleted={}",
            self.descriptor.get_name(),
            ret.len()
        );
        Ok(ret)
    }

    fn dataframe(&self) -> Result<Frame> {
        let rows = self
            .rows
            .iter()
            .map(|(k, v)| FrameRow {
                index: k.clone(),
                values: v.clone(),
            })
            .collect();
        Ok(Frame::from_parts(
            self.descriptor.key_column_names(),
            self.descriptor.value_column_names(),
            rows,
        ))
    }

    fn index(&self) -> Result<Vec<Key>> {
        Ok(self.rows.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.rows.len())
    }
}
