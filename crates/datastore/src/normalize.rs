//! Reshape loosely-structured records into a table's canonical layout.
//!
//! Every mutating table operation goes through [normalize_records] first, so backends only ever see frames indexed by
//! the table's key columns and carrying exactly its value columns, in order.
use log::*;

use crate::errors::*;
use crate::{Frame, FrameRow, Key, TableDescriptor, Value};

/// Normalize `records` against `table`.
///
/// Any existing index is first turned back into ordinary columns, then the frame is re-indexed by the table's key
/// columns.  If `normalize_value_columns` is false, the remaining columns are returned untouched.  Otherwise columns
/// the table doesn't have are dropped, value columns the records don't have are added as nulls, and the result is
/// ordered like the table's value columns.
///
/// The only failure is [Error::MissingKeyColumns]; normalizing an already-normalized frame returns it unchanged.
pub fn normalize_records(
    table: &TableDescriptor,
    records: Frame,
    normalize_value_columns: bool,
) -> Result<Frame> {
    let (index_names, columns, rows) = records.into_parts();

    // Reset the index, so that keys are found wherever they are.
    let columns = index_names
        .into_iter()
        .chain(columns.into_iter())
        .collect::<Vec<_>>();
    let rows = rows.into_iter().map(|r| {
        let mut values = r.index.parts().to_vec();
        values.extend(r.values);
        values
    });

    let missing_keys = table
        .iter_key_columns()
        .map(|c| c.get_name())
        .filter(|k| !columns.iter().any(|c| c == k))
        .map(|k| k.to_string())
        .collect::<Vec<_>>();
    if !missing_keys.is_empty() {
        return Err(Error::MissingKeyColumns {
            table: table.get_name().to_string(),
            columns: missing_keys,
        });
    }

    let key_positions = table
        .iter_key_columns()
        .map(|k| {
            columns
                .iter()
                .position(|c| c == k.get_name())
                .expect("Checked above")
        })
        .collect::<Vec<_>>();
    let rest = (0..columns.len())
        .filter(|i| !key_positions.contains(i))
        .collect::<Vec<_>>();

    let (source_positions, out_columns) = if normalize_value_columns {
        let spurious = rest
            .iter()
            .map(|i| columns[*i].as_str())
            .filter(|c| !table.iter_value_columns().any(|v| v.get_name() == *c))
            .collect::<Vec<_>>();
        if !spurious.is_empty() {
            info!(
                "Specified records contain value columns not in the data table. These columns will be ignored table={} columns={:?}",
                table.get_name(),
                spurious
            );
        }

        let missing = table
            .iter_value_columns()
            .map(|v| v.get_name())
            .filter(|v| !rest.iter().any(|i| columns[*i] == *v))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            info!(
                "Data table contains value columns not found in specified records. These values will be empty table={} columns={:?}",
                table.get_name(),
                missing
            );
        }

        let positions = table
            .iter_value_columns()
            .map(|v| columns.iter().position(|c| c == v.get_name()))
            .collect::<Vec<_>>();
        (positions, table.value_column_names())
    } else {
        (
            rest.iter().map(|i| Some(*i)).collect::<Vec<_>>(),
            rest.iter().map(|i| columns[*i].clone()).collect(),
        )
    };

    let out_rows = rows
        .map(|mut values| {
            let index = Key::new(
                key_positions
                    .iter()
                    .map(|p| std::mem::replace(&mut values[*p], Value::Null)),
            );
            let values = source_positions
                .iter()
                .map(|p| match p {
                    Some(p) => std::mem::replace(&mut values[*p], Value::Null),
                    None => Value::Null,
                })
                .collect();
            FrameRow { index, values }
        })
        .collect();

    Ok(Frame::from_parts(
        table.key_column_names(),
        out_columns,
        out_rows,
    ))
}
