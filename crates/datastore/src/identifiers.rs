//! Random surrogate ids for composite keys.
//!
//! An id table maps a composite key (e.g. a school and its own student number) to a random 32-bit id that is unique
//! within the table.  Such a table has exactly one value column, which holds the id.
use std::collections::HashSet;

use log::*;

use crate::errors::*;
use crate::{DataTable, Frame, Key, Value};

/// How many ids we draw for one key before giving up.
///
/// With 32-bit ids, running out means the table is nearly full or the rng is broken.
pub const MAX_ID_ATTEMPTS: usize = 64;

/// Give every key not yet in `table` a fresh random id, and create the rows.
///
/// Keys already present, and repeats within `keys`, are skipped.  Returns the new `(key, id)` pairs in the order the
/// keys were given.
pub fn assign_surrogate_ids<T, R>(
    table: &mut T,
    keys: impl IntoIterator<Item = Key>,
    rng: &mut R,
) -> Result<Vec<(Key, u32)>>
where
    T: DataTable + ?Sized,
    R: rand::Rng,
{
    let descriptor = table.descriptor().clone();
    if descriptor.value_arity() != 1 {
        return Err(Error::InvalidIdTable(descriptor.get_name().to_string()));
    }

    let existing = table.dataframe()?;
    let mut known_keys = existing.keys().cloned().collect::<HashSet<_>>();
    let mut used_ids = existing
        .into_rows()
        .into_iter()
        .flat_map(|r| r.values)
        .collect::<HashSet<Value>>();

    let mut assigned = vec![];
    for key in keys {
        if !known_keys.insert(key.clone()) {
            continue;
        }

        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| rng.gen::<u32>())
            .find(|id| used_ids.insert(Value::from(*id)))
            .ok_or_else(|| Error::IdSpaceExhausted {
                table: descriptor.get_name().to_string(),
                attempts: MAX_ID_ATTEMPTS,
            })?;
        assigned.push((key, id));
    }

    info!(
        "Generated surrogate ids table={} generated={}",
        descriptor.get_name(),
        assigned.len()
    );

    let mut frame = Frame::with_index(
        descriptor.key_column_names(),
        descriptor.value_column_names(),
    )?;
    for (key, id) in assigned.iter() {
        frame.push_indexed_row(key.clone(), vec![Value::from(*id)])?;
    }
    table.create_records(frame)?;

    Ok(assigned)
}
