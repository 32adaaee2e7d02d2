//! Frames: small in-memory tables of named columns.
//!
//! Frames are how records move in and out of tables.  A frame has ordered, uniquely named columns and, optionally, an
//! index: a second set of named columns whose per-row values form a [Key].  Input frames usually have no index (the
//! key columns are ordinary columns); snapshots from a table are indexed by the table's key columns.
use std::collections::HashSet;

use crate::errors::*;
use crate::{Key, Value};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FrameRow {
    /// Empty when the frame has no index.
    pub index: Key,
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
    index_names: Vec<String>,
    columns: Vec<String>,
    rows: Vec<FrameRow>,
}

fn check_unique<'a>(names: impl Iterator<Item = &'a String>) -> Result<()> {
    let mut seen = HashSet::new();
    for n in names {
        if !seen.insert(n.as_str()) {
            return Err(Error::DuplicateFrameColumn(n.clone()));
        }
    }
    Ok(())
}

impl Frame {
    /// An empty frame with the given columns and no index.
    pub fn new(columns: Vec<String>) -> Result<Frame> {
        Frame::with_index(vec![], columns)
    }

    /// An empty frame indexed by `index_names`.
    ///
    /// Index and column names share one namespace.
    pub fn with_index(index_names: Vec<String>, columns: Vec<String>) -> Result<Frame> {
        check_unique(index_names.iter().chain(columns.iter()))?;
        Ok(Frame {
            index_names,
            columns,
            rows: vec![],
        })
    }

    /// Build an unindexed frame from anything serde can turn into a map of column name to value.
    ///
    /// Columns are the union of every record's fields, in the order first seen (each record's own fields come out of
    /// serde_json sorted).  A record without some column gets null there.
    pub fn from_records<T: serde::Serialize>(records: &[T]) -> Result<Frame> {
        let mut columns: Vec<String> = vec![];
        let mut maps = Vec::with_capacity(records.len());

        for (index, r) in records.iter().enumerate() {
            let map = match serde_json::to_value(r)? {
                serde_json::Value::Object(m) => m,
                _ => return Err(Error::NotARecord { index }),
            };
            for k in map.keys() {
                if !columns.contains(k) {
                    columns.push(k.clone());
                }
            }
            maps.push(map);
        }

        let rows = maps
            .into_iter()
            .map(|mut m| FrameRow {
                index: Key::default(),
                values: columns
                    .iter()
                    .map(|c| m.remove(c).map(Value::from_json).unwrap_or(Value::Null))
                    .collect(),
            })
            .collect();

        Ok(Frame {
            index_names: vec![],
            columns,
            rows,
        })
    }

    /// Append a row to an unindexed frame.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        self.push_indexed_row(Key::default(), values)
    }

    pub fn push_indexed_row(&mut self, index: Key, values: Vec<Value>) -> Result<()> {
        if index.arity() != self.index_names.len() {
            return Err(Error::RowArity {
                expected: self.index_names.len(),
                got: index.arity(),
            });
        }
        if values.len() != self.columns.len() {
            return Err(Error::RowArity {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        self.rows.push(FrameRow { index, values });
        Ok(())
    }

    /// Builder-style [Frame::push_row], for literals in callers and tests.
    pub fn row(mut self, values: impl IntoIterator<Item = Value>) -> Result<Frame> {
        self.push_row(values.into_iter().collect())?;
        Ok(self)
    }

    /// Assemble a frame whose parts are already known to be consistent.
    pub(crate) fn from_parts(
        index_names: Vec<String>,
        columns: Vec<String>,
        rows: Vec<FrameRow>,
    ) -> Frame {
        debug_assert!(rows
            .iter()
            .all(|r| r.index.arity() == index_names.len() && r.values.len() == columns.len()));
        Frame {
            index_names,
            columns,
            rows,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<String>, Vec<FrameRow>) {
        (self.index_names, self.columns, self.rows)
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names[..]
    }

    pub fn is_indexed(&self) -> bool {
        !self.index_names.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns[..]
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows[..]
    }

    pub fn into_rows(self) -> Vec<FrameRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The index of every row, in row order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.rows.iter().map(|r| &r.index)
    }

    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Look up one cell by index and column.  Returns the first match.
    pub fn get(&self, index: &Key, column: &str) -> Option<&Value> {
        let pos = self.column_position(column)?;
        self.rows
            .iter()
            .find(|r| &r.index == index)
            .map(|r| &r.values[pos])
    }

    /// Deserialize every row, index columns included, into `T`.
    pub fn deserialize_rows<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|r| {
                let map = self
                    .index_names
                    .iter()
                    .zip(r.index.iter())
                    .chain(self.columns.iter().zip(r.values.iter()))
                    .map(|(name, v)| (name.clone(), v.to_json()))
                    .collect::<serde_json::Map<_, _>>();
                Ok(serde_json::from_value(serde_json::Value::Object(map))?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Student {
        school_id: i64,
        student_id: i64,
        name: Option<String>,
    }

    #[test]
    fn from_records_unions_columns() {
        let frame = Frame::from_records(&[
            serde_json::json!({"a": 1, "b": "x"}),
            serde_json::json!({"b": "y", "c": [1, 2]}),
        ])
        .unwrap();
        assert_eq!(frame.columns(), ["a", "b", "c"]);
        assert_eq!(
            frame.rows()[1].values,
            vec![
                Value::Null,
                Value::from("y"),
                Value::Json(serde_json::json!([1, 2]))
            ]
        );
        assert!(!frame.is_indexed());
    }

    #[test]
    fn from_records_rejects_scalars() {
        assert!(matches!(
            Frame::from_records(&[serde_json::json!({"a": 1}), serde_json::json!(3)]),
            Err(Error::NotARecord { index: 1 })
        ));
    }

    #[test]
    fn rejects_duplicate_columns_and_bad_rows() {
        assert!(matches!(
            Frame::with_index(vec!["a".into()], vec!["b".into(), "a".into()]),
            Err(Error::DuplicateFrameColumn(_))
        ));

        let mut frame = Frame::new(vec!["a".into()]).unwrap();
        assert!(matches!(
            frame.push_row(vec![]),
            Err(Error::RowArity {
                expected: 1,
                got: 0
            })
        ));
        assert!(matches!(
            frame.push_indexed_row(crate::key![1], vec![Value::Null]),
            Err(Error::RowArity { .. })
        ));
    }

    #[test]
    fn deserializes_through_serde() {
        let students = vec![
            Student {
                school_id: 1,
                student_id: 2,
                name: Some("Ann".into()),
            },
            Student {
                school_id: 1,
                student_id: 3,
                name: None,
            },
        ];
        let frame = Frame::from_records(&students).unwrap();
        assert_eq!(frame.deserialize_rows::<Student>().unwrap(), students);
        assert_eq!(
            frame.get(&Key::default(), "name"),
            Some(&Value::from("Ann"))
        );
    }
}
