//! The database owns one table per entry of a schema, for its whole lifetime.
//!
//! Tables are created when the database is built and are never replaced, only mutated.  Mutation takes `&mut self`,
//! so a database has exactly one writer at a time; share one across threads by wrapping it in a mutex.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::*;

use crate::errors::*;
use crate::{DataTable, MemoryTable, SchemaDescriptor, SqliteTable, Table, TableDescriptor};

pub struct Database {
    descriptor: SchemaDescriptor,
    tables: HashMap<String, Table>,
}

/// SQL that we run as part of opening a sqlite connection.
///
/// - Sets up WAL.
/// - Enables the busy timeout
/// - Raises the default cache size, since sqlite's default is sized for phones.
const INITIAL_SQL: &str = r#"
PRAGMA busy_timeout = 1000;
PRAGMA cache_size = -100000;
pragma journal_mode = WAL;
PRAGMA wal_autocheckpoint = 10000;
"#;

fn log_tables(descriptor: &SchemaDescriptor, backend: &str) {
    use itertools::Itertools;

    info!(
        "Opening database backend={} tables={}",
        backend,
        descriptor.iter_tables().map(|t| t.get_name()).join(", ")
    );
}

impl Database {
    /// Build a database whose tables live in memory.  This can't fail: the schema was validated when it was built.
    pub fn in_memory(descriptor: SchemaDescriptor) -> Database {
        log_tables(&descriptor, "memory");
        let tables: HashMap<String, Table> = descriptor
            .iter_tables()
            .map(|t| {
                (
                    t.get_name().to_string(),
                    MemoryTable::new(t.clone()).into(),
                )
            })
            .collect();
        Database { descriptor, tables }
    }

    /// Open or create a sqlite database at `<dir>/database.sqlite`.
    ///
    /// Tables already present in the file keep their rows.
    pub fn open_sqlite(descriptor: SchemaDescriptor, dir: &std::path::Path) -> Result<Database> {
        let path = dir.join("database.sqlite");
        info!("Opening database at {}", path.display());
        let conn = rusqlite::Connection::open(&path)?;
        Database::with_connection(conn, descriptor)
    }

    /// Build a sqlite-backed database from an already-existing connection.
    pub fn with_connection(
        conn: rusqlite::Connection,
        descriptor: SchemaDescriptor,
    ) -> Result<Database> {
        log_tables(&descriptor, "sqlite");
        conn.execute_batch(INITIAL_SQL)?;
        let conn = Arc::new(Mutex::new(conn));

        let mut tables: HashMap<String, Table> = HashMap::new();
        for t in descriptor.iter_tables() {
            let table = SqliteTable::open(t.clone(), conn.clone())?;
            tables.insert(t.get_name().to_string(), table.into());
        }

        Ok(Database { descriptor, tables })
    }

    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    pub fn table_descriptor(&self, name: &str) -> Result<&TableDescriptor> {
        self.descriptor.get_table(name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Tables in schema order.
    pub fn iter_tables(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.descriptor.iter_tables().map(move |t| {
            let table = self
                .tables
                .get(t.get_name())
                .expect("Every schema table is built with the database");
            (t.get_name(), table)
        })
    }

    /// Delete the contents of all tables.  Primarily useful for testing.
    pub fn truncate_all_tables(&mut self) -> Result<()> {
        for table in self.tables.values_mut() {
            let everything = table.dataframe()?;
            table.delete_records(everything)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::{key, Frame, Key, Value};

    fn build_test_descriptor() -> SchemaDescriptor {
        let mut builder = crate::SchemaDescriptorBuilder::new();
        builder
            .add_table("students".into(), |tb| {
                tb.add_key_column("school_id".into())?;
                tb.add_key_column("student_id".into())?;
                tb.add_value_column("name".into())?;
                Ok(())
            })
            .unwrap();
        builder
            .add_table("profiles".into(), |tb| {
                tb.add_key_column("student_id".into())?;
                tb.add_value_column("name".into())?;
                tb.add_value_column("age".into())?;
                tb.add_value_column("tags".into())?;
                Ok(())
            })
            .unwrap();
        builder.build().unwrap()
    }

    fn student_rows(rows: &[(i64, i64, Option<&str>)]) -> Frame {
        let mut frame = Frame::new(vec![
            "school_id".into(),
            "student_id".into(),
            "name".into(),
        ])
        .unwrap();
        for (school, student, name) in rows {
            frame
                .push_row(vec![
                    Value::from(*school),
                    Value::from(*student),
                    Value::from(*name),
                ])
                .unwrap();
        }
        frame
    }

    /// Every flavor of database we can build, so that the scenarios below run against each backend.
    fn for_each_backend(mut check: impl FnMut(Database)) {
        roster_logging::log_for_tests();
        check(Database::in_memory(build_test_descriptor()));

        let tdir = tempfile::TempDir::new().unwrap();
        check(Database::open_sqlite(build_test_descriptor(), tdir.path()).unwrap());
    }

    fn name_of(db: &Database, key: Key) -> Option<Value> {
        db.table("students")
            .unwrap()
            .dataframe()
            .unwrap()
            .get(&key, "name")
            .cloned()
    }

    /// Creating a key that already exists keeps the old row and doesn't report the key.
    #[test]
    fn create_skips_existing_keys() {
        for_each_backend(|mut db| {
            let students = db.table_mut("students").unwrap();
            let created = students
                .create_records(student_rows(&[(1, 1, Some("Ann")), (1, 2, Some("Bo"))]))
                .unwrap();
            assert_eq!(created, vec![key![1, 1], key![1, 2]]);
            assert_eq!(students.len().unwrap(), 2);

            let created = students
                .create_records(student_rows(&[(1, 1, Some("Ann2")), (1, 3, Some("Cy"))]))
                .unwrap();
            // (1, 1) collides and is skipped without an error.
            assert_eq!(created, vec![key![1, 3]]);
            assert_eq!(name_of(&db, key![1, 1]), Some(Value::from("Ann")));
            assert_eq!(name_of(&db, key![1, 3]), Some(Value::from("Cy")));
        });
    }

    #[test]
    fn update_only_touches_existing_rows() {
        for_each_backend(|mut db| {
            let students = db.table_mut("students").unwrap();
            students
                .create_records(student_rows(&[(1, 1, Some("Ann")), (1, 2, Some("Bo"))]))
                .unwrap();

            let updated = students
                .update_records(student_rows(&[(1, 2, Some("Bo2")), (1, 9, Some("Zed"))]))
                .unwrap();
            assert_eq!(updated, vec![key![1, 2]]);
            assert_eq!(
                students.index().unwrap(),
                vec![key![1, 1], key![1, 2]]
            );
            assert_eq!(name_of(&db, key![1, 2]), Some(Value::from("Bo2")));
            assert_eq!(name_of(&db, key![1, 9]), None);
        });
    }

    #[test]
    fn delete_only_removes_existing_rows() {
        for_each_backend(|mut db| {
            let students = db.table_mut("students").unwrap();
            students
                .create_records(student_rows(&[(1, 1, Some("Ann")), (1, 2, Some("Bo"))]))
                .unwrap();

            let deleted = students
                .delete_records(student_rows(&[(1, 2, None), (1, 9, None)]))
                .unwrap();
            assert_eq!(deleted, vec![key![1, 2]]);
            assert_eq!(students.index().unwrap(), vec![key![1, 1]]);
        });
    }

    #[test]
    fn update_is_partial() {
        for_each_backend(|mut db| {
            let profiles = db.table_mut("profiles").unwrap();
            let rows = Frame::from_records(&[
                serde_json::json!({"student_id": 1, "name": "Ann", "age": 7, "tags": ["a", "b"]}),
                serde_json::json!({"student_id": 2, "name": "Bo", "age": 8.5}),
            ])
            .unwrap();
            profiles.create_records(rows).unwrap();

            // No age column at all, and an explicit null name.
            let patch = Frame::from_records(&[
                serde_json::json!({"student_id": 1, "name": null, "tags": {"x": 1}}),
                serde_json::json!({"student_id": 2, "name": "Bob"}),
            ])
            .unwrap();
            assert_eq!(
                profiles.update_records(patch).unwrap(),
                vec![key![1], key![2]]
            );

            let snapshot = profiles.dataframe().unwrap();
            assert_eq!(snapshot.index_names(), ["student_id"]);
            assert_eq!(snapshot.columns(), ["name", "age", "tags"]);
            assert_eq!(
                snapshot.rows()[0].values,
                vec![
                    Value::from("Ann"),
                    Value::from(7),
                    Value::Json(serde_json::json!({"x": 1}))
                ]
            );
            assert_eq!(
                snapshot.rows()[1].values,
                vec![Value::from("Bob"), Value::from(8.5), Value::Null]
            );
        });
    }

    #[test]
    fn missing_key_columns_change_nothing() {
        for_each_backend(|mut db| {
            let students = db.table_mut("students").unwrap();
            students
                .create_records(student_rows(&[(1, 1, Some("Ann"))]))
                .unwrap();

            let bad = Frame::new(vec!["student_id".into(), "name".into()])
                .unwrap()
                .row([Value::from(5), Value::from("Eve")])
                .unwrap();
            for result in [
                students.create_records(bad.clone()),
                students.update_records(bad.clone()),
                students.delete_records(bad),
            ] {
                match result {
                    Err(Error::MissingKeyColumns { columns, .. }) => {
                        assert_eq!(columns, vec!["school_id"])
                    }
                    x => panic!("Expected missing key columns, got {:?}", x),
                }
            }
            assert_eq!(students.index().unwrap(), vec![key![1, 1]]);
        });
    }

    #[test]
    fn repeated_keys_in_one_batch_keep_the_first() {
        for_each_backend(|mut db| {
            let students = db.table_mut("students").unwrap();
            let created = students
                .create_records(student_rows(&[
                    (1, 1, Some("Ann")),
                    (1, 1, Some("Other Ann")),
                    (2, 1, None),
                ]))
                .unwrap();
            assert_eq!(created, vec![key![1, 1], key![2, 1]]);
            assert_eq!(name_of(&db, key![1, 1]), Some(Value::from("Ann")));
            assert_eq!(name_of(&db, key![2, 1]), Some(Value::Null));
        });
    }

    #[test]
    fn snapshots_are_sorted_and_deserialize() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Student {
            school_id: i64,
            student_id: i64,
            name: Option<String>,
        }

        for_each_backend(|mut db| {
            let students = db.table_mut("students").unwrap();
            students
                .create_records(student_rows(&[
                    (2, 1, Some("Cy")),
                    (1, 2, None),
                    (1, 1, Some("Ann")),
                ]))
                .unwrap();
            let loaded = students
                .dataframe()
                .unwrap()
                .deserialize_rows::<Student>()
                .unwrap();
            assert_eq!(
                loaded,
                vec![
                    Student {
                        school_id: 1,
                        student_id: 1,
                        name: Some("Ann".into())
                    },
                    Student {
                        school_id: 1,
                        student_id: 2,
                        name: None
                    },
                    Student {
                        school_id: 2,
                        student_id: 1,
                        name: Some("Cy".into())
                    },
                ]
            );
        });
    }

    #[test]
    fn null_key_parts_are_ordinary_keys() {
        for_each_backend(|mut db| {
            let profiles = db.table_mut("profiles").unwrap();
            let rows =
                Frame::from_records(&[serde_json::json!({"student_id": null, "name": "Nobody"})])
                    .unwrap();
            assert_eq!(
                profiles.create_records(rows.clone()).unwrap(),
                vec![key![Value::Null]]
            );
            assert_eq!(profiles.create_records(rows.clone()).unwrap(), Vec::<Key>::new());
            assert_eq!(
                profiles.delete_records(rows).unwrap(),
                vec![key![Value::Null]]
            );
            assert!(profiles.is_empty().unwrap());
        });
    }

    #[test]
    fn unknown_tables_and_truncation() {
        for_each_backend(|mut db| {
            assert!(matches!(db.table("nope"), Err(Error::UnknownTable(_))));
            assert_eq!(
                db.iter_tables().map(|x| x.0).collect::<Vec<_>>(),
                vec!["students", "profiles"]
            );

            db.table_mut("students")
                .unwrap()
                .create_records(student_rows(&[(1, 1, Some("Ann"))]))
                .unwrap();
            db.truncate_all_tables().unwrap();
            for (_, t) in db.iter_tables() {
                assert!(t.is_empty().unwrap());
            }
        });
    }

    /// Will detect if reopening clobbers existing tables.
    #[test]
    fn sqlite_rows_survive_reopening() {
        let tdir = tempfile::TempDir::new().unwrap();
        {
            let mut db = Database::open_sqlite(build_test_descriptor(), tdir.path()).unwrap();
            db.table_mut("students")
                .unwrap()
                .create_records(student_rows(&[(1, 1, Some("Ann"))]))
                .unwrap();
        }

        let db = Database::open_sqlite(build_test_descriptor(), tdir.path()).unwrap();
        assert_eq!(name_of(&db, key![1, 1]), Some(Value::from("Ann")));
    }
}
