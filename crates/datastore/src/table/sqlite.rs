//! A table stored in sqlite.
//!
//! All tables of a database share one connection.  Each table is one sqlite table named after it, with one untyped
//! column per key and value column; leaving the columns untyped means values come back out as the kind they went in
//! as.  JSON values are stored as blobs.
//!
//! Key uniqueness is enforced by the batch partitioning rather than by a primary key, because sqlite considers NULLs
//! distinct in unique constraints and a null key part is allowed.  Keys are matched with `IS` for the same reason.
//!
//! Every mutating call runs in a single transaction.
use std::sync::{Arc, Mutex};

use log::*;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use super::{partition_batch, Batch, DataTable};
use crate::errors::*;
use crate::{Frame, FrameRow, Key, TableDescriptor, Value};

pub(crate) type SharedConnection = Arc<Mutex<rusqlite::Connection>>;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::F64(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Json(j) => ToSqlOutput::Owned(rusqlite::types::Value::Blob(
                serde_json::to_vec(j)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            )),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::from(f),
            ValueRef::Text(t) => Value::String(
                std::str::from_utf8(t)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))?
                    .to_string(),
            ),
            ValueRef::Blob(b) => {
                Value::Json(serde_json::from_slice(b).map_err(|e| FromSqlError::Other(Box::new(e)))?)
            }
        })
    }
}

/// Statements for one table, rendered once up front.
#[derive(Debug)]
struct Statements {
    insert: String,
    /// None if the table has no value columns, in which case there is nothing to update.
    update: Option<String>,
    delete: String,
    exists: String,
    load: String,
    index: String,
    count: String,
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name)
}

const CREATE_TEMPLATE: &str = r#"
CREATE TABLE IF NOT EXISTS {{ table }} (
    {{ columns | join(sep=", ") }}
);
CREATE INDEX IF NOT EXISTS {{ key_index }} ON {{ table }}({{ keys | join(sep=", ") }});
"#;

const KEY_MATCH_TEMPLATE: &str =
    r#"{% for k in keys %}{{ k }} IS ?{% if not loop.last %} AND {% endif %}{% endfor %}"#;

const INSERT_TEMPLATE: &str = r#"
INSERT INTO {{ table }}(
    {{ columns | join(sep=", ") }}
) values (
    {%- for c in columns -%}
    ?{% if not loop.last %}, {% endif -%}
    {%- endfor -%}
)
"#;

/// Parameters are the value columns, then the key columns.  A null value keeps the stored one.
const UPDATE_TEMPLATE: &str = r#"
UPDATE {{ table }} SET
    {%- for c in values %} {{ c }} = COALESCE(?, {{ c }}){% if not loop.last %},{% endif %}{% endfor %}
WHERE {{ key_match }}
"#;

const DELETE_TEMPLATE: &str = r#"DELETE FROM {{ table }} WHERE {{ key_match }}"#;

const EXISTS_TEMPLATE: &str = r#"SELECT 1 FROM {{ table }} WHERE {{ key_match }} LIMIT 1"#;

const LOAD_TEMPLATE: &str = r#"
SELECT {{ columns | join(sep=", ") }}
FROM {{ table }}
ORDER BY {{ keys | join(sep=", ") }}
"#;

const INDEX_TEMPLATE: &str = r#"
SELECT {{ keys | join(sep=", ") }}
FROM {{ table }}
ORDER BY {{ keys | join(sep=", ") }}
"#;

const COUNT_TEMPLATE: &str = r#"SELECT COUNT(*) FROM {{ table }}"#;

fn build_context(descriptor: &TableDescriptor) -> Result<tera::Context> {
    let keys = descriptor
        .iter_key_columns()
        .map(|c| quote_ident(c.get_name()))
        .collect::<Vec<_>>();
    let values = descriptor
        .iter_value_columns()
        .map(|c| quote_ident(c.get_name()))
        .collect::<Vec<_>>();
    let columns = keys.iter().chain(values.iter()).collect::<Vec<_>>();

    let mut context = tera::Context::new();
    context.insert("table", &quote_ident(descriptor.get_name()));
    context.insert(
        "key_index",
        &quote_ident(&format!("{}_key_index", descriptor.get_name())),
    );
    context.insert("keys", &keys);
    context.insert("values", &values);
    context.insert("columns", &columns);

    let key_match = tera::Tera::one_off(KEY_MATCH_TEMPLATE, &context, false)?;
    context.insert("key_match", &key_match);
    Ok(context)
}

fn render(template: &str, context: &tera::Context) -> Result<String> {
    Ok(tera::Tera::one_off(template, context, false)?)
}

/// A table stored in sqlite.  Build these through [crate::Database::open_sqlite].
#[derive(Debug)]
pub struct SqliteTable {
    descriptor: TableDescriptor,
    conn: SharedConnection,
    statements: Statements,
}

impl SqliteTable {
    /// Create the backing sqlite table if needed, and prepare statements for it.
    pub(crate) fn open(descriptor: TableDescriptor, conn: SharedConnection) -> Result<SqliteTable> {
        let context = build_context(&descriptor)?;
        let create = render(CREATE_TEMPLATE, &context)?;
        let statements = Statements {
            insert: render(INSERT_TEMPLATE, &context)?,
            update: if descriptor.value_arity() > 0 {
                Some(render(UPDATE_TEMPLATE, &context)?)
            } else {
                None
            },
            delete: render(DELETE_TEMPLATE, &context)?,
            exists: render(EXISTS_TEMPLATE, &context)?,
            load: render(LOAD_TEMPLATE, &context)?,
            index: render(INDEX_TEMPLATE, &context)?,
            count: render(COUNT_TEMPLATE, &context)?,
        };
        debug!(
            "Statements for table={}: {:?} create={}",
            descriptor.get_name(),
            statements,
            create
        );

        conn.lock()
            .map_err(|_| Error::ConnectionPoisoned)?
            .execute_batch(&create)?;

        info!(
            "Initializing sqlite data table table={} key_columns={:?} value_columns={:?}",
            descriptor.get_name(),
            descriptor.key_column_names(),
            descriptor.value_column_names()
        );
        Ok(SqliteTable {
            descriptor,
            conn,
            statements,
        })
    }

    /// Run `f` in a transaction, committing if it succeeds.  On error, dropping the transaction rolls it back.
    fn with_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction, &Statements) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| Error::ConnectionPoisoned)?;
        let transaction = conn.transaction()?;
        let ret = f(&transaction, &self.statements)?;
        transaction.commit()?;
        Ok(ret)
    }

    /// Keep the rows of `batch` whose presence in the table equals `want_present`.
    fn partition_on_presence(
        &self,
        transaction: &rusqlite::Transaction,
        batch: Batch,
        want_present: bool,
        reason: &str,
    ) -> Result<Vec<FrameRow>> {
        let mut exists = transaction.prepare_cached(&self.statements.exists)?;
        partition_batch(&self.descriptor, batch, reason, |k| {
            Ok(exists.exists(rusqlite::params_from_iter(k.iter()))? == want_present)
        })
    }
}

impl DataTable for SqliteTable {
    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn create_batch(&mut self, batch: Batch) -> Result<Vec<Key>> {
        let ret = self.with_transaction(|transaction, statements| {
            let rows =
                self.partition_on_presence(transaction, batch, false, "are already in the data table")?;
            let mut insert = transaction.prepare_cached(&statements.insert)?;
            let mut ret = Vec::with_capacity(rows.len());
            for r in rows {
                insert.execute(rusqlite::params_from_iter(
                    r.index.iter().chain(r.values.iter()),
                ))?;
                ret.push(r.index);
            }
            Ok(ret)
        })?;

        info!(
            "Created records table={} created={}",
            self.descriptor.get_name(),
            ret.len()
        );
        Ok(ret)
    }

    fn update_batch(&mut self, batch: Batch) -> Result<Vec<Key>> {
        let ret = self.with_transaction(|transaction, statements| {
            let rows =
                self.partition_on_presence(transaction, batch, true, "are not in the data table")?;
            let mut ret = Vec::with_capacity(rows.len());
            for r in rows {
                if let Some(update) = statements.update.as_ref() {
                    transaction
                        .prepare_cached(update)?
                        .execute(rusqlite::params_from_iter(
                            r.values.iter().chain(r.index.iter()),
                        ))?;
                }
                ret.push(r.index);
            }
            Ok(ret)
        })?;

        info!(
            "Updated records table={} updated={}",
            self.descriptor.get_name(),
            ret.len()
        );
        Ok(ret)
    }

    fn delete_batch(&mut self, batch: Batch) -> Result<Vec<Key>> {
        let ret = self.with_transaction(|transaction, statements| {
            let rows =
                self.partition_on_presence(transaction, batch, true, "are not in the data table")?;
            let mut delete = transaction.prepare_cached(&statements.delete)?;
            let mut ret = Vec::with_capacity(rows.len());
            for r in rows {
                delete.execute(rusqlite::params_from_iter(r.index.iter()))?;
                ret.push(r.index);
            }
            Ok(ret)
        })?;

        info!(
            "Deleted records table={} deleted={}",
            self.descriptor.get_name(),
            ret.len()
        );
        Ok(ret)
    }

    fn dataframe(&self) -> Result<Frame> {
        let conn = self.conn.lock().map_err(|_| Error::ConnectionPoisoned)?;
        let mut statement = conn.prepare_cached(&self.statements.load)?;
        let key_arity = self.descriptor.key_arity();
        let width = key_arity + self.descriptor.value_arity();

        let mut rows = vec![];
        let mut query = statement.query([])?;
        while let Some(r) = query.next()? {
            let mut values = (0..width)
                .map(|i| r.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let rest = values.split_off(key_arity);
            rows.push(FrameRow {
                index: Key::new(values),
                values: rest,
            });
        }
        rows.sort_by(|a, b| a.index.cmp(&b.index));

        Ok(Frame::from_parts(
            self.descriptor.key_column_names(),
            self.descriptor.value_column_names(),
            rows,
        ))
    }

    fn index(&self) -> Result<Vec<Key>> {
        let conn = self.conn.lock().map_err(|_| Error::ConnectionPoisoned)?;
        let mut statement = conn.prepare_cached(&self.statements.index)?;
        let key_arity = self.descriptor.key_arity();

        let mut keys = vec![];
        let mut query = statement.query([])?;
        while let Some(r) = query.next()? {
            keys.push(
                (0..key_arity)
                    .map(|i| r.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Key>>()?,
            );
        }
        keys.sort();
        Ok(keys)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::ConnectionPoisoned)?;
        let count: i64 = conn
            .prepare_cached(&self.statements.count)?
            .query_row([], |r| r.get(0))?;
        Ok(count as usize)
    }
}
