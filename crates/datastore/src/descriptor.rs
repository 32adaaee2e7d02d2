//! Schema descriptors.
//!
//! A schema is a set of named tables.  Each table has an ordered list of key columns, which together form the
//! composite key of a row, and an ordered list of value columns.  Names are plain identifiers, so that every backend
//! can use them verbatim.
//!
//! Schemas are immutable once built.  Build them either with [SchemaDescriptorBuilder] or from a JSON config of the
//! form `{"table": {"key_column_names": [...], "value_column_names": [...]}}`.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::*;

lazy_static::lazy_static! {
    static ref IDENTIFIER: regex::Regex =
        regex::Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("Identifier regex should compile");
}

fn check_identifier(name: &str) -> Result<()> {
    if !IDENTIFIER.is_match(name) {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Whether a column is part of the composite key or carries a value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    Key,
    Value,
}

/// A column in a table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDescriptor {
    name: String,
    role: ColumnRole,
}

/// Description of a table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableDescriptor {
    name: String,
    key_columns: Vec<ColumnDescriptor>,
    value_columns: Vec<ColumnDescriptor>,
}

/// Description of a whole database: every table, in the order they were added.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SchemaDescriptor {
    tables: Vec<TableDescriptor>,
}

impl ColumnDescriptor {
    pub fn new(name: String, role: ColumnRole) -> Result<Self> {
        check_identifier(&name)?;
        Ok(Self { name, role })
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_role(&self) -> ColumnRole {
        self.role
    }

    pub fn is_key(&self) -> bool {
        self.role == ColumnRole::Key
    }
}

impl TableDescriptor {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Key columns, then value columns.
    pub fn iter_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.key_columns.iter().chain(self.value_columns.iter())
    }

    pub fn iter_key_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.key_columns.iter()
    }

    pub fn iter_value_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.value_columns.iter()
    }

    pub fn key_column_names(&self) -> Vec<String> {
        self.key_columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn value_column_names(&self) -> Vec<String> {
        self.value_columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn key_arity(&self) -> usize {
        self.key_columns.len()
    }

    pub fn value_arity(&self) -> usize {
        self.value_columns.len()
    }
}

impl SchemaDescriptor {
    pub fn iter_tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter()
    }

    pub fn get_table(&self, name: &str) -> Result<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Parse the JSON config format.
    pub fn from_json_str(json: &str) -> Result<SchemaDescriptor> {
        let config: SchemaConfig = serde_json::from_str(json)?;
        SchemaDescriptor::from_config(config)
    }

    pub fn from_json_reader(reader: impl std::io::Read) -> Result<SchemaDescriptor> {
        let config: SchemaConfig = serde_json::from_reader(reader)?;
        SchemaDescriptor::from_config(config)
    }

    pub fn from_config(config: SchemaConfig) -> Result<SchemaDescriptor> {
        let mut builder = SchemaDescriptorBuilder::new();
        for (table, columns) in config {
            builder.add_table(table, |tb| {
                for k in columns.key_column_names {
                    tb.add_key_column(k)?;
                }
                for v in columns.value_column_names {
                    tb.add_value_column(v)?;
                }
                Ok(())
            })?;
        }
        builder.build()
    }

    pub fn to_config(&self) -> SchemaConfig {
        self.tables
            .iter()
            .map(|t| {
                (
                    t.name.clone(),
                    TableConfig {
                        key_column_names: t.key_column_names(),
                        value_column_names: t.value_column_names(),
                    },
                )
            })
            .collect()
    }
}

/// The column lists of one table in the JSON config.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub key_column_names: Vec<String>,
    pub value_column_names: Vec<String>,
}

/// Config form of a schema, mapping table name to its columns.
pub type SchemaConfig = BTreeMap<String, TableConfig>;

/// A helper to build tables.
pub struct TableBuilder {
    name: String,
    key_columns: Vec<ColumnDescriptor>,
    value_columns: Vec<ColumnDescriptor>,
}

impl TableBuilder {
    pub fn new(name: String) -> Result<Self> {
        check_identifier(&name)?;
        Ok(Self {
            name,
            key_columns: vec![],
            value_columns: vec![],
        })
    }

    /// Key and value names share one namespace, which keeps the two lists disjoint.
    fn check_name(&self, name: &str) -> Result<()> {
        if self
            .key_columns
            .iter()
            .chain(self.value_columns.iter())
            .any(|x| x.get_name() == name)
        {
            return Err(Error::DuplicateColumn {
                table: self.name.clone(),
                column: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_key_column(&mut self, name: String) -> Result<()> {
        self.check_name(&name)?;
        self.key_columns
            .push(ColumnDescriptor::new(name, ColumnRole::Key)?);
        Ok(())
    }

    pub fn add_value_column(&mut self, name: String) -> Result<()> {
        self.check_name(&name)?;
        self.value_columns
            .push(ColumnDescriptor::new(name, ColumnRole::Value)?);
        Ok(())
    }

    pub fn build(self) -> Result<TableDescriptor> {
        if self.key_columns.is_empty() {
            return Err(Error::NoKeyColumns(self.name));
        }

        Ok(TableDescriptor {
            name: self.name,
            key_columns: self.key_columns,
            value_columns: self.value_columns,
        })
    }
}

#[derive(Default)]
pub struct SchemaDescriptorBuilder {
    tables: Vec<TableDescriptor>,
}

impl SchemaDescriptorBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a table, letting the closure declare its columns.
    pub fn add_table(
        &mut self,
        name: String,
        builder: impl FnOnce(&mut TableBuilder) -> Result<()>,
    ) -> Result<()> {
        if self.tables.iter().any(|t| t.name == name) {
            return Err(Error::DuplicateTable(name));
        }

        let mut tb = TableBuilder::new(name)?;
        builder(&mut tb)?;
        self.tables.push(tb.build()?);
        Ok(())
    }

    pub fn build(self) -> Result<SchemaDescriptor> {
        Ok(SchemaDescriptor {
            tables: self.tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"{
        "student_ids": {
            "key_column_names": ["tc_school_id", "tc_student_id"],
            "value_column_names": ["student_id"]
        },
        "notes": {
            "key_column_names": ["note_id"],
            "value_column_names": []
        }
    }"#;

    #[test]
    fn parses_json_config() {
        let desc = SchemaDescriptor::from_json_str(CONFIG).unwrap();
        let table = desc.get_table("student_ids").unwrap();
        assert_eq!(
            table.key_column_names(),
            vec!["tc_school_id".to_string(), "tc_student_id".to_string()]
        );
        assert_eq!(table.value_column_names(), vec!["student_id".to_string()]);
        assert_eq!(desc.get_table("notes").unwrap().value_arity(), 0);
        assert!(matches!(
            desc.get_table("nope"),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn config_round_trips() {
        let desc = SchemaDescriptor::from_json_str(CONFIG).unwrap();
        let again = SchemaDescriptor::from_config(desc.to_config()).unwrap();
        assert_eq!(desc, again);
    }

    #[test]
    fn rejects_overlapping_key_and_value_columns() {
        let err = SchemaDescriptor::from_json_str(
            r#"{"t": {"key_column_names": ["a"], "value_column_names": ["b", "a"]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { column, .. } if column == "a"));
    }

    #[test]
    fn rejects_bad_tables() {
        let mut builder = SchemaDescriptorBuilder::new();
        assert!(matches!(
            builder.add_table("empty".into(), |_| Ok(())),
            Err(Error::NoKeyColumns(_))
        ));
        assert!(matches!(
            builder.add_table("has space".into(), |_| Ok(())),
            Err(Error::InvalidIdentifier(_))
        ));

        builder
            .add_table("t".into(), |tb| tb.add_key_column("id".into()))
            .unwrap();
        assert!(matches!(
            builder.add_table("t".into(), |tb| tb.add_key_column("id".into())),
            Err(Error::DuplicateTable(_))
        ));
        assert!(matches!(
            builder.add_table("u".into(), |tb| tb.add_value_column("1st".into())),
            Err(Error::InvalidIdentifier(_))
        ));
    }
}
