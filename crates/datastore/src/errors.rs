#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Key columns {columns:?} missing from records specified for table {table}")]
    MissingKeyColumns { table: String, columns: Vec<String> },

    #[error("{0:?} is not a valid table or column name")]
    InvalidIdentifier(String),

    #[error("Table {table}: duplicate column name {column}")]
    DuplicateColumn { table: String, column: String },

    #[error("Duplicate table name {0}")]
    DuplicateTable(String),

    #[error("Table {0} must have at least one key column")]
    NoKeyColumns(String),

    #[error("Records contain the column {0} more than once")]
    DuplicateFrameColumn(String),

    #[error("Row has {got} values but the records have {expected} columns")]
    RowArity { expected: usize, got: usize },

    #[error("Record {index} does not serialize to a map of column names to values")]
    NotARecord { index: usize },

    #[error("No table named {0}")]
    UnknownTable(String),

    #[error("Table {0} must have exactly one value column to hold surrogate ids")]
    InvalidIdTable(String),

    #[error("Table {table}: could not find an unused id after {attempts} attempts")]
    IdSpaceExhausted { table: String, attempts: usize },

    #[error("The sqlite connection was poisoned by a panic in another thread")]
    ConnectionPoisoned,

    #[error("Sqlite error: {}", _0)]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {}", _0)]
    Json(#[from] serde_json::Error),

    #[error("Template error: {}", _0)]
    Template(#[from] tera::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
