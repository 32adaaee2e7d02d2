//! The datastore crate.
//!
//! This crate holds the keyed tables that the roster tools load data into.  There are 3 primary entities:
//!
//! - The schema, which names each table and lists its key columns and value columns.
//! - The table, which stores rows addressed by a composite key: one value per key column.
//! - The database, which owns one table per schema entry.
//!
//! Data moves in and out of tables as [Frame]s.  Every mutating call normalizes its input first: key columns are found
//! wherever they are, unknown columns are dropped, and missing value columns are filled with nulls.  Batches are
//! best-effort: keys that collide on create or are absent on update/delete are logged and skipped, and each call
//! returns the keys it actually touched.
//!
//! Tables are stored either in memory or in sqlite, behind the one [DataTable] trait.
mod database;
mod descriptor;
mod errors;
mod frame;
mod identifiers;
mod normalize;
mod student_schema;
mod table;
mod value;

pub use database::*;
pub use descriptor::*;
pub use errors::*;
pub use frame::*;
pub use identifiers::*;
pub use normalize::*;
pub use student_schema::*;
pub use table::*;
pub use value::*;
