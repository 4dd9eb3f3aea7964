//! Tuple Store (C1)
//!
//! An abstract interface over a relational store of the working instance.
//! Fs, Fo and Chase are each a [`TupleStore`] handle over a distinct
//! single-file database; the rest of the pipeline never depends on the
//! concrete backend.
//!
//! Two implementations ship here: [`sqlite::SqliteStore`] for real runs
//! (one embedded file per fragment, per §6) and [`memory::MemoryStore`]
//! for fast in-process tests.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::value::Value;

/// A single equality condition for a point query: `column = value`.
pub type ColumnEq<'a> = (&'a str, &'a Value);

/// Abstract relational tuple store (C1, §4.1).
///
/// Implementations must guarantee set-semantics inserts (no duplicate
/// rows), atomic commit at the end of each batch, and indexability of
/// attribute columns for point queries.
pub trait TupleStore {
    /// All relation names currently known to the store.
    fn relations(&self) -> StoreResult<Vec<String>>;

    /// Ordered column names of a relation.
    fn columns(&self, relation: &str) -> StoreResult<Vec<String>>;

    /// Ordered primary-key column names of a relation, empty if the
    /// relation declares no primary key.
    fn primary_key(&self, relation: &str) -> StoreResult<Vec<String>>;

    /// Creates the relation if absent, mirroring `columns` with a generic
    /// text-typed schema. A no-op if the relation already exists.
    fn ensure_relation(&self, relation: &str, columns: &[String]) -> StoreResult<()>;

    /// Point query: every row where all of `conditions` hold (AND semantics).
    fn query_eq(&self, relation: &str, conditions: &[ColumnEq<'_>]) -> StoreResult<Vec<Vec<Value>>>;

    /// Point query: every row where any of `columns` equals `value` (OR
    /// semantics). Used by the initial extractor (C3) to find all rows
    /// mentioning a sensitive constant in any non-key column.
    fn query_any_eq(&self, relation: &str, columns: &[String], value: &Value) -> StoreResult<Vec<Vec<Value>>>;

    /// Inserts `rows` (each ordered per `columns`) if not already present
    /// under set semantics. Returns the number of rows actually inserted.
    fn insert_if_absent(&self, relation: &str, columns: &[String], rows: &[Vec<Value>]) -> StoreResult<usize>;

    /// Deletes every row matching `rows` exactly (using the primary key if
    /// one exists, otherwise the full tuple). Returns the number deleted.
    fn delete_matching(&self, relation: &str, columns: &[String], rows: &[Vec<Value>]) -> StoreResult<usize>;

    /// All rows of a relation, in no particular order.
    fn all_rows(&self, relation: &str) -> StoreResult<Vec<Vec<Value>>>;

    /// Number of rows in a relation.
    fn row_count(&self, relation: &str) -> StoreResult<usize> {
        Ok(self.all_rows(relation)?.len())
    }
}
