//! In-memory [`super::TupleStore`] implementation.
//!
//! Backs the unit and property tests: no file I/O, no SQL, just a
//! `HashMap` of rows per relation. Mirrors the semantics of
//! [`super::sqlite::SqliteStore`] exactly so tests can assert pipeline
//! behaviour without touching disk.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::store::{ColumnEq, StoreError, StoreResult, TupleStore};
use crate::value::Value;

struct Relation {
    columns: Vec<String>,
    pk: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// A plain in-memory tuple store, useful for tests and for small runs
/// that do not need persistence across process restarts.
pub struct MemoryStore {
    relations: RefCell<HashMap<String, Relation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            relations: RefCell::new(HashMap::new()),
        }
    }

    /// Declares a relation with its column list and (possibly empty) primary key.
    pub fn declare_relation(&self, name: &str, columns: &[&str], pk: &[&str]) {
        self.relations.borrow_mut().insert(
            name.to_string(),
            Relation {
                columns: columns.iter().map(|s| s.to_string()).collect(),
                pk: pk.iter().map(|s| s.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Inserts a row unconditionally (used by test fixtures to seed data).
    /// Panics if a row with the same full tuple already exists (set semantics).
    pub fn seed(&self, name: &str, row: Vec<Value>) {
        self.insert_if_absent(name, &self.columns(name).unwrap(), &[row]).unwrap();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

fn column_index(rel: &Relation, column: &str, relation_name: &str) -> StoreResult<usize> {
    rel.columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| StoreError::ColumnMissing {
            relation: relation_name.to_string(),
            column: column.to_string(),
        })
}

impl TupleStore for MemoryStore {
    fn relations(&self) -> StoreResult<Vec<String>> {
        Ok(self.relations.borrow().keys().cloned().collect())
    }

    fn columns(&self, relation: &str) -> StoreResult<Vec<String>> {
        let relations = self.relations.borrow();
        let rel = relations
            .get(relation)
            .ok_or_else(|| StoreError::SchemaMissing(relation.to_string()))?;
        Ok(rel.columns.clone())
    }

    fn primary_key(&self, relation: &str) -> StoreResult<Vec<String>> {
        let relations = self.relations.borrow();
        let rel = relations
            .get(relation)
            .ok_or_else(|| StoreError::SchemaMissing(relation.to_string()))?;
        Ok(rel.pk.clone())
    }

    fn ensure_relation(&self, relation: &str, columns: &[String]) -> StoreResult<()> {
        let mut relations = self.relations.borrow_mut();
        relations.entry(relation.to_string()).or_insert_with(|| Relation {
            columns: columns.to_vec(),
            pk: Vec::new(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn query_eq(&self, relation: &str, conditions: &[ColumnEq<'_>]) -> StoreResult<Vec<Vec<Value>>> {
        let relations = self.relations.borrow();
        let rel = relations
            .get(relation)
            .ok_or_else(|| StoreError::SchemaMissing(relation.to_string()))?;
        let mut indices = Vec::with_capacity(conditions.len());
        for (col, _) in conditions {
            indices.push(column_index(rel, col, relation)?);
        }
        let matches = rel
            .rows
            .iter()
            .filter(|row| {
                indices
                    .iter()
                    .zip(conditions.iter())
                    .all(|(&idx, (_, val))| &row[idx] == *val)
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    fn query_any_eq(&self, relation: &str, columns: &[String], value: &Value) -> StoreResult<Vec<Vec<Value>>> {
        let relations = self.relations.borrow();
        let rel = relations
            .get(relation)
            .ok_or_else(|| StoreError::SchemaMissing(relation.to_string()))?;
        let mut indices = Vec::with_capacity(columns.len());
        for col in columns {
            indices.push(column_index(rel, col, relation)?);
        }
        let matches = rel
            .rows
            .iter()
            .filter(|row| indices.iter().any(|&idx| row[idx] == *value))
            .cloned()
            .collect();
        Ok(matches)
    }

    fn insert_if_absent(&self, relation: &str, columns: &[String], rows: &[Vec<Value>]) -> StoreResult<usize> {
        let mut relations = self.relations.borrow_mut();
        let rel = relations
            .entry(relation.to_string())
            .or_insert_with(|| Relation {
                columns: columns.to_vec(),
                pk: Vec::new(),
                rows: Vec::new(),
            });
        let mut inserted = 0;
        for row in rows {
            if !rel.rows.iter().any(|r| r == row) {
                rel.rows.push(row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn delete_matching(&self, relation: &str, columns: &[String], rows: &[Vec<Value>]) -> StoreResult<usize> {
        let mut relations = self.relations.borrow_mut();
        let rel = relations
            .get_mut(relation)
            .ok_or_else(|| StoreError::SchemaMissing(relation.to_string()))?;

        // Matches SqliteStore::delete_matching: delete by primary key when
        // one is declared, by the full tuple otherwise (§4.1).
        let pk_indices: Vec<usize> = rel
            .pk
            .iter()
            .map(|pk_col| {
                columns
                    .iter()
                    .position(|c| c == pk_col)
                    .ok_or_else(|| StoreError::ColumnMissing {
                        relation: relation.to_string(),
                        column: pk_col.clone(),
                    })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let before = rel.rows.len();
        if pk_indices.is_empty() {
            rel.rows.retain(|r| !rows.iter().any(|target| target == r));
        } else {
            rel.rows.retain(|r| {
                !rows
                    .iter()
                    .any(|target| pk_indices.iter().all(|&i| target[i] == r[i]))
            });
        }
        Ok(before - rel.rows.len())
    }

    fn all_rows(&self, relation: &str) -> StoreResult<Vec<Vec<Value>>> {
        let relations = self.relations.borrow();
        let rel = relations
            .get(relation)
            .ok_or_else(|| StoreError::SchemaMissing(relation.to_string()))?;
        Ok(rel.rows.clone())
    }
}
