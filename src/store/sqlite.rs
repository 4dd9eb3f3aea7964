//! SQLite-backed [`super::TupleStore`] implementation.
//!
//! Each fragment (Fs, Fo, Chase) is a single-file SQLite database (§6:
//! "a single-file embedded database is sufficient and recommended").
//! Column and primary-key introspection goes through `PRAGMA table_info`,
//! matching the reference implementation this system is descended from.

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{Connection, ToSql};

use crate::store::{ColumnEq, StoreError, StoreResult, TupleStore};
use crate::value::Value;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Text(s) => Ok(ToSqlOutput::Owned(SqlValue::Text(s.clone()))),
            Value::Int(i) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*i))),
        }
    }
}

fn sql_value_to_value(v: SqlValue) -> Value {
    match v {
        SqlValue::Integer(i) => Value::Int(i),
        SqlValue::Real(f) => Value::Text(f.to_string()),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).to_string()),
        SqlValue::Null => Value::Text(String::new()),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A tuple store backed by a single SQLite file (or an in-memory
/// connection when `path` is `:memory:`).
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::configure(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(SqliteStore { conn })
    }

    fn configure(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        )?;
        Ok(())
    }

    fn relation_exists(&self, relation: &str) -> StoreResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [relation],
            |row| Ok(row.get::<_, i64>(0)? > 0),
        )?;
        Ok(exists)
    }

    /// Creates a table with the given columns (all TEXT) and a uniqueness
    /// constraint over the full tuple, matching the set-semantics schema
    /// used by every relation in the reference schema except `Patient`.
    pub fn create_relation(&self, relation: &str, columns: &[String]) -> StoreResult<()> {
        let cols_sql = columns
            .iter()
            .map(|c| format!("{} TEXT NOT NULL", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let unique_sql = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, UNIQUE({}))",
                quote_ident(relation),
                cols_sql,
                unique_sql
            ),
            [],
        )?;
        Ok(())
    }
}

impl TupleStore for SqliteStore {
    fn relations(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn columns(&self, relation: &str) -> StoreResult<Vec<String>> {
        if !self.relation_exists(relation)? {
            return Err(StoreError::SchemaMissing(relation.to_string()));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(relation)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn primary_key(&self, relation: &str) -> StoreResult<Vec<String>> {
        if !self.relation_exists(relation)? {
            return Err(StoreError::SchemaMissing(relation.to_string()));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(relation)))?;
        let mut pk_cols: Vec<(i64, String)> = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let pk: i64 = row.get(5)?;
                Ok((pk, name))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|(pk, _)| *pk > 0)
            .collect();
        pk_cols.sort_by_key(|(pk, _)| *pk);
        Ok(pk_cols.into_iter().map(|(_, name)| name).collect())
    }

    fn ensure_relation(&self, relation: &str, columns: &[String]) -> StoreResult<()> {
        if !self.relation_exists(relation)? {
            self.create_relation(relation, columns)?;
        }
        Ok(())
    }

    fn query_eq(&self, relation: &str, conditions: &[ColumnEq<'_>]) -> StoreResult<Vec<Vec<Value>>> {
        let columns = self.columns(relation)?;
        let select_cols = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let where_sql = conditions
            .iter()
            .map(|(col, _)| format!("{} = ?", quote_ident(col)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = if where_sql.is_empty() {
            format!("SELECT {select_cols} FROM {}", quote_ident(relation))
        } else {
            format!("SELECT {select_cols} FROM {} WHERE {where_sql}", quote_ident(relation))
        };
        let params: Vec<&dyn ToSql> = conditions.iter().map(|(_, v)| *v as &dyn ToSql).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let n = columns.len();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let mut values = Vec::with_capacity(n);
                for i in 0..n {
                    let v: SqlValue = row.get(i)?;
                    values.push(sql_value_to_value(v));
                }
                Ok(values)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_any_eq(&self, relation: &str, columns: &[String], value: &Value) -> StoreResult<Vec<Vec<Value>>> {
        let all_cols = self.columns(relation)?;
        let select_cols = all_cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let where_sql = columns
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!("SELECT {select_cols} FROM {} WHERE {where_sql}", quote_ident(relation));
        let params: Vec<&dyn ToSql> = columns.iter().map(|_| value as &dyn ToSql).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let n = all_cols.len();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let mut values = Vec::with_capacity(n);
                for i in 0..n {
                    let v: SqlValue = row.get(i)?;
                    values.push(sql_value_to_value(v));
                }
                Ok(values)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_if_absent(&self, relation: &str, columns: &[String], rows: &[Vec<Value>]) -> StoreResult<usize> {
        self.ensure_relation(relation, columns)?;
        let cols_sql = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let placeholders = columns.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({cols_sql}) VALUES ({placeholders})",
            quote_ident(relation)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut inserted = 0;
        for row in rows {
            let params: Vec<&dyn ToSql> = row.iter().map(|v| v as &dyn ToSql).collect();
            inserted += stmt.execute(params.as_slice())?;
        }
        Ok(inserted)
    }

    fn delete_matching(&self, relation: &str, columns: &[String], rows: &[Vec<Value>]) -> StoreResult<usize> {
        let pk = self.primary_key(relation)?;
        let (match_cols, match_col_indices): (Vec<String>, Vec<usize>) = if pk.is_empty() {
            (
                columns.to_vec(),
                (0..columns.len()).collect(),
            )
        } else {
            let indices = pk
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
            (pk.clone(), indices)
        };
        let where_sql = match_cols
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("DELETE FROM {} WHERE {where_sql}", quote_ident(relation));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut deleted = 0;
        for row in rows {
            let params: Vec<&dyn ToSql> = match_col_indices.iter().map(|&i| &row[i] as &dyn ToSql).collect();
            deleted += stmt.execute(params.as_slice())?;
        }
        Ok(deleted)
    }

    fn all_rows(&self, relation: &str) -> StoreResult<Vec<Vec<Value>>> {
        self.query_eq(relation, &[])
    }

    fn row_count(&self, relation: &str) -> StoreResult<usize> {
        if !self.relation_exists(relation)? {
            return Err(StoreError::SchemaMissing(relation.to_string()));
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(relation)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_absent_respects_set_semantics() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cols = vec!["PatientName".to_string(), "Illness".to_string()];
        store.create_relation("Illness", &cols).unwrap();
        let row = vec![Value::from("Lukas"), Value::from("Tuberculosis")];
        assert_eq!(store.insert_if_absent("Illness", &cols, &[row.clone()]).unwrap(), 1);
        assert_eq!(store.insert_if_absent("Illness", &cols, &[row]).unwrap(), 0);
        assert_eq!(store.row_count("Illness").unwrap(), 1);
    }

    #[test]
    fn query_any_eq_finds_sensitive_constant_in_either_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cols = vec!["PatientName".to_string(), "Treatment".to_string()];
        store.create_relation("Treatment", &cols).unwrap();
        store
            .insert_if_absent("Treatment", &cols, &[vec![Value::from("Lukas"), Value::from("TreatA")]])
            .unwrap();
        let hits = store
            .query_any_eq("Treatment", &cols, &Value::from("Lukas"))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn delete_matching_removes_exact_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cols = vec!["PatientName".to_string(), "Illness".to_string()];
        store.create_relation("Illness", &cols).unwrap();
        let row = vec![Value::from("Lukas"), Value::from("Tuberculosis")];
        store.insert_if_absent("Illness", &cols, &[row.clone()]).unwrap();
        let deleted = store.delete_matching("Illness", &cols, &[row]).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.row_count("Illness").unwrap(), 0);
    }
}
