//! Initial Extractor (C3)
//!
//! For each sensitive root `(T, c)`, moves every row of `Fs.T` that
//! mentions `c` in any non-key column over to `Fo.T`. This handles the
//! *direct* appearance of sensitive constants; everything else is left
//! to the chase/derivation pipeline.

use crate::rules::Atom;
use crate::store::{StoreResult, TupleStore};
use crate::value::Value;

/// Aggregate counters returned by a C3 pass.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ExtractionReport {
    pub roots_processed: usize,
    pub roots_skipped: usize,
    pub rows_moved: usize,
}

/// Runs the initial extraction step for every root in `roots`, moving
/// matching rows from `fs` to `fo`. A root whose relation is unknown to
/// `fs`, or whose query fails, is skipped and counted; extraction of the
/// remaining roots continues (§4.3, §7 SchemaMissing/StoreError).
pub fn run_initial_extraction(
    fs: &impl TupleStore,
    fo: &impl TupleStore,
    roots: &[Atom],
) -> StoreResult<ExtractionReport> {
    let mut report = ExtractionReport::default();
    for root in roots {
        match extract_one_root(fs, fo, root) {
            Ok(moved) => {
                report.roots_processed += 1;
                report.rows_moved += moved;
            }
            Err(err) => {
                tracing::warn!(relation = %root.relation, constant = %root.constant, error = %err, "skipping root in initial extraction");
                report.roots_skipped += 1;
            }
        }
    }
    Ok(report)
}

fn extract_one_root(fs: &impl TupleStore, fo: &impl TupleStore, root: &Atom) -> StoreResult<usize> {
    let columns = fs.columns(&root.relation)?;
    let pk = fs.primary_key(&root.relation)?;
    let candidate_columns: Vec<String> = if pk.is_empty() {
        columns.clone()
    } else {
        columns.iter().filter(|c| !pk.contains(c)).cloned().collect()
    };

    let matching_rows = fs.query_any_eq(&root.relation, &candidate_columns, &Value::Text(root.constant.clone()))?;
    if matching_rows.is_empty() {
        return Ok(0);
    }

    fo.ensure_relation(&root.relation, &columns)?;
    fo.insert_if_absent(&root.relation, &columns, &matching_rows)?;
    let deleted = fs.delete_matching(&root.relation, &columns, &matching_rows)?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seed(store: &MemoryStore) {
        store.declare_relation("Illness", &["PatientName", "Illness"], &[]);
        store.seed("Illness", vec![Value::from("Lukas"), Value::from("HIV_Positive")]);
        store.seed("Illness", vec![Value::from("Klara"), Value::from("Influenza")]);
    }

    #[test]
    fn moves_rows_mentioning_a_sensitive_constant() {
        let fs = MemoryStore::new();
        let fo = MemoryStore::new();
        seed(&fs);
        fo.declare_relation("Illness", &["PatientName", "Illness"], &[]);

        let roots = vec![Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() }];
        let report = run_initial_extraction(&fs, &fo, &roots).unwrap();

        assert_eq!(report.rows_moved, 1);
        assert_eq!(fs.row_count("Illness").unwrap(), 1);
        assert_eq!(fo.row_count("Illness").unwrap(), 1);
    }

    #[test]
    fn skips_unknown_relation_without_aborting() {
        let fs = MemoryStore::new();
        let fo = MemoryStore::new();
        seed(&fs);
        fo.declare_relation("Illness", &["PatientName", "Illness"], &[]);

        let roots = vec![
            Atom { relation: "Bogus".to_string(), constant: "x".to_string() },
            Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() },
        ];
        let report = run_initial_extraction(&fs, &fo, &roots).unwrap();
        assert_eq!(report.roots_skipped, 1);
        assert_eq!(report.roots_processed, 1);
    }
}
