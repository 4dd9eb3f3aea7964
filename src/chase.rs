//! Chase Engine (C4)
//!
//! Operates on a fresh copy of Fs (post-extraction), named Chase.
//! Iteratively applies every rule to a fixpoint, materialising every
//! derivable fact (I.4: tuples are only ever inserted, never deleted).

use std::collections::HashSet;

use crate::rules::Rule;
use crate::store::{StoreResult, TupleStore};
use crate::value::Value;

/// Aggregate counters returned by a chase run.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ChaseReport {
    pub iterations: usize,
    pub inserted: usize,
    pub hit_iteration_cap: bool,
}

/// Copies every relation and row of `fs` into `chase`, giving the chase
/// engine a private working copy so C4 never touches Fs directly.
pub fn seed_chase_from_fs(fs: &impl TupleStore, chase: &impl TupleStore) -> StoreResult<()> {
    for relation in fs.relations()? {
        let columns = fs.columns(&relation)?;
        chase.ensure_relation(&relation, &columns)?;
        let rows = fs.all_rows(&relation)?;
        if !rows.is_empty() {
            chase.insert_if_absent(&relation, &columns, &rows)?;
        }
    }
    Ok(())
}

/// The column assumed to carry the subject key, and the column assumed
/// to carry the rule-atom constant, for a binary TGD relation.
fn tgd_columns(store: &impl TupleStore, relation: &str) -> StoreResult<(String, String)> {
    let columns = store.columns(relation)?;
    let subject_col = columns[0].clone();
    let value_col = columns.get(1).cloned().unwrap_or_else(|| columns[0].clone());
    Ok((subject_col, value_col))
}

pub(crate) fn subjects_with_value(store: &impl TupleStore, relation: &str, constant: &str) -> StoreResult<HashSet<String>> {
    let (subject_col, value_col) = tgd_columns(store, relation)?;
    let value = Value::Text(constant.to_string());
    let rows = store.query_eq(relation, &[(value_col.as_str(), &value)])?;
    let columns = store.columns(relation)?;
    let idx = columns.iter().position(|c| c == &subject_col).unwrap_or(0);
    Ok(rows.into_iter().map(|row| row[idx].as_text()).collect())
}

pub(crate) fn exists_tuple(store: &impl TupleStore, relation: &str, subject: &str, constant: &str) -> StoreResult<bool> {
    let (subject_col, value_col) = tgd_columns(store, relation)?;
    let rows = store.query_eq(
        relation,
        &[
            (subject_col.as_str(), &Value::Text(subject.to_string())),
            (value_col.as_str(), &Value::Text(constant.to_string())),
        ],
    )?;
    Ok(!rows.is_empty())
}

/// Runs the chase to a fixpoint (or until `max_iterations` rounds have
/// elapsed, whichever comes first). Rule-application order within a
/// round is unobservable: fixpoint semantics make it irrelevant.
pub fn run_chase(chase: &impl TupleStore, rules: &[Rule], max_iterations: usize) -> StoreResult<ChaseReport> {
    let mut report = ChaseReport::default();
    loop {
        if report.iterations >= max_iterations {
            report.hit_iteration_cap = true;
            break;
        }
        report.iterations += 1;
        let mut inserts_this_round = 0;

        for rule in rules {
            let mut subjects: Option<HashSet<String>> = None;
            for atom in &rule.body {
                let atom_subjects = subjects_with_value(chase, &atom.relation, &atom.constant)?;
                subjects = Some(match subjects {
                    None => atom_subjects,
                    Some(acc) => acc.intersection(&atom_subjects).cloned().collect(),
                });
                if subjects.as_ref().is_some_and(HashSet::is_empty) {
                    break;
                }
            }
            let Some(subjects) = subjects else { continue };

            let (subject_col, value_col) = tgd_columns(chase, &rule.head.relation)?;
            let columns = chase.columns(&rule.head.relation)?;
            for k in subjects {
                if exists_tuple(chase, &rule.head.relation, &k, &rule.head.constant)? {
                    continue;
                }
                let mut row = vec![Value::Text(String::new()); columns.len()];
                let subj_idx = columns.iter().position(|c| c == &subject_col).unwrap_or(0);
                let val_idx = columns.iter().position(|c| c == &value_col).unwrap_or(1.min(columns.len() - 1));
                row[subj_idx] = Value::Text(k.clone());
                row[val_idx] = Value::Text(rule.head.constant.clone());
                let inserted = chase.insert_if_absent(&rule.head.relation, &columns, &[row])?;
                inserts_this_round += inserted;
            }
        }

        report.inserted += inserts_this_round;
        if inserts_this_round == 0 {
            break;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Atom;
    use crate::store::MemoryStore;

    fn make_chase() -> MemoryStore {
        let store = MemoryStore::new();
        store.declare_relation("Treatment", &["PatientName", "Treatment"], &[]);
        store.declare_relation("Illness", &["PatientName", "Illness"], &[]);
        store.seed("Treatment", vec![Value::from("Lukas"), Value::from("TreatA")]);
        store.seed("Treatment", vec![Value::from("Lukas"), Value::from("TreatB")]);
        store.seed("Illness", vec![Value::from("Klara"), Value::from("Influenza")]);
        store
    }

    #[test]
    fn derives_head_fact_when_all_body_atoms_present() {
        let chase = make_chase();
        let rules = vec![Rule {
            body: vec![
                Atom { relation: "Treatment".to_string(), constant: "TreatA".to_string() },
                Atom { relation: "Treatment".to_string(), constant: "TreatB".to_string() },
            ],
            head: Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() },
        }];
        let report = run_chase(&chase, &rules, 100).unwrap();
        assert_eq!(report.inserted, 1);
        assert!(exists_tuple(&chase, "Illness", "Lukas", "HIV_Positive").unwrap());
    }

    #[test]
    fn second_chase_run_is_a_fixpoint_noop() {
        let chase = make_chase();
        let rules = vec![Rule {
            body: vec![
                Atom { relation: "Treatment".to_string(), constant: "TreatA".to_string() },
                Atom { relation: "Treatment".to_string(), constant: "TreatB".to_string() },
            ],
            head: Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() },
        }];
        run_chase(&chase, &rules, 100).unwrap();
        let second = run_chase(&chase, &rules, 100).unwrap();
        assert_eq!(second.inserted, 0);
    }

    #[test]
    fn rule_does_not_fire_when_a_body_atom_is_missing() {
        let chase = make_chase();
        let rules = vec![Rule {
            body: vec![Atom { relation: "Treatment".to_string(), constant: "TreatZ".to_string() }],
            head: Atom { relation: "Illness".to_string(), constant: "ShouldNotAppear".to_string() },
        }];
        let report = run_chase(&chase, &rules, 100).unwrap();
        assert_eq!(report.inserted, 0);
    }
}
