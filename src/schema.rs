//! The fixed, patient-centric reference schema (§3).
//!
//! Every relation other than `Patient` is a binary table `(PatientName,
//! Attribute)` with a uniqueness constraint over the full tuple (set
//! semantics, no duplicates). `Patient` is the one ternary exception and
//! is never the target of a TGD atom in the reference rule set.

use std::collections::HashMap;

use crate::store::{StoreResult, TupleStore};

/// Column layout of one relation, as declared by the reference schema.
#[derive(Debug, Clone)]
pub struct RelationSchema {
    pub name: String,
    pub columns: Vec<String>,
}

/// The reference patient schema: nine relations keyed on patient name.
pub fn reference_schema() -> HashMap<String, RelationSchema> {
    let defs: &[(&str, &[&str])] = &[
        ("Patient", &["Name", "Age", "Gender"]),
        ("Illness", &["PatientName", "Illness"]),
        ("Medicine", &["PatientName", "Medicine"]),
        ("Allergy", &["PatientName", "Allergy"]),
        ("Insurance", &["PatientName", "Insurance"]),
        ("LabResult", &["PatientName", "LabResult"]),
        ("Appointment", &["PatientName", "Appointment"]),
        ("Hospital", &["PatientName", "Hospital"]),
        ("Treatment", &["PatientName", "Treatment"]),
    ];
    defs.iter()
        .map(|(name, cols)| {
            (
                (*name).to_string(),
                RelationSchema {
                    name: (*name).to_string(),
                    columns: cols.iter().map(|c| (*c).to_string()).collect(),
                },
            )
        })
        .collect()
}

/// Creates every relation of the reference schema in `store` if absent.
/// Used to seed a fresh Fs/Fo/Chase database before a run.
pub fn ensure_reference_schema(store: &impl TupleStore) -> StoreResult<()> {
    for rel in reference_schema().values() {
        store.ensure_relation(&rel.name, &rel.columns)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_schema_has_nine_relations() {
        assert_eq!(reference_schema().len(), 9);
        assert_eq!(reference_schema()["Illness"].columns, vec!["PatientName", "Illness"]);
    }
}
