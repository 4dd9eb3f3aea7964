//! Top-level orchestration, wiring C1–C8 in the strict sequential order
//! mandated by §5: C3 completes before C4 begins; C4 before C5; etc.

use std::collections::HashSet;

use chrono::Utc;

use crate::config::{ChaseConfig, DerivationConfig, StorageConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::extractor::{self, ExtractionReport};
use crate::{chase, derivation, hitting_set, paths, rules, serialize, transfer};
use crate::store::TupleStore;
use crate::transfer::TransferReport;

/// Aggregate counters for one full run: the minimal integration surface
/// described in §6 ("a driver … receiving counters (moved, derived,
/// groups, hit-set size, deleted)"). `started_at`/`finished_at` are
/// RFC 3339 timestamps, stamped the same way the teacher's storage
/// metadata records `created_at`/`last_accessed`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PipelineReport {
    pub started_at: String,
    pub finished_at: String,
    pub extraction: ExtractionReport,
    pub chase_iterations: usize,
    pub chase_inserted: usize,
    pub groups: usize,
    pub hit_set_size: usize,
    pub transfer: TransferReport,
}

/// Runs a full fragmentation pass over `fs`/`fo`/`chase`, given the raw
/// text of rules.txt and C.txt.
///
/// `fs` is mutated by the initial extraction and the final transfer;
/// `chase` is populated from a post-extraction copy of `fs` and mutated
/// only by the chase engine (I.4); `fo` accumulates everything moved out
/// of `fs`. The only fatal condition is a lossless-union or
/// disjointness violation after the transfer step (§7).
///
/// When `storage` is given, the per-run artifacts described in §6
/// (graphs.txt, paths.txt, union_greedy.txt, report.json) are written
/// into its `data_dir` alongside the three databases. Passing `None`
/// skips this (e.g. the in-memory property tests, which have no
/// working directory).
pub fn run<S: TupleStore>(
    fs: &S,
    fo: &S,
    chase_store: &S,
    rules_text: &str,
    roots_text: &str,
    chase_cfg: &ChaseConfig,
    derivation_cfg: &DerivationConfig,
    storage: Option<&StorageConfig>,
) -> PipelineResult<PipelineReport> {
    let started_at = Utc::now().to_rfc3339();

    let known_relations: HashSet<String> = fs.relations().map_err(PipelineError::from)?.into_iter().collect();

    let parsed_rules = rules::parse_rules(rules_text, &known_relations);
    if let Err(err) = rules::assert_acyclic(&parsed_rules) {
        tracing::warn!(error = %err, "rule graph failed the I.3 acyclicity sanity check");
    }
    let roots = rules::parse_roots(roots_text, &known_relations);

    tracing::info!(rules = parsed_rules.len(), roots = roots.len(), "loaded rules and sensitive roots");

    let before = transfer::snapshot(fs)?;

    let extraction = extractor::run_initial_extraction(fs, fo, &roots)?;
    tracing::info!(moved = extraction.rows_moved, "initial extraction complete");

    chase::seed_chase_from_fs(fs, chase_store)?;
    let chase_report = chase::run_chase(chase_store, &parsed_rules, chase_cfg.max_iterations)?;
    tracing::info!(
        iterations = chase_report.iterations,
        inserted = chase_report.inserted,
        hit_cap = chase_report.hit_iteration_cap,
        "chase complete"
    );

    let rule_index = rules::index_by_head(&parsed_rules);
    let expansions = derivation::expand_all_roots(chase_store, &rule_index, &roots, derivation_cfg.max_depth)?;

    let instance = paths::instance_nodes(fs)?;
    let groups: Vec<paths::PathGroup> = expansions
        .iter()
        .map(|expansion| paths::extract_group(&expansion.graphs, &instance))
        .filter(|group| !group.is_empty())
        .collect();
    tracing::info!(groups = groups.len(), "path extraction complete");

    let selected = hitting_set::greedy_hitting_set(&groups);
    tracing::info!(hit_set_size = selected.len(), "hitting-set selection complete");

    if let Some(storage) = storage {
        let all_graphs: Vec<_> = expansions.iter().flat_map(|e| e.graphs.clone()).collect();
        std::fs::write(storage.graphs_path(), serialize::write_graphs(&all_graphs))?;
        std::fs::write(storage.paths_path(), serialize::write_paths(&groups))?;
        let mut selected_sorted: Vec<_> = selected.iter().cloned().collect();
        selected_sorted.sort();
        std::fs::write(storage.union_greedy_path(), serialize::write_union_greedy(&selected_sorted))?;
    }

    let transfer_report = transfer::run_transfer(fs, fo, &selected)?;
    tracing::info!(
        deleted = transfer_report.rows_deleted,
        inserted = transfer_report.rows_inserted,
        "transfer complete"
    );

    transfer::verify_union_invariant(fs, fo, &before)?;
    transfer::verify_disjointness(fs, fo)?;

    let report = PipelineReport {
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        extraction,
        chase_iterations: chase_report.iterations,
        chase_inserted: chase_report.inserted,
        groups: groups.len(),
        hit_set_size: selected.len(),
        transfer: transfer_report,
    };

    if let Some(storage) = storage {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(storage.report_path(), json)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seed_two_patient_case() -> (MemoryStore, MemoryStore, MemoryStore) {
        let fs = MemoryStore::new();
        let fo = MemoryStore::new();
        let chase_store = MemoryStore::new();
        for store in [&fs, &fo, &chase_store] {
            store.declare_relation("Patient", &["Name", "Age", "Gender"], &[]);
            store.declare_relation("Illness", &["PatientName", "Illness"], &[]);
            store.declare_relation("Treatment", &["PatientName", "Treatment"], &[]);
            store.declare_relation("Medicine", &["PatientName", "Medicine"], &[]);
        }

        fs.seed("Patient", vec!["Lukas".into(), "34".into(), "M".into()]);
        fs.seed("Patient", vec!["Klara".into(), "27".into(), "F".into()]);
        fs.seed("Illness", vec!["Lukas".into(), "HIV_Positive".into()]);
        fs.seed("Illness", vec!["Lukas".into(), "Aids".into()]);
        fs.seed("Illness", vec!["Lukas".into(), "Tuberculosis".into()]);
        fs.seed("Illness", vec!["Klara".into(), "Influenza".into()]);
        fs.seed("Treatment", vec!["Lukas".into(), "TreatA".into()]);
        fs.seed("Treatment", vec!["Lukas".into(), "TreatB".into()]);
        fs.seed("Treatment", vec!["Lukas".into(), "TreatY".into()]);
        fs.seed("Treatment", vec!["Klara".into(), "TreatA".into()]);
        fs.seed("Treatment", vec!["Klara".into(), "TreatY".into()]);
        fs.seed("Medicine", vec!["Klara".into(), "MedC".into()]);

        (fs, fo, chase_store)
    }

    #[test]
    fn two_patient_tb_case_moves_hiv_leaf_tuple() {
        let (fs, fo, chase_store) = seed_two_patient_case();
        let rules_text = "Treatment(n,'TreatA') ∧ Treatment(n,'TreatB') -> Illness(n,'HIV_Positive')\n\
                           Illness(n,'HIV_Positive') -> Illness(n,'Aids')\n";
        let roots_text = "Illness['HIV_Positive']\n";

        let report = run(
            &fs,
            &fo,
            &chase_store,
            rules_text,
            roots_text,
            &ChaseConfig::default(),
            &DerivationConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.extraction.rows_moved, 1);
        assert!(report.hit_set_size >= 1);
        // At least one of TreatA/TreatB was moved to cut the re-derivation.
        let fo_treatments = fo.all_rows("Treatment").unwrap();
        assert!(!fo_treatments.is_empty());
    }

    #[test]
    fn empty_sensitive_set_is_a_no_op() {
        let (fs, fo, chase_store) = seed_two_patient_case();
        let before_rows = fs.all_rows("Illness").unwrap().len();

        let report = run(
            &fs,
            &fo,
            &chase_store,
            "Treatment(n,'TreatA') ∧ Treatment(n,'TreatB') -> Illness(n,'HIV_Positive')\n",
            "",
            &ChaseConfig::default(),
            &DerivationConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.extraction.roots_processed, 0);
        assert_eq!(report.hit_set_size, 0);
        assert_eq!(fs.all_rows("Illness").unwrap().len(), before_rows);
        assert_eq!(fo.row_count("Illness").unwrap_or(0), 0);
    }
}
