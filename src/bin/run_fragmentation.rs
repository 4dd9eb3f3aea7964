//! Minimal integration surface (§6): a driver that resolves the three
//! database paths and the two text inputs for one working directory,
//! runs the pipeline, and reports counters. Not a flag-parsed CLI —
//! just the positional data directory, matching the "driver supplying
//! paths … and receiving counters" scope of the core.

use std::env;
use std::fs;
use std::process::ExitCode;

use fragcore::config::Config;
use fragcore::pipeline;
use fragcore::schema;
use fragcore::store::SqliteStore;

fn main() -> ExitCode {
    let config = match env::args().nth(1) {
        Some(data_dir) => Config::for_data_dir(data_dir),
        None => Config::load().unwrap_or_default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    if let Err(err) = fs::create_dir_all(&config.storage.data_dir) {
        tracing::error!(error = %err, "failed to create data directory");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "fragmentation run aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let fs_store = SqliteStore::open(config.storage.fs_path())?;
    let fo_store = SqliteStore::open(config.storage.fo_path())?;
    let chase_store = SqliteStore::open(config.storage.chase_path())?;

    for store in [&fs_store, &fo_store, &chase_store] {
        schema::ensure_reference_schema(store)?;
    }

    let rules_text = fs::read_to_string(config.storage.rules_path()).unwrap_or_default();
    let roots_text = fs::read_to_string(config.storage.roots_path()).unwrap_or_default();

    let report = pipeline::run(
        &fs_store,
        &fo_store,
        &chase_store,
        &rules_text,
        &roots_text,
        &config.chase,
        &config.derivation,
        Some(&config.storage),
    )?;

    tracing::info!(
        started_at = %report.started_at,
        finished_at = %report.finished_at,
        rows_moved_initial = report.extraction.rows_moved,
        chase_inserted = report.chase_inserted,
        groups = report.groups,
        hit_set_size = report.hit_set_size,
        rows_deleted = report.transfer.rows_deleted,
        "fragmentation run complete"
    );

    println!(
        "moved={} derived={} groups={} hit_set={} deleted={}",
        report.extraction.rows_moved,
        report.chase_inserted,
        report.groups,
        report.hit_set_size,
        report.transfer.rows_deleted
    );

    Ok(())
}
