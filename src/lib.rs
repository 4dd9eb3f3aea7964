//! # fragcore
//!
//! A privacy-driven horizontal fragmentation engine for a relational
//! patient-record store. Given an instance, a set of tuple-generating
//! dependencies (TGDs), and a set of sensitive constants, this crate
//! computes a bipartition of the instance into a publishable fragment
//! (Fs) and an owner-held fragment (Fo) such that no sensitive constant
//! is derivable from Fs via the TGDs.
//!
//! ## Pipeline
//!
//! ```text
//! rules.txt, C.txt
//!     ↓
//! [Rule Loader]              → Rule[], sensitive roots[]
//!     ↓
//! [Initial Extractor]        → moves direct sensitive-constant rows Fs → Fo
//!     ↓
//! [Chase Engine]             → Chase (fixpoint closure of Fs' under the TGDs)
//!     ↓
//! [Derivation-Graph Builder] → proof DAGs per sensitive root
//!     ↓
//! [Path Extractor]           → groups of instance-supported proof paths
//!     ↓
//! [Hitting-Set Selector]     → minimal set of tuples cutting every proof
//!     ↓
//! [Transfer Executor]        → moves the hitting set Fs → Fo, verifies Fs ∪ Fo
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fragcore::config::Config;
//! use fragcore::store::SqliteStore;
//! use fragcore::pipeline;
//!
//! let config = Config::for_data_dir("./run");
//! let fs = SqliteStore::open(config.storage.fs_path())?;
//! let fo = SqliteStore::open(config.storage.fo_path())?;
//! let chase = SqliteStore::open(config.storage.chase_path())?;
//!
//! let rules_text = std::fs::read_to_string(config.storage.rules_path())?;
//! let roots_text = std::fs::read_to_string(config.storage.roots_path())?;
//!
//! let report = pipeline::run(
//!     &fs, &fo, &chase, &rules_text, &roots_text,
//!     &config.chase, &config.derivation, Some(&config.storage),
//! )?;
//! ```

pub mod chase;
pub mod config;
pub mod derivation;
pub mod error;
pub mod extractor;
pub mod hitting_set;
pub mod paths;
pub mod pipeline;
pub mod rules;
pub mod schema;
pub mod serialize;
pub mod store;
pub mod transfer;
pub mod value;

pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::PipelineReport;
pub use value::{DerivationNode, Value};
