//! `concord-recon`: fuzzy reconciliation of a raw source corpus against a
//! curated target corpus.
//!
//! Pipeline: normalize → extract features → matcher passes of decreasing
//! trust (exact id, content, optional keyword, title, manual) with duplicate
//! detection after each → finalize → completeness audit. All state lives in
//! one [`Ledger`] threaded through the passes.

pub mod artifact;
pub mod audit;
pub mod config;
pub mod corpus;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod features;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod score;
pub mod script;

pub use artifact::MappingArtifact;
pub use config::ReconConfig;
pub use engine::{run, ReconInput};
pub use error::ReconError;
pub use ledger::Ledger;
pub use model::{CompletenessReport, Document, MappingEntry, MatchType, ReconResult};
