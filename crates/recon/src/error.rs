use std::fmt;

use crate::model::MatchStage;

/// Hard failures. Per-document and per-override problems are not errors;
/// they are collected as [`crate::model::Issue`] records instead.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold ordering, empty range, etc.).
    ConfigValidation(String),
    /// Mutation attempted after the ledger reached `Finalized`.
    LedgerFinalized,
    /// A source or target would hold two primary entries.
    DoubleAssignment { doc_ref: String, existing: String },
    /// Stage transitions only move forward.
    InvalidTransition { from: MatchStage, to: MatchStage },
    /// Saved mapping artifact could not be read back.
    ArtifactParse(String),
    /// IO error (directory walk, artifact write, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::LedgerFinalized => write!(f, "ledger is finalized; no further mutation permitted"),
            Self::DoubleAssignment { doc_ref, existing } => {
                write!(f, "'{doc_ref}' is already assigned (to '{existing}')")
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid stage transition: {from} -> {to}")
            }
            Self::ArtifactParse(msg) => write!(f, "mapping artifact error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
