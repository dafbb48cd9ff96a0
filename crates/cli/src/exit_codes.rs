//! CLI Exit Code Registry
//!
//! Single source of truth for `concord` exit codes. Scripts that wrap a
//! reconciliation run branch on these, so they are part of the contract.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success; mapping complete                                      |
//! | 1    | General error (unspecified)                                    |
//! | 2    | Usage error (bad args, config file not readable)               |
//! | 3    | Mapping incomplete (missing/extra ids, unresolved issues)      |
//! | 4    | Invalid config (parse or validation failure, bad override CSV) |
//! | 5    | Runtime failure (corpus dir missing, I/O, artifact unreadable) |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed and, for `run`/`audit`, the mapping is complete.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable config path.
pub const EXIT_USAGE: u8 = 2;

/// The run finished but the mapping is not complete: expected identifiers
/// are missing, unexpected ones were assigned, or an override or file could
/// not be applied.
pub const EXIT_INCOMPLETE: u8 = 3;

/// Config failed to parse or validate (including the override CSV).
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Fatal engine or I/O failure.
pub const EXIT_RUNTIME: u8 = 5;
