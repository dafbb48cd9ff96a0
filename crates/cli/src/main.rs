// Concord CLI - batch reconciliation of a raw transcript corpus against its curated counterpart

mod exit_codes;
mod recon;
mod util;

use std::process::ExitCode;

use clap::{ArgAction, Parser};

use exit_codes::{EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS};
use recon::ReconCommands;

#[derive(Parser)]
#[command(name = "concord")]
#[command(about = "Reconcile a raw source corpus against its curated target corpus")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ReconCommands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = recon::cmd_recon(cli.command);

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    // A second init (tests driving main twice) is harmless.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Map an engine error onto the exit-code registry.
    pub fn recon(err: concord_recon::ReconError) -> Self {
        use concord_recon::ReconError;

        match err {
            ReconError::ConfigParse(_) => Self::new(EXIT_INVALID_CONFIG, err.to_string())
                .with_hint("check the TOML syntax and field names"),
            ReconError::ConfigValidation(_) => Self::new(EXIT_INVALID_CONFIG, err.to_string()),
            ReconError::ArtifactParse(_) => Self::new(EXIT_RUNTIME, err.to_string())
                .with_hint("was the mapping written by `concord run`?"),
            _ => Self::new(EXIT_RUNTIME, err.to_string()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
