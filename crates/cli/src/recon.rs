//! `concord run | validate | audit`: config-driven corpus reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use concord_recon::artifact::{report_json, write_artifacts, MappingArtifact};
use concord_recon::audit::audit;
use concord_recon::model::{CompletenessReport, IssueKind, PassReport};
use concord_recon::{run, ReconConfig, ReconInput};

use crate::exit_codes::{EXIT_INCOMPLETE, EXIT_USAGE};
use crate::util::{format_id_ranges, pad_left, pad_right, truncate_display};
use crate::CliError;

/// Column budget for document refs in the summary.
const REF_WIDTH: usize = 48;
/// Unassigned refs listed before eliding the rest.
const MAX_LISTED: usize = 20;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run every matching pass and write the mapping artifacts
    #[command(after_help = "\
Examples:
  concord run concord.toml
  concord run concord.toml --json > report.json
  concord run concord.toml --output-dir /tmp/mapping -vv")]
    Run {
        /// Path to the TOML config file
        config: PathBuf,

        /// Also print the completeness report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Artifact directory (default: `[output] dir`, relative to the config file)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Parse and validate a config without touching either corpus
    #[command(after_help = "\
Examples:
  concord validate concord.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Re-run the completeness audit over a saved mapping.json
    #[command(after_help = "\
Examples:
  concord audit concord.toml out/mapping.json
  concord audit concord.toml out/mapping.json --json")]
    Audit {
        /// Path to the TOML config file (supplies the expected identifiers)
        config: PathBuf,

        /// Mapping artifact written by `concord run`
        mapping: PathBuf,

        /// Print the completeness report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output_dir } => cmd_run(config, json, output_dir),
        ReconCommands::Validate { config } => cmd_validate(config),
        ReconCommands::Audit { config, mapping, json } => cmd_audit(config, mapping, json),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(EXIT_USAGE, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(CliError::recon)
}

/// Relative paths in the config resolve against the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base_dir = base_dir(&config_path);

    let input = ReconInput::load(&config, base_dir).map_err(CliError::recon)?;
    let result = run(&config, input).map_err(CliError::recon)?;

    let out_dir = output_dir.unwrap_or_else(|| base_dir.join(&config.output.dir));
    let written = write_artifacts(&result, &out_dir).map_err(CliError::recon)?;

    eprintln!(
        "concord: {} ({} sources, {} targets)",
        config.name, result.meta.source_count, result.meta.target_count
    );
    print_passes(&result.passes);
    print_report(&result.report);
    eprintln!();
    eprintln!("wrote {}", written.mapping_json.display());
    eprintln!("wrote {}", written.mapping_csv.display());
    eprintln!("wrote {}", written.report_json.display());

    if json_output {
        let json = report_json(&result.report).map_err(CliError::recon)?;
        println!("{json}");
    }

    check_complete(&result.report)
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let expected = match config.expected {
        Some(ref e) => {
            let ids = e.id_set().map_err(CliError::recon)?;
            format!("{} expected ids ({}..={})", ids.len(), e.start, e.end)
        }
        None => "no expected id range".to_string(),
    };
    let keyword = match config.passes.keyword_threshold {
        Some(t) => format!("keyword {t}"),
        None => "keyword off".to_string(),
    };
    eprintln!(
        "ok: {} (content {}, {keyword}, title {}, duplicates {}; {expected})",
        config.name,
        config.passes.content_threshold,
        config.passes.title_threshold,
        config.duplicates.threshold,
    );
    Ok(())
}

// ============================================================================
// audit
// ============================================================================

fn cmd_audit(config_path: PathBuf, mapping_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let mapping_str = std::fs::read_to_string(&mapping_path).map_err(|e| {
        recon_err(EXIT_USAGE, format!("cannot read mapping {}: {e}", mapping_path.display()))
    })?;
    let artifact = MappingArtifact::from_json(&mapping_str).map_err(CliError::recon)?;
    let meta = artifact.meta.clone();

    let mut ledger = artifact
        .into_ledger(Vec::new(), Vec::new())
        .map_err(CliError::recon)?;
    ledger.finalize().map_err(CliError::recon)?;

    let expected = config
        .expected
        .as_ref()
        .map(|e| e.id_set())
        .transpose()
        .map_err(CliError::recon)?;
    let report = audit(&ledger, expected.as_ref());

    eprintln!(
        "concord: {} (mapping from {}, engine {})",
        meta.config_name, meta.run_at, meta.engine_version
    );
    print_report(&report);

    if json_output {
        let json = report_json(&report).map_err(CliError::recon)?;
        println!("{json}");
    }

    check_complete(&report)
}

// ============================================================================
// Exit status + summary rendering
// ============================================================================

/// Issues that leave part of the mapping undecided. Malformed identifiers
/// only mean the title fallback applied and do not block completion.
fn blocking_issues(report: &CompletenessReport) -> usize {
    report
        .issues
        .iter()
        .filter(|i| i.kind != IssueKind::MalformedIdentifier)
        .count()
}

fn check_complete(report: &CompletenessReport) -> Result<(), CliError> {
    let blocking = blocking_issues(report);
    if report.complete && blocking == 0 {
        return Ok(());
    }

    let mut parts = Vec::new();
    if !report.missing.is_empty() {
        parts.push(format!("{} missing", report.missing.len()));
    }
    if !report.extra.is_empty() {
        parts.push(format!("{} extra", report.extra.len()));
    }
    if blocking > 0 {
        parts.push(format!("{blocking} unresolved issues"));
    }
    Err(recon_err(EXIT_INCOMPLETE, format!("mapping incomplete: {}", parts.join(", ")))
        .with_hint("add overrides for the remaining pairs or adjust the pass thresholds"))
}

fn print_passes(passes: &[PassReport]) {
    eprintln!();
    eprintln!(
        "  {} {} {} {} {}",
        pad_right("PASS", 12),
        pad_left("NEW", 6),
        pad_left("ABSORBED", 9),
        pad_left("SRC LEFT", 9),
        pad_left("TGT LEFT", 9),
    );
    for p in passes {
        eprintln!(
            "  {} {} {} {} {}",
            pad_right(&p.stage.to_string(), 12),
            pad_left(&p.committed.to_string(), 6),
            pad_left(&p.duplicates_absorbed.to_string(), 9),
            pad_left(&p.remaining_sources.to_string(), 9),
            pad_left(&p.remaining_targets.to_string(), 9),
        );
    }
}

fn print_report(report: &CompletenessReport) {
    eprintln!();
    if report.expected_count > 0 {
        eprintln!(
            "  assigned   {} of {} expected",
            report.assigned_count, report.expected_count
        );
    } else {
        eprintln!("  assigned   {}", report.assigned_count);
    }
    if !report.missing.is_empty() {
        eprintln!("  missing    {}", format_id_ranges(&report.missing));
    }
    if !report.extra.is_empty() {
        eprintln!("  extra      {}", format_id_ranges(&report.extra));
    }

    let by_type: Vec<String> = report
        .counts_by_match_type
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(t, n)| format!("{t} {n}"))
        .collect();
    if !by_type.is_empty() {
        eprintln!("  by type    {}", by_type.join(", "));
    }
    if report.duplicate_groups > 0 {
        eprintln!(
            "  duplicates {} groups ({} suspect)",
            report.duplicate_groups, report.suspect_groups
        );
    }
    if !report.unnumbered_targets.is_empty() {
        eprintln!("  unnumbered {} targets", report.unnumbered_targets.len());
    }

    print_refs("unassigned sources", &report.unassigned_sources);
    print_refs("unassigned targets", &report.unassigned_targets);

    if !report.issues.is_empty() {
        eprintln!();
        eprintln!("  issues ({}):", report.issues.len());
        for issue in &report.issues {
            eprintln!(
                "    {} {} {}",
                pad_right(&issue.kind.to_string(), 26),
                pad_right(&issue.subject, REF_WIDTH),
                issue.detail
            );
        }
    }

    eprintln!();
    if report.complete {
        eprintln!("  status     complete");
    } else {
        eprintln!("  status     INCOMPLETE");
    }
}

fn print_refs(label: &str, refs: &[String]) {
    if refs.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("  {label} ({}):", refs.len());
    for r in refs.iter().take(MAX_LISTED) {
        eprintln!("    {}", truncate_display(r, REF_WIDTH));
    }
    if refs.len() > MAX_LISTED {
        eprintln!("    ... and {} more", refs.len() - MAX_LISTED);
    }
}
