//! cordon-check — operator CLI for policy integrity.
//!
//! Runs the offline checks from `cordon-integrity` against a policy file:
//!
//!   cordon-check --policy policy.json validate
//!   cordon-check --policy policy.json posture
//!   cordon-check --policy policy.json baseline
//!   cordon-check --policy policy.json drift
//!
//! Exit code 0 means the check passed; 1 means it found something
//! blocking (schema errors, drift, a missing baseline on `drift`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cordon_contracts::error::CordonResult;
use cordon_integrity::{drift, posture, schema};

// ── CLI definition ────────────────────────────────────────────────────────────

/// cordon — policy integrity checks.
#[derive(Parser)]
#[command(
    name = "cordon-check",
    about = "Validate, score, and drift-check cordon policy files"
)]
struct Cli {
    /// Path to the policy file under inspection.
    #[arg(long, default_value = "cordon-policy.json")]
    policy: PathBuf,

    /// Path to the drift baseline file.
    #[arg(long, default_value = "cordon-policy.baseline.json")]
    baseline: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the policy: JSON Schema structure plus semantic lints.
    Validate,
    /// Score how permissive the policy is (0-100, higher is tighter).
    Posture,
    /// Record the current policy hash as the drift baseline.
    Baseline,
    /// Compare the policy against the recorded baseline.
    Drift,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Validate => run_validate(&cli),
        Command::Posture => run_posture(&cli),
        Command::Baseline => run_baseline(&cli),
        Command::Drift => run_drift(&cli),
    };

    if let Err(e) = result {
        eprintln!("cordon-check: {}", e);
        std::process::exit(1);
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn run_validate(cli: &Cli) -> CordonResult<()> {
    let report = schema::validate_policy_file(&cli.policy)?;

    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for error in &report.errors {
        println!("error: {}", error);
    }

    if report.is_blocking() {
        eprintln!(
            "{}: {} error(s), {} warning(s)",
            cli.policy.display(),
            report.errors.len(),
            report.warnings.len()
        );
        std::process::exit(1);
    }

    println!(
        "{}: valid ({} warning(s))",
        cli.policy.display(),
        report.warnings.len()
    );
    Ok(())
}

fn run_posture(cli: &Cli) -> CordonResult<()> {
    // Posture only means anything for a policy that hydrates; validation
    // errors surface here as integrity errors.
    let report = schema::validate_policy_file(&cli.policy)?;
    if report.is_blocking() {
        eprintln!("{}: fix validation errors before scoring", cli.policy.display());
        std::process::exit(1);
    }

    let raw = std::fs::read_to_string(&cli.policy).map_err(|e| {
        cordon_contracts::error::CordonError::IntegrityError {
            reason: format!("cannot read {}: {}", cli.policy.display(), e),
        }
    })?;
    let policy = serde_json_policy(&raw, &cli.policy)?;

    let assessment = posture::assess(&policy);
    for finding in &assessment.findings {
        println!("{:?}: {}", finding.severity, finding.message);
    }
    println!("posture score: {}/100", assessment.score);
    Ok(())
}

fn run_baseline(cli: &Cli) -> CordonResult<()> {
    let baseline = drift::record_baseline(&cli.policy, &cli.baseline)?;
    println!("baseline recorded: {}", baseline.hash);
    Ok(())
}

fn run_drift(cli: &Cli) -> CordonResult<()> {
    let status = drift::check(&cli.policy, &cli.baseline)?;
    match &status {
        drift::DriftStatus::Match => println!("{}: no drift", cli.policy.display()),
        drift::DriftStatus::Mismatch { .. } => println!("{}: DRIFT", cli.policy.display()),
        drift::DriftStatus::MissingBaseline => {
            println!("{}: no baseline recorded", cli.policy.display())
        }
    }
    status.enforce()
}

fn serde_json_policy(
    raw: &str,
    path: &std::path::Path,
) -> CordonResult<cordon_contracts::policy::Policy> {
    serde_json::from_str(raw).map_err(|e| cordon_contracts::error::CordonError::IntegrityError {
        reason: format!("cannot hydrate {}: {}", path.display(), e),
    })
}
