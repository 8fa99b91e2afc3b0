//! `ratchet` operator console
//!
//! Reads runs through a snapshot-backed registry and renders the status,
//! comparison, history, and report views used when deciding what a batch
//! produced. Exit codes: `0` success, `2` nothing matched, `3` nothing
//! comparable, `4` the tracking service or code host refused an operation.

mod artifacts;
mod compare;
mod diagnose;
mod history;
mod output;
mod post;
mod report;
mod status;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ratchet_core::{ENV_ENTITY, ENV_PROJECT, ENV_TRUNK};
use ratchet_forge::ForgeError;
use ratchet_registry::{RegistryError, SnapshotRegistry};
use std::path::PathBuf;

/// Environment fallback for `--snapshot`
const ENV_SNAPSHOT: &str = "RATCHET_SNAPSHOT";

/// Command completed normally
pub(crate) const EXIT_OK: i32 = 0;
/// No runs matched the query
pub(crate) const EXIT_NO_RUNS: i32 = 2;
/// Comparison had nothing to rank
pub(crate) const EXIT_AMBIGUOUS: i32 = 3;
/// The tracking service or code host refused an operation
pub(crate) const EXIT_SERVICE: i32 = 4;

#[tokio::main]
async fn main() {
    init_tracing();
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let matches = build_cli().get_matches();

    let project = matches.get_one::<String>("project").unwrap().clone();
    let entity = matches.get_one::<String>("entity").cloned();
    let snapshot = matches.get_one::<PathBuf>("snapshot").unwrap();

    let registry = SnapshotRegistry::load(snapshot)
        .with_context(|| format!("open snapshot {}", snapshot.display()))?;
    if registry.project() != project {
        tracing::warn!(
            snapshot_project = registry.project(),
            requested = project.as_str(),
            "snapshot was exported from a different project"
        );
    }

    match matches.subcommand() {
        Some(("status", sub)) => {
            status::run(
                &registry,
                sub.get_one::<String>("branch").map(String::as_str),
                sub.get_flag("json"),
            )
            .await
        }
        Some(("compare", sub)) => {
            compare::run(
                &registry,
                strings(sub, "branches"),
                strings(sub, "metrics"),
                sub.get_flag("json"),
            )
            .await
        }
        Some(("history", sub)) => {
            history::run(
                &registry,
                sub.get_one::<String>("branch").unwrap(),
                strings(sub, "metrics"),
                *sub.get_one::<usize>("rows").unwrap(),
                sub.get_flag("json"),
            )
            .await
        }
        Some(("diagnose", sub)) => {
            diagnose::run(
                &registry,
                sub.get_one::<String>("branch").map(String::as_str),
                *sub.get_one::<usize>("limit").unwrap(),
                sub.get_flag("json"),
            )
            .await
        }
        Some(("report", sub)) => {
            report::run(
                &registry,
                &project,
                entity.as_deref(),
                strings(sub, "metrics"),
                sub.get_flag("json"),
            )
            .await
        }
        Some(("artifacts", sub)) => {
            artifacts::run(
                &registry,
                sub.get_one::<String>("branch").unwrap(),
                sub.get_flag("json"),
            )
            .await
        }
        Some(("post-result", sub)) => {
            post::run(
                &registry,
                None,
                sub.get_one::<String>("branch").unwrap(),
                sub.get_one::<String>("trunk").unwrap(),
                sub.get_flag("json"),
            )
            .await
        }
        _ => anyhow::bail!("unrecognized command"),
    }
}

fn build_cli() -> Command {
    Command::new("ratchet")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect experiment runs, compare branches, and post results")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("project")
                .long("project")
                .env(ENV_PROJECT)
                .required(true)
                .help("Tracking project the runs belong to"),
        )
        .arg(
            Arg::new("entity")
                .long("entity")
                .env(ENV_ENTITY)
                .help("Tracking entity (team or user) owning the project"),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .env(ENV_SNAPSHOT)
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Exported run snapshot (JSON) to read"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit JSON instead of tables"),
        )
        .subcommand(
            Command::new("status")
                .about("Every tracked run with a state tally")
                .arg(branch_arg(false)),
        )
        .subcommand(
            Command::new("compare")
                .about("Rank branches by metric wins over their newest finished runs")
                .arg(
                    Arg::new("branches")
                        .long("branches")
                        .value_delimiter(',')
                        .help("Branches to compare (comma separated; default all)"),
                )
                .arg(metrics_arg()),
        )
        .subcommand(
            Command::new("history")
                .about("Step metrics for a branch's newest finished run")
                .arg(branch_arg(true))
                .arg(metrics_arg())
                .arg(
                    Arg::new("rows")
                        .long("rows")
                        .default_value("40")
                        .value_parser(value_parser!(usize))
                        .help("Rows to print before eliding the middle"),
                ),
        )
        .subcommand(
            Command::new("diagnose")
                .about("Config, last steps, and log tail for problematic runs")
                .arg(branch_arg(false))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Newest runs to diagnose"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("One-page report across every branch")
                .arg(metrics_arg()),
        )
        .subcommand(
            Command::new("artifacts")
                .about("Artifacts logged by a branch's newest run")
                .arg(branch_arg(true)),
        )
        .subcommand(
            Command::new("post-result")
                .about("Render a results comment for the branch's open review")
                .arg(branch_arg(true))
                .arg(
                    Arg::new("trunk")
                        .long("trunk")
                        .env(ENV_TRUNK)
                        .default_value("main")
                        .help("Trunk branch to diff the run against"),
                ),
        )
}

fn branch_arg(required: bool) -> Arg {
    Arg::new("branch")
        .long("branch")
        .required(required)
        .help("Experiment branch")
}

fn metrics_arg() -> Arg {
    Arg::new("metrics")
        .long("metrics")
        .value_delimiter(',')
        .help("Metrics to include (comma separated; default all logged)")
}

fn strings(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<RegistryError>().is_some() || err.downcast_ref::<ForgeError>().is_some() {
        EXIT_SERVICE
    } else {
        1
    }
}
