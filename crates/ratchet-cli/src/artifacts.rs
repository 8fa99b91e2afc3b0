//! `artifacts`: artifacts logged by a branch's newest run

use crate::output;
use crate::{EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use ratchet_registry::RunRegistry;

pub(crate) async fn run(registry: &dyn RunRegistry, branch: &str, json: bool) -> Result<i32> {
    let Some(run) = registry.latest_run_for_branch(branch).await? else {
        println!("No runs found for branch '{branch}'.");
        return Ok(EXIT_NO_RUNS);
    };
    let artifacts = registry.list_artifacts(&run.id).await?;

    if json {
        output::print_json(&artifacts)?;
        return Ok(EXIT_OK);
    }
    if artifacts.is_empty() {
        println!("No artifacts logged for run {}.", run.name);
        return Ok(EXIT_OK);
    }

    println!("Artifacts for {} (ID: {})", run.name, run.id);
    println!("{:<32} {:<14} {:>10}  {}", "Name", "Kind", "Size", "Aliases");
    println!("{}", "-".repeat(76));
    for artifact in &artifacts {
        println!(
            "{:<32} {:<14} {:>10}  {}",
            artifact.name,
            artifact.kind,
            output::byte_size(artifact.size_bytes),
            artifact.aliases.join(", "),
        );
    }
    Ok(EXIT_OK)
}
