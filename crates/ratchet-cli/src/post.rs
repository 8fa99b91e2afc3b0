//! `post-result`: render a results comment for a branch's newest run and,
//! when a code host is wired in, post it to the branch's open review.
//!
//! Without a host the rendered markdown goes to stdout so an operator can
//! paste it wherever the review lives.

use crate::output;
use crate::{EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use ratchet_compare::{compare, ComparisonSpec};
use ratchet_forge::{CodeHost, ForgeError, ReviewId};
use ratchet_registry::{Run, RunFilter, RunRegistry, RunState};

/// Markdown comment summarizing a run, with deltas against the trunk baseline
pub(crate) fn render_comment(
    run: &Run,
    baseline: Option<&Run>,
    trunk: &str,
    last_step: Option<u64>,
) -> String {
    let branch = run.branch.as_deref().unwrap_or(&run.name);
    let mut body = format!("## Run Results: `{branch}`\n\n");
    body.push_str(&format!("**Run:** {} (ID: `{}`)\n", run.name, run.id));
    body.push_str(&format!("**State:** {}\n", run.state.label()));

    match run.state {
        RunState::Finished => {
            if !run.summary.is_empty() {
                body.push_str("\n### Metrics\n\n");
                body.push_str("| Metric | Value |\n|---|---|\n");
                for (metric, value) in &run.summary {
                    body.push_str(&format!("| {metric} | {} |\n", output::metric(*value)));
                }
            }
            if let Some(baseline) = baseline {
                let result = compare(&run.summary, &baseline.summary, &ComparisonSpec::new());
                if !result.deltas.is_empty() {
                    body.push_str(&format!("\n### vs Baseline (`{trunk}`)\n\n"));
                    body.push_str("| Metric | Baseline | This Branch | Delta |\n|---|---|---|---|\n");
                    for delta in &result.deltas {
                        body.push_str(&format!(
                            "| {} | {} | {} | {:+.6} |\n",
                            delta.metric,
                            output::metric(delta.baseline),
                            output::metric(delta.candidate),
                            delta.delta,
                        ));
                    }
                }
            }
        }
        RunState::Failed | RunState::Crashed | RunState::Cancelled => {
            body.push_str(&format!(
                "\n**Run {}.** See `ratchet diagnose --branch {branch}` for details.\n",
                run.state.label()
            ));
        }
        RunState::Queued | RunState::Running => match last_step {
            Some(step) => body.push_str(&format!("\nRun is still in progress (step {step}).\n")),
            None => body.push_str("\nRun is still in progress.\n"),
        },
    }
    body
}

/// Review label for a run state, `experiment:finished` and friends
pub(crate) fn state_label(state: RunState) -> String {
    format!("experiment:{}", state.label())
}

/// Comment on the branch's open review and label it; `None` when the
/// branch has no open review
pub(crate) async fn publish(
    host: &dyn CodeHost,
    branch: &str,
    body: &str,
    label: &str,
) -> Result<Option<ReviewId>, ForgeError> {
    let Some(review) = host.find_review_for_branch(branch).await? else {
        return Ok(None);
    };
    host.comment(review.id, body).await?;
    host.add_label(review.id, label).await?;
    Ok(Some(review.id))
}

pub(crate) async fn run(
    registry: &dyn RunRegistry,
    host: Option<&dyn CodeHost>,
    branch: &str,
    trunk: &str,
    json: bool,
) -> Result<i32> {
    let Some(run) = registry.latest_run_for_branch(branch).await? else {
        println!("No runs found for branch '{branch}'.");
        return Ok(EXIT_NO_RUNS);
    };

    let baseline = if branch == trunk {
        None
    } else {
        registry
            .list_runs(
                &RunFilter::new()
                    .with_branch(trunk)
                    .with_states(vec![RunState::Finished])
                    .with_limit(1),
            )
            .await?
            .into_iter()
            .next()
    };
    let last_step = if run.state.is_active() {
        registry.get_history(&run.id).await?.last().map(|s| s.step)
    } else {
        None
    };

    let body = render_comment(&run, baseline.as_ref(), trunk, last_step);
    let label = state_label(run.state);

    let posted = match host {
        Some(host) => publish(host, branch, &body, &label).await?,
        None => None,
    };

    if json {
        let payload = serde_json::json!({
            "branch": branch,
            "run": &run.id,
            "label": label,
            "review": posted.map(|id| id.0),
            "body": body,
        });
        output::print_json(&payload)?;
        return Ok(EXIT_OK);
    }

    match posted {
        Some(id) => println!("Posted results to review {id} with label '{label}'."),
        None => {
            println!("{body}");
            println!("Label: {label}");
        }
    }
    Ok(EXIT_OK)
}
