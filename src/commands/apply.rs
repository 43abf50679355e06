use anyhow::Result;
use reconcile::{Outcome, Reconciler, Transition};
use remote::{CancelToken, Client};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::plan::{self, Prepared};
use crate::commands::{confirm, reconciled, session};
use crate::state;
use crate::ui;

/// Run the prepared transition and save the resulting state
pub fn execute(
    client: &Client,
    cancel: &CancelToken,
    prepared: &Prepared,
) -> Result<Option<Outcome>> {
    let outcome = reconciled(Reconciler::new(client).apply(
        prepared.manifest.kind,
        prepared.prior.as_ref(),
        Some(&prepared.manifest.fields),
        cancel,
    ))?;

    if let Some(outcome) = &outcome {
        state::save(&prepared.state_path, &outcome.state)?;
    }
    Ok(outcome)
}

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let prepared = plan::prepare(&args.plan)?;
    if !plan::display(prepared.plan.as_ref()) {
        return Ok(());
    }

    println!();
    if !args.yes && !confirm("Apply this plan?")? {
        ui::warn("Aborted. No changes made.");
        return Ok(());
    }

    let session = session(&args.api)?;
    let Some(outcome) = execute(&session.client, &session.cancel, &prepared)? else {
        return Ok(());
    };

    let id = outcome
        .state
        .external_id()
        .map(|id| id.to_string())
        .unwrap_or_default();
    ui::success(&format!(
        "{} {} {}",
        ui::transition(outcome.transition),
        outcome.state.kind(),
        id
    ));
    if matches!(outcome.transition, Transition::Create | Transition::Adopt)
        && outcome.state.credentials.is_some()
    {
        ui::warn("New credentials were issued and cannot be fetched again");
    }
    if !ctx.quiet {
        ui::dim(&format!("State saved to {}", prepared.state_path.display()));
    }
    Ok(())
}
