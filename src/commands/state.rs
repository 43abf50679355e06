//! Commands working from a state file: refresh, destroy and show.

use anyhow::Result;
use reconcile::{CanonicalState, Reconciler};
use remote::{CancelToken, Client, Secret};
use std::path::Path;

use crate::Context;
use crate::cli::StateArgs;
use crate::commands::{confirm, reconciled, session};
use crate::state;
use crate::ui;

/// Re-read the entity behind a state file and save what the remote reports
pub fn refresh_with(
    client: &Client,
    cancel: &CancelToken,
    path: &Path,
) -> Result<CanonicalState> {
    let prior = state::load_existing(path)?;
    let fresh = reconciled(Reconciler::new(client).read(
        &prior.identity,
        prior.credentials.clone(),
        cancel,
    ))?;
    state::save(path, &fresh)?;
    Ok(fresh)
}

/// Hide the entity behind a state file and save the hidden state
pub fn destroy_with(
    client: &Client,
    cancel: &CancelToken,
    path: &Path,
) -> Result<CanonicalState> {
    let prior = state::load_existing(path)?;
    let reconciler = Reconciler::new(client);
    let outcome = reconciled(reconciler.apply(prior.kind(), Some(&prior), None, cancel))?;
    let hidden = outcome.map_or(prior, |o| o.state);
    state::save(path, &hidden)?;
    Ok(hidden)
}

pub fn refresh(ctx: &Context, args: StateArgs) -> Result<()> {
    let session = session(&args.api)?;
    let fresh = refresh_with(&session.client, &session.cancel, &args.state)?;
    ui::success(&format!("Refreshed {}", fresh.identity));
    if !ctx.quiet {
        print_state(&fresh, false);
    }
    Ok(())
}

pub fn destroy(_ctx: &Context, args: StateArgs, yes: bool) -> Result<()> {
    let prior = state::load_existing(&args.state)?;
    ui::warn(&format!("{} will be hidden from the public", prior.identity));
    ui::info("It stays on the remote and applying its manifest publishes it again");
    if !yes && !confirm("Continue?")? {
        ui::warn("Aborted. No changes made.");
        return Ok(());
    }

    let session = session(&args.api)?;
    let hidden = destroy_with(&session.client, &session.cancel, &args.state)?;
    ui::success(&format!("{} is now {}", hidden.identity, hidden.binding()));
    Ok(())
}

pub fn show(_ctx: &Context, path: &Path, reveal: bool) -> Result<()> {
    let state = state::load_existing(path)?;
    print_state(&state, reveal);
    Ok(())
}

fn secret(secret: Option<&Secret>, reveal: bool) -> String {
    match secret {
        Some(s) if reveal => s.expose().to_string(),
        Some(s) => s.to_string(),
        None => "-".to_string(),
    }
}

/// Lines printed for a state, credentials redacted unless `reveal`
fn describe(state: &CanonicalState, reveal: bool) -> Vec<(String, String)> {
    let mut lines = vec![
        ("kind".to_string(), state.kind().to_string()),
        ("binding".to_string(), state.binding().to_string()),
        (
            "external id".to_string(),
            state
                .external_id()
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
        ),
        ("updated".to_string(), state.updated_at.to_rfc3339()),
    ];
    lines.extend(
        state
            .fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string())),
    );
    if let Some(creds) = &state.credentials {
        lines.push(("api_key".to_string(), secret(creds.api_key.as_ref(), reveal)));
        lines.push((
            "secret_key".to_string(),
            secret(creds.secret_key.as_ref(), reveal),
        ));
    }
    lines
}

fn print_state(state: &CanonicalState, reveal: bool) {
    ui::header(&state.identity.to_string());
    for (key, value) in describe(state, reveal) {
        ui::kv(&key, &value);
    }
}
