use anyhow::{Result, bail};
use reconcile::{CanonicalState, Plan, Transition};
use rules::Record;
use std::path::PathBuf;

use crate::Context;
use crate::cli::PlanArgs;
use crate::manifest::Manifest;
use crate::paths;
use crate::state;
use crate::ui;

/// A manifest with its prior state and the plan between them
pub struct Prepared {
    pub manifest: Manifest,
    pub state_path: PathBuf,
    pub prior: Option<CanonicalState>,
    pub plan: Option<Plan>,
}

impl Prepared {
    /// Desired record as the plan compares it. Defaults only apply to new entities.
    pub fn desired(&self) -> Record {
        match &self.prior {
            Some(_) => self.manifest.fields.clone(),
            None => self.manifest.kind.schema().with_defaults(&self.manifest.fields),
        }
    }
}

/// Load the manifest and its state file and decide what apply would do
pub fn prepare(args: &PlanArgs) -> Result<Prepared> {
    let manifest = Manifest::load(&args.manifest)?;
    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| paths::default_state_path(&args.manifest));
    let prior = state::load(&state_path)?;

    if let Some(prior) = &prior
        && prior.kind() != manifest.kind
    {
        bail!(
            "State file {} belongs to a {}, but the manifest describes a {}",
            state_path.display(),
            prior.kind(),
            manifest.kind
        );
    }

    let mut prepared = Prepared {
        manifest,
        state_path,
        prior,
        plan: None,
    };
    let desired = prepared.desired();
    prepared.plan = Plan::build(
        prepared.manifest.kind,
        prepared.prior.as_ref(),
        Some(&desired),
    );
    Ok(prepared)
}

/// Print a plan; returns false when there is nothing to apply
pub fn display(plan: Option<&Plan>) -> bool {
    let Some(plan) = plan.filter(|p| !p.is_noop()) else {
        ui::success("No changes - remote entity matches the manifest");
        return false;
    };

    ui::header(&format!(
        "Plan: {} {}",
        ui::transition(plan.transition),
        plan.kind
    ));
    for change in &plan.changes {
        ui::change(change);
    }
    if plan.transition == Transition::Adopt {
        println!();
        ui::warn("Adopting rotates the entity's credentials once");
    }
    true
}

pub fn run(_ctx: &Context, args: PlanArgs) -> Result<()> {
    let prepared = prepare(&args)?;
    log::debug!("Using state file {}", prepared.state_path.display());
    display(prepared.plan.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{EntityKind, Identity};
    use std::fs;
    use tempfile::TempDir;

    const GROUP: &str = r#"
kind = "script_group"

[fields]
provider_id = "67e55044-10b1-426f-9247-bb680e5fe0c8"
alt_id = "tools"
name = "Tools"
description = "Useful tools"
public = true
"#;

    fn write_manifest(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("tools.toml");
        fs::write(&path, GROUP).unwrap();
        path
    }

    #[test]
    fn test_prepare_without_state_creates() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir);
        let prepared = prepare(&PlanArgs {
            manifest: manifest.clone(),
            state: None,
        })
        .unwrap();

        assert_eq!(prepared.state_path, dir.path().join("tools.state.json"));
        let plan = prepared.plan.unwrap();
        assert_eq!(plan.transition, Transition::Create);
        assert!(plan.changes.iter().any(|c| c.field == "public"));
    }

    #[test]
    fn test_prepare_with_matching_state_is_noop() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir);
        let fields = Manifest::parse(GROUP).unwrap().fields;
        let prior = CanonicalState::new(
            Identity::new(EntityKind::ScriptGroup),
            "0e4f3c6a-5d1b-4a7e-9c2f-8b3a1d6e7f90".parse().unwrap(),
            fields,
            None,
        );
        state::save(&paths::default_state_path(&manifest), &prior).unwrap();

        let prepared = prepare(&PlanArgs {
            manifest,
            state: None,
        })
        .unwrap();
        assert!(prepared.plan.unwrap().is_noop());
    }

    #[test]
    fn test_prepare_rejects_state_of_other_kind() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir);
        let prior = CanonicalState::new(
            Identity::new(EntityKind::Provider),
            "0e4f3c6a-5d1b-4a7e-9c2f-8b3a1d6e7f90".parse().unwrap(),
            Record::new().with("name", "Acme"),
            None,
        );
        state::save(&paths::default_state_path(&manifest), &prior).unwrap();

        let err = prepare(&PlanArgs {
            manifest,
            state: None,
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("belongs to a"));
    }
}
