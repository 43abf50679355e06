use anyhow::Result;
use reconcile::{Identity, Mode};
use std::path::Path;

use crate::Context;
use crate::commands::reconciled;
use crate::manifest::Manifest;
use crate::ui;

pub fn run(ctx: &Context, path: &Path) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let schema = manifest.kind.schema();
    let desired = schema.with_defaults(&manifest.fields);

    reconciled(schema.validate(&desired, Mode::Create))?;
    let identity = reconciled(Identity::from_record(manifest.kind, &desired))?;

    if !ctx.quiet {
        ui::success(&format!("{} is a valid {}", path.display(), manifest.kind));
        if let Ok(address) = identity.address() {
            ui::dim(&format!("Addresses {address:?}"));
        }
    }
    Ok(())
}
