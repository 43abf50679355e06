use anyhow::{Result, bail};
use reconcile::{EntityKind, Reconciler};
use remote::{CancelToken, Client};
use rules::Record;

use crate::Context;
use crate::cli::LookupArgs;
use crate::commands::{reconciled, session};
use crate::ui;

/// Key fields for a lookup, as the kind's identity expects them
fn key(kind: EntityKind, args: &LookupArgs) -> Result<Record> {
    if args.group.is_some() && kind != EntityKind::Script {
        bail!("--group only applies to scripts");
    }
    if kind == EntityKind::Provider && args.uuid.is_none() {
        bail!("A provider profile can only be looked up by --uuid");
    }

    Ok(Record::new()
        .with("uuid", args.uuid.clone())
        .with("provider_id", args.provider_id.clone())
        .with("script_group_id", args.group.clone())
        .with("alt_id", args.alt_id.clone())
        .compact())
}

/// Fetch the entity behind `key`
pub fn lookup_with(
    client: &Client,
    cancel: &CancelToken,
    kind: EntityKind,
    key: &Record,
) -> Result<Record> {
    reconciled(Reconciler::new(client).lookup(kind, key, cancel))
}

pub fn run(_ctx: &Context, args: LookupArgs) -> Result<()> {
    let kind = args.kind.into();
    let key = key(kind, &args)?;
    let session = session(&args.api)?;
    let fields = lookup_with(&session.client, &session.cancel, kind, &key)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
        return Ok(());
    }

    ui::header(&format!("{} {}", kind, fields.str("uuid").unwrap_or("-")));
    for (name, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
        ui::kv(name, &value.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ApiArgs, KindArg};
    use remote::MockBackend;
    use std::sync::Arc;

    fn args(kind: KindArg) -> LookupArgs {
        LookupArgs {
            kind,
            uuid: None,
            provider_id: None,
            group: None,
            alt_id: None,
            json: false,
            api: ApiArgs::default(),
        }
    }

    #[test]
    fn test_key_for_script() {
        let mut args = args(KindArg::Script);
        args.provider_id = Some("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string());
        args.group = Some("tools".to_string());
        args.alt_id = Some("summarize".to_string());

        let key = key(EntityKind::Script, &args).unwrap();
        assert_eq!(key.str("script_group_id"), Some("tools"));
        assert!(!key.contains("uuid"));
    }

    #[test]
    fn test_key_rejects_misplaced_flags() {
        let mut group = args(KindArg::ScriptGroup);
        group.group = Some("tools".to_string());
        assert!(key(EntityKind::ScriptGroup, &group).is_err());

        let provider = args(KindArg::Provider);
        assert!(key(EntityKind::Provider, &provider).is_err());
    }

    #[test]
    fn test_lookup_reads_existing_group() {
        let mock = MockBackend::new();
        let client = Client::with_backend(Arc::new(mock.clone()));
        let cancel = CancelToken::new();
        let reconciler = Reconciler::new(&client);
        let provider = reconciler
            .create(
                EntityKind::Provider,
                &Record::new()
                    .with("name", "Acme")
                    .with("description", "Acme scripts"),
                &cancel,
            )
            .unwrap()
            .external_id()
            .unwrap();
        reconciler
            .create(
                EntityKind::ScriptGroup,
                &Record::new()
                    .with("provider_id", provider.to_string())
                    .with("alt_id", "tools")
                    .with("name", "Tools")
                    .with("description", "Useful tools")
                    .with("public", true),
                &cancel,
            )
            .unwrap();

        let mut args = args(KindArg::ScriptGroup);
        args.provider_id = Some(provider.to_string());
        args.alt_id = Some("tools".to_string());
        let key = key(EntityKind::ScriptGroup, &args).unwrap();

        let fields = lookup_with(&client, &cancel, EntityKind::ScriptGroup, &key).unwrap();
        assert_eq!(fields.str("name"), Some("Tools"));
        assert_eq!(mock.call_count("read_script_group"), 1);
    }
}
