use anyhow::Result;
use colored::Colorize;
use reconcile::{EntityKind, FieldSpec, Presence, Schema};

use crate::Context;
use crate::ui;

fn presence(field: &FieldSpec) -> colored::ColoredString {
    let s = field.presence.to_string();
    match field.presence {
        Presence::Required => s.yellow(),
        Presence::Optional => s.normal(),
        Presence::Computed => s.dimmed(),
    }
}

/// Notes shown after a field's type: default, flags and rules
fn notes(field: &FieldSpec) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(default) = &field.default {
        notes.push(format!("default {default}"));
    }
    if field.immutable {
        notes.push("immutable".to_string());
    }
    if field.sensitive {
        notes.push("sensitive".to_string());
    }
    notes.extend(field.rules.iter().map(|r| r.description()));
    notes
}

fn print_schema(schema: &Schema) {
    ui::section(schema.kind.label());
    let width = schema.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);

    for field in &schema.fields {
        println!(
            "  {:<width$}  {:<8}  {:<6}  {}",
            field.name,
            presence(field),
            field.ty.as_str(),
            field.description,
        );
        let notes = notes(field);
        if !notes.is_empty() {
            println!("  {:<width$}  {}", "", notes.join("; ").dimmed());
        }
    }

    for group in &schema.groups {
        ui::kv("constraint", &group.description());
    }
}

pub fn run(_ctx: &Context, kind: Option<EntityKind>) -> Result<()> {
    match kind {
        Some(kind) => print_schema(kind.schema()),
        None => EntityKind::ALL.iter().for_each(|k| print_schema(k.schema())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_for_script_fields() {
        let schema = EntityKind::Script.schema();
        let recurrence = notes(schema.field("recurrence").unwrap());
        assert!(recurrence.contains(&"immutable".to_string()));
        assert!(recurrence.len() > 1);

        let id = notes(schema.field("id").unwrap());
        assert!(id.is_empty());
    }

    #[test]
    fn test_provider_default_color_note() {
        let schema = EntityKind::Provider.schema();
        let color = notes(schema.field("color").unwrap());
        assert_eq!(color[0], "default \"#a0a0a0\"");
    }
}
