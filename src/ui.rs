use colored::{ColoredString, Colorize};
use reconcile::{FieldChange, Transition};
use rules::Value;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Plans
// ============================================================================

/// Transition name colored by how disruptive it is
pub fn transition(transition: Transition) -> ColoredString {
    let name = transition.as_str();
    match transition {
        Transition::Create => name.green().bold(),
        Transition::Adopt => name.cyan().bold(),
        Transition::Update => name.yellow().bold(),
        Transition::SoftDelete => name.red().bold(),
    }
}

fn value(value: &Value) -> ColoredString {
    match value {
        Value::Null => "null".dimmed(),
        Value::Unknown => value.to_string().italic(),
        _ => value.to_string().normal(),
    }
}

/// Print one field change as `~ field: before -> after`
pub fn change(change: &FieldChange) {
    let marker = if change.before.is_null() {
        "+".green()
    } else {
        "~".yellow()
    };
    println!(
        "  {} {}: {} {} {}",
        marker,
        change.field,
        value(&change.before),
        "->".dimmed(),
        value(&change.after)
    );
}
