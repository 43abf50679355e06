use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use reconcile::EntityKind;
use std::path::PathBuf;

use crate::config::{ENV_API_TOKEN, ENV_API_URL};

#[derive(Parser)]
#[command(name = "scribae")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of provider profiles, script groups and scripts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a manifest against its field table (no remote calls)
    Validate {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Show what apply would do (no remote calls)
    Plan(PlanArgs),

    /// Create, adopt or update the entity described by a manifest
    Apply(ApplyArgs),

    /// Re-read the entity and rewrite its state file
    Refresh(StateArgs),

    /// Hide the entity from the public (soft delete)
    Destroy {
        #[command(flatten)]
        state: StateArgs,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Read an existing entity by its key, without a state file
    Lookup(LookupArgs),

    /// Print a state file
    Show {
        /// State file
        #[arg(long)]
        state: PathBuf,

        /// Print credentials instead of redacting them
        #[arg(long)]
        reveal: bool,
    },

    /// Print the field table of one or all kinds
    Schema {
        /// Entity kind
        #[arg(value_enum)]
        kind: Option<KindArg>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Manifest file
    pub manifest: PathBuf,

    /// State file (defaults to the manifest path with a .state.json extension)
    #[arg(long)]
    pub state: Option<PathBuf>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(flatten)]
    pub api: ApiArgs,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct StateArgs {
    /// State file
    #[arg(long)]
    pub state: PathBuf,

    #[command(flatten)]
    pub api: ApiArgs,
}

#[derive(Args)]
pub struct LookupArgs {
    /// Entity kind
    #[arg(value_enum)]
    pub kind: KindArg,

    /// UUID of the entity
    #[arg(long, conflicts_with_all = ["group", "alt_id"])]
    pub uuid: Option<String>,

    /// UUID of the owning provider profile
    #[arg(long)]
    pub provider_id: Option<String>,

    /// Script group of a script, by UUID or alt id
    #[arg(long)]
    pub group: Option<String>,

    /// Alt id within the parent
    #[arg(long)]
    pub alt_id: Option<String>,

    /// Print the fields as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub api: ApiArgs,
}

/// Remote API connection flags
#[derive(Args, Clone, Default)]
pub struct ApiArgs {
    /// API endpoint
    #[arg(long, env = ENV_API_URL)]
    pub api_url: Option<String>,

    /// API token
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true)]
    pub api_token: Option<String>,

    /// Give up on remote calls after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Provider,
    ScriptGroup,
    Script,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Provider => Self::Provider,
            KindArg::ScriptGroup => Self::ScriptGroup,
            KindArg::Script => Self::Script,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "scribae",
            "-vv",
            "apply",
            "acme.toml",
            "--state",
            "out.json",
            "--timeout",
            "5",
            "--yes",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.plan.manifest, PathBuf::from("acme.toml"));
        assert_eq!(args.plan.state, Some(PathBuf::from("out.json")));
        assert_eq!(args.api.timeout, Some(5));
        assert!(args.yes);
    }

    #[test]
    fn test_parse_schema_kind() {
        let cli = Cli::try_parse_from(["scribae", "schema", "script-group"]).unwrap();
        let Command::Schema { kind } = cli.command else {
            panic!("expected schema");
        };
        assert_eq!(kind.map(EntityKind::from), Some(EntityKind::ScriptGroup));
    }

    #[test]
    fn test_parse_lookup() {
        let cli = Cli::try_parse_from([
            "scribae",
            "lookup",
            "script",
            "--provider-id",
            "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "--group",
            "tools",
            "--alt-id",
            "summarize",
        ])
        .unwrap();
        let Command::Lookup(args) = cli.command else {
            panic!("expected lookup");
        };
        assert_eq!(args.kind, KindArg::Script);
        assert_eq!(args.group.as_deref(), Some("tools"));
        assert!(!args.json);

        assert!(
            Cli::try_parse_from(["scribae", "lookup", "script", "--uuid", "x", "--alt-id", "y"])
                .is_err()
        );
    }

    #[test]
    fn test_destroy_requires_state() {
        assert!(Cli::try_parse_from(["scribae", "destroy"]).is_err());
    }
}
