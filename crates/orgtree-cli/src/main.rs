//! orgtree - inspect and bulk-edit a typed team hierarchy
//!
//! Every command loads a records file into a fresh in-memory deployment
//! and prints its answer as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Consolidated hierarchy of a records file
//! orgtree tree teams.csv
//!
//! # Flat records of one subtree
//! orgtree export teams.csv --team Engineering
//!
//! # Validate an import without writing it
//! orgtree import new-teams.csv --team Engineering --base teams.csv --dry-run
//!
//! # Roles a team inherits from its parents
//! orgtree roles teams.csv --team Platform
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use orgtree_cli::{Deployment, OrgtreeConfig};

#[derive(Parser, Debug)]
#[command(
    name = "orgtree",
    about = "Inspect and bulk-edit a typed team hierarchy",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the consolidated team forest.
    Tree {
        /// Records file loaded under the organization.
        records: PathBuf,

        /// Keep only joinable teams and their ancestors.
        #[arg(long)]
        joinable_only: bool,

        /// Maximum number of teams listed.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Print the flat records of a team's subtree.
    Export {
        records: PathBuf,

        #[arg(long, value_name = "NAME")]
        team: String,
    },

    /// Import records under a team and print the result.
    Import {
        /// Records to import.
        records: PathBuf,

        #[arg(long, value_name = "NAME")]
        team: String,

        /// Validate every row without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Records file loaded under the organization first.
        #[arg(long, value_name = "FILE")]
        base: Option<PathBuf>,
    },

    /// Print the default and inherited roles of a team.
    Roles {
        records: PathBuf,

        #[arg(long, value_name = "NAME")]
        team: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = OrgtreeConfig::load(cli.config.as_deref())?;

    let log_level = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let deployment = Deployment::new(config)?;

    match cli.command {
        Command::Tree {
            records,
            joinable_only,
            limit,
        } => {
            deployment.load_file(&records)?;
            print_json(&deployment.tree(joinable_only, limit)?)?;
        }
        Command::Export { records, team } => {
            deployment.load_file(&records)?;
            print!("{}", deployment.engine().export_document(&team)?);
        }
        Command::Import {
            records,
            team,
            dry_run,
            base,
        } => {
            if let Some(base) = base {
                deployment.load_file(&base)?;
            }
            let text = read(&records)?;
            print_json(&deployment.engine().import_subtree(&team, &text, dry_run)?)?;
        }
        Command::Roles { records, team } => {
            deployment.load_file(&records)?;
            print_json(&deployment.roles(&team)?)?;
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
