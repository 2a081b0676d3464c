//! Formsmith CLI
//!
//! Command-line front end for building, saving and previewing forms.
//!
//! # Usage
//!
//! ```bash
//! formsmith draft name "Signup"
//! formsmith draft add --label "Date of birth" --alias dob --type date --required
//! formsmith draft add --label Age --alias age --type number --parent dob \
//!     --formula "Math.floor((new Date() - new Date(dob)) / (1000*60*60*24*365.25))"
//! formsmith draft save
//! formsmith forms list --format json
//! formsmith preview <FORM_ID> --set dob=1990-05-01 --submit
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "formsmith")]
#[command(author = "Formsmith")]
#[command(version)]
#[command(about = "Formsmith Command Line Interface", long_about = None)]
struct Cli {
    /// Directory holding the draft and saved forms
    #[arg(long, env = "FORMSMITH_STORE")]
    store: Option<PathBuf>,

    /// Output format
    #[arg(long, short)]
    format: Option<output::OutputFormat>,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit the form being built
    Draft {
        #[command(subcommand)]
        action: DraftCommands,
    },
    /// Browse saved forms
    Forms {
        #[command(subcommand)]
        action: FormCommands,
    },
    /// Fill in a saved form and check it
    Preview {
        /// Saved form id
        form_id: String,
        /// Field value, applied in order
        #[arg(long = "set", value_name = "ALIAS_OR_ID=VALUE")]
        set: Vec<String>,
        /// Validate every field as a submit would
        #[arg(long)]
        submit: bool,
    },
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum DraftCommands {
    /// Show the draft
    Show,
    /// Set the form name
    Name { name: String },
    /// Add a field
    Add(FieldArgs),
    /// Edit a field, keeping anything not given
    Update {
        /// Field id or alias
        id: String,
        #[command(flatten)]
        field: FieldArgs,
    },
    /// Remove a field
    Remove {
        /// Field id or alias
        id: String,
    },
    /// Move the field at FROM to TO (zero-based)
    Move { from: usize, to: usize },
    /// Save the draft as a new form
    Save,
    /// Discard the draft
    Reset,
}

#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    label: Option<String>,

    /// Name the field goes by in formulas
    #[arg(long)]
    alias: Option<String>,

    /// text, number, textarea, select, radio, checkbox or date
    #[arg(long = "type")]
    field_type: Option<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    required: Option<bool>,

    #[arg(long)]
    default: Option<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    not_empty: Option<bool>,

    #[arg(long)]
    min_length: Option<usize>,

    #[arg(long)]
    max_length: Option<usize>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    email: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    password_rule: Option<bool>,

    /// Parent field (alias or id); repeat for several
    #[arg(long = "parent")]
    parents: Vec<String>,

    /// Formula computing this field from its parents
    #[arg(long)]
    formula: Option<String>,
}

#[derive(Subcommand)]
enum FormCommands {
    /// List saved forms
    List,
    /// Show one saved form
    Show { id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set configuration value
    Set { key: String, value: String },
    /// Get configuration value
    Get { key: String },
    /// List all configuration
    List,
    /// Initialize configuration
    Init,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = run(cli);

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let Cli {
        store,
        format,
        profile,
        command,
    } = cli;
    let profile = profile.as_deref();

    match command {
        Commands::Config { action } => commands::config::handle(action, profile),
        Commands::Draft { action } => {
            let (workspace, format) = open_workspace(store, format, profile)?;
            commands::draft::handle(action, &workspace, format)
        }
        Commands::Forms { action } => {
            let (workspace, format) = open_workspace(store, format, profile)?;
            commands::forms::handle(action, &workspace, format)
        }
        Commands::Preview {
            form_id,
            set,
            submit,
        } => {
            let (workspace, format) = open_workspace(store, format, profile)?;
            commands::preview::handle(&form_id, &set, submit, &workspace, format)
        }
    }
}

/// Resolve the store and output format, preferring flags over the profile.
fn open_workspace(
    store: Option<PathBuf>,
    format: Option<output::OutputFormat>,
    profile: Option<&str>,
) -> Result<(commands::Workspace, output::OutputFormat), String> {
    let config = config::Config::load(profile).unwrap_or_default();
    let format = match format {
        Some(format) => format,
        None => config.output_format()?,
    };
    let store_dir = match store {
        Some(dir) => dir,
        None => config.store_dir()?,
    };
    tracing::debug!(store = %store_dir.display(), "using store");
    Ok((commands::Workspace::new(store_dir), format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (workspace, format) = open_workspace(
            Some(dir.path().to_path_buf()),
            Some(output::OutputFormat::Yaml),
            Some("no-such-profile"),
        )
        .unwrap();
        assert!(matches!(format, output::OutputFormat::Yaml));
        assert!(workspace.load_draft().unwrap().fields().is_empty());
    }

    #[test]
    fn test_cli_parses_store_and_command() {
        let cli = Cli::try_parse_from(["formsmith", "--store", "/tmp/forms", "forms", "list"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/forms")));
        assert!(matches!(cli.command, Commands::Forms { action: FormCommands::List }));
    }
}
