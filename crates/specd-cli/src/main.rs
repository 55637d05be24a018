mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specd",
    about = "Spec-driven development: validate change deltas and archive them into specs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from specd/ or .git/)
    #[arg(long, global = true, env = "SPECD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize specd in the current project
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// List active changes, or specs with --specs
    List {
        /// List capability specs instead of changes
        #[arg(long)]
        specs: bool,
    },

    /// Validate a change or spec, or everything in bulk
    Validate {
        /// Change id or capability name (omit for bulk validation)
        item: Option<String>,

        /// Validate all changes and specs
        #[arg(long, conflicts_with = "item")]
        all: bool,

        /// Validate all changes
        #[arg(long, conflicts_with = "item")]
        changes: bool,

        /// Validate all specs
        #[arg(long, conflicts_with = "item")]
        specs: bool,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Maximum number of items validated at once
        #[arg(long, env = "SPECD_CONCURRENCY")]
        concurrency: Option<usize>,
    },

    /// Merge a change's deltas into the specs and move it to the archive
    Archive {
        change_id: String,

        /// Archive without touching specs
        #[arg(long)]
        skip_specs: bool,

        /// Write rebuilt specs even if they fail validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Inspect the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::List { specs } => cmd::list::run(&root, specs, cli.json),
        Commands::Validate {
            item,
            all,
            changes,
            specs,
            strict,
            concurrency,
        } => cmd::validate::run(
            &root,
            cmd::validate::ValidateArgs {
                item,
                all,
                changes,
                specs,
                strict,
                concurrency,
            },
            cli.json,
        ),
        Commands::Archive {
            change_id,
            skip_specs,
            no_validate,
        } => cmd::archive::run(&root, &change_id, skip_specs, no_validate, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
