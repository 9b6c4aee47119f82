mod cmd;
mod host;
mod output;
mod root;
mod when;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::{add::AddArgs, edit::EditArgs, settings::SettingsSubcommand};
use snooze_core::action::ActionId;

#[derive(Parser)]
#[command(
    name = "snooze",
    about = "Schedule URLs to reopen later, once or on a repeating rule",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data directory (default: ~/.snooze)
    #[arg(long, global = true, env = "SNOOZE_HOME")]
    data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a URL
    Add(AddArgs),

    /// List pending actions, soonest first
    List,

    /// Change the wake time, repeat rule, title, or note of an action
    Edit(EditArgs),

    /// Delete a pending action
    Remove { id: ActionId },

    /// Open an action now instead of waiting
    Wake { id: ActionId },

    /// Execute everything overdue and re-arm the rest
    Reconcile,

    /// Run the scheduler daemon
    Run {
        /// Reconcile, fire due timers, and exit
        #[arg(long)]
        once: bool,
    },

    /// Export pending actions as JSON
    Export {
        /// File or directory to write (default: stdout)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Import actions from an export file
    Import {
        file: PathBuf,
        /// Keep existing actions and append the imported ones
        #[arg(long)]
        merge: bool,
    },

    /// Show and change settings
    Settings {
        #[command(subcommand)]
        subcommand: SettingsSubcommand,
    },

    /// Show what each preset resolves to right now
    Presets,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = root::resolve_data_dir(cli.data_dir.as_deref());

    if let Err(e) = run(cli.command, &data_dir, cli.json) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands, data_dir: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(async {
        let host = host::Host::open(data_dir)?;
        match command {
            Commands::Add(args) => cmd::add::run(&host, args, json).await,
            Commands::List => cmd::list::run(&host, json).await,
            Commands::Edit(args) => cmd::edit::run(&host, args, json).await,
            Commands::Remove { id } => cmd::remove::run(&host, id, json).await,
            Commands::Wake { id } => cmd::wake::run(&host, id, json).await,
            Commands::Reconcile => cmd::reconcile::run(&host, json).await,
            Commands::Run { once } => cmd::run::run(&host, once, json).await,
            Commands::Export { out } => cmd::export::run(&host, out).await,
            Commands::Import { file, merge } => cmd::import::run(&host, &file, merge, json).await,
            Commands::Settings { subcommand } => cmd::settings::run(&host, subcommand, json).await,
            Commands::Presets => cmd::presets::run(&host, json).await,
        }
    })
}
