//! Modelstore CLI - inspect and exercise a record database

mod commands;
mod notes;

use clap::{Parser, Subcommand};
use modelstore::config::{self, StoreConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "modelstore")]
#[command(version)]
#[command(about = "Descriptor-driven record persistence over SQLite")]
#[command(long_about = r#"
Modelstore maps typed records onto SQLite tables derived from their field
descriptors.

Example usage:
  modelstore init --version 1 --prefix app_
  modelstore demo --count 10
  modelstore stats --json
  modelstore schema
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,

        /// Schema version stamped on records
        #[arg(long)]
        version: Option<i32>,

        /// Prefix for derived table names
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show tables, row counts and the stored schema version
    Stats,

    /// Print the derived schema of the demo record type
    Schema,

    /// Save, query and delete demo notes
    Demo {
        /// Number of notes to save
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Delete existing notes first
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print a JSON success envelope; human mode prints nothing here
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

/// Resolved config and paths for one invocation
pub struct Context {
    pub config_path: PathBuf,
    pub config: StoreConfig,
    pub database: PathBuf,
}

impl Context {
    fn resolve(config_path: Option<PathBuf>, database: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config_path.unwrap_or_else(config::default_config_path);
        let config = config::load_config(Some(&config_path))?.unwrap_or_default();
        let database = database.unwrap_or_else(|| config.database_path_in(base_dir(&config_path)));
        Ok(Self {
            config_path,
            config,
            database,
        })
    }

    pub fn project_root(&self) -> &Path {
        base_dir(&self.config_path)
    }
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new(""))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let ctx = Context::resolve(cli.config, cli.database.clone())?;

    let result = match cli.command {
        Commands::Init { force, version, prefix } => {
            commands::run_init(&ctx, cli.database.as_deref(), force, version, prefix, output_mode)
        }
        Commands::Stats => commands::run_stats(&ctx, output_mode),
        Commands::Schema => commands::run_schema(&ctx, output_mode),
        Commands::Demo { count, reset } => commands::run_demo(&ctx, count, reset, output_mode),
    };

    if let Err(e) = &result {
        if output_mode.is_human() {
            modelstore::ui::error(&format!("{:#}", e));
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", e) });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        std::process::exit(1);
    }
    Ok(())
}
