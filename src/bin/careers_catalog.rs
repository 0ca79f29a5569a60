//! Command-line front end for the careers catalog.
//!
//! `check` loads and validates the catalog and exits non-zero when the data
//! has errors; `skills`, `roles` and `sfia` print what a load produced.

use anyhow::{Context, Result};
use careers_catalog::{CatalogStore, LEVELS, LoadOptions, SourceMode, StoreConfig};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "careers-catalog", about = "Load, validate and inspect the careers catalog")]
struct Cli {
    /// Backend to read from: `file` or `db`.
    #[arg(long, env = "CAREERS_DATA_SOURCE")]
    source: Option<String>,

    /// Directory holding the catalog data files.
    #[arg(long, env = "CAREERS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log data errors instead of failing the load.
    #[arg(long)]
    no_strict: bool,

    /// Skip validation entirely.
    #[arg(long)]
    no_validate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Load everything and report validation findings.
    Check,
    /// Print skills with their per-level briefs.
    Skills,
    /// Print role titles per pathway and level.
    Roles,
    /// Dump the raw SFIA rows as JSON.
    Sfia,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("careers_catalog=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let store = CatalogStore::new(&config)?;
    let options = LoadOptions {
        validate: !cli.no_validate,
        strict: !cli.no_strict,
    };

    match cli.command {
        Command::Check => check(&store, options).await,
        Command::Skills => {
            store.load_all(options).await?;
            print_skills(&store);
            Ok(())
        }
        Command::Roles => {
            store.load_all(options).await?;
            print_roles(&store);
            Ok(())
        }
        Command::Sfia => {
            store.load_all(options).await?;
            let rows = store.sfia_rows();
            let rendered =
                serde_json::to_string_pretty(rows.as_slice()).context("serializing SFIA rows")?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.data_dir {
        Some(dir) => StoreConfig::from_lookup(dir, |key| env::var(key).ok())?,
        None => StoreConfig::from_env()?,
    };
    if let Some(raw) = &cli.source {
        config.mode = raw.parse::<SourceMode>()?;
    }
    Ok(config)
}

async fn check(store: &CatalogStore, options: LoadOptions) -> Result<()> {
    let report = store.load_all(options).await?;
    let skills = store.skills();
    let roles = store.roles();
    println!(
        "mode {}: {} skills in {} categories, {} roles across {} pathways, {} SFIA rows",
        store.mode(),
        skills.skills.len(),
        skills.categories.len(),
        roles.roles.len(),
        roles.pathways.len(),
        store.sfia_rows().len()
    );

    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for error in &report.errors {
        println!("error: {error}");
    }
    if !report.errors.is_empty() {
        anyhow::bail!("{} data error(s) found", report.errors.len());
    }
    Ok(())
}

fn print_skills(store: &CatalogStore) {
    let skills = store.skills();
    let indexes = store.indexes();
    for skill in &skills.skills {
        let category = indexes
            .category(&skill.category_id)
            .map(|c| c.name.as_str())
            .unwrap_or(skill.category_id.0.as_str());
        println!("\t{}: {} ({category})", skill.id, skill.name);
        for level in &skill.levels {
            let brief = if level.brief_description.is_empty() {
                indexes
                    .level_definition(level.level)
                    .map(|d| d.level_desc.as_str())
                    .unwrap_or_default()
            } else {
                level.brief_description.as_str()
            };
            println!("\t\t{}: {brief}", level.level);
        }
    }
}

fn print_roles(store: &CatalogStore) {
    let roles = store.roles();
    for role in &roles.roles {
        for pathway in &roles.pathways {
            println!("{}: {}", role.name, pathway.description);
            for level in LEVELS {
                let title = role
                    .pathway(&pathway.id)
                    .and_then(|p| p.level(level))
                    .and_then(|block| block.title.as_deref())
                    .unwrap_or_default();
                println!("\t{level}: {title}");
            }
        }
    }
}
