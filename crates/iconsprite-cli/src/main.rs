mod collect;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use iconsprite_cache::{CollectingSink, DiagnosticSink, SpriteEngine, TracingSink};
use iconsprite_core::{ConfigManager, LoggingConfig, SpriteConfig, UnitKey};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

#[derive(Parser)]
#[command(
    name = "iconsprite",
    version,
    about = "IconSprite CLI - bundle referenced SVG icons into one sprite"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a config file (defaults to ./iconsprite.toml or the user config)
    #[arg(short, long, global = true, env = "ICONSPRITE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project and write the sprite artifact
    Build {
        /// Project root to scan
        root: PathBuf,

        /// Output directory (defaults to the project root)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Class attribute for the sprite container
        #[arg(long)]
        class: Option<String>,

        /// Files read in parallel
        #[arg(long, default_value_t = num_cpus::get())]
        jobs: usize,
    },

    /// Print the icons a project references, in sprite order
    List {
        /// Project root to scan
        root: PathBuf,

        /// Print a JSON array instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init {
        #[arg(default_value = "iconsprite.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            ConfigManager::create_default_config(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Created".green(), path.display());
            Ok(())
        }
        Commands::Build {
            root,
            out,
            class,
            jobs,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(class) = class {
                config.class = class;
            }
            init_logging(&config.logging);
            handle_build(config, root, out, jobs).await
        }
        Commands::List { root, json } => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(&config.logging);
            handle_list(config, root, json).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SpriteConfig> {
    let manager = match path {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;
    Ok(manager.into_config())
}

fn init_logging(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    if logging.format == "compact" {
        let subscriber = Registry::default().with(env_filter).with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Pushes every collected file into the engine as its own source unit.
async fn scan_project(engine: &Arc<SpriteEngine>, root: &Path, out: &Path, jobs: usize) -> Result<usize> {
    let excluded = collect::output_exclusions(root, out);
    let files =
        collect::collect_source_files(root, &engine.config().scan.include_extensions, &excluded)?;
    let total = files.len();

    stream::iter(files)
        .map(|path| {
            let engine = Arc::clone(engine);
            let unit = UnitKey::from(path.strip_prefix(root).unwrap_or(&path));
            async move {
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => engine.scan(unit, Some(&text)),
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        engine.clear(unit);
                    }
                }
            }
        })
        .buffer_unordered(jobs.max(1))
        .collect::<Vec<()>>()
        .await;

    Ok(total)
}

async fn handle_build(
    config: SpriteConfig,
    root: PathBuf,
    out: Option<PathBuf>,
    jobs: usize,
) -> Result<()> {
    let out = out.unwrap_or_else(|| root.clone());
    let collected = Arc::new(CollectingSink::new());
    let sink = {
        let collected = Arc::clone(&collected);
        move |message: &str| {
            TracingSink.report(message);
            collected.report(message);
        }
    };

    let engine = Arc::new(
        SpriteEngine::try_with_sink(config, Arc::new(sink)).context("Invalid configuration")?,
    );
    engine.reset();

    let files = scan_project(&engine, &root, &out, jobs).await?;
    let written = engine
        .emit(&out)
        .await
        .context("Failed to write sprite artifact")?;

    let stats = engine.stats();
    debug!("engine stats: {:?}", stats);
    info!(
        "scanned {} files, {} referencing icons",
        files, stats.units
    );

    println!(
        "{} {} files scanned, {} icons referenced, {} symbols",
        "Done:".green().bold(),
        files,
        stats.active_ids,
        stats.cached_symbols
    );
    match written {
        Some(path) => println!("{} {}", "Sprite:".cyan(), path.display()),
        None => println!("{}", "No icons referenced; nothing written".yellow()),
    }
    if !collected.is_empty() {
        println!("{} {}", "Warnings:".yellow().bold(), collected.len());
        for message in collected.messages() {
            println!("  {}", message);
        }
    }
    Ok(())
}

async fn handle_list(config: SpriteConfig, root: PathBuf, json: bool) -> Result<()> {
    let engine = Arc::new(SpriteEngine::new(config));
    let out = root.join(&engine.config().output);
    scan_project(&engine, &root, &out, num_cpus::get()).await?;

    let mut entries = Vec::new();
    for id in engine.active_ids() {
        let count = engine.reference_count(&id);
        let failure = engine.resolve(&id).await.err();
        if json {
            entries.push(serde_json::json!({
                "id": id.as_str(),
                "units": count,
                "error": failure.as_ref().map(|f| f.to_string()),
            }));
            continue;
        }
        match failure {
            None => println!("{} ({} units)", id, count),
            Some(failure) => println!("{} ({} units) {}", id, count, failure.to_string().red()),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    Ok(())
}
