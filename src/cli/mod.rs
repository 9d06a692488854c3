use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use costlens::classify::{Classifier, HttpOracle};
use costlens::config::EngineConfig;
use costlens::detector;
use costlens::graph::{GraphStore, UnitKind};
use costlens::indexer::{IndexOptions, IndexOrchestrator, PhaseEvent};
use costlens::languages::LanguageRegistry;

#[derive(Parser)]
#[command(name = "costlens")]
#[command(about = "Finds cost-relevant code: paid API usage and costly calls inside loops")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Index the current directory with local heuristics
    costlens index

    # Index with remote classification, restricted to one subtree
    costlens index . --mode remote --scope src/services

    # Force a full re-index
    costlens index --force-clean

    # Show what the index knows
    costlens summary
    costlens units src/billing.ts

    # Lint one file for costly calls inside loops
    costlens detect src/worker.py
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the persisted graph document
    #[arg(long, default_value = ".costlens/graph.json")]
    pub graph: PathBuf,

    /// Path to the persisted hash manifest
    #[arg(long, default_value = ".costlens/manifest.json")]
    pub manifest: PathBuf,

    /// JSON config overriding the built-in signature tables
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a workspace
    Index {
        /// Workspace root to index
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Classification strategy
        #[arg(long, value_enum, default_value_t = Mode::Quick)]
        mode: Mode,
        /// Restrict indexing to paths under this prefix
        #[arg(long)]
        scope: Option<String>,
        /// Discard the prior manifest and re-index everything
        #[arg(long)]
        force_clean: bool,
    },
    /// Print a summary of the persisted graph
    Summary,
    /// List indexed units and classifications for one file
    Units {
        /// Workspace-relative file path
        file: String,
    },
    /// Flag costly calls inside loops for one file
    Detect {
        /// File to analyze
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Local signature-table matching, no network calls
    Quick,
    /// Batched calls to the configured classification endpoint
    Remote,
}

fn load_config(cli: &Cli) -> anyhow::Result<Arc<EngineConfig>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(Arc::new(config))
}

pub async fn index(
    cli: &Cli,
    path: &Path,
    mode: Mode,
    scope: Option<String>,
    force_clean: bool,
) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let store = GraphStore::new(&cli.graph, &cli.manifest);
    let classifier = match mode {
        Mode::Quick => Classifier::quick(config.clone()),
        Mode::Remote => Classifier::remote(
            config.clone(),
            Box::new(HttpOracle::new(&config.oracle)?),
        ),
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    let bar_for_phases = bar.clone();
    let orchestrator = IndexOrchestrator::new(config, store, classifier).with_phase_callback(
        move |event| {
            let message = match event {
                PhaseEvent::Scanning => "scanning workspace".to_string(),
                PhaseEvent::Extracting { done, total } => {
                    format!("extracting units {}/{}", done, total)
                }
                PhaseEvent::Classifying { chunk, chunks } => {
                    format!("classifying chunk {}/{}", chunk, chunks)
                }
                PhaseEvent::Persisting => "persisting graph".to_string(),
                PhaseEvent::Finished => "done".to_string(),
            };
            bar_for_phases.set_message(message);
            bar_for_phases.tick();
        },
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let options = IndexOptions { scope, force_clean };
    let graph = orchestrator.index_workspace(path, &options, &cancel).await?;
    bar.finish_and_clear();

    let summary = graph.summary();
    println!(
        "Indexed {} files, {} units.",
        summary.file_count, summary.unit_count
    );
    if summary.by_category.is_empty() {
        println!("No cost-relevant API usage found.");
    } else {
        println!("API usage by category:");
        for (category, count) in &summary.by_category {
            println!("  {:<12} {}", category, count);
        }
        println!("By provider:");
        for (provider, count) in &summary.by_provider {
            println!("  {:<12} {}", provider, count);
        }
    }
    Ok(())
}

pub fn summary(cli: &Cli) -> anyhow::Result<()> {
    let store = GraphStore::new(&cli.graph, &cli.manifest);
    let Some(graph) = store.load_graph() else {
        println!("No graph found at {}. Run `costlens index` first.", cli.graph.display());
        return Ok(());
    };

    let summary = graph.summary();
    println!("Files:     {}", summary.file_count);
    println!("Units:     {}", summary.unit_count);
    println!("Generated: {}", graph.generated_at);
    for (category, count) in &summary.by_category {
        println!("  category {:<12} {}", category, count);
    }
    for (provider, count) in &summary.by_provider {
        println!("  provider {:<12} {}", provider, count);
    }
    Ok(())
}

pub fn units(cli: &Cli, file: &str) -> anyhow::Result<()> {
    let store = GraphStore::new(&cli.graph, &cli.manifest);
    let Some(graph) = store.load_graph() else {
        println!("No graph found at {}. Run `costlens index` first.", cli.graph.display());
        return Ok(());
    };

    let units = graph.units_for_file(file);
    if units.is_empty() {
        println!("No units indexed for {}", file);
        return Ok(());
    }
    for unit in units {
        let kind = match unit.kind {
            UnitKind::Function => "fn",
            UnitKind::Class => "class",
            UnitKind::Method => "method",
        };
        let verdict = match graph.classification(&unit.id) {
            Some(c) => format!(
                "{} {} ({}, paid={}, confidence={:.2})",
                c.category.as_str(),
                c.provider.as_deref().unwrap_or("-"),
                match c.role {
                    costlens::graph::ApiRole::Consumer => "consumer",
                    costlens::graph::ApiRole::Provider => "provider",
                    costlens::graph::ApiRole::None => "none",
                },
                c.is_paid,
                c.confidence
            ),
            None => "unclassified".to_string(),
        };
        println!(
            "{:<7} {:<40} L{}-{}  {}",
            kind, unit.name, unit.location.start_line, unit.location.end_line, verdict
        );
    }
    Ok(())
}

pub fn detect(cli: &Cli, file: &Path) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let registry = LanguageRegistry::new();
    let Some(strategy) = registry.get_for_file(file) else {
        anyhow::bail!("unsupported file type: {}", file.display());
    };

    let source = std::fs::read_to_string(file)?;
    let suggestions = detector::detect(
        &source,
        strategy.name(),
        &file.to_string_lossy(),
        &config,
    );

    if suggestions.is_empty() {
        println!("No costly calls inside loops in {}", file.display());
        return Ok(());
    }
    for suggestion in suggestions {
        println!(
            "{}:{}: [{}] {}",
            suggestion.location.file,
            suggestion.location.start_line,
            match suggestion.severity {
                costlens::graph::Severity::Info => "info",
                costlens::graph::Severity::Warning => "warning",
                costlens::graph::Severity::Critical => "critical",
            },
            suggestion.title
        );
        println!("    {}", suggestion.description);
        if let Some(action) = &suggestion.action {
            println!("    suggested: {}", action);
        }
    }
    Ok(())
}
