//! Graphweave CLI: build knowledge graphs from a JSON records file
//!
//! Logs go to stderr and are controlled with `RUST_LOG`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use graphweave::graph::GraphStatistics;
use graphweave::{
    ClusteringMethod, Graph, GraphEvent, GraphOrchestrator, GraphPipeline, JsonFileSource, LayoutMethod,
    PipelineConfig, SourceRecord,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphweave", version, about = "Graphweave knowledge graph builder")]
struct Cli {
    /// Pipeline configuration (YAML)
    #[arg(long, global = true, env = "GRAPHWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format for statistics
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from a JSON array of records
    Build {
        /// Records file
        records: PathBuf,

        /// Write the graph as JSON here
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// semantic, kmeans, hierarchical or none
        #[arg(long, value_parser = parse_enum::<ClusteringMethod>)]
        clustering: Option<ClusteringMethod>,

        /// force-directed, hierarchical, circular or tree
        #[arg(long, value_parser = parse_enum::<LayoutMethod>)]
        layout: Option<LayoutMethod>,
    },
    /// Print statistics of a previously written graph
    Stats {
        /// Graph file
        graph: PathBuf,
    },
    /// Rebuild whenever the records file changes
    Watch {
        /// Records file
        records: PathBuf,

        /// Seconds between change checks
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
    /// Print the effective configuration as YAML
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Build {
            records,
            output,
            clustering,
            layout,
        } => run_build(config, &records, output.as_deref(), clustering, layout, &cli.format),
        Commands::Stats { graph } => {
            let bytes = std::fs::read(&graph).with_context(|| format!("reading {}", graph.display()))?;
            let graph: Graph = serde_json::from_slice(&bytes).context("parsing graph")?;
            print_statistics(&graph.statistics(), graph.metadata.version, &cli.format)
        }
        Commands::Watch { records, interval } => run_watch(config, records, interval).await,
        Commands::Config => {
            print!("{}", config.to_yaml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_build(
    mut config: PipelineConfig,
    records: &Path,
    output: Option<&Path>,
    clustering: Option<ClusteringMethod>,
    layout: Option<LayoutMethod>,
    format: &OutputFormat,
) -> Result<()> {
    if let Some(method) = clustering {
        config.transformation.clustering_method = method;
    }
    if let Some(method) = layout {
        config.transformation.layout_method = method;
    }

    let bytes = std::fs::read(records).with_context(|| format!("reading {}", records.display()))?;
    let records: Vec<SourceRecord> = serde_json::from_slice(&bytes).context("parsing records")?;
    info!("Loaded {} records", records.len());

    let graph = GraphPipeline::new(config).run(&records, 1);
    graph.validate()?;

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&graph)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote graph to {}", path.display());
    }
    print_statistics(&graph.statistics(), graph.metadata.version, format)
}

async fn run_watch(mut config: PipelineConfig, records: PathBuf, interval: u64) -> Result<()> {
    config.update_check_interval_secs = interval.max(1);
    let source = Arc::new(JsonFileSource::new(records));
    let orchestrator = GraphOrchestrator::new(source, config);
    let mut events = orchestrator.subscribe();
    let _monitor = orchestrator.spawn_update_monitor();

    orchestrator.graph().await?;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(GraphEvent::GraphUpdated { version, node_count, edge_count, cluster_count, duration_ms, .. }) => {
                    println!(
                        "v{}: {} nodes, {} edges, {} clusters ({} ms)",
                        version, node_count, edge_count, cluster_count, duration_ms
                    );
                }
                Ok(GraphEvent::CacheInvalidated { reason }) => {
                    println!("invalidated: {}", reason);
                    if let Err(e) = orchestrator.graph().await {
                        eprintln!("Error: {}", e);
                    }
                }
                Ok(GraphEvent::BuildFailed { error, .. }) => eprintln!("build failed: {}", error),
                Err(e) => eprintln!("event stream: {}", e),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_statistics(stats: &GraphStatistics, version: u64, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Kind", "Type", "Count"]);
            for (kind, count) in &stats.nodes_by_type {
                table.add_row(vec!["node".to_string(), kind.clone(), count.to_string()]);
            }
            for (kind, count) in &stats.edges_by_type {
                table.add_row(vec!["edge".to_string(), kind.clone(), count.to_string()]);
            }
            println!("{}", table);
            println!(
                "version {}, {} clusters, average degree {:.2}, {} isolated",
                version, stats.cluster_count, stats.avg_degree, stats.isolated_nodes
            );
        }
    }
    Ok(())
}

/// Parse a kebab/lowercase enum the same way the config file does
fn parse_enum<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| e.to_string())
}
