use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use topo_api::{GraphBuilder, GraphConfig};
use topo_core::{GraphMessage, GraphResult};
use topo_kubehub::{FileCollector, KubeApiCollector, KubectlCollector, ResourceCollector, DEFAULT_CONNECT_TIMEOUT};

#[derive(Parser, Debug)]
#[command(name = "topoctl", version, about = "Kubernetes namespace topology graph")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace
    #[arg(short = 'n', long = "ns", global = true, env = "TOPO_NAMESPACE", default_value = "default")]
    namespace: String,

    /// All namespaces (overrides --ns)
    #[arg(short = 'A', long = "all-namespaces", global = true, action = ArgAction::SetTrue)]
    all_namespaces: bool,

    /// Kube context (default: current context)
    #[arg(long = "context", global = true, env = "TOPO_CONTEXT")]
    context: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
    /// Host message envelope
    Message,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CollectorKind {
    Kubectl,
    Api,
}

#[derive(Args, Debug, Clone, Default)]
struct BuildArgs {
    /// Resource kinds to fetch, comma separated (default: TOPO_KINDS or built-in list)
    #[arg(long = "kinds", value_delimiter = ',')]
    kinds: Vec<String>,
    /// Kinds never turned into nodes, comma separated
    #[arg(long = "exclude", value_delimiter = ',')]
    exclude: Vec<String>,
    /// Per-kind fetch timeout
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,
}

impl BuildArgs {
    fn config(&self) -> GraphConfig {
        let mut cfg = GraphConfig::from_env();
        if !self.kinds.is_empty() {
            cfg = cfg.with_kinds(self.kinds.iter().cloned());
        }
        if !self.exclude.is_empty() {
            cfg = cfg.with_exclude_kinds(self.exclude.iter().cloned());
        }
        if let Some(secs) = self.timeout_secs.filter(|s| *s > 0) {
            cfg.fetch_timeout_secs = secs;
        }
        cfg
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the graph from the live cluster
    Graph {
        #[command(flatten)]
        build: BuildArgs,
        /// How resources are fetched
        #[arg(long = "collector", value_enum, default_value_t = CollectorKind::Kubectl)]
        collector: CollectorKind,
        /// kubectl binary
        #[arg(long = "kubectl", env = "TOPO_KUBECTL", default_value = "kubectl")]
        kubectl: String,
    },
    /// Build the graph offline from `<dir>/<kind>.json` list dumps
    Infer {
        /// Directory holding `kubectl get <kind> -o json` output
        #[arg(long = "dir")]
        dir: PathBuf,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Print the effective build configuration
    Kinds {
        #[command(flatten)]
        build: BuildArgs,
    },
}

fn init_tracing() {
    let env = std::env::var("TOPO_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the graph
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("TOPO_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid TOPO_METRICS_ADDR; expected host:port");
        }
    }
}

/// Kinds with a dump file in `dir`, sorted.
fn dumped_kinds(dir: &Path) -> Result<Vec<String>> {
    let mut kinds = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                kinds.push(stem.to_string());
            }
        }
    }
    kinds.sort();
    Ok(kinds)
}

fn print_result(res: &GraphResult, output: Output) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(res)?),
        Output::Message => println!("{}", serde_json::to_string(&GraphMessage::new(res.clone()))?),
        Output::Human => {
            if let Some(err) = &res.error {
                eprintln!("graph error: {}", err);
                return Ok(());
            }
            println!("NODES ({})", res.nodes.len());
            for n in &res.nodes {
                match &n.label_details {
                    Some(d) => println!("  {} • {} • {}", n.id, n.status, d),
                    None => println!("  {} • {}", n.id, n.status),
                }
            }
            println!("EDGES ({})", res.edges.len());
            for e in &res.edges {
                let rel = serde_json::to_value(e.relation)?;
                println!("  {} -> {} ({})", e.source, e.target, rel.as_str().unwrap_or("?"));
            }
            if !res.warnings.is_empty() {
                println!("DEGRADED KINDS: {}", res.warnings.join(", "));
            }
        }
    }
    Ok(())
}

async fn run_build(
    collector: Arc<dyn ResourceCollector>,
    cfg: GraphConfig,
    namespace: &str,
    context: Option<&str>,
    output: Output,
) -> Result<()> {
    let t0 = Instant::now();
    let builder = GraphBuilder::new(collector, cfg);
    let res = builder.build_default(namespace, context).await;
    info!(
        collector = builder.collector_name(),
        nodes = res.nodes.len(),
        edges = res.edges.len(),
        took_ms = %t0.elapsed().as_millis(),
        "graph built"
    );
    print_result(&res, output)?;
    if let Some(err) = res.error {
        anyhow::bail!("graph build failed: {}", err);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let namespace = if cli.all_namespaces { String::new() } else { cli.namespace.clone() };
    let context = cli.context.as_deref().filter(|c| !c.is_empty());

    match cli.command {
        Commands::Graph { build, collector, kubectl } => {
            let cfg = build.config();
            let collector: Arc<dyn ResourceCollector> = match collector {
                CollectorKind::Kubectl => Arc::new(KubectlCollector::new(kubectl)),
                // connect must give up before the per-kind fetch timeout does
                CollectorKind::Api => Arc::new(
                    KubeApiCollector::new().with_connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(cfg.fetch_timeout() / 2)),
                ),
            };
            run_build(collector, cfg, &namespace, context, cli.output).await?;
        }
        Commands::Infer { dir, build } => {
            let mut cfg = build.config();
            if build.kinds.is_empty() && std::env::var("TOPO_KINDS").is_err() {
                let kinds = dumped_kinds(&dir)?;
                info!(dir = %dir.display(), kinds = ?kinds, "using dumped kinds");
                cfg = cfg.with_kinds(kinds);
            }
            run_build(Arc::new(FileCollector::new(dir)), cfg, &namespace, context, cli.output).await?;
        }
        Commands::Kinds { build } => {
            let cfg = build.config();
            match cli.output {
                Output::Human => {
                    println!("kinds: {}", cfg.kinds.join(", "));
                    println!("excluded: {}", cfg.exclude_kinds.join(", "));
                    println!("fetch timeout: {}s", cfg.fetch_timeout_secs);
                    println!("max concurrency: {}", cfg.max_concurrency);
                }
                Output::Json | Output::Message => println!("{}", serde_json::to_string_pretty(&cfg)?),
            }
        }
    }
    Ok(())
}
