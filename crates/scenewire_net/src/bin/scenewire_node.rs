//! # SCENEWIRE Node
//!
//! Hosts a scene: accepts clients, applies their transactions to an
//! in-memory store and serves large assets from files.
//!
//! ## Usage
//!
//! ```bash
//! scenewire_node --config node.toml --asset 1=meshes/hall.bin --duration 60
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scenewire_net::{AssetSource, MemoryAssetSource, NetError, Node, NodeConfig};
use scenewire_protocol::MemoryScene;
use scenewire_shared::LargeAssetId;
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<PathBuf>,
    bind: Option<String>,
    name: Option<String>,
    assets: Vec<(LargeAssetId, PathBuf)>,
    duration_secs: Option<u64>,
}

fn print_help() {
    println!("Usage: scenewire_node [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>        TOML configuration file");
    println!("  -b, --bind <ADDR>          Primary listen address (overrides config)");
    println!("  -n, --name <NAME>          Session name (overrides config)");
    println!("  -a, --asset <ID>=<PATH>    Serve a file as large asset ID (repeatable)");
    println!("  -d, --duration <SECS>      Run for N seconds then exit");
    println!("  -h, --help                 Show this help");
}

/// Parses the command line. `Ok(None)` means help was printed.
fn parse_args() -> Result<Option<Args>, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        bind: None,
        name: None,
        assets: Vec::new(),
        duration_secs: None,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1).cloned();
        match flag {
            "--config" | "-c" => parsed.config = value.map(PathBuf::from),
            "--bind" | "-b" => parsed.bind = value,
            "--name" | "-n" => parsed.name = value,
            "--asset" | "-a" => {
                let pair = value.ok_or("--asset needs ID=PATH")?;
                let (id, path) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("bad asset {pair:?}, expected ID=PATH"))?;
                let id = id
                    .parse()
                    .map_err(|_| format!("bad asset id {id:?}"))?;
                parsed.assets.push((id, PathBuf::from(path)));
            }
            "--duration" | "-d" => {
                parsed.duration_secs = value.and_then(|v| v.parse().ok());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other => return Err(format!("unknown option {other:?}")),
        }
        i += 2;
    }
    Ok(Some(parsed))
}

fn build_config(args: &Args) -> Result<NodeConfig, NetError> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.bind_address = bind
            .parse()
            .map_err(|_| NetError::Config(format!("bad bind address {bind:?}")))?;
    }
    if let Some(name) = &args.name {
        config.session_name.clone_from(name);
    }
    config.validate()?;
    Ok(config)
}

fn load_assets(args: &Args) -> Result<MemoryAssetSource, NetError> {
    let source = MemoryAssetSource::new();
    for (id, path) in &args.assets {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(id, %name, bytes = data.len(), "large asset loaded");
        source.insert(*id, name, data);
    }
    Ok(source)
}

async fn run(args: Args) -> Result<(), NetError> {
    let config = build_config(&args)?;
    let icon = match &config.icon_path {
        Some(path) => std::fs::read(path)?,
        None => Vec::new(),
    };
    let assets = load_assets(&args)?;

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Bind Address:       {}", config.bind_address);
    println!("│ Session:            {}", config.session_name);
    println!(
        "│ Protocol Versions:  {}..={}",
        config.min_protocol_version, config.max_protocol_version
    );
    println!("│ Large Asset Ports:  {:?}", config.large_asset_ports);
    println!("│ Large Assets:       {}", assets.len());
    println!("│ Duplicate Policy:   {:?}", config.duplicate_policy);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let store = Arc::new(Mutex::new(MemoryScene::new(config.duplicate_policy)));
    let node = Arc::new(Node::new(config, Arc::clone(&store))?.with_icon(icon));
    let source: Arc<dyn AssetSource> = Arc::new(assets);

    match args.duration_secs {
        Some(secs) => {
            if let Ok(result) = tokio::time::timeout(Duration::from_secs(secs), node.run(Some(source))).await {
                result?;
            }
        }
        None => node.run(Some(source)).await?,
    }

    let scene = store.lock();
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    NODE SHUTDOWN                                 ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║ Entities:           {:>10}                                   ║", scene.entity_count());
    println!("╚══════════════════════════════════════════════════════════════════╝");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         SCENEWIRE NODE                                           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "node failed");
            ExitCode::FAILURE
        }
    }
}
