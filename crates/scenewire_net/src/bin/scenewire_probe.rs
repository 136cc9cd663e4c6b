//! # SCENEWIRE Probe
//!
//! Asks a node for its session name and icon without joining.
//!
//! ## Usage
//!
//! ```bash
//! scenewire_probe --addr 127.0.0.1:50000 --icon-out icon.png
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use scenewire_net::probe;
use scenewire_shared::DEFAULT_PORT;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("Usage: scenewire_probe [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -a, --addr <HOST:PORT>     Node address (default: 127.0.0.1:{DEFAULT_PORT})");
    println!("  -i, --icon-out <PATH>      Write the node's icon to PATH");
    println!("  -t, --timeout <SECS>       Give up after N seconds (default: 5)");
    println!("  -h, --help                 Show this help");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut addr = format!("127.0.0.1:{DEFAULT_PORT}");
    let mut icon_out: Option<PathBuf> = None;
    let mut timeout_secs = 5u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" | "-a" => {
                if i + 1 < args.len() {
                    addr.clone_from(&args[i + 1]);
                    i += 1;
                }
            }
            "--icon-out" | "-i" => {
                if i + 1 < args.len() {
                    icon_out = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--timeout" | "-t" => {
                if i + 1 < args.len() {
                    timeout_secs = args[i + 1].parse().unwrap_or(5);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            _ => {}
        }
        i += 1;
    }

    let reply = match tokio::time::timeout(Duration::from_secs(timeout_secs), probe(addr.as_str())).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            eprintln!("probe of {addr} failed: {e}");
            return ExitCode::FAILURE;
        }
        Err(_) => {
            eprintln!("probe of {addr} timed out after {timeout_secs}s");
            return ExitCode::FAILURE;
        }
    };

    println!("Session:  {}", reply.session_name);
    match reply.icon() {
        Some(icon) => println!("Icon:     {} bytes", icon.len()),
        None => println!("Icon:     none"),
    }

    if let (Some(path), Some(icon)) = (icon_out, reply.icon()) {
        if let Err(e) = std::fs::write(&path, icon) {
            eprintln!("cannot write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
