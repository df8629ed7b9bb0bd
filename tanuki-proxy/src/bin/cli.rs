//! Command-line interface for tanuki-proxy.
//!
//! This binary provides a CLI for monitoring the proxy daemon via the
//! HTTP API.

use std::env;

use anyhow::Result;

use tanuki_proxy::api_client;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: tanuki-cli <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status    Show proxy status");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  TANUKI_API_URL    API base URL (default: {})", api_client::DEFAULT_BASE_URL);
        std::process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "status" => cmd_status().await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Build an API client, honoring TANUKI_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var("TANUKI_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

/// Print a summary of the current proxy state.
async fn cmd_status() -> Result<()> {
    let client = make_client();
    let state = client.get_proxy().await?;

    println!("Version: {}", state.version);
    println!("Uptime:  {} s", state.uptime_secs);

    match &state.current_round {
        Some(round) => {
            println!(
                "Scanning: {} height {} ({:.1}%)",
                round.upstream, round.height, round.progress
            );
        }
        None => println!("Scanning: (idle)"),
    }
    for round in &state.queued_rounds {
        println!("Queued:   {} height {}", round.upstream, round.height);
    }

    if state.upstreams.is_empty() {
        println!("Upstreams: (none)");
    } else {
        println!("Upstreams:");
        for upstream in &state.upstreams {
            let height = upstream
                .current_height
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string());
            let best = upstream
                .best_deadline
                .map(|d| format!("{d} s"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  - {} [{}] weight {} height {} best DL {}",
                upstream.name, upstream.coin, upstream.weight, height, best
            );
        }
    }

    Ok(())
}
