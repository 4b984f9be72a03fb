//! farcast-ctl — command-line interface for the Farcast daemon.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 9100;

fn print_usage() {
    println!("Usage: farcast-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                                  Network status and buffer usage");
    println!("  routes                                  Current routing table");
    println!("  links                                   Latest link snapshot");
    println!("  queue <node>                            Bundles queued at a node");
    println!("  send <src> <dst> <text> [--priority N]  Submit a bundle");
    println!("  delivered                               Delivery log");
    println!("  health                                  Liveness probe");
    println!("  shutdown                                Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut priority: u8 = 0;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--priority" => {
                i += 1;
                priority = args
                    .get(i)
                    .context("--priority requires a value")?
                    .parse()
                    .context("--priority must be 0-255")?;
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                       => cmd::status::cmd_status(port).await,
        ["routes"]                            => cmd::status::cmd_routes(port).await,
        ["links"]                             => cmd::status::cmd_links(port).await,
        ["health"]                            => cmd::status::cmd_health(port).await,
        ["shutdown"]                          => cmd::status::cmd_shutdown(port).await,
        ["queue", node]                       => cmd::bundles::cmd_queue(port, node).await,
        ["delivered"]                         => cmd::bundles::cmd_delivered(port).await,
        ["send", source, destination, text]   => {
            cmd::bundles::cmd_send(port, source, destination, text, priority).await
        }
        ["help"] | ["--help"] | ["-h"]        => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
