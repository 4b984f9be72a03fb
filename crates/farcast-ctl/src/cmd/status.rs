//! Network status, routes, links, health and shutdown commands.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    snapshot_time: Option<u64>,
    links: Vec<LinkInfo>,
    routing_table: BTreeMap<String, RouteInfo>,
    buffer_usage: BTreeMap<String, u64>,
    queued_bundles: BTreeMap<String, usize>,
    stats: StatsInfo,
}

#[derive(Deserialize)]
struct LinkInfo {
    source: String,
    destination: String,
    distance_km: f64,
    latency_secs: f64,
    line_of_sight: bool,
}

#[derive(Deserialize)]
struct RouteInfo {
    destination: String,
    next_hop: String,
    estimated_latency_secs: f64,
}

#[derive(Deserialize)]
struct StatsInfo {
    submitted: u64,
    forwarded: u64,
    delivered: u64,
    failed_attempts: u64,
    dropped: u64,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct ShutdownResponse {
    message: String,
}

async fn fetch_status(port: u16) -> Result<StatusResponse> {
    get_json(&format!("{}/status", base_url(port))).await
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp = fetch_status(port).await?;

    println!("═══════════════════════════════════════");
    println!("  Farcast Network Status");
    println!("═══════════════════════════════════════");
    match resp.snapshot_time {
        Some(t) => println!("  Snapshot time    : {} ms", t),
        None => println!("  Snapshot time    : (no routing tick yet)"),
    }
    let visible = resp.links.iter().filter(|l| l.line_of_sight).count();
    println!("  Links            : {} ({} visible)", resp.links.len(), visible);
    println!("  Routes           : {}", resp.routing_table.len());
    println!("  Submitted        : {}", resp.stats.submitted);
    println!("  Forwarded        : {}", resp.stats.forwarded);
    println!("  Delivered        : {}", resp.stats.delivered);
    println!("  Failed attempts  : {}", resp.stats.failed_attempts);
    println!("  Dropped          : {}", resp.stats.dropped);

    println!("\n  Buffers:");
    for (node, bytes) in &resp.buffer_usage {
        let count = resp.queued_bundles.get(node).copied().unwrap_or(0);
        println!("  ┌─ {}", node);
        println!("  │  bundles : {}", count);
        println!("  └─ bytes   : {}", bytes);
    }

    Ok(())
}

pub async fn cmd_routes(port: u16) -> Result<()> {
    let resp = fetch_status(port).await?;

    if resp.routing_table.is_empty() {
        println!("No routes. Every node is out of sight of every other.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Routing Table ({})", resp.routing_table.len());
    println!("═══════════════════════════════════════");

    for (node, r) in &resp.routing_table {
        println!("  ┌─ {}", node);
        println!("  │  next hop : {}", r.next_hop);
        println!("  │  toward   : {}", r.destination);
        println!("  └─ latency  : {:.3}s", r.estimated_latency_secs);
    }

    Ok(())
}

pub async fn cmd_links(port: u16) -> Result<()> {
    let resp = fetch_status(port).await?;

    if resp.links.is_empty() {
        println!("No link snapshot yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Links ({})", resp.links.len());
    println!("═══════════════════════════════════════");

    for l in &resp.links {
        let icon = if l.line_of_sight { "✓" } else { "✗" };
        println!("  {} {:<16} → {:<16} {:>14.1} km {:>10.3}s",
            icon, l.source, l.destination, l.distance_km, l.latency_secs);
    }

    Ok(())
}

pub async fn cmd_health(port: u16) -> Result<()> {
    let resp: HealthResponse = get_json(&format!("{}/health", base_url(port))).await?;
    println!("farcastd is {}.", resp.status);
    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
