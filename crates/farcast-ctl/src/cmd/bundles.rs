//! Bundle submission, queue inspection and delivery log commands.

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Serialize)]
struct SendBundleRequest<'a> {
    source: &'a str,
    destination: &'a str,
    payload: String,
    priority: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleResponse {
    message: String,
    bundle_id: String,
}

#[derive(Deserialize)]
struct QueueResponse {
    node: String,
    bundles: Vec<BundleInfo>,
    buffer_usage: u64,
}

#[derive(Deserialize)]
struct BundleInfo {
    id: String,
    source: String,
    destination: String,
    size: u64,
    priority: u8,
    path: Vec<String>,
    encrypted: bool,
}

#[derive(Deserialize)]
struct DeliveredResponse {
    count: usize,
    bundles: Vec<DeliveredInfo>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct DeliveredInfo {
    id: String,
    source: String,
    destination: String,
    payload: String,
    path: Vec<String>,
    priority: u8,
    was_encrypted: bool,
    created_at: u64,
    delivered_at: u64,
    transit_ms: u64,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_send(
    port: u16,
    source: &str,
    destination: &str,
    text: &str,
    priority: u8,
) -> Result<()> {
    let req = SendBundleRequest {
        source,
        destination,
        payload: BASE64.encode(text.as_bytes()),
        priority,
    };
    let resp: SendBundleResponse =
        post_json_body(&format!("{}/send-bundle", base_url(port)), &req).await?;

    println!("{}", resp.message);
    println!("  bundle id : {}", resp.bundle_id);
    println!("  route     : {} → {}", source, destination);
    if priority > 5 {
        println!("  sealed    : yes (priority {})", priority);
    }
    Ok(())
}

pub async fn cmd_queue(port: u16, node: &str) -> Result<()> {
    let resp: QueueResponse = get_json(&format!("{}/bundles/{}", base_url(port), node)).await?;

    if resp.bundles.is_empty() {
        println!("No bundles queued at {}.", resp.node);
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Queue at {} ({} bundles, {} bytes)", resp.node, resp.bundles.len(), resp.buffer_usage);
    println!("═══════════════════════════════════════");

    for b in &resp.bundles {
        let lock = if b.encrypted { "🔒" } else { " " };
        println!("  ┌─ {} {}", lock, b.id);
        println!("  │  route    : {} → {}", b.source, b.destination);
        println!("  │  path     : {}", b.path.join(" → "));
        println!("  │  priority : {}", b.priority);
        println!("  └─ size     : {} bytes", b.size);
    }

    Ok(())
}

pub async fn cmd_delivered(port: u16) -> Result<()> {
    let resp: DeliveredResponse = get_json(&format!("{}/delivered", base_url(port))).await?;

    if resp.bundles.is_empty() {
        println!("Nothing delivered yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Delivered Bundles ({})", resp.count);
    println!("═══════════════════════════════════════");

    for d in &resp.bundles {
        let text = BASE64
            .decode(d.payload.as_bytes())
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
            .unwrap_or_else(|| format!("<{} bytes, binary>", d.payload.len()));
        println!("  ┌─ {}", d.id);
        println!("  │  path     : {}", d.path.join(" → "));
        println!("  │  encrypted: {}", if d.was_encrypted { "yes" } else { "no" });
        println!("  │  transit  : {} ms", d.transit_ms);
        println!("  └─ payload  : {}", text);
    }

    Ok(())
}
