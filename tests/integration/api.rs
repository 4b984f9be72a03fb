use crate::*;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use farcast_api::ApiState;
use farcast_services::Scheduler;

/// A daemon-shaped stack on an ephemeral loopback port: API server plus a
/// fast scheduler, earth and moon in plain sight of each other.
struct Daemon {
    base: String,
    net: Network,
    shutdown_tx: broadcast::Sender<()>,
    scheduler: tokio::task::JoinHandle<Result<(), farcast_services::EngineError>>,
}

impl Daemon {
    async fn start() -> Result<Self> {
        let geometry = ConfiguredGeometry::new()
            .with_fixed("earth".into(), Position::default())
            .with_fixed("moon".into(), MOON_CENTER);
        let net = Network::build(&["earth", "moon"], geometry, Vec::new(), lossless())?;
        let (shutdown_tx, _) = broadcast::channel(1);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        let state = ApiState {
            engine: net.engine.clone(),
            deliveries: net.deliveries.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(farcast_api::serve_on(listener, state));

        let scheduler = tokio::spawn(
            Scheduler::new(
                net.engine.clone(),
                Duration::from_millis(50),
                Duration::from_millis(20),
                shutdown_tx.subscribe(),
            )
            .run(),
        );

        Ok(Self {
            base,
            net,
            shutdown_tx,
            scheduler,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::get(self.url(path)).await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new().post(self.url(path)).json(body).send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    async fn wait_for_deliveries(&self, n: usize) -> Result<Value> {
        for _ in 0..200 {
            let (_, body) = self.get("/delivered").await?;
            if body["count"].as_u64() == Some(n as u64) {
                return Ok(body);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("expected {n} deliveries")
    }
}

#[tokio::test]
async fn health_reports_healthy() -> Result<()> {
    let d = Daemon::start().await?;
    let (status, body) = d.get("/health").await?;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "healthy"}));
    Ok(())
}

#[tokio::test]
async fn send_bundle_is_accepted_and_delivered() -> Result<()> {
    let d = Daemon::start().await?;
    let body = json!({
        "source": "earth",
        "destination": "moon",
        "payload": BASE64.encode(b"hello moon"),
        "priority": 7,
    });
    let (status, resp) = d.post("/send-bundle", &body).await?;
    assert_eq!(status, 202);
    assert!(resp["message"].is_string());
    let id = resp["bundleId"].as_str().context("missing bundleId")?.to_string();

    let delivered = d.wait_for_deliveries(1).await?;
    let bundle = &delivered["bundles"][0];
    assert_eq!(bundle["id"], id.as_str());
    assert_eq!(bundle["payload"], BASE64.encode(b"hello moon"));
    assert_eq!(bundle["was_encrypted"], true);
    assert_eq!(bundle["path"], json!(["earth", "moon"]));

    let (_, status) = d.get("/status").await?;
    assert_eq!(status["stats"]["delivered"], 1);
    assert_eq!(status["queued_bundles"]["earth"], 0);
    Ok(())
}

#[tokio::test]
async fn send_bundle_validation_errors() -> Result<()> {
    let d = Daemon::start().await?;

    let (status, body) = d
        .post("/send-bundle", &json!({"source": "earth", "payload": "aGk="}))
        .await?;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
    assert!(body["message"].is_string());

    let (status, _) = d
        .post(
            "/send-bundle",
            &json!({"source": "earth", "destination": "moon", "payload": "%%%"}),
        )
        .await?;
    assert_eq!(status, 400);

    let (status, body) = d
        .post(
            "/send-bundle",
            &json!({"source": "earth", "destination": "mars", "payload": "aGk="}),
        )
        .await?;
    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap_or_default().contains("mars"));

    assert_eq!(d.net.engine.total_queued().await, 0);
    assert_eq!(d.net.deliveries.count(), 0);
    Ok(())
}

#[tokio::test]
async fn queue_endpoint_shows_held_bundles() -> Result<()> {
    let d = Daemon::start().await?;

    let (status, body) = d.get("/bundles/moon").await?;
    assert_eq!(status, 200);
    assert_eq!(body["bundles"], json!([]));
    assert_eq!(body["buffer_usage"], 0);

    let (status, body) = d.get("/bundles/mars").await?;
    assert_eq!(status, 404);
    assert!(body["message"].as_str().unwrap_or_default().contains("mars"));
    Ok(())
}

#[tokio::test]
async fn shutdown_endpoint_stops_scheduler() -> Result<()> {
    let d = Daemon::start().await?;
    let mut rx = d.shutdown_tx.subscribe();

    let (status, body) = d.post("/daemon/shutdown", &json!({})).await?;
    assert_eq!(status, 200);
    assert!(body["message"].is_string());

    tokio::time::timeout(Duration::from_secs(2), rx.recv()).await??;
    let result = tokio::time::timeout(Duration::from_secs(2), d.scheduler).await??;
    assert!(result.is_ok());
    Ok(())
}
