use crate::*;

use std::collections::HashMap;

use farcast_core::config::FarcastConfig;

/// Ground station at the origin, one relay well clear of the lunar limb and
/// one node parked directly behind the Moon.
fn earth_relay_far() -> ConfiguredGeometry {
    ConfiguredGeometry::new()
        .with_fixed("earth".into(), Position::default())
        .with_fixed("relay".into(), Position::new(384_400.0, 20_000.0, 0.0))
        .with_fixed("far".into(), Position::new(400_000.0, 0.0, 0.0))
}

/// The Moon blocks the only direct path; the relay carries the bundle
/// around it, one hop per tick.
#[tokio::test]
async fn relay_carries_bundle_around_moon() -> Result<()> {
    // Relay first, so its first visible neighbour is the far node.
    let net = Network::build(&["relay", "far", "earth"], earth_relay_far(), vec![moon()], lossless())?;

    let status = {
        net.engine.routing_tick(0).await?;
        net.engine.network_status().await
    };
    let earth_far = status
        .links
        .iter()
        .find(|l| l.source.as_str() == "earth" && l.destination.as_str() == "far")
        .context("missing earth → far link")?;
    assert!(!earth_far.line_of_sight, "Moon should block earth → far");

    let id = net.send("earth", "far", b"over the limb", 1).await?;

    net.step(0).await?;
    assert_eq!(net.whereabouts(&id).await?, Some(NodeId::from("relay")));

    net.step(1_000).await?;
    assert_eq!(net.whereabouts(&id).await?, None);

    let d = net.deliveries.get(&id).context("not delivered")?;
    assert_eq!(d.path, vec![NodeId::from("earth"), "relay".into(), "far".into()]);
    assert_eq!(d.payload, Bytes::from_static(b"over the limb"));
    Ok(())
}

/// Routes are greedy and per node, not per destination. With the ground
/// station listed first the relay's first visible neighbour is the ground
/// station, so the bundle shuttles back and forth without ever arriving.
#[tokio::test]
async fn greedy_routes_can_shuttle_a_bundle() -> Result<()> {
    let net = Network::build(&["earth", "relay", "far"], earth_relay_far(), vec![moon()], lossless())?;
    let id = net.send("earth", "far", b"lost in transit", 1).await?;

    let mut holders = Vec::new();
    for tick in 0..4 {
        net.step(tick * 1_000).await?;
        holders.push(net.whereabouts(&id).await?.context("delivered unexpectedly")?);
    }
    assert_eq!(
        holders,
        vec![NodeId::from("relay"), "earth".into(), "relay".into(), "earth".into()]
    );

    let queued = net.engine.queued(&"earth".into()).await?;
    assert_eq!(queued[0].path.len(), 5);
    Ok(())
}

/// A lunar orbiter is hidden behind the Moon at t = 0 and comes into view a
/// quarter orbit later. Traffic waits at the source until then.
#[tokio::test]
async fn orbiter_emerging_from_behind_moon_receives_held_bundle() -> Result<()> {
    let geometry = ConfiguredGeometry::new()
        .with_fixed("earth".into(), Position::default())
        .with_orbit("orbiter".into(), MOON_CENTER, 5_000.0, 1_000.0, 0.0)?;
    let net = Network::build(&["earth", "orbiter"], geometry, vec![moon()], lossless())?;
    let id = net.send("earth", "orbiter", b"wake up", 1).await?;

    for t in [0, 10_000, 20_000] {
        let report = net.step(t).await?;
        assert_eq!(report.attempted, 0);
        assert_eq!(report.held, 1, "earth has traffic but no route");
        assert_eq!(net.whereabouts(&id).await?, Some(NodeId::from("earth")));
    }
    assert!(net.engine.network_status().await.routing_table.is_empty());

    // 250 s = a quarter of the 1000 s period.
    let report = net.step(250_000).await?;
    assert_eq!(report.delivered, 1);
    assert_eq!(net.whereabouts(&id).await?, None);
    Ok(())
}

/// High-priority payloads stay sealed while a relay holds custody and are
/// opened only on delivery.
#[tokio::test]
async fn sealed_bundle_relayed_and_opened_at_destination() -> Result<()> {
    let net = Network::build(&["relay", "far", "earth"], earth_relay_far(), vec![moon()], lossless())?;
    let secret: &'static [u8] = b"launch window opens at T+42";
    let id = net.send("earth", "far", secret, 9).await?;

    net.step(0).await?;
    let held = net.engine.queued(&"relay".into()).await?;
    assert_eq!(held.len(), 1);
    assert!(held[0].encrypted);
    assert_eq!(held[0].size, secret.len() as u64);

    net.step(1_000).await?;
    let d = net.deliveries.get(&id).context("not delivered")?;
    assert!(d.was_encrypted);
    assert_eq!(d.payload, Bytes::from_static(secret));
    Ok(())
}

/// Under heavy loss every bundle is always in exactly one place, per-source
/// order is preserved by head-of-line retry, and everything eventually
/// arrives.
#[tokio::test]
async fn custody_is_never_duplicated_or_lost_under_loss() -> Result<()> {
    let geometry = ConfiguredGeometry::new()
        .with_fixed("a".into(), Position::default())
        .with_fixed("b".into(), Position::new(36_000.0, 0.0, 0.0));
    let net = Network::build(&["a", "b"], geometry, Vec::new(), LossySimulator::new(0.5, 0.0, 0.0))?;

    let traffic: [(&str, &str, &'static [u8]); 5] = [
        ("a", "b", b"one"),
        ("a", "b", b"two"),
        ("b", "a", b"three"),
        ("a", "b", b"four"),
        ("b", "a", b"five"),
    ];
    let mut sent: HashMap<&str, Vec<BundleId>> = HashMap::new();
    for (from, to, payload) in traffic {
        let id = net.send(from, to, payload, 1).await?;
        sent.entry(from).or_default().push(id);
    }
    let all: Vec<BundleId> = sent.values().flatten().cloned().collect();

    let mut tick = 0;
    while net.deliveries.count() < all.len() {
        anyhow::ensure!(tick < 500, "bundles still queued after {tick} ticks");
        net.step(tick * 1_000).await?;
        for id in &all {
            net.whereabouts(id).await?;
        }
        tick += 1;
    }
    assert_eq!(net.engine.total_queued().await, 0);

    let delivered: Vec<BundleId> = net.deliveries.list().into_iter().map(|d| d.id).collect();
    for ids in sent.values() {
        let order: Vec<&BundleId> = delivered.iter().filter(|d| ids.contains(d)).collect();
        assert_eq!(order, ids.iter().collect::<Vec<_>>());
    }

    let stats = net.engine.network_status().await.stats;
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.dropped, 0);
    Ok(())
}

/// The shipped default topology is self-consistent: every node can be
/// placed and the Earth–Moon chain has at least one usable route.
#[tokio::test]
async fn default_topology_builds_and_routes() -> Result<()> {
    let config = FarcastConfig::default();
    let nodes: Vec<NodeId> = config.node_ids().into_iter().map(NodeId::new).collect();
    let geometry = ConfiguredGeometry::from_config(&config.topology)?;
    let deliveries = DeliveryLog::new();
    let engine = Engine::new(
        nodes.clone(),
        Arc::new(geometry),
        Arc::new(BodyOcclusion::from_config(&config.topology)),
        Arc::new(LossySimulator::from_config(&config.simulator)),
        Arc::new(NodeKeyring::generate(&nodes)),
        Arc::new(deliveries),
    )?;
    let engine = EngineHandle::new(engine);

    for t in [0, 600_000, 3_600_000] {
        engine.routing_tick(t).await?;
        let status = engine.network_status().await;
        assert_eq!(status.links.len(), nodes.len() * (nodes.len() - 1));
        assert!(!status.routing_table.is_empty(), "no routes at t = {t}");
        assert_eq!(status.buffer_usage.len(), nodes.len());
    }
    Ok(())
}
