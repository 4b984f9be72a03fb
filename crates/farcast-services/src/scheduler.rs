//! Drives the routing and transmission ticks.
//!
//! Both timers live in one task. Each tick runs to completion inside its
//! `select!` arm before the loop polls again, so ticks never overlap and a
//! shutdown signal is only observed between ticks: every bundle is in
//! exactly one store when `run` returns.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::engine::{now_ms, EngineHandle};
use crate::error::EngineError;

pub struct Scheduler {
    engine: EngineHandle,
    routing_interval: Duration,
    transmission_interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl Scheduler {
    pub fn new(
        engine: EngineHandle,
        routing_interval: Duration,
        transmission_interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            engine,
            routing_interval,
            transmission_interval,
            shutdown,
        }
    }

    /// Run until shutdown. A routing failure is a configuration error and
    /// stops the scheduler.
    pub async fn run(mut self) -> Result<(), EngineError> {
        let mut routing = tokio::time::interval(self.routing_interval);
        routing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut transmission = tokio::time::interval(self.transmission_interval);
        transmission.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            routing_ms = self.routing_interval.as_millis() as u64,
            transmission_ms = self.transmission_interval.as_millis() as u64,
            "scheduler started"
        );

        loop {
            tokio::select! {
                // Routing before transmission so the first transmission tick
                // already has a routing table.
                biased;

                _ = self.shutdown.recv() => {
                    tracing::info!("scheduler shutting down");
                    return Ok(());
                }

                _ = routing.tick() => {
                    if let Err(e) = self.engine.routing_tick(now_ms()).await {
                        tracing::error!(error = %e, "routing tick failed, stopping scheduler");
                        return Err(e);
                    }
                }

                _ = transmission.tick() => {
                    let report = self.engine.transmission_tick(now_ms()).await;
                    if report.attempted > 0 || report.dropped > 0 {
                        tracing::info!(
                            attempted = report.attempted,
                            forwarded = report.forwarded,
                            delivered = report.delivered,
                            failed = report.failed,
                            held = report.held,
                            dropped = report.dropped,
                            "transmission tick"
                        );
                    } else if !report.is_idle() {
                        tracing::debug!(held = report.held, "transmission tick, all traffic held");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use farcast_core::{NodeId, NodeKeyring, Position, Timestamp};

    use crate::delivery::DeliveryLog;
    use crate::engine::Engine;
    use crate::geometry::{
        ConfiguredGeometry, GeometryError, GeometryProvider, ScriptedVisibility,
    };
    use crate::transmission::ScriptedSimulator;

    /// Places every node at the origin at t = 0 and forgets them afterwards.
    struct VanishingGeometry;

    impl GeometryProvider for VanishingGeometry {
        fn position(&self, node: &NodeId, at: Timestamp) -> Result<Position, GeometryError> {
            if at == 0 {
                Ok(Position::default())
            } else {
                Err(GeometryError::UnknownNode(node.clone()))
            }
        }
    }

    fn engine(geometry: Arc<dyn GeometryProvider>, deliveries: &DeliveryLog) -> EngineHandle {
        let nodes: Vec<NodeId> = vec!["a".into(), "b".into()];
        let visibility = Arc::new(ScriptedVisibility::new());
        visibility.open("a", "b");
        let engine = Engine::new(
            nodes.clone(),
            geometry,
            visibility,
            Arc::new(ScriptedSimulator::always(true)),
            Arc::new(NodeKeyring::generate(&nodes)),
            Arc::new(deliveries.clone()),
        )
        .unwrap();
        EngineHandle::new(engine)
    }

    fn two_fixed_nodes() -> Arc<dyn GeometryProvider> {
        Arc::new(
            ConfiguredGeometry::new()
                .with_fixed("a".into(), Position::default())
                .with_fixed("b".into(), Position::new(1_000.0, 0.0, 0.0)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_then_stops_on_shutdown() {
        let deliveries = DeliveryLog::new();
        let handle = engine(two_fixed_nodes(), &deliveries);
        handle
            .submit_bundle("a".into(), "b".into(), Bytes::from_static(b"hi"), 1)
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(
            Scheduler::new(
                handle.clone(),
                Duration::from_millis(500),
                Duration::from_millis(100),
                shutdown_rx,
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(deliveries.count(), 1);

        shutdown_tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(handle.total_queued().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn routing_failure_stops_scheduler() {
        let deliveries = DeliveryLog::new();
        let handle = engine(Arc::new(VanishingGeometry), &deliveries);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let result = Scheduler::new(
            handle,
            Duration::from_millis(50),
            Duration::from_millis(10),
            shutdown_rx,
        )
        .run()
        .await;
        assert!(matches!(result, Err(EngineError::Geometry(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_until_shutdown() {
        let deliveries = DeliveryLog::new();
        let handle = engine(two_fixed_nodes(), &deliveries);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(
            Scheduler::new(handle, Duration::from_millis(50), Duration::from_millis(10), shutdown_rx)
                .run(),
        );
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!task.is_finished());

        shutdown_tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }
}
