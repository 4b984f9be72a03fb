//! Transmission simulator. Decides whether an attempt over a link succeeds.
//!
//! The engine awaits `transmit` while holding the tick, so attempts may
//! suspend (e.g. to model light time) without letting another tick start.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use farcast_core::config::SimulatorConfig;
use farcast_core::{Bundle, BundleId, CommunicationLink};
use futures::future::BoxFuture;
use rand::Rng;

pub trait TransmissionSimulator: Send + Sync {
    fn transmit<'a>(&'a self, link: &'a CommunicationLink, bundle: &'a Bundle) -> BoxFuture<'a, bool>;
}

/// Random loss that grows with light time.
///
///   p_fail = clamp(base_loss + loss_per_light_second * latency, 0, 1)
#[derive(Debug, Clone)]
pub struct LossySimulator {
    base_loss: f64,
    loss_per_light_second: f64,
    delay_scale: f64,
}

impl LossySimulator {
    pub fn new(base_loss: f64, loss_per_light_second: f64, delay_scale: f64) -> Self {
        Self {
            base_loss,
            loss_per_light_second,
            delay_scale,
        }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(config.base_loss, config.loss_per_light_second, config.delay_scale)
    }

    pub fn failure_probability(&self, link: &CommunicationLink) -> f64 {
        if !link.line_of_sight {
            return 1.0;
        }
        let p = self.base_loss + self.loss_per_light_second * link.latency_secs;
        if p.is_nan() {
            1.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    fn delay(&self, link: &CommunicationLink) -> Option<Duration> {
        let secs = link.latency_secs * self.delay_scale;
        (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
    }
}

impl TransmissionSimulator for LossySimulator {
    fn transmit<'a>(&'a self, link: &'a CommunicationLink, bundle: &'a Bundle) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            if let Some(delay) = self.delay(link) {
                tokio::time::sleep(delay).await;
            }
            let p = self.failure_probability(link);
            let ok = rand::thread_rng().gen::<f64>() >= p;
            tracing::trace!(
                bundle = %bundle.id,
                from = %link.source,
                to = %link.destination,
                p_fail = p,
                ok,
                "transmission attempt"
            );
            ok
        })
    }
}

/// Deterministic outcomes, consumed in order. Once the script runs out
/// every attempt gets `fallback`. Records the bundles it was asked to send.
#[derive(Debug)]
pub struct ScriptedSimulator {
    outcomes: Mutex<VecDeque<bool>>,
    fallback: bool,
    attempts: Mutex<Vec<(BundleId, CommunicationLink)>>,
}

impl ScriptedSimulator {
    pub fn new(outcomes: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(ok: bool) -> Self {
        Self::new([], ok)
    }

    /// Every attempt made so far, oldest first.
    pub fn attempts(&self) -> Vec<(BundleId, CommunicationLink)> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next_outcome(&self) -> bool {
        self.outcomes
            .lock()
            .ok()
            .and_then(|mut o| o.pop_front())
            .unwrap_or(self.fallback)
    }
}

impl TransmissionSimulator for ScriptedSimulator {
    fn transmit<'a>(&'a self, link: &'a CommunicationLink, bundle: &'a Bundle) -> BoxFuture<'a, bool> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push((bundle.id.clone(), link.clone()));
        }
        let ok = self.next_outcome();
        Box::pin(async move { ok })
    }
}
