//! Periodic transfer-rate sampling from the daemon's total byte counters.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant};
use tracing::{debug, warn};

use crate::surface::{format_rate, rate_label};
use crate::syncthing_client::{DaemonApi, TransferTotals};

use super::state::StateStore;
use super::status::StatusPublisher;

pub const RATE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    pub in_bytes_per_sec: f64,
    pub out_bytes_per_sec: f64,
}

impl RateSample {
    pub fn between(previous: TransferTotals, current: TransferTotals, interval: Duration) -> Self {
        let secs = interval.as_secs_f64().max(f64::EPSILON);
        Self {
            in_bytes_per_sec: (current.in_bytes_total as f64 - previous.in_bytes_total as f64)
                / secs,
            out_bytes_per_sec: (current.out_bytes_total as f64 - previous.out_bytes_total as f64)
                / secs,
        }
    }
}

/// Latest sample, overwritten on every tick.
#[derive(Debug, Default)]
pub struct TransferRates {
    inner: StdMutex<RateSample>,
}

impl TransferRates {
    pub fn set(&self, sample: RateSample) {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = sample;
    }

    pub fn read(&self) -> RateSample {
        *self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct RateSampler {
    api: Arc<dyn DaemonApi>,
    rates: Arc<TransferRates>,
    state: Arc<Mutex<StateStore>>,
    status: StatusPublisher,
    interval: Duration,
    previous: TransferTotals,
}

impl RateSampler {
    pub fn new(
        api: Arc<dyn DaemonApi>,
        rates: Arc<TransferRates>,
        state: Arc<Mutex<StateStore>>,
        status: StatusPublisher,
    ) -> Self {
        Self {
            api,
            rates,
            state,
            status,
            interval: RATE_INTERVAL,
            previous: TransferTotals::default(),
        }
    }

    pub async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        loop {
            ticker.tick().await;
            self.sample().await;
        }
    }

    /// Take one sample and publish it.
    ///
    /// A failed fetch resets the previous totals to zero, so the next
    /// successful sample reports everything since the daemon started.
    pub async fn sample(&mut self) -> RateSample {
        let sample = match self.api.connections().await {
            Ok(connections) => {
                let current = connections.total;
                let sample = RateSample::between(self.previous, current, self.interval);
                self.previous = current;
                sample
            }
            Err(err) => {
                warn!(error = ?err, "Connection totals query failed");
                self.previous = TransferTotals::default();
                RateSample::default()
            }
        };

        debug!(
            in_rate = %format_rate(sample.in_bytes_per_sec),
            out_rate = %format_rate(sample.out_bytes_per_sec),
            "Sampled transfer rates"
        );
        self.rates.set(sample);
        self.status.surface().set_rate_label(&rate_label(
            sample.in_bytes_per_sec,
            sample.out_bytes_per_sec,
        ));

        if self.status.use_rates() {
            let state = self.state.lock().await;
            self.status.publish(&state);
        }
        sample
    }
}
