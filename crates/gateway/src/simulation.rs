//! Offline simulation feeding a [`MockGateway`]
//!
//! Produces one meter reading per interval while the mock is running, with PV output following
//! a bell curve centred on solar noon.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Timelike};
use contracts::Sample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::MockGateway;

/// Peak PV output in kW
const PV_PEAK_KW: f64 = 8.0;
const SOLAR_NOON_H: f64 = 12.0;

/// Backend meter sampling period
pub const METER_INTERVAL: Duration = Duration::from_secs(3);

/// PV output (kW) at a given local time of day
pub fn pv_profile(hour: u32, minute: u32) -> f64 {
    let t = f64::from(hour) + f64::from(minute) / 60.0;
    (PV_PEAK_KW * (-(t - SOLAR_NOON_H).powi(2) / 18.0).exp()).max(0.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Household draw range in kW
const METER_MIN_KW: f64 = 0.5;
const METER_MAX_KW: f64 = 10.0;

/// Seeded meter draw, uniform between 0.5 and 10.0 kW
#[derive(Debug, Clone)]
pub struct MeterSource {
    rng: StdRng,
}

impl MeterSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_reading(&mut self) -> f64 {
        round2(self.rng.random_range(METER_MIN_KW..=METER_MAX_KW))
    }
}

/// Build the sample the backend would record for `meter` at the current local time
pub fn sample_now(meter: f64) -> Sample {
    let now = Local::now().naive_local();
    let pv = round2(pv_profile(now.hour(), now.minute()));
    Sample {
        timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string().into(),
        meter,
        pv,
        net: round2(pv - meter),
    }
}

/// Spawn the producer; it records only while the mock reports running
pub fn spawn_simulation(gateway: Arc<MockGateway>, interval: Duration, seed: u64) -> JoinHandle<()> {
    info!(interval_ms = interval.as_millis() as u64, "Offline simulation started");
    tokio::spawn(async move {
        let mut meter = MeterSource::new(seed);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if !gateway.is_running() {
                continue;
            }
            let sample = sample_now(meter.next_reading());
            debug!(meter = sample.meter, pv = sample.pv, net = sample.net, "Simulated reading");
            gateway.record(sample);
        }
    })
}
