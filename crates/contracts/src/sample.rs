//! Sample - one power-flow reading produced by the simulation backend.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Backend timestamp (ISO-8601).
///
/// Ordered lexicographically. One backend run emits fixed-format timestamps in a single
/// timezone, for which string order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into a wall-clock time for display labels.
    ///
    /// Accepts naive (`2024-05-01T12:00:00.250`) and offset (`...+02:00`) forms.
    pub fn parse_local(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(&self.0)
                    .ok()
                    .map(|dt| dt.naive_local())
            })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Timestamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One timestamped (meter, pv, net) reading, in kW
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireSample")]
pub struct Sample {
    pub timestamp: Timestamp,
    /// Grid meter draw (>= 0)
    pub meter: f64,
    /// Photovoltaic production (>= 0)
    pub pv: f64,
    /// Net power, `pv - meter` (signed)
    pub net: f64,
}

impl Sample {
    /// Build a sample, deriving `net` from the two readings
    pub fn new(timestamp: impl Into<Timestamp>, meter: f64, pv: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            meter,
            pv,
            net: pv - meter,
        }
    }
}

/// Shape the backend actually sends.
///
/// Rows come out of a CSV whose net column is historically called `sum`; the backend
/// copies it into `net` but keeps the original key, so either or both may be present.
#[derive(Deserialize)]
struct WireSample {
    timestamp: Timestamp,
    meter: f64,
    pv: f64,
    #[serde(default)]
    net: Option<f64>,
    #[serde(default)]
    sum: Option<f64>,
}

impl From<WireSample> for Sample {
    fn from(wire: WireSample) -> Self {
        let net = wire.net.or(wire.sum).unwrap_or(wire.pv - wire.meter);
        Self {
            timestamp: wire.timestamp,
            meter: wire.meter,
            pv: wire.pv,
            net,
        }
    }
}
