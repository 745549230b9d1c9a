//! In-memory fixture data served by the JSON routes
//!
//! Fixtures are plain values built once at startup. [`FixtureSet::render`]
//! checks them and serializes each document exactly once, so every request
//! for a route receives the same bytes.

use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Number of samples in every series of the bundled fixtures
pub const SERIES_LEN: usize = 6;

/// Round-trip-time samples, one named series per latency component.
///
/// `RTT` and `L-RTT` are always present; the other series are optional and
/// omitted from the JSON document when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSample {
    /// Sample timestamps
    #[serde(rename = "TS", default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<u64>>,
    /// Full round-trip time
    #[serde(rename = "RTT")]
    pub rtt: Vec<u64>,
    /// Left-hand (client side) RTT
    #[serde(rename = "L-RTT")]
    pub left_rtt: Vec<u64>,
    /// Right-hand (server side) RTT
    #[serde(rename = "R-RTT", default, skip_serializing_if = "Option::is_none")]
    pub right_rtt: Option<Vec<u64>>,
    /// Observer-to-observer RTT
    #[serde(rename = "M-RTT", default, skip_serializing_if = "Option::is_none")]
    pub mid_rtt: Option<Vec<u64>>,
}

impl MeasurementSample {
    /// The two series every variant of the dataset carries
    pub fn minimal() -> Self {
        Self {
            timestamps: None,
            rtt: vec![30, 200, 100, 400, 150, 250],
            left_rtt: vec![50, 20, 10, 40, 15, 25],
            right_rtt: None,
            mid_rtt: None,
        }
    }

    /// All five series
    pub fn full() -> Self {
        Self {
            timestamps: Some(vec![100, 110, 120, 130, 140, 150]),
            right_rtt: Some(vec![50, 20, 10, 40, 15, 25]),
            mid_rtt: Some(vec![50, 20, 10, 40, 15, 25]),
            ..Self::minimal()
        }
    }

    /// Present series in document order, as (name, samples)
    pub fn series(&self) -> Vec<(&'static str, &[u64])> {
        let mut series = Vec::with_capacity(5);
        if let Some(ts) = &self.timestamps {
            series.push(("TS", ts.as_slice()));
        }
        series.push(("RTT", self.rtt.as_slice()));
        series.push(("L-RTT", self.left_rtt.as_slice()));
        if let Some(r) = &self.right_rtt {
            series.push(("R-RTT", r.as_slice()));
        }
        if let Some(m) = &self.mid_rtt {
            series.push(("M-RTT", m.as_slice()));
        }
        series
    }

    /// Every present series must have the same length as `RTT`
    pub fn validate(&self) -> Result<()> {
        let expected = self.rtt.len();
        for (name, samples) in self.series() {
            if samples.len() != expected {
                return Err(Error::SeriesLength {
                    series: name,
                    expected,
                    actual: samples.len(),
                });
            }
        }
        Ok(())
    }
}

/// One monitored session and the protocol it was measured over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
        }
    }
}

/// The complete set of fixtures a server instance exposes.
///
/// A `None` session list means the `/demo` route is not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSet {
    pub measurements: MeasurementSample,
    pub sessions: Option<Vec<SessionRecord>>,
}

impl FixtureSet {
    /// Union of every dataset variant: five series plus two sessions
    pub fn full() -> Self {
        Self {
            measurements: MeasurementSample::full(),
            sessions: Some(vec![
                SessionRecord::new("1", "ICMP"),
                SessionRecord::new("2", "QUIC"),
            ]),
        }
    }

    /// RTT and L-RTT only, no session data
    pub fn minimal() -> Self {
        Self {
            measurements: MeasurementSample::minimal(),
            sessions: None,
        }
    }

    /// Validate and serialize every document once
    pub fn render(&self) -> Result<RenderedFixtures> {
        self.measurements.validate()?;

        let measurements = Bytes::from(serde_json::to_vec(&self.measurements)?);
        let sessions = self
            .sessions
            .as_ref()
            .map(|s| serde_json::to_vec(s).map(Bytes::from))
            .transpose()?;

        Ok(RenderedFixtures {
            measurements,
            sessions,
        })
    }
}

impl Default for FixtureSet {
    fn default() -> Self {
        Self::full()
    }
}

/// Pre-serialized fixture documents, shared read-only by all requests
#[derive(Debug, Clone)]
pub struct RenderedFixtures {
    pub measurements: Bytes,
    pub sessions: Option<Bytes>,
}
