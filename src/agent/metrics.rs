//! Performance metrics tracking for the agent loop
//!
//! Tracks response times and calculates percentiles for monitoring.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Target response time for 95th percentile (NFR-P4)
pub const TARGET_RESPONSE_TIME_MS: u128 = 2000;

/// Maximum number of response time samples to keep for percentile calculation
const MAX_SAMPLES: usize = 100;

/// Response time metrics tracker
pub struct ResponseMetrics {
    samples: Mutex<VecDeque<Duration>>,
}

impl ResponseMetrics {
    /// Creates a new response metrics tracker
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(MAX_SAMPLES)),
        }
    }

    /// Records a response time sample
    pub fn record(&self, duration: Duration) {
        let mut samples = self.samples.lock().unwrap();

        // Add new sample
        samples.push_back(duration);

        // Keep only last MAX_SAMPLES
        if samples.len() > MAX_SAMPLES {
            samples.pop_front();
        }
    }

    /// Calculates the 95th percentile response time in milliseconds
    pub fn percentile_95(&self) -> Option<u128> {
        let samples = self.samples.lock().unwrap();

        if samples.is_empty() {
            return None;
        }

        // Convert to sorted vec of milliseconds
        let mut times_ms: Vec<u128> = samples.iter().map(|d| d.as_millis()).collect();

        times_ms.sort_unstable();

        // Calculate 95th percentile index
        let index = ((times_ms.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);

        Some(times_ms[index])
    }

    /// Returns the current sample count
    pub fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    /// Returns average response time in milliseconds
    pub fn average(&self) -> Option<u128> {
        let samples = self.samples.lock().unwrap();

        if samples.is_empty() {
            return None;
        }

        let sum: u128 = samples.iter().map(|d| d.as_millis()).sum();
        Some(sum / samples.len() as u128)
    }
}

impl Default for ResponseMetrics {
    fn default() -> Self {
        Self::new()
    }
}
