//! Shared test utilities for timed_serial integration tests.
//!
//! This module provides:
//! - Mock port builders for paced sources and bounded sinks
//! - Timing assertions for paused-clock tests
//! - Hardware test configuration from the environment

#![allow(dead_code)]

use std::env;
use std::time::Duration;
use timed_serial::port::{MockTransport, TimedPort};

pub const MOCK_PORT: &str = "MOCK0";

/// An open port over a mock that emits `data` one byte per `interval`.
pub fn paced_source(data: &[u8], interval: Duration) -> (TimedPort<MockTransport>, MockTransport) {
    let mock = MockTransport::new(MOCK_PORT);
    mock.prepare_read(data, interval);
    (open(&mock), mock)
}

/// An open port over a mock sink that accepts at most `capacity` bytes.
pub fn bounded_sink(capacity: usize, interval: Duration) -> (TimedPort<MockTransport>, MockTransport) {
    let mock = MockTransport::new(MOCK_PORT);
    mock.prepare_write(capacity, interval);
    (open(&mock), mock)
}

/// Open a port over a clone of `mock`, leaving `mock` for inspection.
pub fn open(mock: &MockTransport) -> TimedPort<MockTransport> {
    let mut port = TimedPort::new(mock.clone());
    port.open().expect("mock transport should open");
    port
}

/// Milliseconds shorthand.
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Assert that `elapsed` lies within `[low, high]`.
pub fn assert_elapsed_between(elapsed: Duration, low: Duration, high: Duration) {
    assert!(
        elapsed >= low && elapsed <= high,
        "elapsed {:?} outside [{:?}, {:?}]",
        elapsed,
        low,
        high
    );
}

/// Hardware port settings taken from the environment.
pub struct HardwarePort {
    pub name: String,
    pub baud_rate: u32,
    pub loopback: bool,
}

impl HardwarePort {
    /// `TIMED_SERIAL_TEST_PORT` selects the device; `None` skips the test.
    pub fn from_env() -> Option<Self> {
        let name = env::var("TIMED_SERIAL_TEST_PORT").ok()?;
        let baud_rate = env::var("TIMED_SERIAL_TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(115200);
        let loopback = env::var("TIMED_SERIAL_TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(Self {
            name,
            baud_rate,
            loopback,
        })
    }
}
