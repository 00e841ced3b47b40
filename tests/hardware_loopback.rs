//! Tests requiring actual serial hardware.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TIMED_SERIAL_TEST_PORT=/dev/ttyUSB0   # or COM3
//! export TIMED_SERIAL_TEST_BAUD=115200         # optional
//! export TIMED_SERIAL_TEST_LOOPBACK=1          # if TX is wired to RX
//! cargo test --features hardware-tests --test hardware_loopback
//! ```
//!
//! Each test returns early when `TIMED_SERIAL_TEST_PORT` is not set.

#![cfg(feature = "hardware-tests")]

mod common;

use common::{ms, HardwarePort};
use timed_serial::port::{PortConfiguration, PortError, TimedPort, TokioSerialTransport};
use timed_serial::registry::{PortRegistry, SystemPortRegistry};

fn hardware() -> Option<HardwarePort> {
    let port = HardwarePort::from_env();
    if port.is_none() {
        println!("Skipping hardware test: TIMED_SERIAL_TEST_PORT not set");
    }
    port
}

fn native_port(hw: &HardwarePort) -> TimedPort<TokioSerialTransport> {
    TimedPort::new(TokioSerialTransport::new(
        hw.name.clone(),
        PortConfiguration::with_baud(hw.baud_rate),
    ))
}

#[test]
fn test_test_port_is_listed() {
    let Some(hw) = hardware() else { return };

    let ports = SystemPortRegistry.list().unwrap();
    assert!(
        ports.iter().any(|p| p.name == hw.name),
        "{} not among {:?}",
        hw.name,
        ports.iter().map(|p| &p.name).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_session_open_close_cycles() {
    let Some(hw) = hardware() else { return };
    let mut port = native_port(&hw);

    for _ in 0..3 {
        let result: Result<(), PortError> = port.session(|_| Box::pin(async { Ok(()) })).await;
        result.unwrap();
        assert!(!port.is_open());
    }
}

#[tokio::test]
async fn test_loopback_exchange() {
    let Some(hw) = hardware() else { return };
    if !hw.loopback {
        println!("Skipping loopback test: TIMED_SERIAL_TEST_LOOPBACK not set");
        return;
    }
    let mut port = native_port(&hw);
    let payload = b"timed-serial loopback".to_vec();

    let echoed = port
        .session(|port| {
            Box::pin(async move {
                port.write_timeout(&payload, ms(500)).await?;
                port.read_timeout(payload.len(), ms(1000)).await
            })
        })
        .await
        .unwrap();

    assert_eq!(echoed, b"timed-serial loopback".to_vec());
}

#[tokio::test]
async fn test_silent_line_times_out() {
    let Some(hw) = hardware() else { return };
    if hw.loopback {
        return;
    }
    let mut port = native_port(&hw);

    let result = port
        .session(|port| Box::pin(async move { port.read_timeout(64, ms(200)).await }))
        .await;

    assert!(matches!(result, Err(PortError::Timeout(_))));
}
