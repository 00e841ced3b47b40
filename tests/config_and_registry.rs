//! Integration tests for configuration files and port discovery filters.
//!
//! Config tests touch process environment variables and the working
//! directory, so they run serially.

mod common;

use common::ms;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use timed_serial::config::{ConfigError, ConfigLoader, LogFormat};
use timed_serial::port::{MockTransport, PortIdentity, TimedPort};
use timed_serial::registry::{PortInfo, PortKind, PortRegistry, StaticPortRegistry};

// ============================================================================
// Configuration
// ============================================================================

#[test]
#[serial]
fn test_save_and_reload_roundtrip() {
    // Arrange: a loader with non-default values
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("timed-serial.toml");
    let mut loader = ConfigLoader::with_defaults();
    loader.config_mut().serial.read_timeout_ms = 1500;
    loader.config_mut().logging.format = LogFormat::Json;

    // Act: save (creating the parent directory) and load it back
    loader.save_to(&path).unwrap();
    let reloaded = ConfigLoader::load_from(&path).unwrap();

    // Assert
    assert_eq!(reloaded.config(), loader.config());
    assert_eq!(reloaded.config_path.as_deref(), Some(path.as_path()));
}

#[test]
#[serial]
fn test_reload_picks_up_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timed-serial.toml");
    std::fs::write(&path, "[serial]\nwrite_timeout_ms = 100\n").unwrap();
    let mut loader = ConfigLoader::load_from(&path).unwrap();

    std::fs::write(&path, "[serial]\nwrite_timeout_ms = 400\n").unwrap();
    loader.reload().unwrap();

    assert_eq!(loader.config().serial.write_timeout(), ms(400));
}

#[test]
#[serial]
fn test_reload_keeps_previous_config_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timed-serial.toml");
    std::fs::write(&path, "[serial]\ndefault_baud = 9600\n").unwrap();
    let mut loader = ConfigLoader::load_from(&path).unwrap();

    std::fs::write(&path, "[serial]\ndefault_baud = 0\n").unwrap();
    let err = loader.reload().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError { .. }));
    assert_eq!(loader.config().serial.default_baud, 9600);
}

#[test]
#[serial]
fn test_malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timed-serial.toml");
    std::fs::write(&path, "[serial\ndefault_baud = ").unwrap();

    assert!(matches!(
        ConfigLoader::load_from(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
#[serial]
fn test_explicit_path_env_wins() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[serial]\ndefault_baud = 57600\n").unwrap();
    env::set_var("TIMED_SERIAL_CONFIG", &path);

    // Act
    let loaded = ConfigLoader::load();
    env::remove_var("TIMED_SERIAL_CONFIG");

    // Assert
    let loader = loaded.unwrap();
    assert_eq!(loader.config().serial.default_baud, 57600);
    assert_eq!(loader.config_path, Some(path));
}

#[test]
#[serial]
fn test_env_override_beats_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timed-serial.toml");
    std::fs::write(&path, "[serial]\nread_timeout_ms = 100\n").unwrap();
    env::set_var("TIMED_SERIAL_SERIAL_READ_TIMEOUT_MS", "900");

    let loaded = ConfigLoader::load_from(&path);
    env::remove_var("TIMED_SERIAL_SERIAL_READ_TIMEOUT_MS");

    assert_eq!(loaded.unwrap().config().serial.read_timeout(), ms(900));
}

#[test]
#[serial]
fn test_configure_applies_serial_section() {
    let mut loader = ConfigLoader::with_defaults();
    let serial = &mut loader.config_mut().serial;
    serial.read_timeout_ms = 120;
    serial.write_timeout_ms = 80;
    serial.poll_interval_ms = 5;

    let mut port = TimedPort::new(MockTransport::new(common::MOCK_PORT));
    port.configure(&loader.config().serial);

    assert_eq!(port.default_timeouts(), (ms(120), ms(80)));
    assert_eq!(port.poll_interval(), ms(5));
}

// ============================================================================
// Registry filters
// ============================================================================

fn bench_registry() -> StaticPortRegistry {
    let mut bluetooth = PortInfo::new("/dev/rfcomm0", PortIdentity::default());
    bluetooth.kind = PortKind::Bluetooth;

    StaticPortRegistry::new(vec![
        PortInfo::new("/dev/ttyUSB0", PortIdentity::new(0x0403, 0x6001)),
        PortInfo::new("/dev/ttyUSB1", PortIdentity::new(0x1a86, 0x7523)),
        PortInfo::new("/dev/ttyACM0", PortIdentity::new(0x2341, 0x0043)),
        PortInfo::new("/dev/ttyACM1", PortIdentity::new(0x2341, 0x0043)),
        bluetooth,
    ])
}

#[test]
fn test_filters_are_subsets_of_list() {
    let registry = bench_registry();
    let all = registry.list().unwrap();

    for subset in [
        registry.list_matching(0x2341, 0x0043).unwrap(),
        registry.by_vendor(0x0403).unwrap(),
        registry.by_product(0x7523).unwrap(),
    ] {
        assert!(!subset.is_empty());
        assert!(subset.iter().all(|p| all.contains(p)));
    }
}

#[test]
fn test_zero_ids_match_non_usb_ports() {
    let matches = bench_registry().list_matching(0, 0).unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].kind, PortKind::Bluetooth);
}

#[test]
fn test_duplicate_devices_are_all_returned() {
    let names: Vec<String> = bench_registry()
        .list_matching(0x2341, 0x0043)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();

    assert_eq!(names, vec!["/dev/ttyACM0", "/dev/ttyACM1"]);
}

#[test]
fn test_no_match_is_empty() {
    assert!(bench_registry().list_matching(0x0403, 0x7523).unwrap().is_empty());
    assert!(bench_registry().by_vendor(0xffff).unwrap().is_empty());
}

#[test]
fn test_into_blocking_port_keeps_identity() {
    let info = PortInfo::new("/dev/ttyUSB1", PortIdentity::new(0x1a86, 0x7523));

    let port = info.into_blocking_port(Default::default(), ms(20));

    assert!(!port.is_open());
    assert_eq!(port.identity().to_string(), "1a86:7523");
}
