//! Discovery of serial ports visible to the system.
//!
//! A [`PortRegistry`] produces a snapshot of [`PortInfo`] records. The
//! vendor/product filters are plain equality filters over that snapshot;
//! ordering is whatever the platform reports.

use crate::port::{
    PortConfiguration, PortError, PortIdentity, SyncSerialTransport, TimedPort,
    TokioSerialTransport,
};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// How a port is attached to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Usb,
    Bluetooth,
    Pci,
    Unknown,
}

/// A discovered port. Opening it is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub identity: PortIdentity,
    pub kind: PortKind,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// A USB port with no descriptive strings.
    pub fn new(name: impl Into<String>, identity: PortIdentity) -> Self {
        Self {
            name: name.into(),
            identity,
            kind: PortKind::Usb,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.identity.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.identity.product_id()
    }

    /// A closed port over the native async transport.
    pub fn into_port(self, config: PortConfiguration) -> TimedPort<TokioSerialTransport> {
        TimedPort::new(TokioSerialTransport::new(self.name, config).with_identity(self.identity))
    }

    /// A closed port over the blocking transport, with the given native
    /// poll slice.
    pub fn into_blocking_port(
        self,
        config: PortConfiguration,
        poll_slice: Duration,
    ) -> TimedPort<SyncSerialTransport> {
        let transport = SyncSerialTransport::new(self.name, config)
            .with_identity(self.identity)
            .with_poll_slice(poll_slice);
        TimedPort::new(transport)
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        use serialport::SerialPortType;

        let mut port = Self {
            name: info.port_name,
            identity: PortIdentity::default(),
            kind: PortKind::Unknown,
            manufacturer: None,
            product: None,
            serial_number: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                port.kind = PortKind::Usb;
                port.identity = PortIdentity::new(usb.vid, usb.pid);
                port.manufacturer = usb.manufacturer;
                port.product = usb.product;
                port.serial_number = usb.serial_number;
            }
            SerialPortType::BluetoothPort => port.kind = PortKind::Bluetooth,
            SerialPortType::PciPort => port.kind = PortKind::Pci,
            SerialPortType::Unknown => {}
        }
        port
    }
}

/// Source of port snapshots.
pub trait PortRegistry {
    /// Every port currently visible.
    fn list(&self) -> Result<Vec<PortInfo>, PortError>;

    /// Ports whose vendor and product ids both match.
    fn list_matching(&self, vendor_id: u16, product_id: u16) -> Result<Vec<PortInfo>, PortError> {
        let wanted = PortIdentity::new(vendor_id, product_id);
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.identity == wanted)
            .collect())
    }

    fn by_vendor(&self, vendor_id: u16) -> Result<Vec<PortInfo>, PortError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.vendor_id() == vendor_id)
            .collect())
    }

    fn by_product(&self, product_id: u16) -> Result<Vec<PortInfo>, PortError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.product_id() == product_id)
            .collect())
    }
}

/// Registry backed by the operating system's device enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortRegistry;

impl PortRegistry for SystemPortRegistry {
    fn list(&self) -> Result<Vec<PortInfo>, PortError> {
        let ports: Vec<PortInfo> = serialport::available_ports()?
            .into_iter()
            .map(PortInfo::from)
            .collect();
        debug!(count = ports.len(), "Enumerated serial ports");
        Ok(ports)
    }
}

/// Registry over a fixed list, for tests and preconfigured setups.
#[derive(Debug, Clone, Default)]
pub struct StaticPortRegistry {
    ports: Vec<PortInfo>,
}

impl StaticPortRegistry {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self { ports }
    }
}

impl PortRegistry for StaticPortRegistry {
    fn list(&self) -> Result<Vec<PortInfo>, PortError> {
        Ok(self.ports.clone())
    }
}
