//! Core traits for serial port abstraction.
//!
//! Defines the [`Transport`] capability that every platform backend provides,
//! so real serial ports, blocking library ports and in-memory doubles can be
//! driven by the same timed core.

use super::error::PortError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Line parameters used when a native transport is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl PortConfiguration {
    /// 8N1 with no flow control at the given baud rate.
    pub fn with_baud(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Default::default()
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// USB vendor/product pair identifying a discovered device.
///
/// Ports that are not USB devices report `0` for both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortIdentity {
    vendor_id: u16,
    product_id: u16,
}

impl PortIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }
}

impl std::fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Raw byte channel to a serial device.
///
/// `read_some` and `write_some` are best-effort: they may move fewer bytes
/// than asked for, including zero, without that being an error, and they
/// never enforce a deadline of their own. Exact counts and deadlines are
/// the job of [`TimedPort`](super::TimedPort).
///
/// `open` and `close` are synchronous so that a scope guard can release the
/// transport from `Drop`.
#[async_trait]
pub trait Transport: Send + std::fmt::Debug {
    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Vendor/product identity of the underlying device.
    fn identity(&self) -> PortIdentity {
        PortIdentity::default()
    }

    /// Acquire the native handle. A closed transport always gets a fresh one.
    fn open(&mut self) -> Result<(), PortError>;

    /// Release the native handle. Closing a closed transport does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Change the baud rate. On a closed transport the rate is remembered
    /// and applied by the next `open`.
    fn set_baud_rate(&mut self, rate: u32) -> Result<(), PortError>;

    /// Number of received bytes waiting to be read.
    fn bytes_available(&self) -> Result<usize, PortError>;

    /// Neutralize any timeout the native library applies to its own reads
    /// and writes, leaving deadlines entirely to the caller.
    fn disable_native_timeout(&mut self) -> Result<(), PortError>;

    /// Read whatever is available into `buffer`, returning the byte count.
    async fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write a prefix of `data`, returning how many bytes were accepted.
    async fn write_some(&mut self, data: &[u8]) -> Result<usize, PortError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn identity(&self) -> PortIdentity {
        (**self).identity()
    }

    fn open(&mut self) -> Result<(), PortError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn set_baud_rate(&mut self, rate: u32) -> Result<(), PortError> {
        (**self).set_baud_rate(rate)
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        (**self).bytes_available()
    }

    fn disable_native_timeout(&mut self) -> Result<(), PortError> {
        (**self).disable_native_timeout()
    }

    async fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        (**self).read_some(buffer).await
    }

    async fn write_some(&mut self, data: &[u8]) -> Result<usize, PortError> {
        (**self).write_some(data).await
    }
}
