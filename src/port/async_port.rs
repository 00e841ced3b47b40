//! Non-blocking serial transport using tokio-serial.
//!
//! The stream is registered with the Tokio reactor, so it must be opened from
//! within a runtime. Raw reads complete as soon as any bytes are available
//! and never time out on their own.

use super::error::PortError;
use super::traits::{DataBits, FlowControl, Parity, PortConfiguration, PortIdentity, StopBits};
use super::traits::Transport;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Serial transport backed by a `tokio_serial::SerialStream`.
pub struct TokioSerialTransport {
    name: String,
    identity: PortIdentity,
    config: PortConfiguration,
    stream: Option<tokio_serial::SerialStream>,
}

impl TokioSerialTransport {
    /// Describe a port without opening it.
    ///
    /// # Example
    /// ```no_run
    /// use timed_serial::port::{PortConfiguration, TimedPort, TokioSerialTransport};
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<(), timed_serial::PortError> {
    /// let transport = TokioSerialTransport::new("/dev/ttyUSB0", PortConfiguration::with_baud(9600));
    /// let mut port = TimedPort::new(transport);
    /// let banner = port
    ///     .session(|port| Box::pin(async move { port.read_timeout(16, Duration::from_secs(1)).await }))
    ///     .await?;
    /// # let _ = banner;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(name: impl Into<String>, config: PortConfiguration) -> Self {
        Self {
            name: name.into(),
            identity: PortIdentity::default(),
            config,
            stream: None,
        }
    }

    pub fn with_identity(mut self, identity: PortIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

    /// Get a reference to the underlying stream, if open.
    pub fn as_raw(&self) -> Option<&tokio_serial::SerialStream> {
        self.stream.as_ref()
    }

    fn stream_mut(&mut self) -> Result<&mut tokio_serial::SerialStream, PortError> {
        self.stream.as_mut().ok_or(PortError::NotOpen)
    }
}

#[async_trait]
impl Transport for TokioSerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> PortIdentity {
        self.identity
    }

    fn open(&mut self) -> Result<(), PortError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(PortError::open_failed(
                &self.name,
                "no Tokio runtime to register the stream with",
            ));
        }

        let builder = tokio_serial::new(&self.name, self.config.baud_rate)
            .data_bits(convert_data_bits(self.config.data_bits))
            .flow_control(convert_flow_control(self.config.flow_control))
            .parity(convert_parity(self.config.parity))
            .stop_bits(convert_stop_bits(self.config.stop_bits));

        let stream = tokio_serial::SerialStream::open(&builder).map_err(|e| match e.kind {
            tokio_serial::ErrorKind::NoDevice => PortError::not_found(&self.name),
            tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
            _ => PortError::open_failed(&self.name, e),
        })?;

        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn set_baud_rate(&mut self, rate: u32) -> Result<(), PortError> {
        use tokio_serial::SerialPort;

        if rate == 0 {
            return Err(PortError::config("baud rate must be non-zero"));
        }
        self.config.baud_rate = rate;
        if let Some(stream) = self.stream.as_mut() {
            stream.set_baud_rate(rate)?;
        }
        Ok(())
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        use tokio_serial::SerialPort;

        let stream = self.stream.as_ref().ok_or(PortError::NotOpen)?;
        Ok(stream.bytes_to_read()? as usize)
    }

    fn disable_native_timeout(&mut self) -> Result<(), PortError> {
        // Reads are readiness-driven; there is no native timeout to disable.
        self.stream_mut().map(|_| ())
    }

    async fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let stream = self.stream_mut()?;
        Ok(stream.read(buffer).await?)
    }

    async fn write_some(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let stream = self.stream_mut()?;
        Ok(stream.write(data).await?)
    }
}

impl std::fmt::Debug for TokioSerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSerialTransport")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

// Helper conversion functions for tokio-serial types

fn convert_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn convert_flow_control(flow: FlowControl) -> tokio_serial::FlowControl {
    match flow {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Software => tokio_serial::FlowControl::Software,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    }
}

fn convert_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn convert_stop_bits(stop_bits: StopBits) -> tokio_serial::StopBits {
    match stop_bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}
