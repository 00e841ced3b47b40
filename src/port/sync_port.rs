//! Blocking serial transport built on the `serialport` crate.
//!
//! The native handle has a blocking read timeout of its own, which
//! [`Transport::disable_native_timeout`] shrinks to a short poll slice. Each
//! raw transfer runs on Tokio's blocking pool, so a slice that expires with
//! no data costs one blocking-pool round trip and reports zero bytes.
//!
//! A blocking read cannot be interrupted. When the caller stops waiting
//! (deadline, cancellation) the read keeps running for the rest of its
//! slice; its handle is kept and the next read collects whatever it
//! received before touching the device again.

use super::error::PortError;
use super::traits::{PortConfiguration, PortIdentity, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// How long one blocking raw transfer may wait before reporting no progress.
pub const DEFAULT_NATIVE_POLL_SLICE: Duration = Duration::from_millis(10);

type NativePort = Box<dyn serialport::SerialPort>;

/// The native handle, tagged with the open it belongs to.
#[derive(Default)]
struct NativeSlot {
    port: Option<NativePort>,
    generation: u64,
}

/// Serial transport backed by a blocking `serialport` handle.
pub struct SyncSerialTransport {
    name: String,
    identity: PortIdentity,
    config: PortConfiguration,
    poll_slice: Duration,
    slot: Arc<Mutex<NativeSlot>>,
    open: bool,
    generation: u64,
    /// Read still running on the blocking pool after its caller gave up.
    in_flight: Option<JoinHandle<Result<Vec<u8>, PortError>>>,
    /// Bytes received but not yet handed to a caller.
    carry: VecDeque<u8>,
}

impl SyncSerialTransport {
    /// Describe a port without opening it.
    ///
    /// # Example
    /// ```no_run
    /// use timed_serial::port::{PortConfiguration, SyncSerialTransport, TimedPort};
    ///
    /// let transport = SyncSerialTransport::new("/dev/ttyUSB0", PortConfiguration::default());
    /// let mut port = TimedPort::new(transport);
    /// port.open()?;
    /// # Ok::<(), timed_serial::PortError>(())
    /// ```
    pub fn new(name: impl Into<String>, config: PortConfiguration) -> Self {
        Self {
            name: name.into(),
            identity: PortIdentity::default(),
            config,
            poll_slice: DEFAULT_NATIVE_POLL_SLICE,
            slot: Arc::new(Mutex::new(NativeSlot::default())),
            open: false,
            generation: 0,
            in_flight: None,
            carry: VecDeque::new(),
        }
    }

    pub fn with_identity(mut self, identity: PortIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Set the native timeout applied once deadlines are handed to the caller.
    pub fn with_poll_slice(mut self, slice: Duration) -> Self {
        self.poll_slice = slice;
        self
    }

    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

    fn install(&mut self, port: NativePort) {
        self.generation += 1;
        let mut slot = self.slot.lock();
        slot.port = Some(port);
        slot.generation = self.generation;
        drop(slot);

        self.open = true;
        self.carry.clear();
        self.in_flight = None;
    }

    fn with_port<R>(
        &self,
        op: impl FnOnce(&mut NativePort) -> Result<R, PortError>,
    ) -> Result<R, PortError> {
        if !self.open {
            return Err(PortError::NotOpen);
        }
        let mut slot = self.slot.lock();
        match slot.port.as_mut() {
            Some(port) => op(port),
            None => Err(PortError::NotOpen),
        }
    }
}

/// Native timeouts mean "nothing arrived in this slice", not failure.
fn native_result(result: std::io::Result<usize>) -> Result<usize, PortError> {
    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
        Err(e) => Err(PortError::Io(e)),
    }
}

fn join_error(e: tokio::task::JoinError) -> PortError {
    PortError::Io(std::io::Error::other(e))
}

fn spawn_read(
    slot: Arc<Mutex<NativeSlot>>,
    len: usize,
) -> JoinHandle<Result<Vec<u8>, PortError>> {
    tokio::task::spawn_blocking(move || {
        let mut slot = slot.lock();
        let port = slot.port.as_mut().ok_or(PortError::NotOpen)?;
        let mut temp = vec![0u8; len];
        let count = native_result(port.read(&mut temp))?;
        temp.truncate(count);
        Ok(temp)
    })
}

#[async_trait]
impl Transport for SyncSerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> PortIdentity {
        self.identity
    }

    fn open(&mut self) -> Result<(), PortError> {
        let port = serialport::new(&self.name, self.config.baud_rate)
            .data_bits(self.config.data_bits.into())
            .flow_control(self.config.flow_control.into())
            .parity(self.config.parity.into())
            .stop_bits(self.config.stop_bits.into())
            .timeout(self.poll_slice)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(&self.name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::open_failed(&self.name, e),
            })?;

        self.install(port);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.carry.clear();
        // Whatever a detached read still collects is dropped with the session.
        self.in_flight = None;

        // Dropping the handle releases the device. A detached read may hold
        // it until its slice ends; the release then runs on the blocking pool.
        let generation = self.generation;
        let release = {
            let slot = Arc::clone(&self.slot);
            move || {
                let mut slot = slot.lock();
                if slot.generation == generation {
                    slot.port = None;
                }
            }
        };
        match self.slot.try_lock() {
            Some(mut slot) => slot.port = None,
            None => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    trace!(port = %self.name, "Deferring release behind a detached read");
                    drop(handle.spawn_blocking(release));
                }
                Err(_) => release(),
            },
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_baud_rate(&mut self, rate: u32) -> Result<(), PortError> {
        if rate == 0 {
            return Err(PortError::config("baud rate must be non-zero"));
        }
        self.config.baud_rate = rate;
        if self.open {
            self.with_port(|port| Ok(port.set_baud_rate(rate)?))?;
        }
        Ok(())
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        let native = self.with_port(|port| Ok(port.bytes_to_read()? as usize))?;
        Ok(self.carry.len() + native)
    }

    fn disable_native_timeout(&mut self) -> Result<(), PortError> {
        let slice = self.poll_slice;
        self.with_port(|port| Ok(port.set_timeout(slice)?))?;
        debug!(port = %self.name, ?slice, "Native timeout reduced to poll slice");
        Ok(())
    }

    async fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        if !self.open {
            return Err(PortError::NotOpen);
        }

        if self.carry.is_empty() {
            // The handle stays in `in_flight` until the read finishes, so a
            // caller that stops waiting leaves the bytes for the next read.
            let slot = &self.slot;
            let handle = self
                .in_flight
                .get_or_insert_with(|| spawn_read(Arc::clone(slot), buffer.len()));
            let result = handle.await;
            self.in_flight = None;
            self.carry.extend(result.map_err(join_error)??);
        }

        let count = self.carry.len().min(buffer.len());
        for (dst, byte) in buffer.iter_mut().zip(self.carry.drain(..count)) {
            *dst = byte;
        }
        Ok(count)
    }

    async fn write_some(&mut self, data: &[u8]) -> Result<usize, PortError> {
        if !self.open {
            return Err(PortError::NotOpen);
        }
        let data = data.to_vec();
        let slot = Arc::clone(&self.slot);

        tokio::task::spawn_blocking(move || {
            let mut slot = slot.lock();
            let port = slot.port.as_mut().ok_or(PortError::NotOpen)?;
            native_result(port.write(&data))
        })
        .await
        .map_err(join_error)?
    }
}

impl std::fmt::Debug for SyncSerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialTransport")
            .field("name", &self.name)
            .field("baud_rate", &self.config.baud_rate)
            .field("poll_slice", &self.poll_slice)
            .field("open", &self.open)
            .field("carried", &self.carry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let mut transport =
            SyncSerialTransport::new("/dev/nonexistent_port_12345", PortConfiguration::default());

        match transport.open() {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::OpenFailed { port, .. }) => assert!(port.contains("nonexistent")),
            other => panic!("Expected open error, got: {:?}", other),
        }
        assert!(!transport.is_open());
    }

    #[test]
    fn test_closed_transport() {
        let mut transport = SyncSerialTransport::new("/dev/ttyS99", PortConfiguration::default());

        assert!(matches!(transport.bytes_available(), Err(PortError::NotOpen)));
        assert!(matches!(
            transport.disable_native_timeout(),
            Err(PortError::NotOpen)
        ));
        // Close on a closed transport is a no-op
        transport.close();
    }

    #[test]
    fn test_baud_rate_remembered_while_closed() {
        let mut transport = SyncSerialTransport::new("/dev/ttyS99", PortConfiguration::default());

        transport.set_baud_rate(9600).unwrap();
        assert_eq!(transport.config().baud_rate, 9600);
        assert!(transport.set_baud_rate(0).is_err());
    }

    #[test]
    fn test_native_timeout_reports_no_progress() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slice expired");
        assert_eq!(native_result(Err(timed_out)).unwrap(), 0);

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(native_result(Err(broken)), Err(PortError::Io(_))));
    }

    #[tokio::test]
    async fn test_read_on_closed_transport() {
        let mut transport = SyncSerialTransport::new("/dev/ttyS99", PortConfiguration::default());
        let mut buffer = [0u8; 4];

        assert!(matches!(
            transport.read_some(&mut buffer).await,
            Err(PortError::NotOpen)
        ));
    }

    #[cfg(unix)]
    mod pty {
        use super::*;
        use crate::port::TimedPort;
        use std::thread;
        use std::time::Instant;

        /// A transport on the slave end of a pty pair, plus the master end.
        fn pty_port(slice: Duration) -> (TimedPort<SyncSerialTransport>, serialport::TTYPort) {
            let (master, slave) = serialport::TTYPort::pair().unwrap();
            let mut transport =
                SyncSerialTransport::new("pty", PortConfiguration::default()).with_poll_slice(slice);
            transport.install(Box::new(slave));
            transport.disable_native_timeout().unwrap();
            (TimedPort::new(transport), master)
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_timed_out_read_keeps_late_bytes() {
            // Arrange: data arrives while the first read's slice is still running
            let (mut port, mut master) = pty_port(Duration::from_millis(500));
            let writer = thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                master.write_all(b"AB\n").unwrap();
                master
            });

            // Act: give up on the first read long before the data shows up
            let first = port.read_timeout(1, Duration::from_millis(50)).await;
            let second = port.read_timeout(2, Duration::from_millis(2000)).await;

            // Assert: nothing was swallowed by the abandoned read
            assert!(matches!(first, Err(PortError::Timeout(_))));
            assert_eq!(second.unwrap(), b"AB".to_vec());
            drop(writer.join().unwrap());
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_close_does_not_wait_for_detached_read() {
            let (mut port, _master) = pty_port(Duration::from_millis(1000));

            let result = port.read_timeout(1, Duration::from_millis(20)).await;
            let start = Instant::now();
            port.close();

            assert!(matches!(result, Err(PortError::Timeout(_))));
            assert!(start.elapsed() < Duration::from_millis(250));
            assert!(!port.is_open());
            assert!(matches!(
                port.read_timeout(1, Duration::from_millis(20)).await,
                Err(PortError::NotOpen)
            ));
        }
    }
}
