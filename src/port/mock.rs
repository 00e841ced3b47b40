//! In-memory transport for testing.
//!
//! `MockTransport` stands in for a device without any hardware. It can be
//! primed with bytes to hand out, paced with a per-byte emit interval, given
//! a bounded sink for writes, and told to fail opens or transfers. Clones
//! share state, so a test can keep a handle for inspection after moving the
//! transport into a port.

use super::error::PortError;
use super::traits::{PortIdentity, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct MockState {
    open: bool,
    open_count: usize,
    close_count: usize,
    native_timeout_disabled: usize,
    baud_rate: u32,

    /// Bytes still to be handed to readers.
    pending_read: VecDeque<u8>,
    /// Bytes accepted from writers.
    received: Vec<u8>,
    /// Maximum number of bytes the sink will ever accept.
    sink_capacity: usize,
    /// Delay before each raw transfer; non-zero also limits it to one byte.
    emit_interval: Duration,

    read_calls: usize,
    write_calls: usize,

    fail_open: Option<String>,
    read_fault: Option<std::io::ErrorKind>,
    write_fault: Option<std::io::ErrorKind>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            open: false,
            open_count: 0,
            close_count: 0,
            native_timeout_disabled: 0,
            baud_rate: 9600,
            pending_read: VecDeque::new(),
            received: Vec::new(),
            sink_capacity: usize::MAX,
            emit_interval: Duration::ZERO,
            read_calls: 0,
            write_calls: 0,
            fail_open: None,
            read_fault: None,
            write_fault: None,
        }
    }
}

/// Mock transport.
///
/// # Example
/// ```
/// use timed_serial::port::{MockTransport, TimedPort};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), timed_serial::PortError> {
/// let mock = MockTransport::new("MOCK0");
/// mock.prepare_read(&[0, 1, 2, 3], Duration::from_millis(1));
///
/// let mut port = TimedPort::new(mock.clone());
/// port.open()?;
/// let data = port.read_timeout(4, Duration::from_millis(100)).await?;
/// assert_eq!(data, vec![0, 1, 2, 3]);
/// port.close();
/// assert_eq!(mock.close_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MockTransport {
    name: String,
    identity: PortIdentity,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a closed mock transport with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: PortIdentity::default(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Give the mock a vendor/product identity.
    pub fn with_identity(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.identity = PortIdentity::new(vendor_id, product_id);
        self
    }

    /// Replace the bytes handed to readers and set the emit interval.
    pub fn prepare_read(&self, data: &[u8], emit_interval: Duration) {
        let mut state = self.state.lock();
        state.pending_read = data.iter().copied().collect();
        state.emit_interval = emit_interval;
    }

    /// Reset the sink to accept at most `capacity` bytes and set the emit
    /// interval.
    pub fn prepare_write(&self, capacity: usize, emit_interval: Duration) {
        let mut state = self.state.lock();
        state.received.clear();
        state.sink_capacity = capacity;
        state.emit_interval = emit_interval;
    }

    /// Append bytes to the read queue.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().pending_read.extend(data);
    }

    /// Everything the sink has accepted since the last `prepare_write`.
    pub fn received(&self) -> Vec<u8> {
        self.state.lock().received.clone()
    }

    /// Make the next `open` fail with the given reason.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.state.lock().fail_open = Some(reason.into());
    }

    /// Make the next raw read fail with an I/O error of this kind.
    pub fn fail_next_read(&self, kind: std::io::ErrorKind) {
        self.state.lock().read_fault = Some(kind);
    }

    /// Make the next raw write fail with an I/O error of this kind.
    pub fn fail_next_write(&self, kind: std::io::ErrorKind) {
        self.state.lock().write_fault = Some(kind);
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// How many times `disable_native_timeout` was called.
    pub fn native_timeout_disabled_count(&self) -> usize {
        self.state.lock().native_timeout_disabled
    }

    /// Number of raw reads issued against this transport.
    pub fn read_calls(&self) -> usize {
        self.state.lock().read_calls
    }

    /// Number of raw writes issued against this transport.
    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    pub fn baud_rate(&self) -> u32 {
        self.state.lock().baud_rate
    }

    /// Bytes still queued for readers.
    pub fn pending_bytes(&self) -> usize {
        self.state.lock().pending_read.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> PortIdentity {
        self.identity
    }

    fn open(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_open.take() {
            return Err(PortError::open_failed(&self.name, reason));
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn set_baud_rate(&mut self, rate: u32) -> Result<(), PortError> {
        if rate == 0 {
            return Err(PortError::config("baud rate must be non-zero"));
        }
        self.state.lock().baud_rate = rate;
        Ok(())
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        let state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        Ok(state.pending_read.len())
    }

    fn disable_native_timeout(&mut self) -> Result<(), PortError> {
        // No native timeout to neutralize; only count the call.
        self.state.lock().native_timeout_disabled += 1;
        Ok(())
    }

    async fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let interval = {
            let mut state = self.state.lock();
            state.read_calls += 1;
            if !state.open {
                return Err(PortError::NotOpen);
            }
            if let Some(kind) = state.read_fault.take() {
                return Err(PortError::Io(std::io::Error::new(kind, "injected read fault")));
            }
            state.emit_interval
        };

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let mut state = self.state.lock();
        let limit = if interval.is_zero() { buffer.len() } else { 1 };
        let mut count = 0;
        while count < limit.min(buffer.len()) {
            match state.pending_read.pop_front() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    async fn write_some(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let interval = {
            let mut state = self.state.lock();
            state.write_calls += 1;
            if !state.open {
                return Err(PortError::NotOpen);
            }
            if let Some(kind) = state.write_fault.take() {
                return Err(PortError::Io(std::io::Error::new(kind, "injected write fault")));
            }
            state.emit_interval
        };

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let mut state = self.state.lock();
        let room = state.sink_capacity.saturating_sub(state.received.len());
        let limit = if interval.is_zero() { data.len() } else { 1 };
        let count = limit.min(data.len()).min(room);
        state.received.extend_from_slice(&data[..count]);
        Ok(count)
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .field("pending_bytes", &self.pending_bytes())
            .finish()
    }
}
