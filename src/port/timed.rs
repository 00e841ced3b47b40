//! Timeout-governed reads and writes over a raw [`Transport`].
//!
//! A transport only promises best-effort transfers: a raw read may return a
//! few bytes, or none, and never gives up on its own. `TimedPort` turns that
//! into all-or-nothing operations: a read returns exactly the requested
//! number of bytes, a write reports the full input length, and anything
//! short of that within the deadline is a [`PortError::Timeout`].
//!
//! A zero timeout means "no deadline".

use super::error::PortError;
use super::traits::{PortIdentity, Transport};
use crate::config::SerialConfig;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Back-off applied after a raw transfer that made no progress.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Per-port default read and write timeouts.
///
/// Shared between a port and its async facade so the facade can capture the
/// current defaults when an operation is submitted.
#[derive(Debug, Default)]
pub struct DefaultTimeouts {
    read_nanos: AtomicU64,
    write_nanos: AtomicU64,
}

impl DefaultTimeouts {
    pub fn read(&self) -> Duration {
        Duration::from_nanos(self.read_nanos.load(Ordering::Relaxed))
    }

    pub fn write(&self) -> Duration {
        Duration::from_nanos(self.write_nanos.load(Ordering::Relaxed))
    }

    pub fn set(&self, read: Duration, write: Duration) {
        self.read_nanos.store(as_nanos(read), Ordering::Relaxed);
        self.write_nanos.store(as_nanos(write), Ordering::Relaxed);
    }
}

/// Stored at full precision so a sub-millisecond default stays a deadline.
fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// A serial port with exact-count, deadline-bounded transfers.
///
/// The port starts closed. Default timeouts start at zero (wait forever)
/// and survive `open`/`close`.
#[derive(Debug)]
pub struct TimedPort<T> {
    transport: T,
    defaults: Arc<DefaultTimeouts>,
    poll_interval: Duration,
}

impl<T: Transport> TimedPort<T> {
    /// Wrap a (closed) transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            defaults: Arc::new(DefaultTimeouts::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how long to back off after a raw transfer that moved no bytes.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Apply default timeouts and poll interval from configuration.
    pub fn configure(&mut self, config: &SerialConfig) {
        self.set_default_timeouts(config.read_timeout(), config.write_timeout());
        self.poll_interval = config.poll_interval();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn identity(&self) -> PortIdentity {
        self.transport.identity()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub(crate) fn shared_defaults(&self) -> Arc<DefaultTimeouts> {
        Arc::clone(&self.defaults)
    }

    /// Open the underlying transport.
    ///
    /// Opening an open port is refused with [`PortError::AlreadyOpen`] and
    /// leaves the transport untouched.
    pub fn open(&mut self) -> Result<(), PortError> {
        if self.transport.is_open() {
            return Err(PortError::AlreadyOpen);
        }
        self.transport.open()?;
        info!(port = %self.name(), "Port opened");
        Ok(())
    }

    /// Close the underlying transport if it is open.
    pub fn close(&mut self) {
        if self.transport.is_open() {
            self.transport.close();
            info!(port = %self.name(), "Port closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn set_baud_rate(&mut self, rate: u32) -> Result<(), PortError> {
        self.transport.set_baud_rate(rate)
    }

    pub fn bytes_available(&self) -> Result<usize, PortError> {
        self.transport.bytes_available()
    }

    pub fn disable_native_timeout(&mut self) -> Result<(), PortError> {
        self.transport.disable_native_timeout()
    }

    /// Current `(read, write)` default timeouts.
    pub fn default_timeouts(&self) -> (Duration, Duration) {
        (self.defaults.read(), self.defaults.write())
    }

    /// Set the timeouts used by [`read`](Self::read) and
    /// [`write`](Self::write). Operations already running keep the value
    /// they started with.
    pub fn set_default_timeouts(&self, read: Duration, write: Duration) {
        self.defaults.set(read, write);
    }

    /// Read exactly `count` bytes using the default read timeout.
    ///
    /// The default is captured here, when the call is made, not when the
    /// returned future is first polled.
    pub fn read(
        &mut self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<u8>, PortError>> + '_ {
        let timeout = self.defaults.read();
        self.read_timeout(count, timeout)
    }

    /// Read exactly `count` bytes within `timeout` (zero: no deadline).
    ///
    /// Bytes received before a timeout are discarded; the caller never sees
    /// a short buffer.
    pub async fn read_timeout(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, PortError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.ensure_open()?;

        let mut buffer = vec![0u8; count];
        let mut filled = 0;
        let poll = self.poll_interval;
        let result = within(
            timeout,
            fill(&mut self.transport, &mut buffer, &mut filled, poll),
        )
        .await;

        match result {
            Ok(()) => {
                debug!(port = %self.name(), bytes = count, "Read complete");
                Ok(buffer)
            }
            Err(e) => {
                self.log_failure("read", count, filled, &e);
                Err(e)
            }
        }
    }

    /// Like [`read_timeout`](Self::read_timeout), but aborts with
    /// [`PortError::Cancelled`] as soon as `token` is cancelled.
    pub async fn read_cancellable(
        &mut self,
        count: usize,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, PortError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PortError::Cancelled),
            result = self.read_timeout(count, timeout) => result,
        }
    }

    /// Write all of `data` using the default write timeout, captured when
    /// the call is made.
    pub fn write<'a>(
        &'a mut self,
        data: &'a [u8],
    ) -> impl Future<Output = Result<usize, PortError>> + 'a {
        let timeout = self.defaults.write();
        self.write_timeout(data, timeout)
    }

    /// Write all of `data` within `timeout` (zero: no deadline).
    ///
    /// Returns `data.len()` on success. After a timeout some prefix of
    /// `data` may already have reached the device; how much is unspecified.
    pub async fn write_timeout(
        &mut self,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, PortError> {
        if data.is_empty() {
            return Ok(0);
        }
        self.ensure_open()?;

        let mut sent = 0;
        let poll = self.poll_interval;
        let result = within(timeout, drain(&mut self.transport, data, &mut sent, poll)).await;

        match result {
            Ok(()) => {
                debug!(port = %self.name(), bytes = data.len(), "Write complete");
                Ok(data.len())
            }
            Err(e) => {
                self.log_failure("write", data.len(), sent, &e);
                Err(e)
            }
        }
    }

    /// Like [`write_timeout`](Self::write_timeout), but aborts with
    /// [`PortError::Cancelled`] as soon as `token` is cancelled.
    pub async fn write_cancellable(
        &mut self,
        data: &[u8],
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<usize, PortError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PortError::Cancelled),
            result = self.write_timeout(data, timeout) => result,
        }
    }

    fn ensure_open(&self) -> Result<(), PortError> {
        if self.transport.is_open() {
            Ok(())
        } else {
            Err(PortError::NotOpen)
        }
    }

    fn log_failure(&self, op: &str, requested: usize, moved: usize, err: &PortError) {
        if err.is_timeout() {
            debug!(port = %self.name(), op, requested, moved, "Transfer timed out");
        } else {
            warn!(port = %self.name(), op, requested, moved, error = %err, "Transfer failed");
        }
    }
}

/// Run `op` under a deadline; a zero timeout means none.
async fn within<F, R>(timeout: Duration, op: F) -> Result<R, PortError>
where
    F: Future<Output = Result<R, PortError>>,
{
    if timeout.is_zero() {
        return op.await;
    }
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(PortError::timeout(timeout)),
    }
}

/// Fill `buffer` completely from raw reads. `filled` tracks progress so it
/// survives the future being dropped at the deadline.
async fn fill<T: Transport + ?Sized>(
    transport: &mut T,
    buffer: &mut [u8],
    filled: &mut usize,
    poll: Duration,
) -> Result<(), PortError> {
    while *filled < buffer.len() {
        match transport.read_some(&mut buffer[*filled..]).await {
            Ok(0) => idle(poll).await,
            Ok(n) => {
                *filled += n.min(buffer.len() - *filled);
                trace!(chunk = n, filled = *filled, "Raw read");
            }
            Err(e) if e.is_transient() => idle(poll).await,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Push all of `data` through raw writes.
async fn drain<T: Transport + ?Sized>(
    transport: &mut T,
    data: &[u8],
    sent: &mut usize,
    poll: Duration,
) -> Result<(), PortError> {
    while *sent < data.len() {
        match transport.write_some(&data[*sent..]).await {
            Ok(0) => idle(poll).await,
            Ok(n) => {
                *sent += n.min(data.len() - *sent);
                trace!(chunk = n, sent = *sent, "Raw write");
            }
            Err(e) if e.is_transient() => idle(poll).await,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn idle(poll: Duration) {
    if poll.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(poll).await;
    }
}
