//! Submit reads and writes to a Tokio runtime and collect the results later.
//!
//! [`SharedPort`] owns a [`TimedPort`] behind an async mutex. Each submitted
//! operation becomes a task on the runtime handle passed in and is returned
//! as a [`Deferred`] handle that can be awaited or cancelled. Submissions
//! queue on the mutex; no ordering between them is promised.

use super::error::PortError;
use super::timed::{DefaultTimeouts, TimedPort};
use super::traits::Transport;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::trace;

/// Eventual result of a submitted port operation.
///
/// Awaiting yields the operation's result, or [`PortError::Cancelled`] if
/// [`cancel`](Self::cancel) stopped it first. Dropping the handle does not
/// stop the operation.
#[derive(Debug)]
#[must_use = "a Deferred does nothing unless awaited or cancelled"]
pub struct Deferred<T> {
    task: JoinHandle<Result<T, PortError>>,
}

impl<T: Send + 'static> Deferred<T> {
    fn spawn<F>(handle: &Handle, op: F) -> Self
    where
        F: Future<Output = Result<T, PortError>> + Send + 'static,
    {
        Self {
            task: handle.spawn(op),
        }
    }

    /// Stop the operation at its next suspension point. The port stays open.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, PortError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_cancelled() => Poll::Ready(Err(PortError::Cancelled)),
            Poll::Ready(Err(e)) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

/// A port that accepts operations from many tasks.
pub struct SharedPort<T> {
    inner: Arc<Mutex<TimedPort<T>>>,
    defaults: Arc<DefaultTimeouts>,
    name: String,
}

impl<T> Clone for SharedPort<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            defaults: Arc::clone(&self.defaults),
            name: self.name.clone(),
        }
    }
}

impl<T: Transport + 'static> SharedPort<T> {
    pub fn new(port: TimedPort<T>) -> Self {
        let defaults = port.shared_defaults();
        let name = port.name().to_string();
        Self {
            inner: Arc::new(Mutex::new(port)),
            defaults,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the timeouts used by [`read`](Self::read) and
    /// [`write`](Self::write). Already submitted operations are unaffected.
    pub fn set_default_timeouts(&self, read: Duration, write: Duration) {
        self.defaults.set(read, write);
    }

    pub fn default_timeouts(&self) -> (Duration, Duration) {
        (self.defaults.read(), self.defaults.write())
    }

    /// Exclusive access to the port, e.g. to open or close it.
    pub async fn lock(&self) -> MutexGuard<'_, TimedPort<T>> {
        self.inner.lock().await
    }

    /// Recover the port once no other handle exists.
    pub fn try_unwrap(self) -> Result<TimedPort<T>, Self> {
        let Self {
            inner,
            defaults,
            name,
        } = self;
        match Arc::try_unwrap(inner) {
            Ok(mutex) => Ok(mutex.into_inner()),
            Err(inner) => Err(Self {
                inner,
                defaults,
                name,
            }),
        }
    }

    /// Submit a read of `count` bytes with the current default timeout.
    pub fn read(&self, count: usize, handle: &Handle) -> Deferred<Vec<u8>> {
        self.read_timeout(count, self.defaults.read(), handle)
    }

    /// Submit a read of exactly `count` bytes within `timeout`.
    ///
    /// The deadline starts once the operation holds the port, not at
    /// submission.
    pub fn read_timeout(
        &self,
        count: usize,
        timeout: Duration,
        handle: &Handle,
    ) -> Deferred<Vec<u8>> {
        trace!(port = %self.name, count, ?timeout, "Submitting read");
        let inner = Arc::clone(&self.inner);
        Deferred::spawn(handle, async move {
            let mut port = inner.lock().await;
            port.read_timeout(count, timeout).await
        })
    }

    /// Submit a write with the current default timeout.
    pub fn write(&self, data: impl Into<Vec<u8>>, handle: &Handle) -> Deferred<usize> {
        self.write_timeout(data, self.defaults.write(), handle)
    }

    /// Submit a write of all of `data` within `timeout`.
    pub fn write_timeout(
        &self,
        data: impl Into<Vec<u8>>,
        timeout: Duration,
        handle: &Handle,
    ) -> Deferred<usize> {
        let data = data.into();
        trace!(port = %self.name, bytes = data.len(), ?timeout, "Submitting write");
        let inner = Arc::clone(&self.inner);
        Deferred::spawn(handle, async move {
            let mut port = inner.lock().await;
            port.write_timeout(&data, timeout).await
        })
    }
}

impl<T> std::fmt::Debug for SharedPort<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPort")
            .field("name", &self.name)
            .field("read_timeout", &self.defaults.read())
            .field("write_timeout", &self.defaults.write())
            .finish()
    }
}
