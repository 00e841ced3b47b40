//! Scoped open/use/close bracket for a [`TimedPort`].
//!
//! [`TimedPort::session`] opens the transport, hands the open port to a body
//! and closes it again however the body ends: `Ok`, `Err`, a panic, or the
//! session future being dropped part-way through. The release lives in the
//! `Drop` of [`OpenPort`], which the async state machine runs on every one of
//! those paths.

use super::error::PortError;
use super::timed::TimedPort;
use super::traits::Transport;
use futures::future::BoxFuture;
use std::ops::{Deref, DerefMut};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// An open port that closes itself when dropped.
///
/// Obtained from [`TimedPort::open_scoped`]. Derefs to the port, so all
/// reads and writes are available on it.
#[derive(Debug)]
pub struct OpenPort<'a, T: Transport> {
    port: &'a mut TimedPort<T>,
}

impl<T: Transport> Deref for OpenPort<'_, T> {
    type Target = TimedPort<T>;

    fn deref(&self) -> &Self::Target {
        self.port
    }
}

impl<T: Transport> DerefMut for OpenPort<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.port
    }
}

impl<T: Transport> Drop for OpenPort<'_, T> {
    fn drop(&mut self) {
        debug!(port = %self.port.name(), "Releasing scoped port");
        self.port.close();
    }
}

impl<T: Transport> TimedPort<T> {
    /// Open the port for the lifetime of the returned guard.
    ///
    /// The native timeout is disabled right after opening, so deadlines come
    /// only from this crate. If that step fails the port is closed again
    /// before the error is returned.
    pub fn open_scoped(&mut self) -> Result<OpenPort<'_, T>, PortError> {
        self.open()?;
        let guard = OpenPort { port: self };
        guard.port.disable_native_timeout()?;
        Ok(guard)
    }

    /// Run `body` with the port open, closing it afterwards.
    ///
    /// If the port cannot be opened the error is returned, `body` is not
    /// run and nothing is closed.
    ///
    /// # Example
    /// ```
    /// use timed_serial::port::{MockTransport, TimedPort};
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), timed_serial::PortError> {
    /// let mock = MockTransport::new("MOCK0");
    /// mock.enqueue_read(b"OK");
    ///
    /// let mut port = TimedPort::new(mock.clone());
    /// let reply = port
    ///     .session(|port| {
    ///         Box::pin(async move { port.read_timeout(2, Duration::from_millis(50)).await })
    ///     })
    ///     .await?;
    /// assert_eq!(reply, b"OK");
    /// assert!(!port.is_open());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn session<F, R, E>(&mut self, body: F) -> Result<R, E>
    where
        F: for<'p> FnOnce(&'p mut TimedPort<T>) -> BoxFuture<'p, Result<R, E>>,
        E: From<PortError>,
    {
        let mut guard = self.open_scoped()?;
        body(&mut *guard).await
    }

    /// Like [`session`](Self::session), but abandons `body` as soon as
    /// `token` is cancelled and returns [`PortError::Cancelled`]. The port is
    /// closed either way.
    pub async fn session_until<F, R, E>(
        &mut self,
        token: &CancellationToken,
        body: F,
    ) -> Result<R, E>
    where
        F: for<'p> FnOnce(&'p mut TimedPort<T>) -> BoxFuture<'p, Result<R, E>>,
        E: From<PortError>,
    {
        let mut guard = self.open_scoped()?;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PortError::Cancelled.into()),
            result = body(&mut *guard) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scoped_open_closes_on_drop() {
        let mock = MockTransport::new("MOCK0");
        let mut port = TimedPort::new(mock.clone());

        {
            let scoped = port.open_scoped().unwrap();
            assert!(scoped.is_open());
            assert_eq!(mock.native_timeout_disabled_count(), 1);
        }

        assert!(!port.is_open());
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn test_session_body_error_still_closes() {
        let mock = MockTransport::new("MOCK0");
        let mut port = TimedPort::new(mock.clone());

        let result: Result<(), PortError> = port
            .session(|_| Box::pin(async { Err(PortError::config("body failed")) }))
            .await;

        assert!(matches!(result, Err(PortError::Config(_))));
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_skips_body_and_close() {
        let mock = MockTransport::new("MOCK0");
        mock.fail_next_open("permission denied");
        let mut port = TimedPort::new(mock.clone());

        let mut ran = false;
        let result: Result<(), PortError> = port
            .session(|_| {
                ran = true;
                Box::pin(async { Ok(()) })
            })
            .await;

        assert!(matches!(result, Err(PortError::OpenFailed { .. })));
        assert!(!ran);
        assert_eq!(mock.close_count(), 0);
        assert_eq!(mock.native_timeout_disabled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_until_cancel_closes() {
        let mock = MockTransport::new("MOCK0");
        let mut port = TimedPort::new(mock.clone());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result: Result<Vec<u8>, PortError> = port
            .session_until(&token, |port| {
                Box::pin(async move { port.read_timeout(1, Duration::ZERO).await })
            })
            .await;

        assert!(matches!(result, Err(PortError::Cancelled)));
        assert_eq!(mock.close_count(), 1);
        assert!(!port.is_open());
    }

    #[tokio::test]
    async fn test_port_reopens_after_session() {
        let mock = MockTransport::new("MOCK0");
        let mut port = TimedPort::new(mock.clone());

        for _ in 0..2 {
            let _: Result<(), PortError> = port.session(|_| Box::pin(async { Ok(()) })).await;
        }

        assert_eq!(mock.open_count(), 2);
        assert_eq!(mock.close_count(), 2);
    }
}
