//! Port abstraction layer for serial communication.
//!
//! [`Transport`] is the raw, best-effort byte channel each backend provides.
//! [`TimedPort`] layers exact-count, deadline-bounded transfers on top of
//! it, [`TimedPort::session`] brackets use between open and close, and
//! [`SharedPort`] runs operations as runtime tasks.

pub mod async_port;
pub mod deferred;
pub mod error;
pub mod mock;
pub mod session;
pub mod sync_port;
pub mod timed;
pub mod traits;

pub use async_port::TokioSerialTransport;
pub use deferred::{Deferred, SharedPort};
pub use error::{ErrorKind, PortError};
pub use mock::MockTransport;
pub use session::OpenPort;
pub use sync_port::{SyncSerialTransport, DEFAULT_NATIVE_POLL_SLICE};
pub use timed::{DefaultTimeouts, TimedPort, DEFAULT_POLL_INTERVAL};
pub use traits::*;
