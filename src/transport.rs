use std::time::Duration;

use crate::{ConfigError, TransportError};

/// Byte-oriented communication channel with deadline-bounded blocking I/O.
///
/// The trait is object safe, so callers that must not hardcode the transport
/// can hold a `Box<dyn Transport>` or `Arc<dyn Transport>`.
///
/// All operations take `&self` and are serialized by a per-instance lock:
/// only one call executes at a time, a second caller blocks until the first
/// returns. The single exception is [`abort()`][Self::abort], which never
/// takes the lock so that it can interrupt a blocking call from another
/// thread. An abort issued just before a blocking call begins may have no
/// effect.
pub trait Transport: Send + Sync {
	/// Acquire the underlying OS resource.
	///
	/// An already open transport is closed first and reopened from scratch.
	/// On failure no resource is leaked.
	fn open(&self) -> Result<(), TransportError>;

	/// Release the underlying OS resource if it is held.
	///
	/// Closing a transport that is not open succeeds.
	fn close(&self) -> Result<(), TransportError>;

	/// Check whether the transport is currently open.
	fn is_open(&self) -> bool;

	/// Non-blocking read.
	///
	/// Returns the bytes that are available right now, up to `buffer.len()`.
	/// Returns `Ok(0)` when no data is available. Never waits for data.
	fn read_some(&self, buffer: &mut [u8]) -> Result<usize, TransportError>;

	/// Non-blocking write.
	///
	/// Returns the number of bytes accepted immediately, which is `Ok(0)`
	/// when the transport cannot currently take data. Never waits.
	fn write_some(&self, buffer: &[u8]) -> Result<usize, TransportError>;

	/// Blocking read of exactly `buffer.len()` bytes, bounded by the read timeout.
	///
	/// Blocks until the buffer is filled, the read deadline elapses or the
	/// call is aborted. Returns the number of bytes actually transferred,
	/// which is lower than `buffer.len()` if the deadline or an abort cut
	/// the transfer short. Only an unrecoverable transport failure is an error.
	fn read(&self, buffer: &mut [u8]) -> Result<usize, TransportError>;

	/// Blocking write of exactly `buffer.len()` bytes, bounded by the write timeout.
	///
	/// The same contract as [`read()`][Self::read], with the write deadline.
	fn write(&self, buffer: &[u8]) -> Result<usize, TransportError>;

	/// Request cancellation of the blocking open/read/write currently in flight.
	///
	/// A no-op when no blocking call is executing. May be called from any
	/// thread; it does not take the instance lock. The interrupted call
	/// returns its partial byte count, indistinguishable from a deadline
	/// expiry.
	fn abort(&self);

	/// Get the timeout bounding blocking reads.
	fn read_timeout(&self) -> Duration;

	/// Set the timeout bounding blocking reads.
	///
	/// A zero timeout is rejected and leaves the previous value in place.
	fn set_read_timeout(&self, timeout: Duration) -> Result<(), ConfigError>;

	/// Get the timeout bounding blocking writes.
	fn write_timeout(&self) -> Duration;

	/// Set the timeout bounding blocking writes.
	///
	/// A zero timeout is rejected and leaves the previous value in place.
	fn set_write_timeout(&self, timeout: Duration) -> Result<(), ConfigError>;
}
