//! The deadline-bounded operation pattern shared by both transports.
//!
//! Each transport instance owns a private [`Reactor`]: a single-threaded
//! [`mio::Poll`] that is only ever driven from inside a blocking
//! open/read/write call. A blocking call registers its OS handle, then loops
//! on [`Reactor::wait`], which races three sources against each other:
//! readiness of the handle, expiry of the deadline (the poll timeout is the
//! one-shot timer) and a cross-thread wake-up from `abort()`.
//!
//! The tie-break is fixed: a deadline expiry or an abort never surfaces as an
//! error from a blocking transfer, only as a lower (possibly zero) byte
//! count. The two interruption sources are deliberately indistinguishable to
//! the caller.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use mio::{Events, Poll, Registry, Token};

use crate::TransportError;

/// Token for the OS handle driven by the current blocking call.
pub(crate) const IO: Token = Token(0);

/// Token for the waker that `abort()` fires.
pub(crate) const ABORT: Token = Token(1);

/// Why [`Reactor::wait`] returned.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Wait {
	/// The registered handle is ready; attempt the transfer.
	Ready,
	/// The deadline passed before the handle became ready.
	TimedOut,
	/// `abort()` was called while the wait was in progress.
	Aborted,
}

/// Private, per-instance event loop for deadline-bounded blocking calls.
pub(crate) struct Reactor {
	poll: Poll,
	events: Events,
}

impl Reactor {
	pub(crate) fn new() -> io::Result<Self> {
		Ok(Self {
			poll: Poll::new()?,
			events: Events::with_capacity(8),
		})
	}

	/// The registry to register the per-call OS handle (and the instance waker) with.
	pub(crate) fn registry(&self) -> &Registry {
		self.poll.registry()
	}

	/// Block until the handle registered as [`IO`] is ready, the deadline
	/// passes, or `aborted` is raised through the instance waker.
	///
	/// Wake-ups left over from an abort that targeted an earlier call are
	/// ignored: only a wake-up with `aborted` still raised counts. The flag
	/// is cleared by the blocking call before it starts waiting, so an abort
	/// issued before that point may have no effect.
	pub(crate) fn wait(&mut self, deadline: Instant, aborted: &AtomicBool) -> io::Result<Wait> {
		loop {
			if aborted.load(Ordering::SeqCst) {
				return Ok(Wait::Aborted);
			}

			let timeout = match deadline.checked_duration_since(Instant::now()) {
				Some(timeout) => timeout,
				None => return Ok(Wait::TimedOut),
			};

			match self.poll.poll(&mut self.events, Some(timeout)) {
				Ok(()) => (),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}

			if self.events.is_empty() {
				return Ok(Wait::TimedOut);
			}

			let mut ready = false;
			for event in self.events.iter() {
				match event.token() {
					IO => ready = true,
					ABORT => {
						if aborted.load(Ordering::SeqCst) {
							return Ok(Wait::Aborted);
						}
						// Stale wake-up from an abort aimed at an earlier
						// call; keep waiting.
					},
					_ => (),
				}
			}

			if ready {
				return Ok(Wait::Ready);
			}
		}
	}
}

/// Drive a non-blocking transfer to completion, bounded by a deadline.
///
/// `transfer` is called with the number of bytes already moved and attempts
/// to move the remainder without blocking. The handle behind `transfer` must
/// be registered with the reactor as [`IO`] before calling this.
///
/// Moves bytes until `len` is reached, then returns `Ok(len)`. A deadline
/// expiry or an abort stops the transfer and returns the partial count. A
/// transfer that reports zero progress while the handle was ready means the
/// other side is gone.
pub(crate) fn transfer_deadline<F>(
	reactor: &mut Reactor,
	deadline: Instant,
	aborted: &AtomicBool,
	len: usize,
	mut transfer: F,
) -> Result<usize, TransportError>
where
	F: FnMut(usize) -> io::Result<usize>,
{
	let mut total = 0;
	while total < len {
		// Attempt the transfer before waiting: readiness that predates the
		// registration would otherwise never produce an event.
		match transfer(total) {
			Ok(0) => return Err(TransportError::Disconnected),
			Ok(n) => {
				total += n;
				continue;
			},
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => (),
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e.into()),
		}

		match reactor.wait(deadline, aborted)? {
			Wait::Ready => (),
			Wait::TimedOut | Wait::Aborted => break,
		}
	}
	Ok(total)
}
