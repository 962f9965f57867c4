use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};

/// Raw OS handle of a serial line.
pub(crate) type Handle = RawFd;

pub(crate) fn handle(port: &serial2::SerialPort) -> Handle {
	port.as_raw_fd()
}

/// Number of received bytes sitting in the kernel input queue.
pub(crate) fn input_queue_len(handle: Handle) -> io::Result<usize> {
	let mut count: libc::c_int = 0;
	// SAFETY: FIONREAD writes a single c_int through the provided pointer.
	let result = unsafe { libc::ioctl(handle, libc::FIONREAD as _, &mut count) };
	if result < 0 {
		Err(io::Error::last_os_error())
	} else {
		Ok(count as usize)
	}
}

/// Number of not-yet-transmitted bytes sitting in the kernel output queue.
pub(crate) fn output_queue_len(handle: Handle) -> io::Result<usize> {
	let mut count: libc::c_int = 0;
	// SAFETY: TIOCOUTQ writes a single c_int through the provided pointer.
	let result = unsafe { libc::ioctl(handle, libc::TIOCOUTQ as _, &mut count) };
	if result < 0 {
		Err(io::Error::last_os_error())
	} else {
		Ok(count as usize)
	}
}

/// Take exclusive access to the serial line.
///
/// `TIOCEXCL` blocks further opens of the device node, `flock()` keeps
/// processes that already hold an open descriptor from sharing the line.
/// The lock is tied to the descriptor and vanishes when the port is closed.
pub(crate) fn lock_exclusive(handle: Handle) -> io::Result<()> {
	// SAFETY: both calls only operate on the descriptor itself.
	unsafe {
		if libc::ioctl(handle, libc::TIOCEXCL as _) != 0 {
			return Err(io::Error::last_os_error());
		}
		if libc::flock(handle, libc::LOCK_EX | libc::LOCK_NB) != 0 {
			return Err(io::Error::last_os_error());
		}
	}
	Ok(())
}

/// Switch the descriptor to non-blocking mode.
pub(crate) fn set_nonblocking(handle: Handle) -> io::Result<()> {
	// SAFETY: fcntl with F_GETFL/F_SETFL does not touch memory.
	unsafe {
		let flags = libc::fcntl(handle, libc::F_GETFL);
		if flags < 0 {
			return Err(io::Error::last_os_error());
		}
		if libc::fcntl(handle, libc::F_SETFL, flags | libc::O_NONBLOCK) != 0 {
			return Err(io::Error::last_os_error());
		}
	}
	Ok(())
}

/// Non-blocking read on the raw descriptor.
pub(crate) fn read(handle: Handle, buffer: &mut [u8]) -> io::Result<usize> {
	// SAFETY: the kernel writes at most `buffer.len()` bytes into `buffer`.
	let result = unsafe { libc::read(handle, buffer.as_mut_ptr().cast(), buffer.len()) };
	if result < 0 {
		Err(io::Error::last_os_error())
	} else {
		Ok(result as usize)
	}
}

/// Non-blocking write on the raw descriptor.
pub(crate) fn write(handle: Handle, buffer: &[u8]) -> io::Result<usize> {
	// SAFETY: the kernel reads at most `buffer.len()` bytes from `buffer`.
	let result = unsafe { libc::write(handle, buffer.as_ptr().cast(), buffer.len()) };
	if result < 0 {
		Err(io::Error::last_os_error())
	} else {
		Ok(result as usize)
	}
}

/// Register the descriptor with the instance reactor for one blocking call.
pub(crate) fn register(registry: &Registry, handle: Handle, token: Token, interest: Interest) -> io::Result<()> {
	registry.register(&mut SourceFd(&handle), token, interest)
}

/// Undo [`register()`] after the blocking call finished.
pub(crate) fn deregister(registry: &Registry, handle: Handle) -> io::Result<()> {
	registry.deregister(&mut SourceFd(&handle))
}
