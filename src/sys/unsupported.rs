use std::io;

use mio::{Interest, Registry, Token};

/// Raw OS handle of a serial line. No-op on this platform.
pub(crate) type Handle = ();

pub(crate) fn handle(_port: &serial2::SerialPort) -> Handle {}

fn unsupported() -> io::Error {
	io::Error::new(io::ErrorKind::Unsupported, "serial transport is not supported on this platform")
}

pub(crate) fn input_queue_len(_handle: Handle) -> io::Result<usize> {
	Err(unsupported())
}

pub(crate) fn output_queue_len(_handle: Handle) -> io::Result<usize> {
	Err(unsupported())
}

/// Exclusive access is not available; opening proceeds without it.
pub(crate) fn lock_exclusive(_handle: Handle) -> io::Result<()> {
	Ok(())
}

pub(crate) fn set_nonblocking(_handle: Handle) -> io::Result<()> {
	Err(unsupported())
}

pub(crate) fn read(_handle: Handle, _buffer: &mut [u8]) -> io::Result<usize> {
	Err(unsupported())
}

pub(crate) fn write(_handle: Handle, _buffer: &[u8]) -> io::Result<usize> {
	Err(unsupported())
}

pub(crate) fn register(_registry: &Registry, _handle: Handle, _token: Token, _interest: Interest) -> io::Result<()> {
	Err(unsupported())
}

pub(crate) fn deregister(_registry: &Registry, _handle: Handle) -> io::Result<()> {
	Err(unsupported())
}
