//! Platform adapter for the serial transport.
//!
//! The serial primitive has no native "try without blocking" transfer, so the
//! non-blocking emulation needs the kernel queue lengths of the line, and
//! `open()` needs exclusive access to the device. Both are platform calls
//! that have no place in the transport logic, so they live behind this
//! adapter, selected at build time. On platforms without an implementation
//! every query fails, which the transports surface as an operation error.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::*;

#[cfg(not(unix))]
mod unsupported;
#[cfg(not(unix))]
pub(crate) use unsupported::*;
