//! Deadline-bounded byte transports over serial lines and TCP sockets.
//!
//! This crate exposes one capability set, the [`Transport`] trait, with two
//! implementations: [`SerialTransport`] for serial lines and
//! [`SocketTransport`] for TCP connections in either server or client role.
//!
//! Every transport offers non-blocking transfers ([`Transport::read_some`],
//! [`Transport::write_some`]) and blocking transfers with an enforced upper
//! bound ([`Transport::read`], [`Transport::write`]). Blocking calls race the
//! underlying I/O against a deadline inside a private, single-threaded event
//! loop; [`Transport::abort`] can interrupt them from another thread.
//!
//! A deadline expiry or an abort is not an error: the interrupted call
//! returns the number of bytes that were moved before it was cut short,
//! which may be zero. The error channel is reserved for unrecoverable
//! transport failures.
//!
//! ```no_run
//! use comlink::{SerialConfig, SerialTransport, Transport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SerialConfig::new("/dev/ttyUSB0", 9600)?;
//! let port = SerialTransport::new(config)?;
//! port.open()?;
//!
//! port.write(b"AT\r\n")?;
//! let mut response = [0; 64];
//! let received = port.read(&mut response)?;
//! println!("{:?}", &response[..received]);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod log;

mod error;
mod serial;
mod socket;
mod sys;
mod transport;
mod wait;

pub use error::ConfigError;
pub use error::TransportError;
pub use serial::{FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
pub use socket::{Role, SocketConfig, SocketTransport};
pub use transport::Transport;
