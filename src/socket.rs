//! TCP socket transport, in server or client role.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Waker};

use crate::wait::{self, Reactor, Wait};
use crate::{ConfigError, Transport, TransportError};

/// Role of a socket transport, derived from the configured address.
///
/// An empty address selects the server role: `open()` listens on the
/// configured port and accepts exactly one inbound connection. Any parseable
/// IPv4 address selects the client role: `open()` connects outward.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
	Server,
	Client(Ipv4Addr),
}

/// Validated configuration of a TCP socket transport.
///
/// Every setter validates its value independently; a rejected value leaves
/// the previously configured one untouched. Changes made while the transport
/// is open take effect at the next [`open()`][Transport::open].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SocketConfig {
	role: Role,
	port: u16,
	open_timeout: Duration,
	read_timeout: Duration,
	write_timeout: Duration,
}

impl SocketConfig {
	/// Create a configuration for the given address and port.
	///
	/// An empty `address` selects the server role. `timeout` bounds blocking
	/// opens, reads and writes alike; the three can be adjusted separately
	/// afterwards.
	pub fn new(address: &str, port: u16, timeout: Duration) -> Result<Self, ConfigError> {
		let mut config = Self {
			role: Role::Server,
			port,
			open_timeout: Duration::from_secs(1),
			read_timeout: Duration::from_secs(1),
			write_timeout: Duration::from_secs(1),
		};
		config.set_address(address)?;
		config.set_open_timeout(timeout)?;
		config.set_read_timeout(timeout)?;
		config.set_write_timeout(timeout)?;
		Ok(config)
	}

	pub fn role(&self) -> Role {
		self.role
	}

	/// The configured peer address, or the empty string in server role.
	pub fn address(&self) -> String {
		match self.role {
			Role::Server => String::new(),
			Role::Client(address) => address.to_string(),
		}
	}

	/// Set the peer address and thereby the role.
	///
	/// An empty string selects the server role, a valid IPv4 address selects
	/// the client role. Anything else is rejected and the previous role and
	/// address stay in effect.
	pub fn set_address(&mut self, address: &str) -> Result<(), ConfigError> {
		if address.is_empty() {
			self.role = Role::Server;
			return Ok(());
		}
		match address.parse() {
			Ok(address) => {
				self.role = Role::Client(address);
				Ok(())
			},
			Err(_) => Err(ConfigError::InvalidAddress(address.to_owned())),
		}
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Set the TCP port to listen on or connect to.
	pub fn set_port(&mut self, port: u16) {
		self.port = port;
	}

	pub fn open_timeout(&self) -> Duration {
		self.open_timeout
	}

	/// Set the timeout for blocking opens. Zero is rejected.
	pub fn set_open_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
		if timeout.is_zero() {
			return Err(ConfigError::InvalidTimeout);
		}
		self.open_timeout = timeout;
		Ok(())
	}

	pub fn read_timeout(&self) -> Duration {
		self.read_timeout
	}

	/// Set the timeout for blocking reads. Zero is rejected.
	pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
		if timeout.is_zero() {
			return Err(ConfigError::InvalidTimeout);
		}
		self.read_timeout = timeout;
		Ok(())
	}

	pub fn write_timeout(&self) -> Duration {
		self.write_timeout
	}

	/// Set the timeout for blocking writes. Zero is rejected.
	pub fn set_write_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
		if timeout.is_zero() {
			return Err(ConfigError::InvalidTimeout);
		}
		self.write_timeout = timeout;
		Ok(())
	}
}

/// [`Transport`] implementation over a TCP connection.
///
/// In server role `open()` binds the configured port with address reuse,
/// accepts exactly one connection within the open timeout and closes the
/// listening socket again either way; a later `open()` rebinds from scratch.
/// In client role `open()` performs a deadline-bounded connect. Either way
/// the resulting connection runs in native non-blocking mode.
pub struct SocketTransport {
	inner: Mutex<Inner>,
	waker: Waker,
	aborted: AtomicBool,
}

struct Inner {
	config: SocketConfig,
	reactor: Reactor,
	stream: Option<TcpStream>,
}

impl SocketTransport {
	/// Create a closed transport from a validated configuration.
	///
	/// No socket is created until [`open()`][Transport::open].
	pub fn new(config: SocketConfig) -> std::io::Result<Self> {
		let reactor = Reactor::new()?;
		let waker = Waker::new(reactor.registry(), wait::ABORT)?;
		Ok(Self {
			inner: Mutex::new(Inner {
				config,
				reactor,
				stream: None,
			}),
			waker,
			aborted: AtomicBool::new(false),
		})
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// The configured role.
	pub fn role(&self) -> Role {
		self.lock().config.role()
	}

	/// The configured peer address, or the empty string in server role.
	pub fn address(&self) -> String {
		self.lock().config.address()
	}

	/// Set the peer address (and role) for the next open.
	///
	/// See [`SocketConfig::set_address`].
	pub fn set_address(&self, address: &str) -> Result<(), ConfigError> {
		self.lock().config.set_address(address)
	}

	pub fn port(&self) -> u16 {
		self.lock().config.port()
	}

	/// Set the TCP port for the next open.
	pub fn set_port(&self, port: u16) {
		self.lock().config.set_port(port)
	}

	pub fn open_timeout(&self) -> Duration {
		self.lock().config.open_timeout()
	}

	/// Set the timeout bounding blocking opens. Zero is rejected.
	pub fn set_open_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
		self.lock().config.set_open_timeout(timeout)
	}
}

/// Bind and listen on the configured port, then accept exactly one
/// connection. The listening socket is closed when this returns, whether the
/// accept succeeded or not.
fn accept_one(inner: &mut Inner, deadline: Instant, aborted: &AtomicBool) -> Result<TcpStream, TransportError> {
	// mio sets SO_REUSEADDR on the listener, so a closed acceptor does not
	// keep the port unavailable for the next open().
	let bind_address = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, inner.config.port()));
	let mut listener = TcpListener::bind(bind_address)?;
	inner.reactor.registry().register(&mut listener, wait::IO, Interest::READABLE)?;

	let result = loop {
		match listener.accept() {
			Ok((stream, peer)) => {
				debug!("accepted connection from {}", peer);
				break Ok(stream);
			},
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => (),
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(e) => break Err(TransportError::Io(e)),
		}
		match inner.reactor.wait(deadline, aborted) {
			Ok(Wait::Ready) => (),
			Ok(Wait::TimedOut) | Ok(Wait::Aborted) => break Err(TransportError::TimedOut),
			Err(e) => break Err(TransportError::Io(e)),
		}
	};

	// Single-use acceptor: dropping the listener closes it no matter how the
	// accept went.
	let _ = inner.reactor.registry().deregister(&mut listener);
	result
}

/// Deadline-bounded connect to the configured peer.
fn connect(inner: &mut Inner, address: Ipv4Addr, deadline: Instant, aborted: &AtomicBool) -> Result<TcpStream, TransportError> {
	let peer = SocketAddr::V4(SocketAddrV4::new(address, inner.config.port()));
	let mut stream = TcpStream::connect(peer)?;
	inner.reactor.registry().register(&mut stream, wait::IO, Interest::WRITABLE)?;

	let result = loop {
		match inner.reactor.wait(deadline, aborted) {
			Ok(Wait::Ready) => (),
			Ok(Wait::TimedOut) | Ok(Wait::Aborted) => break Err(TransportError::TimedOut),
			Err(e) => break Err(TransportError::Io(e)),
		}
		// Writability alone does not mean the connect succeeded; check for a
		// pending socket error first, then for an established peer.
		match stream.take_error() {
			Ok(None) => (),
			Ok(Some(e)) => break Err(TransportError::Io(e)),
			Err(e) => break Err(TransportError::Io(e)),
		}
		match stream.peer_addr() {
			Ok(peer) => {
				debug!("connected to {}", peer);
				break Ok(());
			},
			Err(e) if e.kind() == std::io::ErrorKind::NotConnected => (),
			Err(e) => break Err(TransportError::Io(e)),
		}
	};

	let _ = inner.reactor.registry().deregister(&mut stream);
	result.map(|()| stream)
}

impl Transport for SocketTransport {
	fn open(&self) -> Result<(), TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		self.aborted.store(false, Ordering::SeqCst);

		// An already open connection is closed and replaced.
		inner.stream = None;

		let deadline = Instant::now() + inner.config.open_timeout();
		let stream = match inner.config.role() {
			Role::Server => accept_one(inner, deadline, &self.aborted)?,
			Role::Client(address) => connect(inner, address, deadline, &self.aborted)?,
		};

		// mio streams run in native non-blocking mode from the start, which
		// is what read_some/write_some rely on.
		inner.stream = Some(stream);
		Ok(())
	}

	fn close(&self) -> Result<(), TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		if inner.stream.take().is_some() {
			debug!("closed connection on port {}", inner.config.port());
		}
		Ok(())
	}

	fn is_open(&self) -> bool {
		self.lock().stream.is_some()
	}

	fn read_some(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		let stream = inner.stream.as_mut().ok_or(TransportError::NotOpen)?;

		match stream.read(buffer) {
			Ok(0) if !buffer.is_empty() => Err(TransportError::Disconnected),
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
			Err(e) => Err(e.into()),
		}
	}

	fn write_some(&self, buffer: &[u8]) -> Result<usize, TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		let stream = inner.stream.as_mut().ok_or(TransportError::NotOpen)?;

		match stream.write(buffer) {
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
			Err(e) => Err(e.into()),
		}
	}

	fn read(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		self.aborted.store(false, Ordering::SeqCst);

		let stream = inner.stream.as_mut().ok_or(TransportError::NotOpen)?;
		let deadline = Instant::now() + inner.config.read_timeout();

		inner.reactor.registry().register(stream, wait::IO, Interest::READABLE)?;
		let result = {
			let stream = &*stream;
			wait::transfer_deadline(&mut inner.reactor, deadline, &self.aborted, buffer.len(), |total| {
				(&mut &*stream).read(&mut buffer[total..])
			})
		};
		let _ = inner.reactor.registry().deregister(stream);

		trace!("blocking read moved {:?} of {} bytes", result, buffer.len());
		result
	}

	fn write(&self, buffer: &[u8]) -> Result<usize, TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		self.aborted.store(false, Ordering::SeqCst);

		let stream = inner.stream.as_mut().ok_or(TransportError::NotOpen)?;
		let deadline = Instant::now() + inner.config.write_timeout();

		inner.reactor.registry().register(stream, wait::IO, Interest::WRITABLE)?;
		let result = {
			let stream = &*stream;
			wait::transfer_deadline(&mut inner.reactor, deadline, &self.aborted, buffer.len(), |total| {
				(&mut &*stream).write(&buffer[total..])
			})
		};
		let _ = inner.reactor.registry().deregister(stream);

		trace!("blocking write moved {:?} of {} bytes", result, buffer.len());
		result
	}

	fn abort(&self) {
		self.aborted.store(true, Ordering::SeqCst);
		let _ = self.waker.wake();
	}

	fn read_timeout(&self) -> Duration {
		self.lock().config.read_timeout()
	}

	fn set_read_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
		self.lock().config.set_read_timeout(timeout)
	}

	fn write_timeout(&self) -> Duration {
		self.lock().config.write_timeout()
	}

	fn set_write_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
		self.lock().config.set_write_timeout(timeout)
	}
}
