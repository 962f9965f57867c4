//! Serial line transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mio::{Interest, Waker};

use crate::sys;
use crate::wait::{self, Reactor};
use crate::{ConfigError, Transport, TransportError};

/// Number of stop bits on the serial line.
///
/// The integer round-trip encodes 1.5 stop bits as `3`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StopBits {
	One,
	OnePointFive,
	Two,
}

/// Parity checking mode of the serial line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Parity {
	Even,
	Odd,
	None,
}

/// Flow control mode of the serial line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlowControl {
	Hardware,
	Software,
	None,
}

impl StopBits {
	/// Parse the integer encoding: `1`, `2`, or `3` for 1.5 stop bits.
	pub fn from_u8(raw: u8) -> Result<Self, ConfigError> {
		match raw {
			1 => Ok(Self::One),
			2 => Ok(Self::Two),
			3 => Ok(Self::OnePointFive),
			other => Err(ConfigError::InvalidStopBits(other)),
		}
	}

	/// The integer encoding: `1`, `2`, or `3` for 1.5 stop bits.
	pub fn as_u8(self) -> u8 {
		match self {
			Self::One => 1,
			Self::Two => 2,
			Self::OnePointFive => 3,
		}
	}
}

impl Parity {
	/// Parse the character encoding: `e`, `o` or `n`, case-insensitive.
	pub fn from_char(raw: char) -> Result<Self, ConfigError> {
		match raw {
			'e' | 'E' => Ok(Self::Even),
			'o' | 'O' => Ok(Self::Odd),
			'n' | 'N' => Ok(Self::None),
			other => Err(ConfigError::InvalidParity(other)),
		}
	}

	/// The character encoding: `e`, `o` or `n`.
	pub fn as_char(self) -> char {
		match self {
			Self::Even => 'e',
			Self::Odd => 'o',
			Self::None => 'n',
		}
	}
}

impl FlowControl {
	/// Parse the character encoding: `h`, `s` or `n`, case-insensitive.
	pub fn from_char(raw: char) -> Result<Self, ConfigError> {
		match raw {
			'h' | 'H' => Ok(Self::Hardware),
			's' | 'S' => Ok(Self::Software),
			'n' | 'N' => Ok(Self::None),
			other => Err(ConfigError::InvalidFlowControl(other)),
		}
	}

	/// The character encoding: `h`, `s` or `n`.
	pub fn as_char(self) -> char {
		match self {
			Self::Hardware => 'h',
			Self::Software => 's',
			Self::None => 'n',
		}
	}
}

/// Validated configuration of a serial line.
///
/// Every setter validates its value independently; a rejected value leaves
/// the previously configured one untouched. Changes made while the transport
/// is open take effect at the next [`open()`][Transport::open].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SerialConfig {
	device: String,
	baud_rate: u32,
	data_bits: u8,
	stop_bits: StopBits,
	parity: Parity,
	flow_control: FlowControl,
	read_timeout: Duration,
	write_timeout: Duration,
}

impl SerialConfig {
	/// Create a configuration for the given device and baud rate.
	///
	/// The remaining parameters start at 8 data bits, 1 stop bit, no parity,
	/// hardware flow control and a one second timeout for blocking reads and
	/// writes.
	pub fn new(device: impl Into<String>, baud_rate: u32) -> Result<Self, ConfigError> {
		let mut config = Self {
			device: String::new(),
			baud_rate: 1,
			data_bits: 8,
			stop_bits: StopBits::One,
			parity: Parity::None,
			flow_control: FlowControl::Hardware,
			read_timeout: Duration::from_secs(1),
			write_timeout: Duration::from_secs(1),
		};
		config.set_device(device)?;
		config.set_baud_rate(baud_rate)?;
		Ok(config)
	}

	/// The device name, for example `/dev/ttyUSB0` or `COM1`.
	pub fn device(&self) -> &str {
		&self.device
	}

	/// Set the device name. An empty name is rejected.
	pub fn set_device(&mut self, device: impl Into<String>) -> Result<(), ConfigError> {
		let device = device.into();
		if device.is_empty() {
			return Err(ConfigError::InvalidDevice);
		}
		self.device = device;
		Ok(())
	}

	pub fn baud_rate(&self) -> u32 {
		self.baud_rate
	}

	/// Set the baud rate. Zero is rejected.
	pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), ConfigError> {
		if baud_rate == 0 {
			return Err(ConfigError::InvalidBaudRate);
		}
		self.baud_rate = baud_rate;
		Ok(())
	}

	pub fn data_bits(&self) -> u8 {
		self.data_bits
	}

	/// Set the number of data bits. Values outside 5..=8 are rejected.
	pub fn set_data_bits(&mut self, data_bits: u8) -> Result<(), ConfigError> {
		if !(5..=8).contains(&data_bits) {
			return Err(ConfigError::InvalidDataBits(data_bits));
		}
		self.data_bits = data_bits;
		Ok(())
	}

	pub fn stop_bits(&self) -> StopBits {
		self.stop_bits
	}

	pub fn set_stop_bits(&mut self, stop_bits: StopBits) {
		self.stop_bits = stop_bits;
	}

	pub fn parity(&self) -> Parity {
		self.parity
	}

	pub fn set_parity(&mut self, parity: Parity) {
		self.parity = parity;
	}

	pub fn flow_control(&self) -> FlowControl {
		self.flow_control
	}

	pub fn set_flow_control(&mut self, flow_control: FlowControl) {
		self.flow_control = flow_control;
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

/// [`Transport`] implementation over a serial line.
///
/// Opening takes exclusive access to the device on platforms that support it
/// and applies the five line parameters as a unit: a line that cannot be
/// fully configured is closed again, never left half-configured.
pub struct SerialTransport {
	inner: Mutex<Inner>,
	waker: Waker,
	aborted: AtomicBool,
}

struct Inner {
	config: SerialConfig,
	reactor: Reactor,
	port: Option<serial2::SerialPort>,
}

impl SerialTransport {
	/// Create a closed transport from a validated configuration.
	///
	/// The serial device itself is not touched until [`open()`][Transport::open].
	pub fn new(config: SerialConfig) -> std::io::Result<Self> {
		let reactor = Reactor::new()?;
		let waker = Waker::new(reactor.registry(), wait::ABORT)?;
		Ok(Self {
			inner: Mutex::new(Inner {
				config,
				reactor,
				port: None,
			}),
			waker,
			aborted: AtomicBool::new(false),
		})
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// The configured device name.
	pub fn device(&self) -> String {
		self.lock().config.device().to_owned()
	}

	/// Set the device name for the next open. An empty name is rejected.
	pub fn set_device(&self, device: impl Into<String>) -> Result<(), ConfigError> {
		self.lock().config.set_device(device)
	}

	pub fn baud_rate(&self) -> u32 {
		self.lock().config.baud_rate()
	}

	/// Set the baud rate for the next open. Zero is rejected.
	pub fn set_baud_rate(&self, baud_rate: u32) -> Result<(), ConfigError> {
		self.lock().config.set_baud_rate(baud_rate)
	}

	pub fn data_bits(&self) -> u8 {
		self.lock().config.data_bits()
	}

	/// Set the number of data bits for the next open.
	pub fn set_data_bits(&self, data_bits: u8) -> Result<(), ConfigError> {
		self.lock().config.set_data_bits(data_bits)
	}

	pub fn stop_bits(&self) -> StopBits {
		self.lock().config.stop_bits()
	}

	pub fn set_stop_bits(&self, stop_bits: StopBits) {
		self.lock().config.set_stop_bits(stop_bits)
	}

	pub fn parity(&self) -> Parity {
		self.lock().config.parity()
	}

	pub fn set_parity(&self, parity: Parity) {
		self.lock().config.set_parity(parity)
	}

	pub fn flow_control(&self) -> FlowControl {
		self.lock().config.flow_control()
	}

	pub fn set_flow_control(&self, flow_control: FlowControl) {
		self.lock().config.set_flow_control(flow_control)
	}

	/// Discard the pending bytes in both kernel buffers of the serial line.
	pub fn flush(&self) -> Result<(), TransportError> {
		let inner = self.lock();
		let port = inner.port.as_ref().ok_or(TransportError::NotOpen)?;
		port.discard_buffers()?;
		Ok(())
	}
}

/// Translate the configured line parameters into `serial2` settings.
///
/// 1.5 stop bits has no representation in the line discipline on this
/// backend, so applying it fails, which in turn fails the open.
fn apply_line_settings(settings: &mut serial2::Settings, config: &SerialConfig) -> std::io::Result<()> {
	settings.set_raw();
	settings.set_baud_rate(config.baud_rate())?;
	settings.set_char_size(match config.data_bits() {
		5 => serial2::CharSize::Bits5,
		6 => serial2::CharSize::Bits6,
		7 => serial2::CharSize::Bits7,
		8 => serial2::CharSize::Bits8,
		bits => {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				format!("unsupported number of data bits: {}", bits),
			))
		},
	});
	settings.set_stop_bits(match config.stop_bits() {
		StopBits::One => serial2::StopBits::One,
		StopBits::Two => serial2::StopBits::Two,
		StopBits::OnePointFive => {
			return Err(std::io::Error::new(
				std::io::ErrorKind::Unsupported,
				"1.5 stop bits is not supported on this platform",
			))
		},
	});
	settings.set_parity(match config.parity() {
		Parity::Even => serial2::Parity::Even,
		Parity::Odd => serial2::Parity::Odd,
		Parity::None => serial2::Parity::None,
	});
	settings.set_flow_control(match config.flow_control() {
		FlowControl::Hardware => serial2::FlowControl::RtsCts,
		FlowControl::Software => serial2::FlowControl::XonXoff,
		FlowControl::None => serial2::FlowControl::None,
	});
	Ok(())
}

impl Transport for SerialTransport {
	fn open(&self) -> Result<(), TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;

		// An already open line is closed and reopened from scratch.
		inner.port = None;

		let config = inner.config.clone();
		let device = config.device().to_owned();
		let port = serial2::SerialPort::open(&device, move |mut settings: serial2::Settings| {
			apply_line_settings(&mut settings, &config)?;
			Ok(settings)
		})?;

		// Dropping `port` on any failure below closes the line again, so an
		// unlockable or unconfigurable line is never left open.
		let handle = sys::handle(&port);
		sys::lock_exclusive(handle)?;
		sys::set_nonblocking(handle)?;

		debug!("opened serial device {}", inner.config.device());
		inner.port = Some(port);
		Ok(())
	}

	fn close(&self) -> Result<(), TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		if inner.port.take().is_some() {
			debug!("closed serial device {}", inner.config.device());
		}
		Ok(())
	}

	fn is_open(&self) -> bool {
		self.lock().port.is_some()
	}

	fn read_some(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
		let guard = self.lock();
		let inner = &*guard;
		let port = inner.port.as_ref().ok_or(TransportError::NotOpen)?;
		let handle = sys::handle(port);

		// The serial primitive has no native non-blocking read, so only
		// transfer when the kernel queue already holds data.
		if sys::input_queue_len(handle)? == 0 {
			return Ok(0);
		}
		match sys::read(handle, buffer) {
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
			Err(e) => Err(e.into()),
		}
	}

	fn write_some(&self, buffer: &[u8]) -> Result<usize, TransportError> {
		let guard = self.lock();
		let inner = &*guard;
		let port = inner.port.as_ref().ok_or(TransportError::NotOpen)?;
		let handle = sys::handle(port);

		// A non-empty output queue means the line is still draining; report
		// "nothing accepted" rather than risking a short or blocking write.
		if sys::output_queue_len(handle)? > 0 {
			return Ok(0);
		}
		match sys::write(handle, buffer) {
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
			Err(e) => Err(e.into()),
		}
	}

	fn read(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		self.aborted.store(false, Ordering::SeqCst);

		let port = inner.port.as_ref().ok_or(TransportError::NotOpen)?;
		let handle = sys::handle(port);
		let deadline = Instant::now() + inner.config.read_timeout();

		sys::register(inner.reactor.registry(), handle, wait::IO, Interest::READABLE)?;
		let result = wait::transfer_deadline(&mut inner.reactor, deadline, &self.aborted, buffer.len(), |total| {
			sys::read(handle, &mut buffer[total..])
		});
		let _ = sys::deregister(inner.reactor.registry(), handle);

		trace!("blocking read moved {:?} of {} bytes", result, buffer.len());
		result
	}

	fn write(&self, buffer: &[u8]) -> Result<usize, TransportError> {
		let mut guard = self.lock();
		let inner = &mut *guard;
		self.aborted.store(false, Ordering::SeqCst);

		let port = inner.port.as_ref().ok_or(TransportError::NotOpen)?;
		let handle = sys::handle(port);
		let deadline = Instant::now() + inner.config.write_timeout();

		sys::register(inner.reactor.registry(), handle, wait::IO, Interest::WRITABLE)?;
		let result = wait::transfer_deadline(&mut inner.reactor, deadline, &self.aborted, buffer.len(), |total| {
			sys::write(handle, &buffer[total..])
		});
		let _ = sys::deregister(inner.reactor.registry(), handle);

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

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;

	#[test]
	fn stop_bits_round_trip() {
		assert!(StopBits::from_u8(1) == Ok(StopBits::One));
		assert!(StopBits::from_u8(2) == Ok(StopBits::Two));
		assert!(StopBits::from_u8(3) == Ok(StopBits::OnePointFive));
		assert!(StopBits::from_u8(0) == Err(ConfigError::InvalidStopBits(0)));
		for raw in [1, 2, 3] {
			assert!(StopBits::from_u8(raw).unwrap().as_u8() == raw);
		}
	}

	#[test]
	fn parity_round_trip() {
		assert!(Parity::from_char('e') == Ok(Parity::Even));
		assert!(Parity::from_char('O') == Ok(Parity::Odd));
		assert!(Parity::from_char('n') == Ok(Parity::None));
		assert!(Parity::from_char('x') == Err(ConfigError::InvalidParity('x')));
		for raw in ['e', 'o', 'n'] {
			assert!(Parity::from_char(raw).unwrap().as_char() == raw);
		}
	}

	#[test]
	fn flow_control_round_trip() {
		assert!(FlowControl::from_char('H') == Ok(FlowControl::Hardware));
		assert!(FlowControl::from_char('s') == Ok(FlowControl::Software));
		assert!(FlowControl::from_char('n') == Ok(FlowControl::None));
		assert!(FlowControl::from_char('q') == Err(ConfigError::InvalidFlowControl('q')));
		for raw in ['h', 's', 'n'] {
			assert!(FlowControl::from_char(raw).unwrap().as_char() == raw);
		}
	}

	#[test]
	fn config_rejects_invalid_values_without_mutating() {
		let mut config = SerialConfig::new("/dev/ttyUSB0", 9600).unwrap();

		assert!(config.set_device("") == Err(ConfigError::InvalidDevice));
		assert!(config.device() == "/dev/ttyUSB0");

		assert!(config.set_baud_rate(0) == Err(ConfigError::InvalidBaudRate));
		assert!(config.baud_rate() == 9600);

		assert!(config.set_data_bits(9) == Err(ConfigError::InvalidDataBits(9)));
		assert!(config.set_data_bits(4) == Err(ConfigError::InvalidDataBits(4)));
		assert!(config.data_bits() == 8);

		assert!(config.set_read_timeout(Duration::ZERO) == Err(ConfigError::InvalidTimeout));
		assert!(config.read_timeout() == Duration::from_secs(1));

		assert!(config.set_write_timeout(Duration::ZERO) == Err(ConfigError::InvalidTimeout));
		assert!(config.write_timeout() == Duration::from_secs(1));
	}

	#[test]
	fn config_rejects_invalid_construction() {
		assert!(SerialConfig::new("", 9600) == Err(ConfigError::InvalidDevice));
		assert!(SerialConfig::new("/dev/ttyS0", 0) == Err(ConfigError::InvalidBaudRate));
	}

	#[test]
	fn config_accepts_one_point_five_stop_bits() {
		let mut config = SerialConfig::new("COM1", 115200).unwrap();
		config.set_stop_bits(StopBits::OnePointFive);
		assert!(config.stop_bits().as_u8() == 3);
	}
}
