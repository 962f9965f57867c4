/// An error caused by an invalid configuration value.
///
/// Configuration errors are reported by constructors and setters.
/// A failed setter never modifies the previously configured value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
	/// The device name is empty.
	InvalidDevice,
	/// The baud rate is zero.
	InvalidBaudRate,
	/// The number of data bits is outside the supported 5..=8 range.
	InvalidDataBits(u8),
	/// The stop bits value is not 1, 2 or 3 (3 encodes 1.5 stop bits).
	InvalidStopBits(u8),
	/// The parity character is not one of `e`, `o` or `n`.
	InvalidParity(char),
	/// The flow control character is not one of `h`, `s` or `n`.
	InvalidFlowControl(char),
	/// The timeout is zero.
	InvalidTimeout,
	/// The peer address is not empty and not a valid IPv4 address.
	InvalidAddress(String),
}

/// An error reported by a transport operation.
///
/// A deadline expiry or an [`abort()`][crate::Transport::abort] during a
/// blocking read or write is deliberately *not* an error: those calls return
/// the (possibly zero) partial byte count instead.
#[derive(Debug)]
pub enum TransportError {
	/// The transport is not open.
	NotOpen,
	/// The connection was closed by the peer or the device disappeared.
	Disconnected,
	/// An `open()` did not complete before its deadline or was aborted.
	TimedOut,
	/// The operating system reported an error.
	Io(std::io::Error),
}

impl std::error::Error for ConfigError {}
impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
	fn from(other: std::io::Error) -> Self {
		Self::Io(other)
	}
}

impl From<std::io::ErrorKind> for TransportError {
	fn from(other: std::io::ErrorKind) -> Self {
		Self::Io(other.into())
	}
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidDevice => write!(f, "invalid device name: must not be empty"),
			Self::InvalidBaudRate => write!(f, "invalid baud rate: must be greater than zero"),
			Self::InvalidDataBits(bits) => write!(f, "invalid data bits: expected a value in 5..=8, got {}", bits),
			Self::InvalidStopBits(bits) => write!(f, "invalid stop bits: expected 1, 2 or 3 (for 1.5), got {}", bits),
			Self::InvalidParity(c) => write!(f, "invalid parity: expected 'e', 'o' or 'n', got {:?}", c),
			Self::InvalidFlowControl(c) => write!(f, "invalid flow control: expected 'h', 's' or 'n', got {:?}", c),
			Self::InvalidTimeout => write!(f, "invalid timeout: must be greater than zero"),
			Self::InvalidAddress(addr) => write!(f, "invalid IPv4 address: {:?}", addr),
		}
	}
}

impl std::fmt::Display for TransportError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::NotOpen => write!(f, "the transport is not open"),
			Self::Disconnected => write!(f, "the connection was closed by the other side"),
			Self::TimedOut => write!(f, "the operation did not complete before the deadline"),
			Self::Io(e) => write!(f, "{}", e),
		}
	}
}
