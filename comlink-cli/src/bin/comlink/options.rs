use clap::Parser;

/// Interactive terminal for serial lines and TCP connections.
///
/// Lines typed on stdin are transmitted through the selected transport and
/// the response is printed, until an empty line ends the session.
#[derive(Parser)]
pub struct Options {
	/// Print more messages. Can be used multiple times.
	#[arg(long, short, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Timeout in milliseconds for blocking reads and writes.
	#[arg(long, global = true, default_value = "1000")]
	pub timeout: u64,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
	/// Talk over a serial line.
	Serial {
		/// The serial device to use.
		#[arg(long, short)]
		#[cfg_attr(target_os = "windows", arg(default_value = "COM1"))]
		#[cfg_attr(not(target_os = "windows"), arg(default_value = "/dev/ttyUSB0"))]
		device: String,

		/// The baud rate of the line.
		#[arg(long, short, default_value = "38400")]
		baud_rate: u32,

		/// The number of data bits (5 to 8).
		#[arg(long, default_value = "8")]
		data_bits: u8,

		/// The number of stop bits: 1, 2 or 3 for 1.5 stop bits.
		#[arg(long, default_value = "1")]
		stop_bits: u8,

		/// The parity: 'e', 'o' or 'n'.
		#[arg(long, default_value = "n")]
		parity: char,

		/// The flow control: 'h', 's' or 'n'.
		#[arg(long, default_value = "h")]
		flow_control: char,
	},

	/// Talk over a TCP connection.
	Socket {
		/// The peer IPv4 address to connect to.
		///
		/// Leave empty to accept one inbound connection instead.
		#[arg(long, short, default_value = "")]
		address: String,

		/// The TCP port to connect to or listen on.
		#[arg(long, short)]
		port: u16,

		/// Timeout in milliseconds for opening the connection.
		#[arg(long, default_value = "10000")]
		open_timeout: u64,
	},
}
