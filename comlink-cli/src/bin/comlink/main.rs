use std::io::Write;
use std::time::Duration;

use comlink::{FlowControl, Parity, SerialConfig, SerialTransport, SocketConfig, SocketTransport, StopBits, Transport};

mod logging;
mod options;

use options::{Command, Options};

fn main() {
	if let Err(()) = do_main(clap::Parser::parse()) {
		std::process::exit(1);
	}
}

fn do_main(options: Options) -> Result<(), ()> {
	logging::init(module_path!(), options.verbose as i8);

	let timeout = Duration::from_millis(options.timeout);
	let transport: Box<dyn Transport> = match &options.command {
		Command::Serial {
			device,
			baud_rate,
			data_bits,
			stop_bits,
			parity,
			flow_control,
		} => {
			let mut config = SerialConfig::new(device.clone(), *baud_rate).map_err(|e| log::error!("{}", e))?;
			config.set_data_bits(*data_bits).map_err(|e| log::error!("{}", e))?;
			config.set_stop_bits(StopBits::from_u8(*stop_bits).map_err(|e| log::error!("{}", e))?);
			config.set_parity(Parity::from_char(*parity).map_err(|e| log::error!("{}", e))?);
			config.set_flow_control(FlowControl::from_char(*flow_control).map_err(|e| log::error!("{}", e))?);
			config.set_read_timeout(timeout).map_err(|e| log::error!("{}", e))?;
			config.set_write_timeout(timeout).map_err(|e| log::error!("{}", e))?;
			let transport = SerialTransport::new(config).map_err(|e| log::error!("failed to create the transport: {}", e))?;
			Box::new(transport)
		},
		Command::Socket {
			address,
			port,
			open_timeout,
		} => {
			let mut config = SocketConfig::new(address, *port, timeout).map_err(|e| log::error!("{}", e))?;
			config
				.set_open_timeout(Duration::from_millis(*open_timeout))
				.map_err(|e| log::error!("{}", e))?;
			if address.is_empty() {
				log::info!("waiting for an inbound connection on port {}", port);
			}
			let transport = SocketTransport::new(config).map_err(|e| log::error!("failed to create the transport: {}", e))?;
			Box::new(transport)
		},
	};

	transport
		.open()
		.map_err(|e| log::error!("failed to open the transport: {}", e))?;

	log::info!("transport open; empty input ends the session");
	let result = session(&*transport);

	transport
		.close()
		.map_err(|e| log::error!("failed to close the transport: {}", e))?;
	result
}

/// Line-oriented echo session: transmit each stdin line, then print whatever
/// the peer sends back until a read deadline passes without data.
fn session(transport: &dyn Transport) -> Result<(), ()> {
	let stdin = std::io::stdin();
	let mut stdout = std::io::stdout();
	let mut line = String::new();
	let mut buffer = [0; 128];

	loop {
		print!("Tx: ");
		stdout.flush().map_err(|e| log::error!("{}", e))?;

		line.clear();
		let end_of_input = stdin.read_line(&mut line).map_err(|e| log::error!("{}", e))? == 0;
		let message = line.trim_end_matches(['\r', '\n']);
		if end_of_input || message.is_empty() {
			return Ok(());
		}

		let sent = transport
			.write(message.as_bytes())
			.map_err(|e| log::error!("failed to transmit: {}", e))?;
		if sent != message.len() {
			log::warn!("incomplete transmission: {} of {} bytes", sent, message.len());
		}

		print!("Rx: ");
		stdout.flush().map_err(|e| log::error!("{}", e))?;
		loop {
			let received = transport
				.read(&mut buffer)
				.map_err(|e| log::error!("failed to receive: {}", e))?;
			if received == 0 {
				break;
			}
			stdout.write_all(&buffer[..received]).map_err(|e| log::error!("{}", e))?;
			stdout.flush().map_err(|e| log::error!("{}", e))?;
		}
		println!();
	}
}
