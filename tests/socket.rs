use assert2::{assert, let_assert};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use comlink::{Role, SocketConfig, SocketTransport, Transport, TransportError};

/// Connect a plain std peer to a transport under test, retrying until the
/// listener is up.
fn connect_peer(port: u16) -> std::net::TcpStream {
	let deadline = Instant::now() + Duration::from_secs(5);
	loop {
		match std::net::TcpStream::connect(("127.0.0.1", port)) {
			Ok(stream) => return stream,
			Err(e) => {
				if Instant::now() > deadline {
					panic!("failed to connect to 127.0.0.1:{}: {}", port, e);
				}
				std::thread::sleep(Duration::from_millis(10));
			},
		}
	}
}

fn server(port: u16, timeout: Duration) -> SocketTransport {
	let config = SocketConfig::new("", port, timeout).unwrap();
	SocketTransport::new(config).unwrap()
}

#[test]
fn fresh_transport_is_closed() {
	let transport = server(17801, Duration::from_secs(1));
	assert!(transport.role() == Role::Server);
	assert!(!transport.is_open());

	// Closing a transport that was never opened still succeeds.
	let_assert!(Ok(()) = transport.close());
	assert!(!transport.is_open());
}

#[test]
fn server_accepts_and_echoes() {
	let transport = server(17802, Duration::from_secs(5));

	let peer = std::thread::spawn(|| {
		let mut stream = connect_peer(17802);
		stream.write_all(b"hello").unwrap();
		let mut echo = [0; 5];
		stream.read_exact(&mut echo).unwrap();
		echo
	});

	let_assert!(Ok(()) = transport.open());
	assert!(transport.is_open());

	let mut buffer = [0; 5];
	let_assert!(Ok(5) = transport.read(&mut buffer));
	assert!(&buffer == b"hello");
	let_assert!(Ok(5) = transport.write(&buffer));

	let echo = peer.join().unwrap();
	assert!(&echo == b"hello");

	let_assert!(Ok(()) = transport.close());
	assert!(!transport.is_open());
}

#[test]
fn client_connects_and_echoes() {
	let listener = std::net::TcpListener::bind(("127.0.0.1", 17803)).unwrap();
	let peer = std::thread::spawn(move || {
		let (mut stream, _) = listener.accept().unwrap();
		let mut request = [0; 4];
		stream.read_exact(&mut request).unwrap();
		stream.write_all(&request).unwrap();
		request
	});

	let config = SocketConfig::new("127.0.0.1", 17803, Duration::from_secs(5)).unwrap();
	let transport = SocketTransport::new(config).unwrap();
	let_assert!(Ok(()) = transport.open());
	assert!(transport.is_open());

	let_assert!(Ok(4) = transport.write(b"ping"));
	let mut response = [0; 4];
	let_assert!(Ok(4) = transport.read(&mut response));
	assert!(&response == b"ping");

	let request = peer.join().unwrap();
	assert!(&request == b"ping");
}

#[test]
fn blocking_read_returns_partial_count_at_the_deadline() {
	let transport = server(17804, Duration::from_secs(5));
	let peer = std::thread::spawn(|| {
		let mut stream = connect_peer(17804);
		stream.write_all(b"abc").unwrap();
		// Keep the connection open but silent while the server waits.
		std::thread::sleep(Duration::from_secs(2));
		drop(stream);
	});

	let_assert!(Ok(()) = transport.open());
	let_assert!(Ok(()) = transport.set_read_timeout(Duration::from_millis(300)));

	// The peer only delivers 3 of the 16 requested bytes; the deadline must
	// cut the read short with the partial count, not an error.
	let start = Instant::now();
	let mut buffer = [0; 16];
	let_assert!(Ok(3) = transport.read(&mut buffer));
	let elapsed = start.elapsed();
	assert!(&buffer[..3] == b"abc");
	assert!(elapsed >= Duration::from_millis(300));
	assert!(elapsed < Duration::from_millis(1500));

	peer.join().unwrap();
}

#[test]
fn blocking_read_from_a_silent_peer_returns_zero() {
	let transport = server(17805, Duration::from_secs(5));
	let peer = std::thread::spawn(|| {
		let stream = connect_peer(17805);
		std::thread::sleep(Duration::from_secs(2));
		drop(stream);
	});

	let_assert!(Ok(()) = transport.open());
	let_assert!(Ok(()) = transport.set_read_timeout(Duration::from_millis(200)));

	let start = Instant::now();
	let mut buffer = [0; 16];
	let_assert!(Ok(0) = transport.read(&mut buffer));
	assert!(start.elapsed() >= Duration::from_millis(200));
	assert!(start.elapsed() < Duration::from_millis(1500));

	peer.join().unwrap();
}

#[test]
fn read_some_without_data_returns_zero_immediately() {
	let transport = server(17806, Duration::from_secs(5));
	let peer = std::thread::spawn(|| {
		let stream = connect_peer(17806);
		std::thread::sleep(Duration::from_millis(500));
		drop(stream);
	});

	let_assert!(Ok(()) = transport.open());

	let start = Instant::now();
	let mut buffer = [0; 16];
	let_assert!(Ok(0) = transport.read_some(&mut buffer));
	assert!(start.elapsed() < Duration::from_millis(100));

	peer.join().unwrap();
}

#[test]
fn abort_interrupts_a_blocking_read_promptly() {
	let transport = Arc::new(server(17807, Duration::from_secs(5)));
	let peer = std::thread::spawn(|| {
		let stream = connect_peer(17807);
		std::thread::sleep(Duration::from_secs(2));
		drop(stream);
	});

	let_assert!(Ok(()) = transport.open());
	let_assert!(Ok(()) = transport.set_read_timeout(Duration::from_secs(10)));

	let aborter = {
		let transport = Arc::clone(&transport);
		std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(200));
			transport.abort();
		})
	};

	// The read is bounded by a 10 second deadline; the abort must end it
	// with a partial (zero) count long before that.
	let start = Instant::now();
	let mut buffer = [0; 16];
	let_assert!(Ok(0) = transport.read(&mut buffer));
	assert!(start.elapsed() >= Duration::from_millis(200));
	assert!(start.elapsed() < Duration::from_secs(2));

	aborter.join().unwrap();
	peer.join().unwrap();
}

#[test]
fn abort_interrupts_a_blocking_accept() {
	let transport = Arc::new(server(17808, Duration::from_secs(10)));

	let aborter = {
		let transport = Arc::clone(&transport);
		std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(200));
			transport.abort();
		})
	};

	let start = Instant::now();
	let_assert!(Err(TransportError::TimedOut) = transport.open());
	assert!(start.elapsed() < Duration::from_secs(2));
	assert!(!transport.is_open());

	aborter.join().unwrap();
}

#[test]
fn server_open_times_out_and_can_rebind() {
	let transport = server(17809, Duration::from_millis(200));

	// Nobody connects: the accept must give up at the open deadline and the
	// listening socket must be gone afterwards.
	let start = Instant::now();
	let_assert!(Err(TransportError::TimedOut) = transport.open());
	assert!(start.elapsed() >= Duration::from_millis(200));
	assert!(start.elapsed() < Duration::from_millis(1500));
	assert!(!transport.is_open());

	// A second open() rebinds from scratch and accepts a late client.
	let_assert!(Ok(()) = transport.set_open_timeout(Duration::from_secs(5)));
	let peer = std::thread::spawn(|| {
		let mut stream = connect_peer(17809);
		stream.write_all(b"late").unwrap();
	});

	let_assert!(Ok(()) = transport.open());
	let mut buffer = [0; 4];
	let_assert!(Ok(4) = transport.read(&mut buffer));
	assert!(&buffer == b"late");

	peer.join().unwrap();
}

#[test]
fn client_open_fails_when_the_peer_refuses() {
	let config = SocketConfig::new("127.0.0.1", 17810, Duration::from_secs(5)).unwrap();
	let transport = SocketTransport::new(config).unwrap();

	// Nothing listens on the port, so the connect is refused.
	let_assert!(Err(_) = transport.open());
	assert!(!transport.is_open());
}

#[test]
fn operations_on_a_closed_transport_report_not_open() {
	let transport = server(17811, Duration::from_secs(1));

	let mut buffer = [0; 4];
	let_assert!(Err(TransportError::NotOpen) = transport.read(&mut buffer));
	let_assert!(Err(TransportError::NotOpen) = transport.write(b"data"));
	let_assert!(Err(TransportError::NotOpen) = transport.read_some(&mut buffer));
	let_assert!(Err(TransportError::NotOpen) = transport.write_some(b"data"));
}

#[test]
fn timeout_setters_reject_zero_without_mutating() {
	let transport = server(17812, Duration::from_millis(750));

	assert!(transport.set_read_timeout(Duration::ZERO).is_err());
	assert!(transport.set_write_timeout(Duration::ZERO).is_err());
	assert!(transport.set_open_timeout(Duration::ZERO).is_err());

	assert!(transport.read_timeout() == Duration::from_millis(750));
	assert!(transport.write_timeout() == Duration::from_millis(750));
	assert!(transport.open_timeout() == Duration::from_millis(750));
}
