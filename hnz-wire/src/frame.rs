use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hnz_utils::error::Result;
use log::{debug, error, info, warn};

/// The largest HNZ frame this core will read or write, including the address
/// and control bytes.
pub const MAX_FRAME_LEN: usize = 255;

/// A single HNZ frame as handed up from the framing layer: byte 0 is the link
/// address, byte 1 is the control field, and anything past that is the
/// application payload.
#[derive(Clone, Copy)]
pub struct Frame {
	pub len: u16,
	pub bytes: [u8; MAX_FRAME_LEN],
}

impl Frame {
	pub fn from_slice(data: &[u8]) -> Self {
		let mut bytes = [0u8; MAX_FRAME_LEN];
		let len = data.len().min(MAX_FRAME_LEN);
		bytes[..len].copy_from_slice(&data[..len]);
		Self { len: len as u16, bytes }
	}

	pub fn payload(&self) -> &[u8] {
		&self.bytes[..self.len as usize]
	}

	/// The control byte (byte 1), or `0` for a frame too short to have one.
	pub fn control(&self) -> u8 {
		self.bytes.get(1).copied().unwrap_or(0)
	}
}

/// The narrow, external contract this core relies on for raw framing: reading
/// and writing one HNZ frame at a time over a transport this core does not
/// otherwise concern itself with. A production deployment backs this with the
/// real HDLC flag/stuffing/CRC framing library; this crate ships only the
/// loopback-TCP stand-in below (`TcpFrameCodec`) so the rest of the core is
/// runnable without that external dependency.
pub trait FrameCodec: Send {
	/// Starts listening on `port` and spawns the codec's own accept thread.
	/// Returns immediately; connectedness is observed via `is_connected`.
	fn start(&mut self, port: u16) -> Result;

	/// Tears down the listener and any connected peer, then joins the accept
	/// thread. Bounded: abandons a stuck accept thread after 10s rather than
	/// hanging shutdown forever.
	fn stop(&mut self);

	fn is_connected(&self) -> bool;

	/// Blocks for an implementation-chosen IO timeout. Returns `None` if no
	/// frame arrived in that window but the connection is still alive.
	fn receive_frame(&mut self) -> Option<Frame>;

	fn check_crc(&self, frame: &Frame) -> bool;

	/// Prepends `addr`, appends a CRC trailer, and writes the frame.
	fn send_frame(&mut self, addr: u8, payload: &[u8]) -> Result;
}

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_TIMEOUT: Duration = Duration::from_millis(500);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

struct Shared {
	stream: Mutex<Option<TcpStream>>,
	running: AtomicBool,
}

/// A concrete, non-normative `FrameCodec`: length-prefixed frames
/// (2-byte big-endian length, then address + control/payload bytes, then a
/// 1-byte additive checksum trailer) over a plain `TcpListener`/`TcpStream`.
///
/// This is not a claim about the real HNZ wire format — HDLC flag/stuffing/
/// CRC framing is outside this core's scope (§1) — it exists purely so
/// `PathEndpoint` and `DualPathServer` are runnable and testable over
/// loopback TCP.
pub struct TcpFrameCodec {
	shared: Arc<Shared>,
	accept_thread: Option<JoinHandle<()>>,
}

impl Default for TcpFrameCodec {
	fn default() -> Self {
		Self {
			shared: Arc::new(Shared { stream: Mutex::new(None), running: AtomicBool::new(false) }),
			accept_thread: None,
		}
	}
}

impl TcpFrameCodec {
	pub fn new() -> Self {
		Self::default()
	}
}

fn checksum(bytes: &[u8]) -> u8 {
	bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

impl FrameCodec for TcpFrameCodec {
	fn start(&mut self, port: u16) -> Result {
		let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|err| error!("Failed to bind TCP listener on port {port}: {err}"))?;

		listener.set_nonblocking(true).map_err(|err| error!("Failed to set listener non-blocking: {err}"))?;

		self.shared.running.store(true, Ordering::SeqCst);

		let shared = self.shared.clone();

		self.accept_thread = Some(thread::spawn(move || {
			info!("Listening for a peer on port {port}");

			while shared.running.load(Ordering::SeqCst) {
				match listener.accept() {
					Ok((stream, peer)) => {
						info!("Accepted connection from {peer}");

						if let Err(err) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
							warn!("Failed to set read timeout: {err}");
						}

						*shared.stream.lock().expect("Stream mutex poisoned") = Some(stream);
						// This path accepts exactly one peer; reconnection requires a full restart.
						break;
					}
					Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
					Err(err) => {
						error!("Accept failed on port {port}: {err}");
						break;
					}
				}
			}
		}));

		Ok(())
	}

	fn stop(&mut self) {
		self.shared.running.store(false, Ordering::SeqCst);

		if let Some(stream) = self.shared.stream.lock().expect("Stream mutex poisoned").take() {
			let _ = stream.shutdown(std::net::Shutdown::Both);
		}

		if let Some(handle) = self.accept_thread.take() {
			let shared = self.shared.clone();
			let (done_tx, done_rx) = std::sync::mpsc::channel();

			thread::spawn(move || {
				let _ = handle.join();
				let _ = done_tx.send(());
				drop(shared);
			});

			if done_rx.recv_timeout(JOIN_TIMEOUT).is_err() {
				warn!("Accept thread did not join within {JOIN_TIMEOUT:?}, abandoning it");
			}
		}
	}

	fn is_connected(&self) -> bool {
		self.shared.stream.lock().expect("Stream mutex poisoned").is_some()
	}

	fn receive_frame(&mut self) -> Option<Frame> {
		let mut guard = self.shared.stream.lock().expect("Stream mutex poisoned");
		let stream = guard.as_mut()?;

		let mut len_buf = [0u8; 2];

		match stream.read_exact(&mut len_buf) {
			Ok(()) => {}
			Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => return None,
			Err(err) => {
				debug!("Connection lost while reading frame length: {err}");
				*guard = None;
				return None;
			}
		}

		let len = u16::from_be_bytes(len_buf) as usize;

		if len == 0 || len > MAX_FRAME_LEN {
			warn!("Received implausible frame length {len}, dropping connection");
			*guard = None;
			return None;
		}

		let mut body = vec![0u8; len + 1];

		if let Err(err) = stream.read_exact(&mut body) {
			debug!("Connection lost while reading frame body: {err}");
			*guard = None;
			return None;
		}

		let (payload, trailer) = body.split_at(len);
		let mut bytes = [0u8; MAX_FRAME_LEN];
		bytes[..len].copy_from_slice(payload);

		let mut frame = Frame { len: len as u16, bytes };
		// Stash the trailer right after the payload for check_crc to re-derive.
		if len < MAX_FRAME_LEN {
			frame.bytes[len] = trailer[0];
		}

		Some(frame)
	}

	fn check_crc(&self, frame: &Frame) -> bool {
		let len = frame.len as usize;

		if len >= MAX_FRAME_LEN {
			return false;
		}

		checksum(&frame.bytes[..len]) == frame.bytes[len]
	}

	fn send_frame(&mut self, addr: u8, payload: &[u8]) -> Result {
		let mut guard = self.shared.stream.lock().expect("Stream mutex poisoned");
		let Some(stream) = guard.as_mut() else {
			warn!("Attempted to send a frame with no connected peer");
			return Err(());
		};

		let mut body = Vec::with_capacity(payload.len() + 2);
		body.push(addr);
		body.extend_from_slice(payload);
		body.push(checksum(&body));

		let len = (body.len() as u16).to_be_bytes();

		let write = stream
			.write_all(&len)
			.and_then(|()| stream.write_all(&body))
			.and_then(|()| stream.flush());

		if let Err(err) = write {
			warn!("Failed to send frame: {err}");
			*guard = None;
			return Err(());
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::net::TcpStream as StdStream;

	use super::*;

	fn free_port() -> u16 {
		TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
	}

	#[test]
	fn sends_and_receives_a_round_trip_frame() {
		let port = free_port();
		let mut server = TcpFrameCodec::new();
		server.start(port).unwrap();

		let client = loop {
			if let Ok(stream) = StdStream::connect(("127.0.0.1", port)) {
				break stream;
			}
			thread::sleep(Duration::from_millis(20));
		};

		let deadline = std::time::Instant::now() + Duration::from_secs(2);
		while !server.is_connected() && std::time::Instant::now() < deadline {
			thread::sleep(Duration::from_millis(20));
		}
		assert!(server.is_connected());

		server.send_frame(0x0F, &[0x63]).unwrap();

		let mut client = client;
		let mut len_buf = [0u8; 2];
		client.read_exact(&mut len_buf).unwrap();
		let len = u16::from_be_bytes(len_buf) as usize;
		let mut body = vec![0u8; len + 1];
		client.read_exact(&mut body).unwrap();

		assert_eq!(&body[..len], &[0x0F, 0x63]);

		server.stop();
	}

	#[test]
	fn rejects_a_frame_with_a_bad_checksum() {
		let frame = Frame { len: 2, bytes: { let mut b = [0u8; MAX_FRAME_LEN]; b[0] = 1; b[1] = 2; b[2] = 0xFF; b } };
		let codec = TcpFrameCodec::new();
		assert!(!codec.check_crc(&frame));
	}
}
