use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hnz_link::{LinkStateMachine, PendingQueue};
use hnz_utils::error::Result;
use hnz_wire::codes::{DISC_CODE, SARM_CODE, UA_CODE};
use hnz_wire::{decode, Event, Frame, FrameCodec, RemoteStationAddress};
use log::{debug, warn};

use crate::send::{send_sarm, send_ua};

const OBSERVED_CAPACITY: usize = 32;
const HANDSHAKE_RETRY_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(16);
const STEADY_STATE_PACE: Duration = Duration::from_secs(1);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

fn bounded_join(handle: JoinHandle<()>, what: &str) {
	let (done_tx, done_rx) = std::sync::mpsc::channel();
	thread::spawn(move || {
		let _ = handle.join();
		let _ = done_tx.send(());
	});

	if done_rx.recv_timeout(JOIN_TIMEOUT).is_err() {
		warn!("{what} did not join within {JOIN_TIMEOUT:?}, abandoning it");
	}
}

fn push_capped(buffer: &mut VecDeque<Frame>, frame: Frame) {
	if buffer.len() == OBSERVED_CAPACITY {
		buffer.pop_front();
	}
	buffer.push_back(frame);
}

/// One path's TCP listener, handshake, and steady-state receive loop.
///
/// Owns a `LinkStateMachine` and a pending outbound queue; decoded
/// application events are handed off to a queue the `Dispatcher` drains
/// from a different thread (the `DualPathServer` supervisor), so the
/// receive loop is never blocked behind a TCACK's 3 s delay.
pub struct PathEndpoint {
	codec: Arc<Mutex<Box<dyn FrameCodec>>>,
	link: Arc<Mutex<LinkStateMachine>>,
	pending: Arc<Mutex<PendingQueue>>,
	events: Arc<Mutex<VecDeque<(Event, bool)>>>,
	last_received: Arc<Mutex<VecDeque<Frame>>>,
	last_sent: Arc<Mutex<VecDeque<Frame>>>,
	is_running: Arc<AtomicBool>,
	addr_a: u8,
	addr_b: u8,
	port: Option<u16>,
	receive_thread: Option<JoinHandle<()>>,
}

impl PathEndpoint {
	pub fn new(codec: Box<dyn FrameCodec>, rsa: RemoteStationAddress) -> Self {
		Self {
			codec: Arc::new(Mutex::new(codec)),
			link: Arc::new(Mutex::new(LinkStateMachine::new())),
			pending: Arc::new(Mutex::new(PendingQueue::new())),
			events: Arc::new(Mutex::new(VecDeque::new())),
			last_received: Arc::new(Mutex::new(VecDeque::new())),
			last_sent: Arc::new(Mutex::new(VecDeque::new())),
			is_running: Arc::new(AtomicBool::new(false)),
			addr_a: rsa.addr_a(),
			addr_b: rsa.addr_b(),
			port: None,
			receive_thread: None,
		}
	}

	pub fn codec(&self) -> Arc<Mutex<Box<dyn FrameCodec>>> {
		self.codec.clone()
	}

	pub fn link(&self) -> Arc<Mutex<LinkStateMachine>> {
		self.link.clone()
	}

	pub fn pending(&self) -> Arc<Mutex<PendingQueue>> {
		self.pending.clone()
	}

	pub fn addr_a(&self) -> u8 {
		self.addr_a
	}

	pub fn addr_b(&self) -> u8 {
		self.addr_b
	}

	pub fn is_running(&self) -> bool {
		self.is_running.load(Ordering::SeqCst)
	}

	/// Observed "last received" frames, for test inspection only.
	#[cfg(feature = "observe")]
	pub fn last_received(&self) -> Vec<Frame> {
		self.last_received.lock().expect("observed buffer mutex poisoned").iter().copied().collect()
	}

	/// Observed "last sent" frames, for test inspection only.
	#[cfg(feature = "observe")]
	pub fn last_sent(&self) -> Vec<Frame> {
		self.last_sent.lock().expect("observed buffer mutex poisoned").iter().copied().collect()
	}

	pub fn start(&mut self, port: u16) -> Result {
		self.port = Some(port);
		self.codec.lock().expect("codec mutex poisoned").start(port)?;
		self.is_running.store(true, Ordering::SeqCst);
		Ok(())
	}

	/// Drains every application event decoded since the last call, for the
	/// supervisor to feed through the `Dispatcher` (§4.11).
	pub fn drain_events(&self) -> Vec<(Event, bool)> {
		self.events.lock().expect("events mutex poisoned").drain(..).collect()
	}

	/// Runs the handshake (§4.5), retrying once with a codec reset on
	/// timeout, then spawns the steady-state receive loop (§4.6). Returns
	/// `false` if both attempts timed out.
	pub fn wait_ready(&mut self, timeout: Duration) -> bool {
		if self.link.lock().expect("link mutex poisoned").connected() {
			return true;
		}

		if self.attempt_handshake(timeout) {
			self.spawn_receive_loop();
			return true;
		}

		warn!("Handshake timed out, resetting the codec and retrying");

		if let Some(port) = self.port {
			let mut codec = self.codec.lock().expect("codec mutex poisoned");
			codec.stop();
			if codec.start(port).is_err() {
				warn!("Failed to restart codec after handshake timeout");
				return false;
			}
		}

		if self.attempt_handshake(timeout) {
			self.spawn_receive_loop();
			true
		} else {
			warn!("Path is not ready after a retried handshake");
			false
		}
	}

	fn attempt_handshake(&mut self, timeout: Duration) -> bool {
		self.link.lock().expect("link mutex poisoned").reset();

		let ua_ok = Arc::new(AtomicBool::new(false));
		let sarm_ok = Arc::new(AtomicBool::new(false));
		let keep_sending = Arc::new(AtomicBool::new(true));

		let sender = {
			let codec = self.codec.clone();
			let addr_b = self.addr_b;
			let ua_ok = ua_ok.clone();
			let sarm_ok = sarm_ok.clone();
			let keep_sending = keep_sending.clone();

			thread::spawn(move || {
				while keep_sending.load(Ordering::SeqCst) {
					let connected = codec.lock().expect("codec mutex poisoned").is_connected();
					if connected {
						ua_ok.store(false, Ordering::SeqCst);
						sarm_ok.store(false, Ordering::SeqCst);
						if send_sarm(codec.lock().expect("codec mutex poisoned").as_mut(), addr_b).is_err() {
							warn!("Failed to send SARM during handshake");
						}
					}
					thread::sleep(HANDSHAKE_RETRY_INTERVAL);
				}
			})
		};

		let deadline = Instant::now() + timeout;
		let success = loop {
			if ua_ok.load(Ordering::SeqCst) && sarm_ok.load(Ordering::SeqCst) {
				break true;
			}
			if Instant::now() >= deadline {
				break false;
			}

			let frame = { self.codec.lock().expect("codec mutex poisoned").receive_frame() };
			let Some(frame) = frame else { continue };

			if !self.codec.lock().expect("codec mutex poisoned").check_crc(&frame) {
				warn!("CRC failure during handshake, dropping frame");
				continue;
			}

			match frame.control() {
				UA_CODE => {
					self.link.lock().expect("link mutex poisoned").on_ua_received();
					ua_ok.store(true, Ordering::SeqCst);
				}
				SARM_CODE => {
					self.link.lock().expect("link mutex poisoned").on_sarm_received();
					if send_ua(self.codec.lock().expect("codec mutex poisoned").as_mut(), self.addr_a).is_err() {
						warn!("Failed to send UA during handshake");
					}
					sarm_ok.store(true, Ordering::SeqCst);
				}
				other => debug!("Ignoring unexpected control byte {other:#04x} during handshake"),
			}
		};

		keep_sending.store(false, Ordering::SeqCst);
		bounded_join(sender, "Handshake SARM sender thread");

		success
	}

	fn spawn_receive_loop(&mut self) {
		self.last_received.lock().expect("observed buffer mutex poisoned").clear();

		let codec = self.codec.clone();
		let link = self.link.clone();
		let events = self.events.clone();
		let last_received = self.last_received.clone();
		let is_running = self.is_running.clone();
		let addr_a = self.addr_a;
		let addr_b = self.addr_b;

		self.receive_thread = Some(thread::spawn(move || {
			receive_loop(codec, link, events, last_received, is_running, addr_a, addr_b);
		}));
	}

	pub fn stop(&mut self) {
		self.is_running.store(false, Ordering::SeqCst);
		self.link.lock().expect("link mutex poisoned").reset();
		self.codec.lock().expect("codec mutex poisoned").stop();

		if let Some(handle) = self.receive_thread.take() {
			bounded_join(handle, "Receive thread");
		}
	}
}

fn receive_loop(
	codec: Arc<Mutex<Box<dyn FrameCodec>>>,
	link: Arc<Mutex<LinkStateMachine>>,
	events: Arc<Mutex<VecDeque<(Event, bool)>>>,
	last_received: Arc<Mutex<VecDeque<Frame>>>,
	is_running: Arc<AtomicBool>,
	addr_a: u8,
	addr_b: u8,
) {
	while is_running.load(Ordering::SeqCst) {
		let frame = { codec.lock().expect("codec mutex poisoned").receive_frame() };

		if let Some(frame) = frame {
			let crc_ok = codec.lock().expect("codec mutex poisoned").check_crc(&frame);

			if !crc_ok {
				warn!("CRC failure on steady-state receive, dropping frame");
			} else {
				push_capped(&mut last_received.lock().expect("observed buffer mutex poisoned"), frame);

				let control = frame.control();
				match control {
					UA_CODE => {
						link.lock().expect("link mutex poisoned").on_ua_received();
						if send_sarm(codec.lock().expect("codec mutex poisoned").as_mut(), addr_b).is_err() {
							warn!("Failed to send SARM in response to unexpected UA");
						}
					}
					SARM_CODE => {
						link.lock().expect("link mutex poisoned").on_sarm_received();
						if send_ua(codec.lock().expect("codec mutex poisoned").as_mut(), addr_a).is_err() {
							warn!("Failed to send UA in response to SARM");
						}
					}
					DISC_CODE => {
						if send_ua(codec.lock().expect("codec mutex poisoned").as_mut(), addr_a).is_err() {
							warn!("Failed to send UA in response to DISC");
						}
					}
					_ if control & 1 == 0 => {
						if frame.len > 2 {
							link.lock().expect("link mutex poisoned").on_info_received();
							let p = decode::repeat_bit(control);
							if let Some(event) = decode::decode(frame.payload()) {
								events.lock().expect("events mutex poisoned").push_back((event, p));
							}
						} else {
							warn!("Dropping malformed information frame (len <= 2)");
						}
					}
					_ => {
						debug!("Received supervisory frame with control byte {control:#04x}");
					}
				}
			}
		}

		if !codec.lock().expect("codec mutex poisoned").is_connected() {
			is_running.store(false, Ordering::SeqCst);
			break;
		}

		thread::sleep(STEADY_STATE_PACE);
	}
}
