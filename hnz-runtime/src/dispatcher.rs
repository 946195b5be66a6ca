use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hnz_config::Destination;
use hnz_link::{LinkStateMachine, PendingQueue};
use hnz_wire::codes::TCACK_CODE;
use hnz_wire::{Event, FrameCodec, TsImage};
use log::warn;

use crate::send::{send_information, send_rej, send_rr};

const DRAIN_GAP: Duration = Duration::from_millis(500);
const TCACK_DELAY: Duration = Duration::from_secs(3);

/// The narrow capability this core invokes when a `Tc`/`Tvc` order arrives:
/// the real command dispatch lives on the other side of the host plugin
/// boundary (§1). Returns a host-defined status code, mirrored back as-is.
pub trait OperationSink: Send + Sync {
	fn operation(&self, op_name: &str, names: &[&str], values: &[&str], destination: Destination) -> i32;
}

/// Routes one decoded event to its wire response and, for `Tc`/`Tvc`, the
/// operation sink — everything §4.8 describes for a single path.
pub struct Dispatcher {
	pub codec: Arc<Mutex<Box<dyn FrameCodec>>>,
	pub link: Arc<Mutex<LinkStateMachine>>,
	pub pending: Arc<Mutex<PendingQueue>>,
	pub ts_image: Arc<Mutex<TsImage>>,
	pub sink: Arc<dyn OperationSink>,
	pub destination: Destination,
	pub addr_a: u8,
	pub addr_b: u8,
}

impl Dispatcher {
	pub fn dispatch(&self, event: Event, p: bool) {
		match event {
			Event::CgRequest => self.handle_cg_request(),
			Event::Bulle => self.respond_rr(p),
			Event::Tc { ado, adb, open } => self.handle_tc(ado, adb, open, p),
			Event::Tvc { addr, open } => self.handle_tvc(addr, open, p),
			Event::TimeUpdate | Event::DateUpdate { .. } => self.respond_rr(p),
			Event::Unknown => self.respond_rej(p),
		}
	}

	fn respond_rr(&self, p: bool) {
		let mut codec = self.codec.lock().expect("codec mutex poisoned");
		let link = self.link.lock().expect("link mutex poisoned");
		if send_rr(codec.as_mut(), &link, self.addr_a, p).is_err() {
			warn!("Failed to send RR");
		}
	}

	fn respond_rej(&self, p: bool) {
		let mut codec = self.codec.lock().expect("codec mutex poisoned");
		let link = self.link.lock().expect("link mutex poisoned");
		if send_rej(codec.as_mut(), &link, self.addr_a, p).is_err() {
			warn!("Failed to send REJ");
		}
	}

	fn handle_cg_request(&self) {
		let payload = self.ts_image.lock().expect("TS image mutex poisoned").to_tscg();

		{
			let mut codec = self.codec.lock().expect("codec mutex poisoned");
			let mut link = self.link.lock().expect("link mutex poisoned");
			if send_information(codec.as_mut(), &mut link, self.addr_b, &payload, false).is_err() {
				warn!("Failed to send TSCG response to general interrogation");
				return;
			}
			link.set_cg_sent(true);
		}

		self.drain_pending();
	}

	/// Sends every frame currently queued for this path, in FIFO order,
	/// with the mandatory inter-frame gap. Called both right after a CG
	/// response and from the supervisor loop once CG has already been
	/// answered (§4.11).
	pub fn drain_pending(&self) {
		if !self.link.lock().expect("link mutex poisoned").cg_sent() {
			return;
		}

		loop {
			let Some(frame) = self.pending.lock().expect("pending queue mutex poisoned").pop() else { break };

			let mut codec = self.codec.lock().expect("codec mutex poisoned");
			let mut link = self.link.lock().expect("link mutex poisoned");
			if send_information(codec.as_mut(), &mut link, self.addr_b, &frame, false).is_err() {
				warn!("Failed to send a queued frame");
			}
			drop(codec);
			drop(link);

			thread::sleep(DRAIN_GAP);
		}
	}

	fn handle_tc(&self, ado: u8, adb: u8, open: bool, p: bool) {
		self.respond_rr(p);

		thread::sleep(TCACK_DELAY);

		let order = if open { 0b10u8 } else { 0b01u8 };
		let tcack = [TCACK_CODE, ado, 0b1 | (adb << 5) | (order << 3)];

		{
			let mut codec = self.codec.lock().expect("codec mutex poisoned");
			let mut link = self.link.lock().expect("link mutex poisoned");
			if send_information(codec.as_mut(), &mut link, self.addr_b, &tcack, false).is_err() {
				warn!("Failed to send TCACK");
			}
		}

		let co_addr = (adb as u32 | ((ado as u32) << 8)).to_string();
		let co_value = if open { "1" } else { "0" };
		self.sink.operation("HNZCommand", &["co_type", "co_addr", "co_value"], &["TC", &co_addr, co_value], self.destination.clone());
	}

	fn handle_tvc(&self, addr: u8, open: bool, p: bool) {
		self.respond_rr(p);

		let co_addr = addr.to_string();
		let co_value = if open { "1" } else { "0" };
		self.sink.operation("HNZCommand", &["co_type", "co_addr", "co_value"], &["TVC", &co_addr, co_value], self.destination.clone());
	}
}

#[cfg(test)]
mod tests {
	use std::io::Read;
	use std::net::{TcpListener, TcpStream};

	use hnz_wire::TcpFrameCodec;

	use super::*;

	struct NoopSink;

	impl OperationSink for NoopSink {
		fn operation(&self, _: &str, _: &[&str], _: &[&str], _: Destination) -> i32 {
			0
		}
	}

	fn free_port() -> u16 {
		TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
	}

	fn read_frame(peer: &mut TcpStream) -> Vec<u8> {
		let mut len_buf = [0u8; 2];
		peer.read_exact(&mut len_buf).unwrap();
		let len = u16::from_be_bytes(len_buf) as usize;
		let mut body = vec![0u8; len + 1];
		peer.read_exact(&mut body).unwrap();
		body[..len].to_vec()
	}

	fn connected_dispatcher(port: u16, addr_a: u8, addr_b: u8) -> (Dispatcher, TcpStream) {
		let mut codec = TcpFrameCodec::new();
		codec.start(port).unwrap();

		let peer = loop {
			if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
				break stream;
			}
			std::thread::sleep(std::time::Duration::from_millis(20));
		};

		let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
		while !codec.is_connected() && std::time::Instant::now() < deadline {
			std::thread::sleep(std::time::Duration::from_millis(20));
		}

		let mut peer = peer;
		peer.set_read_timeout(Some(std::time::Duration::from_secs(2))).unwrap();

		let dispatcher = Dispatcher {
			codec: Arc::new(Mutex::new(Box::new(codec))),
			link: Arc::new(Mutex::new(LinkStateMachine::new())),
			pending: Arc::new(Mutex::new(PendingQueue::new())),
			ts_image: TsImage::shared(),
			sink: Arc::new(NoopSink),
			destination: Destination::Broadcast,
			addr_a,
			addr_b,
		};

		(dispatcher, peer)
	}

	#[test]
	fn cg_request_emits_44_byte_tscg_addressed_to_addr_b_and_sets_cg_sent() {
		let port = free_port();
		let (dispatcher, mut peer) = connected_dispatcher(port, 51, 49);

		dispatcher.dispatch(Event::CgRequest, false);

		let frame = read_frame(&mut peer);
		// byte 0 = addr_b, byte 1 = control_info(false) = 0, then the 44-byte TSCG payload.
		assert_eq!(frame[0], 49);
		assert_eq!(frame.len(), 2 + 44);
		assert_eq!(&frame[2..6], &[hnz_wire::codes::TSCG_CODE, 0, 0, 0]);
		assert_eq!(frame[13], hnz_wire::codes::TSCG_CODE);
		assert_eq!(frame[14], 2);

		assert!(dispatcher.link.lock().unwrap().cg_sent());
	}

	#[test]
	fn cg_request_drains_a_frame_already_queued_before_the_request() {
		let port = free_port();
		let (dispatcher, mut peer) = connected_dispatcher(port, 51, 49);

		dispatcher.pending.lock().unwrap().push(vec![0xAB, 0xCD]);

		dispatcher.dispatch(Event::CgRequest, false);

		let tscg = read_frame(&mut peer);
		assert_eq!(tscg.len(), 2 + 44);

		let queued = read_frame(&mut peer);
		assert_eq!(&queued[2..], &[0xAB, 0xCD]);

		assert!(dispatcher.pending.lock().unwrap().is_empty());
	}

	#[test]
	fn bulle_is_answered_with_rr() {
		let port = free_port();
		let (dispatcher, mut peer) = connected_dispatcher(port, 51, 49);

		dispatcher.dispatch(Event::Bulle, true);

		let frame = read_frame(&mut peer);
		assert_eq!(frame[0], 51); // addr_a
		assert_eq!(frame[1] & 0b1111, 0b0001); // RR low nibble
		assert_eq!((frame[1] >> 4) & 1, 1); // p echoed
	}

	#[test]
	fn unknown_event_is_answered_with_rej() {
		let port = free_port();
		let (dispatcher, mut peer) = connected_dispatcher(port, 51, 49);

		dispatcher.dispatch(Event::Unknown, false);

		let frame = read_frame(&mut peer);
		assert_eq!(frame[0], 51);
		assert_eq!(frame[1] & 0b1111, 0b1001); // REJ low nibble
	}

	#[test]
	fn tc_sends_rr_then_tcack_and_invokes_the_sink() {
		let port = free_port();
		let (dispatcher, mut peer) = connected_dispatcher(port, 51, 49);

		dispatcher.dispatch(Event::Tc { ado: 0x02, adb: 3, open: true }, false);

		let rr = read_frame(&mut peer);
		assert_eq!(rr[1] & 0b1111, 0b0001);

		let tcack = read_frame(&mut peer);
		assert_eq!(tcack[0], 49); // addr_b
		assert_eq!(&tcack[2..4], &[hnz_wire::codes::TCACK_CODE, 0x02]);
		assert_eq!(tcack[4], 0b1 | (3 << 5) | (0b10 << 3));
	}
}
