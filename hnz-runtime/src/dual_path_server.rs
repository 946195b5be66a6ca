use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hnz_config::Config;
use hnz_wire::{FrameCodec, RemoteStationAddress, TsImage};
use log::{info, warn};

use crate::dispatcher::{Dispatcher, OperationSink};
use crate::path_endpoint::PathEndpoint;

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const SUPERVISOR_PACE: Duration = Duration::from_secs(2);

/// Spawns and supervises both path endpoints, restarting whichever one
/// drops its connection while the process is still running (§4.11).
pub struct DualPathServer {
	path_a: Arc<Mutex<PathEndpoint>>,
	path_b: Arc<Mutex<PathEndpoint>>,
	ts_image: Arc<Mutex<TsImage>>,
	config: Arc<Config>,
	sink: Arc<dyn OperationSink>,
	running: Arc<AtomicBool>,
	supervisors: Vec<JoinHandle<()>>,
}

impl DualPathServer {
	pub fn new(
		codec_a: Box<dyn FrameCodec>,
		codec_b: Box<dyn FrameCodec>,
		rsa: RemoteStationAddress,
		ts_image: Arc<Mutex<TsImage>>,
		config: Arc<Config>,
		sink: Arc<dyn OperationSink>,
	) -> Self {
		Self {
			path_a: Arc::new(Mutex::new(PathEndpoint::new(codec_a, rsa))),
			path_b: Arc::new(Mutex::new(PathEndpoint::new(codec_b, rsa))),
			ts_image,
			config,
			sink,
			running: Arc::new(AtomicBool::new(false)),
			supervisors: Vec::new(),
		}
	}

	pub fn start(&mut self) -> hnz_utils::error::Result {
		self.path_a.lock().expect("path mutex poisoned").start(self.config.port_path_a)?;
		self.path_b.lock().expect("path mutex poisoned").start(self.config.port_path_b)?;

		self.running.store(true, Ordering::SeqCst);

		self.supervisors.push(self.spawn_supervisor(self.path_a.clone(), self.config.port_path_a));
		self.supervisors.push(self.spawn_supervisor(self.path_b.clone(), self.config.port_path_b));

		Ok(())
	}

	pub fn stop(&mut self) {
		self.running.store(false, Ordering::SeqCst);

		for handle in self.supervisors.drain(..) {
			let _ = handle.join();
		}

		self.path_a.lock().expect("path mutex poisoned").stop();
		self.path_b.lock().expect("path mutex poisoned").stop();
	}

	/// Queues `payload` for transmission on both paths — a reading produced
	/// by the ingest pipeline rides whichever of the two redundant links
	/// the center is currently listening on.
	pub fn enqueue(&self, payload: Vec<u8>) {
		self.path_a.lock().expect("path mutex poisoned").pending().lock().expect("pending queue mutex poisoned").push(payload.clone());
		self.path_b.lock().expect("path mutex poisoned").pending().lock().expect("pending queue mutex poisoned").push(payload);
	}

	fn spawn_supervisor(&self, path: Arc<Mutex<PathEndpoint>>, port: u16) -> JoinHandle<()> {
		let ts_image = self.ts_image.clone();
		let config = self.config.clone();
		let sink = self.sink.clone();
		let running = self.running.clone();

		thread::spawn(move || {
			while running.load(Ordering::SeqCst) {
				let ready = path.lock().expect("path mutex poisoned").wait_ready(READY_TIMEOUT);

				if !ready {
					if !path.lock().expect("path mutex poisoned").is_running() {
						info!("Path on port {port} is not running, restarting it");
						let mut guard = path.lock().expect("path mutex poisoned");
						guard.stop();
						if let Err(()) = guard.start(port) {
							warn!("Failed to restart path on port {port}");
						}
					}
					thread::sleep(SUPERVISOR_PACE);
					continue;
				}

				let (events, codec, link, pending, addr_a, addr_b) = {
					let guard = path.lock().expect("path mutex poisoned");
					(guard.drain_events(), guard.codec(), guard.link(), guard.pending(), guard.addr_a(), guard.addr_b())
				};

				let dispatcher = Dispatcher {
					codec,
					link,
					pending,
					ts_image: ts_image.clone(),
					sink: sink.clone(),
					destination: config.destination(),
					addr_a,
					addr_b,
				};

				for (event, p) in events {
					dispatcher.dispatch(event, p);
				}

				dispatcher.drain_pending();

				if !path.lock().expect("path mutex poisoned").is_running() {
					info!("Path on port {port} dropped its connection, restarting it");
					let mut guard = path.lock().expect("path mutex poisoned");
					guard.stop();
					if let Err(()) = guard.start(port) {
						warn!("Failed to restart path on port {port}");
					}
				}

				thread::sleep(SUPERVISOR_PACE);
			}
		})
	}
}
