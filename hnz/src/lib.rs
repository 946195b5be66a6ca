//! The public facade: ties a parsed [`Config`] to a running
//! [`DualPathServer`] and an [`OperationSink`], analogous in spirit (but not
//! scope — the host plugin surface itself stays out of bounds, §1) to the
//! original plugin's top-level class.

use std::sync::{Arc, Mutex};

use hnz_config::Config;
use hnz_runtime::{logger, DualPathServer, OperationSink};
use hnz_utils::error::Result;
use hnz_wire::{encode, IngestParameters, RemoteStationAddress, TcpFrameCodec, TsImage};

pub use hnz_config::Destination;
pub use hnz_runtime::dispatcher::OperationSink as Sink;
pub use hnz_wire::MsgCode;

/// The entry point a host plugin constructs once per configured HNZ
/// instance.
pub struct HnzNorth {
	server: DualPathServer,
	config: Arc<Config>,
	ts_image: Arc<Mutex<TsImage>>,
}

impl HnzNorth {
	/// Parses both configuration documents and builds the dual-path server.
	/// Returns `None` if the protocol configuration is incomplete or its
	/// remote station address cannot be turned into a valid [`hnz_wire::RemoteStationAddress`]
	/// (a config-level `remote_station_addr` of exactly 64 passes the
	/// config's own `<= 64` check but fails the stricter 6-bit bound here —
	/// see `hnz-config`'s documentation of that inherited discrepancy).
	pub fn new(protocol_json: &str, exchange_json: &str, sink: Arc<dyn OperationSink>) -> Option<Self> {
		let config = Config::parse(protocol_json, exchange_json);

		if !config.protocol_config_complete {
			log::error!("Protocol configuration is incomplete, refusing to start");
			return None;
		}

		let rsa = RemoteStationAddress::new(config.remote_station_addr.unwrap_or(0) as u8)?;
		let config = Arc::new(config);
		let ts_image = TsImage::shared();

		let server = DualPathServer::new(Box::new(TcpFrameCodec::new()), Box::new(TcpFrameCodec::new()), rsa, ts_image.clone(), config.clone(), sink);

		Some(Self { server, config, ts_image })
	}

	pub fn start(&mut self) -> Result {
		self.server.start()
	}

	pub fn stop(&mut self) {
		self.server.stop();
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Encodes and queues every reading in `readings` whose `msg_code` this
	/// core recognizes, removing each one it successfully queues — so
	/// whatever remains afterward is exactly what failed. Returns the
	/// number removed (the number successfully ingested), preserving the
	/// original's inverted "erase the successes" convention rather than the
	/// more obvious "collect the failures" one.
	pub fn send(&self, readings: &mut Vec<IngestParameters>) -> usize {
		let before = readings.len();

		readings.retain(|params| match encode(&self.ts_image, params) {
			Some(payload) => {
				self.server.enqueue(payload);
				false
			}
			None => {
				log::warn!("Unknown msg_code {:?}, leaving reading unprocessed", params.msg_code);
				true
			}
		});

		before - readings.len()
	}
}

/// Installs the shared logger at the given level. Host plugins call this
/// once at startup; safe to call more than once.
pub fn init_logging(level: log::LevelFilter) {
	logger::init(level);
}

#[cfg(test)]
mod tests {
	use super::*;

	struct NoopSink;

	impl OperationSink for NoopSink {
		fn operation(&self, _: &str, _: &[&str], _: &[&str], _: Destination) -> i32 {
			0
		}
	}

	fn protocol_json(remote_station_addr: u32) -> String {
		format!(r#"{{"protocol_stack":{{"application_layer":{{"remote_station_addr":{remote_station_addr}}}}}}}"#)
	}

	const EMPTY_EXCHANGE: &str = r#"{"exchanged_data":{"datapoints":[]}}"#;

	#[test]
	fn remote_station_addr_above_sixty_three_is_rejected() {
		// remote_station_addr=95 passes hnz-config's own <= 64 bound but
		// fails hnz-wire's stricter 6-bit bound, so `new` refuses to build.
		let north = HnzNorth::new(&protocol_json(95), EMPTY_EXCHANGE, Arc::new(NoopSink));
		assert!(north.is_none());
	}

	#[test]
	fn remote_station_addr_sixty_four_is_rejected_by_the_stricter_wire_bound() {
		let north = HnzNorth::new(&protocol_json(64), EMPTY_EXCHANGE, Arc::new(NoopSink));
		assert!(north.is_none());
	}

	#[test]
	fn valid_remote_station_addr_builds_successfully() {
		let north = HnzNorth::new(&protocol_json(12), EMPTY_EXCHANGE, Arc::new(NoopSink));
		assert!(north.is_some());
	}

	#[test]
	fn send_reports_the_count_of_readings_it_successfully_queued() {
		let north = HnzNorth::new(&protocol_json(12), EMPTY_EXCHANGE, Arc::new(NoopSink)).unwrap();

		let mut readings = vec![
			IngestParameters {
				label: "a".into(),
				msg_code: "TS".into(),
				station_addr: 12,
				msg_address: 20,
				value: 1,
				valid: true,
				ts: None,
				ts_iv: None,
				ts_c: None,
				ts_s: None,
				cg: None,
				an: None,
				outdated: None,
				quality_update: None,
			},
			IngestParameters {
				label: "b".into(),
				msg_code: "UNKNOWN".into(),
				station_addr: 12,
				msg_address: 21,
				value: 0,
				valid: true,
				ts: None,
				ts_iv: None,
				ts_c: None,
				ts_s: None,
				cg: None,
				an: None,
				outdated: None,
				quality_update: None,
			},
		];

		let sent = north.send(&mut readings);

		assert_eq!(sent, 1);
		// The successfully-ingested reading is removed; the unrecognized one remains.
		assert_eq!(readings.len(), 1);
		assert_eq!(readings[0].msg_code, "UNKNOWN");
	}
}
