//! Parses the two JSON configuration documents (`protocol_stack` and
//! `exchanged_data`) a deployment hands this core, with the same
//! "mark incomplete and keep going" tolerance as the original plugin: a
//! malformed or missing field never panics and never aborts the other
//! document's import, it just flips a completeness flag any caller is
//! expected to check before starting a path.

pub mod error;
mod mode;
mod raw;

use std::collections::HashMap;

pub use error::ConfigError;
pub use mode::Mode;

pub const DEFAULT_PORT_PATH_A: u16 = 9090;
pub const DEFAULT_PORT_PATH_B: u16 = 9091;
pub const DEFAULT_INACC_TIMEOUT: u32 = 180;
pub const DEFAULT_MAX_SARM: u32 = 30;
pub const DEFAULT_REPEAT_PATH: u32 = 3;
pub const DEFAULT_REPEAT_TIMEOUT: u32 = 3000;
pub const DEFAULT_ANTICIPATION_RATIO: u32 = 3;
pub const DEFAULT_TEST_MSG_SEND: &str = "1304";
pub const DEFAULT_GI_SCHEDULE: &str = "99:99";
pub const DEFAULT_GI_REPEAT_COUNT: u32 = 3;
pub const DEFAULT_GI_TIME: u32 = 255;
pub const DEFAULT_C_ACK_TIME: u32 = 10;
pub const DEFAULT_CMD_RECV_TIMEOUT: u64 = 100_000;

const HNZIP_PROTOCOL_NAME: &str = "hnzip";

/// Where a decoded `Tc`/`Tvc` operation gets reported: the named south
/// plugin if `cmd_dest` is set, otherwise every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
	Service(String),
	Broadcast,
}

/// A fully resolved configuration: whichever fields importing could read,
/// defaulted where the original leaves an unsigned field defaulting to
/// zero-like behavior, paired with the two completeness flags callers must
/// check before starting a path or trusting the label index.
#[derive(Debug, Clone)]
pub struct Config {
	pub port_path_a: u16,
	pub port_path_b: u16,
	pub mode: Mode,

	/// `None` when the field was missing or failed its `<= 64` bound check
	/// (the original's own check, one short of the 6-bit/63 ceiling
	/// `hnz_wire::RemoteStationAddress` actually enforces).
	pub remote_station_addr: Option<u32>,
	pub inacc_timeout: u32,
	pub max_sarm: u32,
	pub repeat_path_a: u32,
	pub repeat_path_b: u32,
	pub repeat_timeout: u32,
	pub anticipation_ratio: u32,
	pub test_msg_send: String,
	pub test_msg_receive: String,
	pub gi_schedule: String,
	pub gi_repeat_count: u32,
	pub gi_time: u32,
	pub c_ack_time: u32,
	pub cmd_recv_timeout: u64,
	pub cmd_dest: String,

	pub protocol_config_complete: bool,
	pub exchange_config_complete: bool,

	labels: HashMap<(String, u32, u32), String>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			port_path_a: DEFAULT_PORT_PATH_A,
			port_path_b: DEFAULT_PORT_PATH_B,
			mode: Mode::default(),
			remote_station_addr: None,
			inacc_timeout: DEFAULT_INACC_TIMEOUT,
			max_sarm: DEFAULT_MAX_SARM,
			repeat_path_a: DEFAULT_REPEAT_PATH,
			repeat_path_b: DEFAULT_REPEAT_PATH,
			repeat_timeout: DEFAULT_REPEAT_TIMEOUT,
			anticipation_ratio: DEFAULT_ANTICIPATION_RATIO,
			test_msg_send: DEFAULT_TEST_MSG_SEND.to_string(),
			test_msg_receive: String::new(),
			gi_schedule: DEFAULT_GI_SCHEDULE.to_string(),
			gi_repeat_count: DEFAULT_GI_REPEAT_COUNT,
			gi_time: DEFAULT_GI_TIME,
			c_ack_time: DEFAULT_C_ACK_TIME,
			cmd_recv_timeout: DEFAULT_CMD_RECV_TIMEOUT,
			cmd_dest: String::new(),
			protocol_config_complete: false,
			exchange_config_complete: false,
			labels: HashMap::new(),
		}
	}
}

impl Config {
	/// Imports both documents. Never fails: a malformed or invalid document
	/// is logged via [`ConfigError`]'s `Display` and leaves the
	/// corresponding completeness flag `false`, with every other field
	/// falling back to its default.
	pub fn parse(protocol_json: &str, exchange_json: &str) -> Self {
		let mut config = Self::default();

		match import_protocol(protocol_json) {
			Ok(fields) => {
				apply_protocol_fields(&mut config, fields);
				config.protocol_config_complete = true;
			}
			Err(err) => {
				log::error!("Failed to import protocol configuration: {err}");
			}
		}

		let station_addr = config.remote_station_addr.unwrap_or(0);
		match import_exchange(exchange_json, station_addr) {
			Ok(labels) => {
				config.labels = labels;
				config.exchange_config_complete = true;
			}
			Err(err) => {
				log::error!("Failed to import exchanged-data configuration: {err}");
			}
		}

		config
	}

	/// The destination an ingest operation (`Tc`/`Tvc`) should be reported
	/// to: the named south plugin if `cmd_dest` is non-empty, else every
	/// subscriber.
	pub fn destination(&self) -> Destination {
		if self.cmd_dest.is_empty() {
			Destination::Broadcast
		} else {
			Destination::Service(self.cmd_dest.clone())
		}
	}

	/// Looks up the configured label for a `(msg_code, msg_address,
	/// remote_station_addr)` triple, mirroring the original's nested map.
	pub fn label(&self, msg_code: &str, msg_address: u32, remote_station_addr: u32) -> Option<&str> {
		self.labels.get(&(msg_code.to_string(), msg_address, remote_station_addr)).map(String::as_str)
	}
}

struct ProtocolFields {
	port_path_a: u16,
	port_path_b: u16,
	remote_station_addr: u32,
	inacc_timeout: u32,
	max_sarm: u32,
	repeat_path_a: u32,
	repeat_path_b: u32,
	repeat_timeout: u32,
	anticipation_ratio: u32,
	test_msg_send: String,
	test_msg_receive: String,
	gi_schedule: String,
	gi_repeat_count: u32,
	gi_time: u32,
	c_ack_time: u32,
	cmd_recv_timeout: u64,
	cmd_dest: String,
}

fn import_protocol(json: &str) -> Result<ProtocolFields, ConfigError> {
	let doc: raw::ProtocolDocument = serde_json::from_str(json)?;
	let app = doc.protocol_stack.application_layer;
	let transport = doc.protocol_stack.transport_layer;

	let remote_station_addr = app.remote_station_addr.ok_or(ConfigError::MissingRemoteStationAddr)?;
	if remote_station_addr > 64 {
		return Err(ConfigError::RemoteStationAddrOutOfRange(remote_station_addr));
	}

	Ok(ProtocolFields {
		port_path_a: transport.port_path_a.unwrap_or(DEFAULT_PORT_PATH_A),
		port_path_b: transport.port_path_b.unwrap_or(DEFAULT_PORT_PATH_B),
		remote_station_addr,
		inacc_timeout: app.inacc_timeout.unwrap_or(DEFAULT_INACC_TIMEOUT),
		max_sarm: app.max_sarm.unwrap_or(DEFAULT_MAX_SARM),
		repeat_path_a: app.repeat_path_a.unwrap_or(DEFAULT_REPEAT_PATH),
		repeat_path_b: app.repeat_path_b.unwrap_or(DEFAULT_REPEAT_PATH),
		repeat_timeout: app.repeat_timeout.unwrap_or(DEFAULT_REPEAT_TIMEOUT),
		anticipation_ratio: app.anticipation_ratio.unwrap_or(DEFAULT_ANTICIPATION_RATIO),
		test_msg_send: app.test_msg_send.unwrap_or_else(|| DEFAULT_TEST_MSG_SEND.to_string()),
		test_msg_receive: app.test_msg_receive.unwrap_or_default(),
		gi_schedule: app.gi_schedule.unwrap_or_else(|| DEFAULT_GI_SCHEDULE.to_string()),
		gi_repeat_count: app.gi_repeat_count.unwrap_or(DEFAULT_GI_REPEAT_COUNT),
		gi_time: app.gi_time.unwrap_or(DEFAULT_GI_TIME),
		c_ack_time: app.c_ack_time.unwrap_or(DEFAULT_C_ACK_TIME),
		cmd_recv_timeout: app.cmd_recv_timeout.unwrap_or(DEFAULT_CMD_RECV_TIMEOUT),
		cmd_dest: app.cmd_dest.unwrap_or_default(),
	})
}

fn apply_protocol_fields(config: &mut Config, fields: ProtocolFields) {
	config.port_path_a = fields.port_path_a;
	config.port_path_b = fields.port_path_b;
	config.remote_station_addr = Some(fields.remote_station_addr);
	config.inacc_timeout = fields.inacc_timeout;
	config.max_sarm = fields.max_sarm;
	config.repeat_path_a = fields.repeat_path_a;
	config.repeat_path_b = fields.repeat_path_b;
	config.repeat_timeout = fields.repeat_timeout;
	config.anticipation_ratio = fields.anticipation_ratio;
	config.test_msg_send = fields.test_msg_send;
	config.test_msg_receive = fields.test_msg_receive;
	config.gi_schedule = fields.gi_schedule;
	config.gi_repeat_count = fields.gi_repeat_count;
	config.gi_time = fields.gi_time;
	config.c_ack_time = fields.c_ack_time;
	config.cmd_recv_timeout = fields.cmd_recv_timeout;
	config.cmd_dest = fields.cmd_dest;
}

fn import_exchange(json: &str, remote_station_addr: u32) -> Result<HashMap<(String, u32, u32), String>, ConfigError> {
	let doc: raw::ExchangeDocument = serde_json::from_str(json)?;
	let mut labels = HashMap::new();

	for point in doc.exchanged_data.datapoints {
		let Some(protocol) = point.protocols.iter().find(|p| p.name == HNZIP_PROTOCOL_NAME) else {
			log::warn!("Datapoint {:?} has no hnzip protocol entry, skipping", point.label);
			continue;
		};

		let (Some(msg_code), Some(address)) = (protocol.msg_code.clone(), protocol.address) else {
			log::warn!("Datapoint {:?} has an incomplete hnzip protocol entry, skipping", point.label);
			continue;
		};

		labels.insert((msg_code, address, remote_station_addr), point.label);
	}

	Ok(labels)
}

#[cfg(test)]
mod tests {
	use super::*;

	const PROTOCOL_JSON: &str = r#"{
		"protocol_stack": {
			"transport_layer": { "port_path_A": 9190, "port_path_B": 9191 },
			"application_layer": { "remote_station_addr": 12, "cmd_dest": "south1" }
		}
	}"#;

	const EXCHANGE_JSON: &str = r#"{
		"exchanged_data": {
			"datapoints": [
				{ "label": "TS1", "protocols": [{ "name": "hnzip", "typeid": "TS", "address": 20 }] },
				{ "label": "broken", "protocols": [{ "name": "hnzip", "address": 21 }] }
			]
		}
	}"#;

	#[test]
	fn parses_a_complete_document_pair() {
		let config = Config::parse(PROTOCOL_JSON, EXCHANGE_JSON);
		assert!(config.protocol_config_complete);
		assert!(config.exchange_config_complete);
		assert_eq!(config.port_path_a, 9190);
		assert_eq!(config.remote_station_addr, Some(12));
		assert_eq!(config.label("TS", 20, 12), Some("TS1"));
		assert_eq!(config.label("TS", 21, 12), None);
		assert_eq!(config.destination(), Destination::Service("south1".into()));
	}

	#[test]
	fn missing_remote_station_addr_marks_protocol_incomplete_but_keeps_defaults() {
		let config = Config::parse(r#"{"protocol_stack":{"application_layer":{}}}"#, EXCHANGE_JSON);
		assert!(!config.protocol_config_complete);
		assert_eq!(config.port_path_a, DEFAULT_PORT_PATH_A);
		assert!(config.exchange_config_complete);
	}

	#[test]
	fn remote_station_addr_above_sixty_four_is_rejected() {
		let config = Config::parse(r#"{"protocol_stack":{"application_layer":{"remote_station_addr":65}}}"#, EXCHANGE_JSON);
		assert!(!config.protocol_config_complete);
	}

	#[test]
	fn empty_cmd_dest_broadcasts() {
		let config = Config::parse(r#"{"protocol_stack":{"application_layer":{"remote_station_addr":1}}}"#, EXCHANGE_JSON);
		assert_eq!(config.destination(), Destination::Broadcast);
	}

	#[test]
	fn malformed_json_never_panics() {
		let config = Config::parse("not json", "also not json");
		assert!(!config.protocol_config_complete);
		assert!(!config.exchange_config_complete);
	}
}
