use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProtocolDocument {
	pub protocol_stack: ProtocolStack,
}

#[derive(Debug, Deserialize)]
pub struct ProtocolStack {
	#[serde(default)]
	pub transport_layer: TransportLayer,
	#[serde(default)]
	pub application_layer: ApplicationLayer,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransportLayer {
	#[serde(rename = "port_path_A")]
	pub port_path_a: Option<u16>,
	#[serde(rename = "port_path_B")]
	pub port_path_b: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationLayer {
	pub remote_station_addr: Option<u32>,
	pub inacc_timeout: Option<u32>,
	pub max_sarm: Option<u32>,
	#[serde(rename = "repeat_path_A")]
	pub repeat_path_a: Option<u32>,
	#[serde(rename = "repeat_path_B")]
	pub repeat_path_b: Option<u32>,
	pub repeat_timeout: Option<u32>,
	pub anticipation_ratio: Option<u32>,
	pub test_msg_send: Option<String>,
	pub test_msg_receive: Option<String>,
	pub gi_schedule: Option<String>,
	pub gi_repeat_count: Option<u32>,
	pub gi_time: Option<u32>,
	pub c_ack_time: Option<u32>,
	pub cmd_recv_timeout: Option<u64>,
	pub cmd_dest: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeDocument {
	pub exchanged_data: ExchangedData,
}

#[derive(Debug, Deserialize)]
pub struct ExchangedData {
	#[serde(default)]
	pub datapoints: Vec<Datapoint>,
}

#[derive(Debug, Deserialize)]
pub struct Datapoint {
	pub label: String,
	#[serde(default)]
	pub protocols: Vec<Protocol>,
}

#[derive(Debug, Deserialize)]
pub struct Protocol {
	pub name: String,
	#[serde(rename = "typeid")]
	pub msg_code: Option<String>,
	pub address: Option<u32>,
}
