use std::sync::Mutex;

use crate::codes::{TCACK_CODE, TM4_CODE, TSCE_CODE, TVCACK_CODE};
use crate::image::TsImage;

/// The four message families a datapoint reading can be ingested as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgCode {
	Ts,
	Tm,
	Tc,
	Tvc,
}

impl MsgCode {
	pub fn parse(code: &str) -> Option<Self> {
		match code {
			"TS" => Some(Self::Ts),
			"TM" => Some(Self::Tm),
			"TC" => Some(Self::Tc),
			"TVC" => Some(Self::Tvc),
			_ => None,
		}
	}
}

/// An already-parsed reading handed to this core by the northbound ingestion
/// pipeline (out of scope; this is the narrow interface it hands over).
/// `msg_code` is the raw string the pipeline attached to it — `"TS"`,
/// `"TM"`, `"TC"`, or `"TVC"` are the only ones this core understands;
/// anything else fails to [`encode`] rather than panicking.
#[derive(Debug, Clone)]
pub struct IngestParameters {
	pub label: String,
	pub msg_code: String,
	pub station_addr: u8,
	pub msg_address: u32,
	pub value: i64,
	pub valid: bool,

	pub ts: Option<u64>,
	pub ts_iv: Option<bool>,
	pub ts_c: Option<bool>,
	pub ts_s: Option<bool>,
	pub cg: Option<bool>,
	pub an: Option<String>,
	pub outdated: Option<bool>,
	pub quality_update: Option<bool>,
}

impl IngestParameters {
	fn flag(value: Option<bool>) -> bool {
		value.unwrap_or(false)
	}
}

/// Serializes `params` into the wire bytes for its message family, updating
/// `image` in place for a TS reading. Returns `None` for an unrecognized
/// `msg_code` — the caller is expected to leave that reading unconsumed.
pub fn encode(image: &Mutex<TsImage>, params: &IngestParameters) -> Option<Vec<u8>> {
	let bytes = match MsgCode::parse(&params.msg_code)? {
		MsgCode::Ts => encode_tsce(image, params),
		MsgCode::Tvc => encode_tvcack(params),
		MsgCode::Tc => encode_tcack(params),
		MsgCode::Tm => encode_tm4(params),
	};

	Some(bytes)
}

fn encode_tsce(image: &Mutex<TsImage>, params: &IngestParameters) -> Vec<u8> {
	let addr = params.msg_address;
	let value_bit = (params.value & 0x1) as u8;
	let valid_bit = params.valid as u8;

	let mut data = vec![TSCE_CODE, (addr / 10) as u8, 0, 0, 0];

	data[2] |= ((addr % 10) as u8) << 5;
	data[2] |= valid_bit << 4;
	data[2] |= value_bit << 3;
	data[2] |= (IngestParameters::flag(params.ts_c) as u8) << 1;
	data[2] |= IngestParameters::flag(params.ts_s) as u8;
	data[2] |= (IngestParameters::flag(params.ts_iv) as u8) << 2;

	let ts = params.ts.unwrap_or(0);
	data[3] = ((ts >> 8) & 0xFF) as u8;
	data[4] = (ts & 0xFF) as u8;

	image.lock().expect("TS image mutex poisoned").set_ts(addr as u8, value_bit != 0, valid_bit != 0);

	data
}

fn encode_tvcack(params: &IngestParameters) -> Vec<u8> {
	let addr = params.msg_address;
	let mut data = vec![TVCACK_CODE, 0, 0, 0];

	data[1] = (addr & 0x1F) as u8 | ((params.valid as u8) << 6);

	let mut value = params.value;
	let mut sign = 0u8;
	if value < 0 {
		value = -value;
		sign |= 0x80;
	}

	data[2] = (value & 0x7F) as u8;
	data[3] = sign;

	data
}

fn encode_tcack(params: &IngestParameters) -> Vec<u8> {
	let addr = params.msg_address;
	let mut data = vec![TCACK_CODE, (addr / 10) as u8, 0];

	let order = if params.value == 0 { 0b01u8 } else { 0b10u8 };
	data[2] |= ((addr % 10) as u8) << 5;
	data[2] |= order << 3;
	data[2] |= if params.valid { 0 } else { 0b001 };

	data
}

fn encode_tm4(params: &IngestParameters) -> Vec<u8> {
	let addr = params.msg_address;
	let mut data = vec![TM4_CODE, ((addr / 4) * 4) as u8, 0xFF, 0xFF, 0xFF, 0xFF];

	let slot = (addr % 4) as usize;
	data[2 + slot] = (params.value & 0xFF) as u8;

	data
}
