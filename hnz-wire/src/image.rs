use std::sync::{Arc, Mutex};

use crate::codes::TSCG_CODE;

/// The number of TS slots the image can hold.
pub const TS_SLOT_COUNT: usize = 144;
const TS_IMAGE_BYTES: usize = 36;
const GROUP_COUNT: usize = 4;
const GROUP_BYTES: usize = TS_IMAGE_BYTES / GROUP_COUNT;

/// The process-wide teleinformation image: a bit-packed table of up to 144
/// `(valid, open)` slots, serialized on demand into a TSCG payload when a
/// general interrogation arrives on either path. Outlives every path and is
/// shared between them behind a single lock.
#[derive(Default)]
pub struct TsImage {
	bytes: [u8; TS_IMAGE_BYTES],
}

impl TsImage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Wraps a fresh image in the `Arc<Mutex<_>>` both paths share.
	///
	/// The mutex here plays the role of the re-entrant lock the original
	/// plugin takes: `set_ts` never calls back into code that re-acquires it,
	/// so a plain (non-recursive) `Mutex` is sufficient as long as no caller
	/// holds the lock across a call back into this type — which is the case
	/// for every caller in this workspace.
	pub fn shared() -> Arc<Mutex<Self>> {
		Arc::new(Mutex::new(Self::new()))
	}

	/// Sets the `(valid, open)` pair for `addr`. A no-op for `addr >= 144`.
	pub fn set_ts(&mut self, addr: u8, valid: bool, open: bool) {
		if addr as usize >= TS_SLOT_COUNT {
			return;
		}

		let index = addr as usize / 4;
		let shift = 6 - (addr as usize % 4) * 2;

		let mut byte = self.bytes[index];
		byte = set_bit(byte, shift + 1, valid);
		byte = set_bit(byte, shift, open);
		self.bytes[index] = byte;
	}

	/// Serializes the image into a 44-byte TSCG payload: four groups of nine
	/// bytes, each preceded by `[TSCG_CODE, group_addr]`.
	pub fn to_tscg(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(TS_IMAGE_BYTES + GROUP_COUNT * 2);

		for (i, chunk) in self.bytes.chunks(GROUP_BYTES).enumerate() {
			out.push(TSCG_CODE);
			out.push((i * 2) as u8);
			out.extend_from_slice(chunk);
		}

		out
	}
}

fn set_bit(byte: u8, shift: usize, value: bool) -> u8 {
	let mask = 1u8 << shift;
	if value {
		byte | mask
	} else {
		byte & !mask
	}
}
