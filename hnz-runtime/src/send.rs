use hnz_link::LinkStateMachine;
use hnz_utils::error::Result;
use hnz_wire::codes::{SARM_CODE, UA_CODE};
use hnz_wire::FrameCodec;

/// Prepends `control_info(p)` to `payload`, sends it addressed to `addr_b`,
/// and advances `N(S)` on success.
pub fn send_information(codec: &mut dyn FrameCodec, link: &mut LinkStateMachine, addr_b: u8, payload: &[u8], p: bool) -> Result {
	let control = link.control_info(p);
	let mut frame = Vec::with_capacity(payload.len() + 1);
	frame.push(control);
	frame.extend_from_slice(payload);

	codec.send_frame(addr_b, &frame)?;
	link.on_info_sent();
	Ok(())
}

/// Sends a single-byte RR supervisory frame addressed to `addr_a`.
pub fn send_rr(codec: &mut dyn FrameCodec, link: &LinkStateMachine, addr_a: u8, p: bool) -> Result {
	codec.send_frame(addr_a, &[link.control_rr(p)])
}

/// Sends a single-byte REJ supervisory frame addressed to `addr_a`.
pub fn send_rej(codec: &mut dyn FrameCodec, link: &LinkStateMachine, addr_a: u8, p: bool) -> Result {
	codec.send_frame(addr_a, &[link.control_rej(p)])
}

/// Sends `[SARM_CODE]` addressed to `addr_b`.
pub fn send_sarm(codec: &mut dyn FrameCodec, addr_b: u8) -> Result {
	codec.send_frame(addr_b, &[SARM_CODE])
}

/// Sends `[UA_CODE]` addressed to `addr_a`.
pub fn send_ua(codec: &mut dyn FrameCodec, addr_a: u8) -> Result {
	codec.send_frame(addr_a, &[UA_CODE])
}
