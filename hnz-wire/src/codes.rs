//! Wire-level byte constants for HNZ link and application frames.
//!
//! The link-layer codes (`SARM`, `UA`, `DISC`) and the application codes that
//! appear in a received I-frame's `data[2]` (`CG`, `TC`, `TVC`, the date/time
//! update codes) are pinned exactly as the protocol defines them. The five
//! encode-only codes below stand in for constants that, in the reference
//! plugin, come from `libhnz` — a C framing library outside this core's
//! scope. Their numeric values are internal to this crate; nothing decodes
//! against them.

/// Set Asynchronous Response Mode: link-establishment request.
pub const SARM_CODE: u8 = 0x0F;
/// Unnumbered Acknowledge: response to SARM.
pub const UA_CODE: u8 = 0x63;
/// Disconnect.
pub const DISC_CODE: u8 = 0x43;

/// General interrogation family code, found at `data[2]` of a CG request or
/// a bulle (keepalive) message.
pub const CG_CODE: u8 = 0x13;
/// Sub-code at `data[3]` identifying an actual CG request.
pub const CG_REQUEST_SUBCODE: u8 = 0x01;
/// Sub-code at `data[3]` identifying a bulle (keepalive).
pub const CG_BULLE_SUBCODE: u8 = 0x04;

/// Control command (TC) code.
pub const TC_CODE: u8 = 0x19;
/// Set-point command (TVC) code.
pub const TVC_CODE: u8 = 0x1A;
/// Time update code.
pub const TIME_UPDATE_CODE: u8 = 0x1D;
/// Date update code.
pub const DATE_UPDATE_CODE: u8 = 0x1C;

/// Time-tagged single-point state (outbound encoding only).
pub const TSCE_CODE: u8 = 0x0B;
/// Grouped single-point state, i.e. the general-interrogation response
/// (outbound encoding only; also used as each TSCG group's header byte).
pub const TSCG_CODE: u8 = 0x14;
/// Quad analog measurement (outbound encoding only).
pub const TM4_CODE: u8 = 0x0C;
/// Control command acknowledgment (outbound encoding only).
pub const TCACK_CODE: u8 = 0x09;
/// Set-point command acknowledgment (outbound encoding only).
pub const TVCACK_CODE: u8 = 0x1B;
