use bilge::prelude::*;

/// The remote station address (RSA): a 6-bit identifier for the control
/// center this endpoint talks to. Values above 63 are invalid.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RemoteStationAddress(u8);

impl RemoteStationAddress {
	pub const MAX: u8 = 63;

	/// Builds a validated remote station address, rejecting anything above 63.
	pub fn new(value: u8) -> Option<Self> {
		(value <= Self::MAX).then_some(Self(value))
	}

	pub fn value(self) -> u8 {
		self.0
	}

	/// The link address used in frames travelling center → PA that acknowledge
	/// (suffix `0b11`).
	pub fn addr_a(self) -> u8 {
		LinkAddress::new(u2::new(0b11), u6::new(self.0)).into()
	}

	/// The link address used in frames travelling PA → center (suffix `0b01`).
	pub fn addr_b(self) -> u8 {
		LinkAddress::new(u2::new(0b01), u6::new(self.0)).into()
	}
}

/// The byte layout of a link address: a direction suffix in the low two bits,
/// the remote station address in the high six.
#[bitsize(8)]
#[derive(Clone, Copy)]
struct LinkAddress {
	suffix: u2,
	rsa: u6,
}
