/// The per-path link-establishment state, per the data model's
/// `Disconnected | SarmSeen | UaSeen | Connected` chart: `Disconnected`
/// until either SARM or UA has been seen, `SarmSeen`/`UaSeen` once exactly
/// one of the two has arrived, and `Connected` once both have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
	#[default]
	Disconnected,
	SarmSeen,
	UaSeen,
	Connected,
}

/// Per-path link state: the SARM/UA handshake flags, the modulo-8 `N(S)`/
/// `N(R)` counters, and whether a CG (general interrogation) has already
/// been answered on this connection.
///
/// Lives for the lifetime of one `PathEndpoint`'s connection; `reset` is
/// called whenever the underlying socket drops so a reconnect starts clean.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStateMachine {
	ns: u8,
	nr: u8,
	sarm_seen: bool,
	ua_seen: bool,
	cg_sent: bool,
}

impl LinkStateMachine {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reset(&mut self) {
		*self = Self::default();
	}

	/// Marks SARM as seen and resynchronizes `N(R)` to 0, matching the
	/// original `StateMachine::receiveSARMCode()`.
	pub fn on_sarm_received(&mut self) {
		self.sarm_seen = true;
		self.nr = 0;
	}

	pub fn on_ua_received(&mut self) {
		self.ua_seen = true;
	}

	/// Advances `N(R)` after accepting an information frame from the peer.
	pub fn on_info_received(&mut self) {
		self.nr = (self.nr + 1) % 8;
	}

	/// Advances `N(S)` after sending an information frame of our own.
	pub fn on_info_sent(&mut self) {
		self.ns = (self.ns + 1) % 8;
	}

	/// The tagged `LinkState` derived from the two handshake flags.
	pub fn state(&self) -> LinkState {
		match (self.sarm_seen, self.ua_seen) {
			(false, false) => LinkState::Disconnected,
			(true, false) => LinkState::SarmSeen,
			(false, true) => LinkState::UaSeen,
			(true, true) => LinkState::Connected,
		}
	}

	pub fn connected(&self) -> bool {
		self.state() == LinkState::Connected
	}

	pub fn cg_sent(&self) -> bool {
		self.cg_sent
	}

	pub fn set_cg_sent(&mut self, cg_sent: bool) {
		self.cg_sent = cg_sent;
	}

	pub fn ns(&self) -> u8 {
		self.ns
	}

	pub fn nr(&self) -> u8 {
		self.nr
	}

	/// Builds an RR control byte: low nibble `0001`, `N(R)` in bits 5-7,
	/// the poll/final bit in bit 4 if `p` is set. Any nonzero `p` is
	/// treated as "set the bit" — matching the original's `if (p != 0)`
	/// guard rather than shifting `p` itself into place.
	pub fn control_rr(&self, p: bool) -> u8 {
		let mut control = 0b0000_0001u8;
		control |= self.nr << 5;
		if p {
			control |= 1 << 4;
		}
		control
	}

	/// Builds a REJ control byte: low nibble `1001`, otherwise identical to
	/// [`Self::control_rr`].
	pub fn control_rej(&self, p: bool) -> u8 {
		self.control_rr(p) | (1 << 3)
	}

	/// Builds an information-frame control byte: bit 0 clear, `N(S)` in
	/// bits 1-3, the poll/final bit in bit 4, `N(R)` in bits 5-7.
	pub fn control_info(&self, p: bool) -> u8 {
		let mut control = 0u8;
		control |= self.nr << 5;
		if p {
			control |= 1 << 4;
		}
		control |= self.ns << 1;
		control
	}
}
