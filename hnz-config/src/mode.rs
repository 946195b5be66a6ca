/// Whether a path endpoint should accept connections unconditionally, or
/// only once its matching south-side plugin is known to be connected. This
/// core only has one south-monitoring collaborator out of scope (§1), so
/// `ConnectIfSouthConnected` currently behaves identically to `Always`; it
/// is kept as a distinct variant so a future south-monitoring integration
/// has somewhere to plug in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
	#[default]
	Always,
	ConnectIfSouthConnected,
}
