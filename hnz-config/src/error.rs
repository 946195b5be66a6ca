use thiserror::Error;

/// Everything that can go wrong while importing one of the two configuration
/// documents. Never propagated to `Config::parse`'s caller: it is logged and
/// folded into `protocol_config_complete`/`exchange_config_complete` instead.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("malformed configuration JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("remote_station_addr is missing")]
	MissingRemoteStationAddr,

	/// Mirrors the original plugin's own (off-by-one, never tightened)
	/// bound: it logs "not on 6 bits" but actually rejects only `> 64`.
	#[error("remote_station_addr {0} is not on 6 bits")]
	RemoteStationAddrOutOfRange(u32),

	#[error("datapoint {label:?} has no hnzip protocol entry")]
	MissingHnzipProtocol { label: String },
}
