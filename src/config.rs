//! Process-wide configuration (§6), constructed once by the binary and
//! shared read-only across the supervisor, every connection handler and
//! every authority session.

use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_LEN;

/// Default authority endpoint, per §6 ("a well-known default exists").
pub const DEFAULT_AUTHORITY_ADDR: &str = "pestcontrol.protohackers.com:20547";

/// Default authority RPC timeout (§5: "implementation-chosen, e.g., 10 s").
pub const DEFAULT_AUTHORITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    /// Address this coordinator listens for inbound client connections on.
    pub listen_addr: String,
    /// Address of the upstream authority service.
    pub authority_addr: String,
    /// Largest frame either direction of the wire codec will buffer.
    pub max_frame_len: usize,
    /// Bound on each individual authority request/response round trip.
    pub authority_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            authority_addr: DEFAULT_AUTHORITY_ADDR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            authority_timeout: DEFAULT_AUTHORITY_TIMEOUT,
        }
    }
}
