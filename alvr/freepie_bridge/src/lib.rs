mod bridge;
mod host;
mod layout;
mod packets;
mod platform;

pub use bridge::*;
pub use host::*;
pub use layout::*;
pub use packets::*;
pub use platform::*;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REGION_NAME: &str =
    "ALVR_FREEPIE_FILEMAPPING_13B65572-591A-4248-A2F6-BAC2D89EE3B8";
pub const DEFAULT_GATE_NAME: &str = "ALVR_FREEPIE_MUTEX_AA77F1C3-86E4-4EF9-AAA2-5C40CF380D7A";

/// Bound on the per-tick gate wait before the cycle is skipped.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Names of the OS objects shared with the host, plus the gate policy. The
/// defaults match the production host; tests substitute unique names.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BridgeConfig {
    pub region_name: String,
    pub gate_name: String,
    /// `None` waits on the gate without bound.
    pub lock_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            region_name: DEFAULT_REGION_NAME.into(),
            gate_name: DEFAULT_GATE_NAME.into(),
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
        }
    }
}
