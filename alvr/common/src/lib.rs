pub mod logging;

pub use anyhow;
pub use glam;
pub use log;
pub use once_cell;

pub use log::{debug, error, info, warn};
pub use logging::*;
