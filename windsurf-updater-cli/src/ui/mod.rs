//! Terminal output for update runs.
//!
//! # Module Structure
//!
//! - `progress` - Download progress bar and stage lines
//! - `confirm` - Interactive replacement prompt

pub mod confirm;
pub mod progress;

pub use confirm::InteractiveConfirm;
pub use progress::{stage_reporter, DownloadProgress};
