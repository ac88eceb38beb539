//! PlatformBridge: the only seam between the corner engine and the OS.
//!
//! The engine fires the action and asks for the foreground window; nothing
//! else. The real bridge talks to the helper worker process, the dry-run
//! bridge only logs, and tests substitute their own in-memory fakes.

mod dry_run;
mod r#trait;
mod worker_bridge;

pub use self::dry_run::DryRunBridge;
pub use self::r#trait::{create_platform_bridge, PlatformBridge};
pub use self::worker_bridge::WorkerBridge;
