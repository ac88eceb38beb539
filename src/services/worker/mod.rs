//! Worker process channel.
//!
//! Owns long-lived helper subprocesses that speak the line protocol
//! (`TRIGGER`, `STATUS`, `EXIT` on stdin; one JSON line per `STATUS` on
//! stdout). Responses are paired with requests strictly in FIFO order; every
//! failure degrades to the empty response `{}` and a restart after backoff.

mod channel;
mod pending;
mod protocol;

pub use channel::{ChannelSettings, WorkerChannel};
pub use protocol::{WorkerCommand, EMPTY_RESPONSE};
