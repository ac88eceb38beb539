pub mod command;
pub mod foreground;
pub mod geometry;

pub use command::{EngineCommand, EngineNotification};
pub use foreground::{exe_basename, ForegroundInfo, ForegroundSnapshot, WindowTraits};
pub use geometry::{CursorPoint, DisplayBounds, DisplayInfo, DisplaySelector};
