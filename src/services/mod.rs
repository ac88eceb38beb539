pub mod corner_engine;
pub mod corner_service;
pub mod display;
pub mod foreground_probe;
pub mod platform;
pub mod preference_store;
pub mod scheduler;
pub mod suppression;
pub mod worker;

pub use corner_service::{CornerService, ServiceHandle, ServiceSettings};
pub use display::create_display_service;
pub use platform::create_platform_bridge;
pub use preference_store::TomlPreferenceStore;
