//! DisplayService: pointer position and monitor geometry from the host
//! windowing system.
//!
//! Only geometry lives here. Which display is targeted and what happens in
//! its corners is decided by the corner service.

mod cache;
mod dry_run;
mod r#trait;
mod x11;

pub use self::cache::DisplayCache;
pub use self::dry_run::DryRunDisplayService;
pub use self::r#trait::{create_display_service, DisplayService};
pub use self::x11::{parse_list_monitors, X11DisplayService};
