pub mod corner;
pub mod key_codes;
pub mod speed;

pub use corner::{Corner, EDGE_THRESHOLD_PX, NEAR_CORNER_THRESHOLD_PX};
pub use key_codes::{KeyCombo, KeycodeMap};
pub use speed::SpeedPreset;
