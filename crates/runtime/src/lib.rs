pub mod intent_log;
pub mod throttle;

pub use intent_log::*;
pub use throttle::*;
