pub mod config;
pub mod controller;
pub mod machine;
pub mod placement;
pub mod state;

pub use config::*;
pub use controller::*;
pub use machine::*;
pub use placement::*;
pub use state::*;
