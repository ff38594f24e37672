pub mod controller;
pub mod markers;
pub mod registry;
pub mod renderer;

pub use controller::*;
pub use markers::*;
pub use registry::*;
pub use renderer::*;
