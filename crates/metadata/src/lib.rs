pub mod cache;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod provider;

pub use cache::*;
pub use descriptor::*;
pub use directory::*;
pub use error::*;
pub use provider::*;
