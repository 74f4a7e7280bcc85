pub mod config;
pub mod error;
pub mod logging;
pub mod security;
pub mod validation;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use security::*;
pub use validation::*;
