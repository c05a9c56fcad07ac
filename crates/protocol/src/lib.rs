pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod messages;
pub mod types;
pub mod wire;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use messages::*;
pub use types::*;
