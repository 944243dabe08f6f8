//! Data models

pub mod pump_log;
pub mod snore_log;
pub mod user;

pub use pump_log::*;
pub use snore_log::*;
pub use user::*;
