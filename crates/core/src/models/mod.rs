//! Data models for Snapseek

mod user;
mod search;
mod login;

pub use user::*;
pub use search::*;
pub use login::*;
