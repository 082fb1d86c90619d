pub mod config;
pub mod error;
pub mod locator;
pub mod observability;
pub mod path_util;

pub use error::BootError;
