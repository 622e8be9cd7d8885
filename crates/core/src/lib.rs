pub mod config;
pub mod error;
pub mod watcher;

pub use config::Config;
pub use error::*;
pub use watcher::*;
