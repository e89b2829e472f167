pub mod ai;
pub mod config;
pub mod entry;
pub mod error;
pub mod markdown;
pub mod scheduler;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
