pub mod config;
pub mod error;
pub mod types;

pub use config::CaptureConfig;
pub use error::{FeedtapError, Result};
pub use types::{PostContext, PostRecord, RawExchange, Reaction, StopReason};
