#![warn(clippy::unwrap_used)]

pub mod local;

pub use local::{CacheKey, ResponseCache};
