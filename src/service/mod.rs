pub mod cache;
pub mod client;

pub use cache::{clear_cache, get_cache_path, DetailCache};
pub use client::ServiceClient;
