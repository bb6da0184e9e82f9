mod cache_index;
mod types;

pub use cache_index::CacheIndex;
pub use types::*;
