pub mod aggregate;
pub mod cache;
pub mod request_cache;

pub use aggregate::*;
pub use cache::*;
pub use request_cache::*;

// Re-export common types for convenience
pub use genealogy_core::{NodeId, Source};
