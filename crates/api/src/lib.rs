pub mod cache;
pub mod error;
pub mod models;
pub mod origin;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStatus};
pub use error::{TransportError, TransportResult};
pub use models::*;
pub use origin::{Origin, OriginRequest, OriginResponse};
