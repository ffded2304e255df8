pub mod config;
pub mod error;
pub mod logging;

pub mod assemble;
pub mod cache;
pub mod fetch;
pub mod headers;
pub mod identifier;
pub mod legacy;
pub mod listing;
pub mod negotiate;
pub mod origin;
pub mod outcome;
pub mod registry;
pub mod resolver;

pub use error::Result;
pub use registry::{Registry, RegistryRequest};
