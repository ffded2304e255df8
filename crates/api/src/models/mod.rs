pub mod metadata;
pub mod module;

pub use metadata::*;
pub use module::*;
