pub mod artifacts;
pub mod builder;
pub mod defaults;
pub mod runtime;
pub mod traits;
