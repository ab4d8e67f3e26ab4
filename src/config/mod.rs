pub mod coerce;
pub mod options;
pub mod source;

// Re-export commonly used types
pub use coerce::{coerce, coerce_literal, CoercionError};
pub use options::ContextOptions;
pub use source::{ConfigSource, ConfigSourceChain, EnvConfigSource, MapConfigSource};
