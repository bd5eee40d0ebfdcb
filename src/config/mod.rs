//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (default network, keys, gateway, log level)
//!     → validation.rs (semantic checks)
//!     → AccessConfig (owned by one ChainAccess instance)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The access layer only consumes a config; loading it is the embedder's call

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AccessConfig;
pub use schema::ObservabilityConfig;
pub use schema::TokenConfig;
