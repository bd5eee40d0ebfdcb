//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (network, chain_id, tx_hash)
//!     → metrics.rs (RPC and operation counters)
//!
//! The embedding process decides where they go:
//!     → logging.rs installs a tracing-subscriber (pretty or JSON)
//!     → any `metrics` recorder/exporter it chooses to install
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder on its own
//! - Private keys and full RPC URLs (which may embed API keys) are never logged

pub mod logging;
pub mod metrics;
