//! Oracle Verification Core - Foundational Types
//!
//! Shared building blocks for the oracle verification backend: the
//! error taxonomy, process configuration, and the approved enclave
//! measurement targets with their on-chain chunk encodings.

pub mod config;
pub mod error;
pub mod measurement;

// Re-export commonly used types
pub use config::{Configuration, LiveCheckConfig, DEFAULT_NITRO_VERIFICATION_TIME};
pub use error::{Result, VerifyError};
pub use measurement::{
    format_pcr_values, format_u128_pair, slice_to_u128, PcrValuesInfo, TargetMeasurements,
    UniqueIdInfo, PCR_COUNT, PCR_LEN, UNIQUE_ID_LEN,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
