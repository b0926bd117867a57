//! External capability seams.
//!
//! Quote verification and the enclave-native message hash are not
//! reimplemented here; they are invoked through these traits. The
//! production process plugs in the hardware-backed implementations,
//! tests and simulation mode plug in the providers from
//! [`crate::simulate`].

use oracle_verify_core::error::Result;

use crate::report::{NitroDocument, SgxReport};

/// Verifies report signatures and certificate chains.
///
/// Failures are cryptographic errors and must be surfaced to the
/// caller verbatim.
pub trait QuoteVerifier: Send + Sync {
    /// Verify an SGX remote report and return its parsed fields.
    fn verify_sgx(&self, report: &[u8]) -> Result<SgxReport>;

    /// Verify a Nitro attestation document against the AWS root of
    /// trust, checking certificate validity at `reference_time` (unix
    /// seconds), and return its payload.
    fn verify_nitro(&self, document: &[u8], reference_time: i64) -> Result<NitroDocument>;
}

/// Factory for scoped signer sessions.
pub trait SignerWrapper: Send + Sync {
    /// Open a fresh session. Each request-level operation gets its own
    /// session and must not share it with concurrent callers; the
    /// session is released when the box is dropped.
    fn open_session(&self) -> Result<Box<dyn SignerSession>>;
}

/// One scoped handle to the message format and hash capability.
pub trait SignerSession: Send {
    /// Recover raw bytes from the signer's wire representation.
    fn recover_message(&mut self, wire: &[u8]) -> Result<Vec<u8>>;

    /// Format raw bytes into the canonical chunked representation with
    /// `field_count` data fields per struct.
    fn format_message(&mut self, message: &[u8], field_count: usize) -> Result<Vec<u8>>;

    /// Hash a formatted message down to the 16-byte binding digest.
    fn hash_message(&mut self, formatted: &[u8]) -> Result<[u8; 16]>;
}
