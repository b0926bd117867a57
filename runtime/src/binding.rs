//! Proof-to-report binding verification.
//!
//! Proves that a decoded proof payload was produced inside the same
//! enclave run as the attestation report: the canonical proof bytes
//! are rebuilt, formatted and hashed by the signer capability, and the
//! digest is compared against the bytes the enclave committed to in
//! its report.

use oracle_verify_core::error::{Result, VerifyError};

use crate::capability::SignerSession;
use crate::codec::{encode_proof_data, META_HEADER_LEN};
use crate::proof::DecodedProofData;

/// Width of the committed digest, in bytes. A Poseidon8 hash is 16
/// bytes in byte form, so only this prefix of the report's committed
/// user data carries the binding.
// IMPORTANT! this needs to be adjusted if more data goes into the report
pub const BINDING_COMMIT_WIDTH: usize = 16;

/// Data fields per struct when formatting the proof for hashing.
pub const REPORT_DATA_FIELD_COUNT: usize = 8;

/// Recompute the binding digest for a decoded proof and compare it to
/// the report's committed user data.
pub fn verify_binding(
    session: &mut dyn SignerSession,
    decoded: &DecodedProofData,
    committed_user_data: &[u8],
    price_feed_urls: &[String],
) -> Result<()> {
    if committed_user_data.len() < BINDING_COMMIT_WIDTH {
        return Err(VerifyError::StructuralDecode(format!(
            "committed user data is too short: {} bytes",
            committed_user_data.len()
        )));
    }

    let mut proof_bytes = encode_proof_data(
        decoded.response_status_code,
        &decoded.attestation_data,
        decoded.timestamp,
        &decoded.attestation_request,
        price_feed_urls,
    )
    .map_err(|err| VerifyError::BindingPrepare(err.to_string()))?;

    // price feed payloads arrive pre-formatted from the feed encoder,
    // which stamps a marker into their leading byte. The commitment
    // does not cover that marker, so it is zeroed on both sides of the
    // comparison before hashing.
    if price_feed_urls.contains(&decoded.attestation_request.url) {
        if let Some(first) = proof_bytes.get_mut(META_HEADER_LEN) {
            *first = 0;
        }
    }

    let formatted = session
        .format_message(&proof_bytes, REPORT_DATA_FIELD_COUNT)
        .map_err(|err| VerifyError::BindingFormat(err.to_string()))?;

    let digest = session
        .hash_message(&formatted)
        .map_err(|err| VerifyError::BindingHash(err.to_string()))?;

    if digest[..] != committed_user_data[..BINDING_COMMIT_WIDTH] {
        return Err(VerifyError::BindingMismatch);
    }

    Ok(())
}
