//! SGX report verification.

use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::TargetMeasurements;

use crate::capability::QuoteVerifier;
use crate::report::SgxReport;

/// Verify an SGX remote report and check its enclave identity.
///
/// Signature and certificate chain checks are delegated to the quote
/// verifier; its errors pass through unchanged. On success the parsed
/// unique ID must match the approved build.
pub fn verify_sgx_report(
    verifier: &dyn QuoteVerifier,
    report_bytes: &[u8],
    target: &TargetMeasurements,
) -> Result<SgxReport> {
    let report = verifier.verify_sgx(report_bytes)?;

    let unique_id = hex::encode(report.unique_id);
    let target_unique_id = target.unique_id_hex();

    if unique_id != target_unique_id {
        tracing::warn!(
            expected = %target_unique_id,
            got = %unique_id,
            "reporting enclave unique ID doesn't match the expected one"
        );
        return Err(VerifyError::MeasurementMismatch {
            expected: target_unique_id,
            actual: unique_id,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{TcbStatus, SGX_REPORT_DATA_LEN};
    use crate::simulate::{build_sgx_report, SimulatedQuoteVerifier};

    fn target_with_unique_id(unique_id: [u8; 32]) -> TargetMeasurements {
        TargetMeasurements {
            unique_id,
            pcr_values: [[0u8; 48]; 3],
        }
    }

    fn report_with_unique_id(unique_id: [u8; 32]) -> SgxReport {
        SgxReport {
            data: [0x42; SGX_REPORT_DATA_LEN],
            security_version: 1,
            debug: false,
            unique_id,
            signer_id: [0x33; 32],
            product_id: [0u8; 16],
            tcb_status: TcbStatus::UpToDate,
        }
    }

    #[test]
    fn test_matching_unique_id_passes() {
        let unique_id = [0xAA; 32];
        let blob = build_sgx_report(&report_with_unique_id(unique_id));
        let report = verify_sgx_report(
            &SimulatedQuoteVerifier,
            &blob,
            &target_with_unique_id(unique_id),
        )
        .unwrap();
        assert_eq!(report.unique_id, unique_id);
    }

    #[test]
    fn test_mismatched_unique_id_rejected() {
        let blob = build_sgx_report(&report_with_unique_id([0xAA; 32]));
        let err = verify_sgx_report(
            &SimulatedQuoteVerifier,
            &blob,
            &target_with_unique_id([0xBB; 32]),
        )
        .unwrap_err();

        match err {
            VerifyError::MeasurementMismatch { expected, actual } => {
                assert_eq!(expected, "bb".repeat(32));
                assert_eq!(actual, "aa".repeat(32));
            }
            other => panic!("expected MeasurementMismatch, got {other}"),
        }
    }

    #[test]
    fn test_cryptographic_failure_passes_through() {
        let err = verify_sgx_report(
            &SimulatedQuoteVerifier,
            &[0u8; 32],
            &target_with_unique_id([0xAA; 32]),
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::Cryptographic(_)));
    }
}
