//! Nitro attestation document verification.

use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::TargetMeasurements;

use crate::capability::QuoteVerifier;
use crate::report::{NitroDocument, NITRO_USER_DATA_LEN};

/// Verify a Nitro attestation document and check its PCR identity.
///
/// COSE signature and AWS certificate chain checks are delegated to
/// the quote verifier, with certificate validity evaluated at
/// `reference_time`. On success:
/// - if `expected_nonce` is set, the document nonce must match it;
/// - PCR0 through PCR2 must match the approved build;
/// - the committed user data must be exactly one binding digest wide.
pub fn verify_nitro_document(
    verifier: &dyn QuoteVerifier,
    document_bytes: &[u8],
    expected_nonce: Option<&str>,
    target: &TargetMeasurements,
    reference_time: i64,
) -> Result<NitroDocument> {
    let document = verifier.verify_nitro(document_bytes, reference_time)?;

    if let Some(expected_nonce) = expected_nonce {
        let nonce = hex::encode(&document.nonce);
        if expected_nonce != nonce {
            return Err(VerifyError::MeasurementMismatch {
                expected: expected_nonce.to_string(),
                actual: nonce,
            });
        }
    }

    let pinned = document.pinned_pcrs()?;
    let pcr_values = pinned.map(hex::encode);
    let target_pcr_values = target.pcr_values_hex();

    if pcr_values != target_pcr_values {
        tracing::warn!(
            expected = %target_pcr_values.join(", "),
            got = %pcr_values.join(", "),
            "reporting enclave PCR values don't match the expected ones"
        );
        return Err(VerifyError::MeasurementMismatch {
            expected: format!("[{}]", target_pcr_values.join(", ")),
            actual: format!("[{}]", pcr_values.join(", ")),
        });
    }

    if document.user_data.len() != NITRO_USER_DATA_LEN {
        return Err(VerifyError::StructuralDecode(format!(
            "unexpected length of the attestation report data: {}",
            document.user_data.len()
        )));
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::{build_nitro_document, SimulatedQuoteVerifier};
    use std::collections::BTreeMap;

    const REFERENCE_TIME: i64 = 1710946800;

    fn sample_pcrs() -> [[u8; 48]; 3] {
        [[0x01; 48], [0x02; 48], [0x03; 48]]
    }

    fn target_with_pcrs(pcrs: [[u8; 48]; 3]) -> TargetMeasurements {
        TargetMeasurements {
            unique_id: [0u8; 32],
            pcr_values: pcrs,
        }
    }

    fn sample_document() -> NitroDocument {
        let mut pcrs = BTreeMap::new();
        for (idx, pcr) in sample_pcrs().into_iter().enumerate() {
            pcrs.insert(idx as u32, pcr.to_vec());
        }
        NitroDocument {
            module_id: "i-0aa-enc0bb".to_string(),
            timestamp: 1701851063000,
            digest: "SHA384".to_string(),
            pcrs,
            certificate: vec![0x30],
            cabundle: vec![],
            public_key: vec![],
            user_data: vec![0xCD; NITRO_USER_DATA_LEN],
            nonce: vec![0x01, 0x02, 0x03],
        }
    }

    #[test]
    fn test_matching_document_passes() {
        let blob = build_nitro_document(&sample_document()).unwrap();
        let document = verify_nitro_document(
            &SimulatedQuoteVerifier,
            &blob,
            None,
            &target_with_pcrs(sample_pcrs()),
            REFERENCE_TIME,
        )
        .unwrap();
        assert_eq!(document.user_data, vec![0xCD; NITRO_USER_DATA_LEN]);
    }

    #[test]
    fn test_nonce_checked_when_supplied() {
        let blob = build_nitro_document(&sample_document()).unwrap();
        let target = target_with_pcrs(sample_pcrs());

        assert!(verify_nitro_document(
            &SimulatedQuoteVerifier,
            &blob,
            Some("010203"),
            &target,
            REFERENCE_TIME,
        )
        .is_ok());

        let err = verify_nitro_document(
            &SimulatedQuoteVerifier,
            &blob,
            Some("ffffff"),
            &target,
            REFERENCE_TIME,
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::MeasurementMismatch { .. }));
    }

    #[test]
    fn test_pcr_mismatch_lists_both_sets() {
        let blob = build_nitro_document(&sample_document()).unwrap();
        let err = verify_nitro_document(
            &SimulatedQuoteVerifier,
            &blob,
            None,
            &target_with_pcrs([[0x0F; 48]; 3]),
            REFERENCE_TIME,
        )
        .unwrap_err();

        match err {
            VerifyError::MeasurementMismatch { expected, actual } => {
                assert!(expected.contains(&"0f".repeat(48)));
                assert!(actual.contains(&"01".repeat(48)));
            }
            other => panic!("expected MeasurementMismatch, got {other}"),
        }
    }

    #[test]
    fn test_wrong_user_data_width_rejected() {
        let mut document = sample_document();
        document.user_data = vec![0xCD; 64];
        let blob = build_nitro_document(&document).unwrap();
        let err = verify_nitro_document(
            &SimulatedQuoteVerifier,
            &blob,
            None,
            &target_with_pcrs(sample_pcrs()),
            REFERENCE_TIME,
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::StructuralDecode(_)));
    }

    #[test]
    fn test_missing_pcr_rejected() {
        let mut document = sample_document();
        document.pcrs.remove(&2);
        let blob = build_nitro_document(&document).unwrap();
        assert!(verify_nitro_document(
            &SimulatedQuoteVerifier,
            &blob,
            None,
            &target_with_pcrs(sample_pcrs()),
            REFERENCE_TIME,
        )
        .is_err());
    }
}
