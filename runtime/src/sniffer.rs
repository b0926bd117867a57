//! Report type sniffing.
//!
//! Enclaves hand back raw report blobs, sometimes with trailing
//! garbage from fixed-size transport buffers. The sniffer looks at the
//! first bytes to decide which TEE produced the report and cuts the
//! blob down to the exact report slice.

use oracle_verify_core::error::{Result, VerifyError};

/// OpenEnclave remote report header prefix: version 1, type 2, both
/// little-endian u32.
pub const SGX_REPORT_MAGIC: [u8; 8] = [0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];

/// COSE_Sign1 prefix of a Nitro attestation document: a 4-element
/// array, a 4-byte protected header with alg -35, an empty unprotected
/// map, and the opening of a 16-bit-length payload byte string.
pub const NITRO_DOCUMENT_MAGIC: [u8; 8] = [0x84, 0x44, 0xA1, 0x01, 0x38, 0x22, 0xA0, 0x59];

/// Offset of the body length in both report headers.
const LENGTH_OFFSET: usize = 8;

/// Minimum bytes required before the sniffer can read a length.
pub const MIN_REPORT_LEN: usize = 10;

/// Bytes before the SGX report body: magic plus a u64 body length.
const SGX_HEADER_LEN: usize = 16;

/// Bytes before the Nitro payload (prefix, length, payload byte-string
/// header) plus the trailing signature byte string.
const NITRO_FRAMING_LEN: usize = 12;
const NITRO_SIGNATURE_LEN: usize = 96;

/// The TEE that produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeKind {
    Sgx,
    Nitro,
}

impl TeeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TeeKind::Sgx => "sgx",
            TeeKind::Nitro => "nitro",
        }
    }
}

/// Identify the TEE type of a raw report blob and return the exact
/// report slice, discarding anything after it.
pub fn sniff_report(buf: &[u8]) -> Result<(TeeKind, &[u8])> {
    if buf.len() < MIN_REPORT_LEN {
        return Err(VerifyError::StructuralDecode(format!(
            "report blob is too short: {} bytes",
            buf.len()
        )));
    }

    if buf[..8] == SGX_REPORT_MAGIC {
        if buf.len() < SGX_HEADER_LEN {
            return Err(VerifyError::StructuralDecode(
                "SGX report is missing its body length".to_string(),
            ));
        }

        let body_len = u64::from_le_bytes(
            buf[LENGTH_OFFSET..LENGTH_OFFSET + 8]
                .try_into()
                .map_err(|_| VerifyError::StructuralDecode("bad SGX body length".to_string()))?,
        );

        let total = usize::try_from(body_len)
            .ok()
            .and_then(|len| len.checked_add(SGX_HEADER_LEN))
            .filter(|&total| total <= buf.len())
            .ok_or_else(|| {
                VerifyError::StructuralDecode(format!(
                    "SGX report body length {body_len} exceeds blob of {} bytes",
                    buf.len()
                ))
            })?;

        return Ok((TeeKind::Sgx, &buf[..total]));
    }

    if buf[..8] == NITRO_DOCUMENT_MAGIC {
        let payload_len =
            u16::from_be_bytes([buf[LENGTH_OFFSET], buf[LENGTH_OFFSET + 1]]) as usize;

        let total = NITRO_FRAMING_LEN + payload_len + NITRO_SIGNATURE_LEN;
        if total > buf.len() {
            return Err(VerifyError::StructuralDecode(format!(
                "Nitro document payload length {payload_len} exceeds blob of {} bytes",
                buf.len()
            )));
        }

        return Ok((TeeKind::Nitro, &buf[..total]));
    }

    Err(VerifyError::UnsupportedReportType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sgx_blob(body_len: u64, total_len: usize) -> Vec<u8> {
        let mut blob = vec![0xCC; total_len];
        blob[..8].copy_from_slice(&SGX_REPORT_MAGIC);
        blob[8..16].copy_from_slice(&body_len.to_le_bytes());
        blob
    }

    fn nitro_blob(payload_len: u16, total_len: usize) -> Vec<u8> {
        let mut blob = vec![0xCC; total_len];
        blob[..8].copy_from_slice(&NITRO_DOCUMENT_MAGIC);
        blob[8..10].copy_from_slice(&payload_len.to_be_bytes());
        blob
    }

    #[test]
    fn test_sniff_sgx_exact_slice() {
        let blob = sgx_blob(100, 200);
        let (kind, report) = sniff_report(&blob).unwrap();
        assert_eq!(kind, TeeKind::Sgx);
        assert_eq!(report.len(), 116);
        assert_eq!(report, &blob[..116]);
    }

    #[test]
    fn test_sniff_sgx_no_trailing_garbage() {
        let blob = sgx_blob(100, 116);
        let (_, report) = sniff_report(&blob).unwrap();
        assert_eq!(report.len(), 116);
    }

    #[test]
    fn test_sniff_sgx_body_exceeds_blob() {
        let blob = sgx_blob(1000, 116);
        assert!(matches!(
            sniff_report(&blob),
            Err(VerifyError::StructuralDecode(_))
        ));
    }

    #[test]
    fn test_sniff_sgx_huge_length_no_overflow() {
        let blob = sgx_blob(u64::MAX, 200);
        assert!(matches!(
            sniff_report(&blob),
            Err(VerifyError::StructuralDecode(_))
        ));
    }

    #[test]
    fn test_sniff_nitro_exact_slice() {
        let blob = nitro_blob(500, 1000);
        let (kind, report) = sniff_report(&blob).unwrap();
        assert_eq!(kind, TeeKind::Nitro);
        assert_eq!(report.len(), 12 + 500 + 96);
    }

    #[test]
    fn test_sniff_nitro_payload_exceeds_blob() {
        let blob = nitro_blob(500, 300);
        assert!(matches!(
            sniff_report(&blob),
            Err(VerifyError::StructuralDecode(_))
        ));
    }

    #[test]
    fn test_sniff_too_short() {
        assert!(matches!(
            sniff_report(&[0u8; 9]),
            Err(VerifyError::StructuralDecode(_))
        ));
        assert!(matches!(sniff_report(&[]), Err(VerifyError::StructuralDecode(_))));
    }

    #[test]
    fn test_sniff_unknown_prefix() {
        let blob = vec![0xAB; 64];
        assert!(matches!(
            sniff_report(&blob),
            Err(VerifyError::UnsupportedReportType)
        ));
    }

    #[test]
    fn test_sniff_almost_sgx_magic() {
        let mut blob = sgx_blob(10, 64);
        blob[4] = 0x03;
        assert!(matches!(
            sniff_report(&blob),
            Err(VerifyError::UnsupportedReportType)
        ));
    }
}
