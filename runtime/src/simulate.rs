//! Simulated capability providers.
//!
//! Stand-ins for the hardware-backed quote verification and signer
//! capabilities, used in tests and when the process is started with
//! `simulation: true`. Simulated reports carry the real wire framing
//! (OpenEnclave header, COSE_Sign1 envelope) but their signatures are
//! placeholders and are NOT checked against any root of trust.

use sha2::{Digest, Sha256};

use oracle_verify_core::error::{Result, VerifyError};

use crate::capability::{QuoteVerifier, SignerSession, SignerWrapper};
use crate::report::{NitroDocument, SgxReport, TcbStatus, SGX_REPORT_DATA_LEN};
use crate::sniffer::{NITRO_DOCUMENT_MAGIC, SGX_REPORT_MAGIC};

/// Body length of a simulated SGX report.
pub const SIMULATED_SGX_BODY_LEN: usize = 150;

const NITRO_SIGNATURE_LEN: usize = 96;

fn tcb_status_to_byte(status: TcbStatus) -> u8 {
    match status {
        TcbStatus::UpToDate => 0,
        TcbStatus::OutOfDate => 1,
        TcbStatus::SWHardeningNeeded => 2,
        TcbStatus::ConfigurationNeeded => 3,
        TcbStatus::ConfigurationAndSWHardeningNeeded => 4,
        TcbStatus::OutOfDateConfigurationNeeded => 5,
        TcbStatus::Revoked => 6,
        TcbStatus::Unknown => 7,
    }
}

fn tcb_status_from_byte(byte: u8) -> TcbStatus {
    match byte {
        0 => TcbStatus::UpToDate,
        1 => TcbStatus::OutOfDate,
        2 => TcbStatus::SWHardeningNeeded,
        3 => TcbStatus::ConfigurationNeeded,
        4 => TcbStatus::ConfigurationAndSWHardeningNeeded,
        5 => TcbStatus::OutOfDateConfigurationNeeded,
        6 => TcbStatus::Revoked,
        _ => TcbStatus::Unknown,
    }
}

/// Serialize an SGX report with the OpenEnclave remote report framing
/// the sniffer expects.
pub fn build_sgx_report(report: &SgxReport) -> Vec<u8> {
    let mut blob = Vec::with_capacity(16 + SIMULATED_SGX_BODY_LEN);
    blob.extend_from_slice(&SGX_REPORT_MAGIC);
    blob.extend_from_slice(&(SIMULATED_SGX_BODY_LEN as u64).to_le_bytes());

    blob.extend_from_slice(&report.unique_id);
    blob.extend_from_slice(&report.signer_id);
    blob.extend_from_slice(&report.product_id);
    blob.extend_from_slice(&report.security_version.to_le_bytes());
    blob.push(report.debug as u8);
    blob.push(tcb_status_to_byte(report.tcb_status));
    blob.extend_from_slice(&report.data);

    blob
}

/// Serialize a Nitro document into a COSE_Sign1 envelope with a
/// placeholder signature.
pub fn build_nitro_document(document: &NitroDocument) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(document, &mut payload)
        .map_err(|err| VerifyError::Serialization(err.to_string()))?;

    let payload_len = u16::try_from(payload.len()).map_err(|_| {
        VerifyError::MalformedInput("document payload exceeds a 16-bit length".to_string())
    })?;

    let mut blob = Vec::with_capacity(12 + payload.len() + NITRO_SIGNATURE_LEN);
    blob.extend_from_slice(&NITRO_DOCUMENT_MAGIC);
    blob.extend_from_slice(&payload_len.to_be_bytes());
    blob.extend_from_slice(&payload);
    // signature byte string: 96-byte placeholder
    blob.extend_from_slice(&[0x58, 0x60]);
    blob.extend_from_slice(&[0x5A; NITRO_SIGNATURE_LEN]);

    Ok(blob)
}

/// Quote verifier that parses report structure but performs no
/// signature or certificate chain checks.
pub struct SimulatedQuoteVerifier;

impl SimulatedQuoteVerifier {
    pub fn new() -> Self {
        tracing::warn!("simulation mode: attestation reports are NOT cryptographically verified");
        Self
    }
}

impl Default for SimulatedQuoteVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteVerifier for SimulatedQuoteVerifier {
    fn verify_sgx(&self, report: &[u8]) -> Result<SgxReport> {
        if report.len() != 16 + SIMULATED_SGX_BODY_LEN || report[..8] != SGX_REPORT_MAGIC {
            return Err(VerifyError::Cryptographic(
                "simulated SGX verification failed: malformed report".to_string(),
            ));
        }

        let body = &report[16..];
        let mut parsed = SgxReport {
            data: [0u8; SGX_REPORT_DATA_LEN],
            security_version: u32::from_le_bytes(body[84..88].try_into().map_err(|_| {
                VerifyError::Cryptographic("simulated SGX verification failed".to_string())
            })?),
            debug: body[88] != 0,
            unique_id: [0u8; 32],
            signer_id: [0u8; 32],
            product_id: [0u8; 16],
            tcb_status: tcb_status_from_byte(body[89]),
        };
        parsed.unique_id.copy_from_slice(&body[..32]);
        parsed.signer_id.copy_from_slice(&body[32..64]);
        parsed.product_id.copy_from_slice(&body[64..80]);
        parsed.data.copy_from_slice(&body[90..90 + SGX_REPORT_DATA_LEN]);

        Ok(parsed)
    }

    fn verify_nitro(&self, document: &[u8], reference_time: i64) -> Result<NitroDocument> {
        if document.len() < 12 + NITRO_SIGNATURE_LEN || document[..8] != NITRO_DOCUMENT_MAGIC {
            return Err(VerifyError::Cryptographic(
                "simulated Nitro verification failed: malformed document".to_string(),
            ));
        }

        let payload_len = u16::from_be_bytes([document[8], document[9]]) as usize;
        if 12 + payload_len + NITRO_SIGNATURE_LEN != document.len() {
            return Err(VerifyError::Cryptographic(
                "simulated Nitro verification failed: bad payload length".to_string(),
            ));
        }

        let payload: NitroDocument = ciborium::from_reader(&document[10..10 + payload_len])
            .map_err(|err| {
                VerifyError::Cryptographic(format!("simulated Nitro verification failed: {err}"))
            })?;

        if reference_time <= 0 {
            return Err(VerifyError::Cryptographic(
                "certificate validity reference time is not set".to_string(),
            ));
        }

        Ok(payload)
    }
}

/// Signer whose wire format is a comma-separated list of u128 chunk
/// literals and whose digest is a truncated SHA-256.
pub struct SimulatedSigner;

impl SimulatedSigner {
    pub fn new() -> Self {
        tracing::warn!("simulation mode: binding digests use a stand-in hash, not the enclave-native one");
        Self
    }
}

impl Default for SimulatedSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerWrapper for SimulatedSigner {
    fn open_session(&self) -> Result<Box<dyn SignerSession>> {
        Ok(Box::new(SimulatedSignerSession))
    }
}

/// One session of the simulated signer. Stateless; the real capability
/// holds per-session resources that are released on drop.
pub struct SimulatedSignerSession;

impl SignerSession for SimulatedSignerSession {
    fn recover_message(&mut self, wire: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(wire)
            .map_err(|_| VerifyError::Session("wire message is not valid UTF-8".to_string()))?;

        let mut recovered = Vec::new();
        for literal in text.split(',') {
            let literal = literal.trim();
            let digits = literal.strip_suffix("u128").ok_or_else(|| {
                VerifyError::Session(format!("malformed chunk literal {literal:?}"))
            })?;
            let chunk: u128 = digits.parse().map_err(|_| {
                VerifyError::Session(format!("malformed chunk literal {literal:?}"))
            })?;
            recovered.extend_from_slice(&chunk.to_le_bytes());
        }

        Ok(recovered)
    }

    fn format_message(&mut self, message: &[u8], field_count: usize) -> Result<Vec<u8>> {
        if field_count == 0 || field_count > 32 {
            return Err(VerifyError::Session(format!(
                "field count {field_count} is out of range"
            )));
        }

        let mut padded = message.to_vec();
        let rem = padded.len() % 16;
        if rem != 0 {
            padded.resize(padded.len() + 16 - rem, 0);
        }

        let mut literals = Vec::with_capacity(padded.len() / 16);
        for chunk in padded.chunks_exact(16) {
            let arr: [u8; 16] = chunk.try_into().map_err(|_| {
                VerifyError::Session("message chunking failed".to_string())
            })?;
            literals.push(format!("{}u128", u128::from_le_bytes(arr)));
        }

        Ok(literals.join(",").into_bytes())
    }

    fn hash_message(&mut self, formatted: &[u8]) -> Result<[u8; 16]> {
        let digest = Sha256::digest(formatted);
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        Ok(out)
    }
}
