//! Verification orchestrator.
//!
//! Composes the sniffer, the TEE adapters, and the binding verifier
//! into the request-facing operations. The orchestrator holds only
//! read-only state, so any number of verifications may run in parallel;
//! each request-level operation opens its own signer session and
//! releases it on every exit path when the box drops.

use std::sync::Arc;

use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::TargetMeasurements;

use crate::binding::verify_binding;
use crate::capability::{QuoteVerifier, SignerSession, SignerWrapper};
use crate::codec::decode_proof_data;
use crate::nitro::verify_nitro_document;
use crate::proof::{AttestationRequest, DecodedProofData};
use crate::report::{format_report, AttestationReport, FormattedReport};
use crate::sgx::verify_sgx_report;
use crate::sniffer::{sniff_report, TeeKind};

/// Progress of a single verification call. Every stage can fail into a
/// terminal rejection, surfaced as the returned error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerificationStage {
    Received,
    Sniffed,
    Authenticated,
    MeasurementsChecked,
    Bound,
    Valid,
}

impl VerificationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStage::Received => "received",
            VerificationStage::Sniffed => "sniffed",
            VerificationStage::Authenticated => "authenticated",
            VerificationStage::MeasurementsChecked => "measurements_checked",
            VerificationStage::Bound => "bound",
            VerificationStage::Valid => "valid",
        }
    }
}

/// One report with the proof fields it claims to attest, transport
/// encoding already stripped by the caller.
#[derive(Debug, Clone)]
pub struct ReportSubmission {
    pub report_bytes: Vec<u8>,
    pub nonce: Option<String>,
    pub status_code: u64,
    pub attestation_data: String,
    pub timestamp: i64,
    pub request: AttestationRequest,
}

/// The verification engine. Built once at startup, after the target
/// measurements are fixed, and shared read-only across requests.
pub struct Verifier {
    target: TargetMeasurements,
    quotes: Arc<dyn QuoteVerifier>,
    signer: Arc<dyn SignerWrapper>,
    price_feed_urls: Vec<String>,
    nitro_verification_time: i64,
}

impl Verifier {
    pub fn new(
        target: TargetMeasurements,
        quotes: Arc<dyn QuoteVerifier>,
        signer: Arc<dyn SignerWrapper>,
        price_feed_urls: Vec<String>,
        nitro_verification_time: i64,
    ) -> Self {
        Self {
            target,
            quotes,
            signer,
            price_feed_urls,
            nitro_verification_time,
        }
    }

    pub fn target_measurements(&self) -> &TargetMeasurements {
        &self.target
    }

    /// Decode a canonical proof payload. No attestation check.
    pub fn decode_proof(&self, proof_bytes: &[u8]) -> Result<DecodedProofData> {
        decode_proof_data(proof_bytes)
    }

    /// Open a signer session for one request-level operation.
    pub fn open_session(&self) -> Result<Box<dyn SignerSession>> {
        self.signer.open_session()
    }

    /// Sniff and verify one report, then bind the claimed proof fields
    /// to it.
    fn verify_one(
        &self,
        session: &mut dyn SignerSession,
        submission: &ReportSubmission,
    ) -> Result<AttestationReport> {
        let (kind, report_slice) = sniff_report(&submission.report_bytes)?;
        tracing::debug!(
            stage = VerificationStage::Sniffed.as_str(),
            tee = kind.as_str(),
            report_len = report_slice.len(),
            "report type identified"
        );

        let report = match kind {
            TeeKind::Sgx => {
                AttestationReport::Sgx(verify_sgx_report(&*self.quotes, report_slice, &self.target)?)
            }
            TeeKind::Nitro => AttestationReport::Nitro(verify_nitro_document(
                &*self.quotes,
                report_slice,
                submission.nonce.as_deref(),
                &self.target,
                self.nitro_verification_time,
            )?),
        };
        tracing::debug!(
            stage = VerificationStage::MeasurementsChecked.as_str(),
            tee = kind.as_str(),
            "report authenticated against target measurements"
        );

        let decoded = DecodedProofData {
            attestation_request: submission.request.clone(),
            attestation_data: submission.attestation_data.clone(),
            response_status_code: submission.status_code,
            timestamp: submission.timestamp,
        };
        verify_binding(
            session,
            &decoded,
            report.committed_user_data(),
            &self.price_feed_urls,
        )?;
        tracing::debug!(
            stage = VerificationStage::Valid.as_str(),
            tee = kind.as_str(),
            "proof bound to report"
        );

        Ok(report)
    }

    /// Verify a batch of reports in order.
    ///
    /// The first failure aborts the batch: the error is returned and no
    /// indices are reported valid, even for reports that had already
    /// passed.
    pub fn verify_batch(&self, submissions: &[ReportSubmission]) -> Result<Vec<usize>> {
        let mut session = self.signer.open_session()?;

        for (idx, submission) in submissions.iter().enumerate() {
            if let Err(err) = self.verify_one(session.as_mut(), submission) {
                tracing::warn!(report = idx, error = %err, "report verification failed");
                return Err(err);
            }
        }

        Ok((0..submissions.len()).collect())
    }

    /// Decode a recovered proof payload, attaching the stale-encoder
    /// hint on failure since an undecodable payload usually means the
    /// encoder versions drifted apart.
    pub fn decode_recovered_proof(&self, proof_bytes: &[u8]) -> Result<DecodedProofData> {
        decode_proof_data(proof_bytes).map_err(|err| {
            VerifyError::StructuralDecode(format!(
                "{err}; user data may be using a different version of encoder, please check for updates"
            ))
        })
    }

    /// Verify a recovered report against already-decoded proof data
    /// and format it for display.
    pub fn verify_decoded(
        &self,
        session: &mut dyn SignerSession,
        decoded: &DecodedProofData,
        report_bytes: &[u8],
    ) -> Result<FormattedReport> {
        let (kind, report_slice) = sniff_report(report_bytes)?;
        let report = match kind {
            TeeKind::Sgx => {
                AttestationReport::Sgx(verify_sgx_report(&*self.quotes, report_slice, &self.target)?)
            }
            TeeKind::Nitro => AttestationReport::Nitro(verify_nitro_document(
                &*self.quotes,
                report_slice,
                None,
                &self.target,
                self.nitro_verification_time,
            )?),
        };

        verify_binding(
            session,
            decoded,
            report.committed_user_data(),
            &self.price_feed_urls,
        )?;

        format_report(&report)
    }

    /// Recover, decode, and fully verify one proof/report pair, then
    /// format the verified report for display.
    pub fn decode_and_verify(
        &self,
        user_data_wire: &[u8],
        report_wire: &[u8],
    ) -> Result<(DecodedProofData, FormattedReport)> {
        let mut session = self.signer.open_session()?;

        let proof_bytes = session.recover_message(user_data_wire)?;
        let report_bytes = session.recover_message(report_wire)?;

        // decoding the recovered proof is redundant with the binding
        // check below, but it confirms the payload follows the known
        // encoding scheme before any cryptography runs
        let decoded = self.decode_recovered_proof(&proof_bytes)?;
        let formatted = self.verify_decoded(session.as_mut(), &decoded, &report_bytes)?;

        Ok((decoded, formatted))
    }
}
