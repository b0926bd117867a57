//! Oracle Verification Runtime - Attestation Engine
//!
//! The verification engine behind the oracle backend: the canonical
//! proof codec, the report sniffer, the SGX and Nitro adapters, the
//! proof-to-report binding verifier, and the orchestrator that ties
//! them together. Quote verification and the enclave-native hash are
//! reached through the capability traits in [`capability`]; simulated
//! providers live in [`simulate`].

pub mod binding;
pub mod capability;
pub mod codec;
pub mod nitro;
pub mod proof;
pub mod report;
pub mod sgx;
pub mod simulate;
pub mod sniffer;
pub mod verifier;

pub use binding::{verify_binding, BINDING_COMMIT_WIDTH, REPORT_DATA_FIELD_COUNT};
pub use capability::{QuoteVerifier, SignerSession, SignerWrapper};
pub use codec::{decode_proof_data, encode_proof_data, TARGET_ALIGNMENT};
pub use proof::{
    AttestationRequest, AttestationResponse, DecodedProofData, EncodingOptions, EncodingValue,
    HtmlResultKind, ResponseFormat,
};
pub use report::{
    format_report, AttestationReport, FormattedReport, NitroDocument, SgxReport, TcbStatus,
};
pub use sniffer::{sniff_report, TeeKind};
pub use verifier::{ReportSubmission, VerificationStage, Verifier};
