//! Verified attestation report types and their display formatting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::{format_pcr_values, PCR_COUNT, PCR_LEN};

/// SGX report data field width.
pub const SGX_REPORT_DATA_LEN: usize = 64;

/// Nitro committed user data width: exactly one binding digest.
pub const NITRO_USER_DATA_LEN: usize = 16;

/// TCB level of the platform that produced an SGX report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcbStatus {
    UpToDate,
    OutOfDate,
    SWHardeningNeeded,
    ConfigurationNeeded,
    ConfigurationAndSWHardeningNeeded,
    OutOfDateConfigurationNeeded,
    Revoked,
    Unknown,
}

impl TcbStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TcbStatus::UpToDate => "UpToDate",
            TcbStatus::OutOfDate => "OutOfDate",
            TcbStatus::SWHardeningNeeded => "SWHardeningNeeded",
            TcbStatus::ConfigurationNeeded => "ConfigurationNeeded",
            TcbStatus::ConfigurationAndSWHardeningNeeded => "ConfigurationAndSWHardeningNeeded",
            TcbStatus::OutOfDateConfigurationNeeded => "OutOfDateConfigurationNeeded",
            TcbStatus::Revoked => "Revoked",
            TcbStatus::Unknown => "Unknown",
        }
    }
}

/// Fields of a cryptographically verified SGX report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgxReport {
    /// Report data committed by the enclave. The first 16 bytes hold
    /// the proof binding digest.
    pub data: [u8; SGX_REPORT_DATA_LEN],
    /// ISVSVN.
    pub security_version: u32,
    /// True for debug enclaves.
    pub debug: bool,
    /// MRENCLAVE.
    pub unique_id: [u8; 32],
    /// MRSIGNER.
    pub signer_id: [u8; 32],
    /// ISVPRODID.
    pub product_id: [u8; 16],
    pub tcb_status: TcbStatus,
}

/// Payload of a cryptographically verified Nitro attestation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NitroDocument {
    pub module_id: String,
    pub timestamp: u64,
    pub digest: String,
    /// PCR register index to 48-byte digest.
    pub pcrs: BTreeMap<u32, Vec<u8>>,
    pub certificate: Vec<u8>,
    pub cabundle: Vec<Vec<u8>>,
    #[serde(default)]
    pub public_key: Vec<u8>,
    /// Committed user data; holds the proof binding digest.
    #[serde(default)]
    pub user_data: Vec<u8>,
    #[serde(default)]
    pub nonce: Vec<u8>,
}

impl NitroDocument {
    /// The three pinned PCR digests, in register order.
    pub fn pinned_pcrs(&self) -> Result<[[u8; PCR_LEN]; PCR_COUNT]> {
        let mut out = [[0u8; PCR_LEN]; PCR_COUNT];
        for (idx, slot) in out.iter_mut().enumerate() {
            let pcr = self.pcrs.get(&(idx as u32)).ok_or_else(|| {
                VerifyError::StructuralDecode(format!("document is missing PCR{idx}"))
            })?;
            let pcr: &[u8; PCR_LEN] = pcr.as_slice().try_into().map_err(|_| {
                VerifyError::StructuralDecode(format!(
                    "PCR{idx} must be {PCR_LEN} bytes, got {}",
                    pcr.len()
                ))
            })?;
            *slot = *pcr;
        }
        Ok(out)
    }
}

/// A verified report from either supported TEE.
///
/// The two report shapes are a closed set; matching on this enum is
/// exhaustive, so an unknown type can never slip through verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationReport {
    Sgx(SgxReport),
    Nitro(NitroDocument),
}

impl AttestationReport {
    /// The bytes the enclave committed to in the report. The binding
    /// digest is compared against a prefix of these.
    pub fn committed_user_data(&self) -> &[u8] {
        match self {
            AttestationReport::Sgx(report) => &report.data,
            AttestationReport::Nitro(document) => &document.user_data,
        }
    }
}

fn aleo_u128(bytes: &[u8; 16]) -> String {
    format!("{}u128", u128::from_le_bytes(*bytes))
}

fn aleo_u128_pair(bytes: &[u8; 32]) -> [String; 2] {
    let first: [u8; 16] = bytes[..16].try_into().unwrap_or([0u8; 16]);
    let second: [u8; 16] = bytes[16..].try_into().unwrap_or([0u8; 16]);
    [aleo_u128(&first), aleo_u128(&second)]
}

/// Display form of a verified SGX report, with measurements rendered as
/// on-chain u128 chunks so users can compare them with contract values.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedSgxReport {
    /// Committed report data, hex-encoded.
    pub data: String,
    #[serde(rename = "securityVersion")]
    pub security_version: u32,
    pub debug: bool,
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    #[serde(rename = "aleoUniqueId")]
    pub aleo_unique_id: [String; 2],
    #[serde(rename = "signerId")]
    pub signer_id: String,
    #[serde(rename = "aleoSignerId")]
    pub aleo_signer_id: [String; 2],
    #[serde(rename = "productId")]
    pub product_id: String,
    #[serde(rename = "aleoProductId")]
    pub aleo_product_id: String,
    #[serde(rename = "tcbStatus")]
    pub tcb_status: TcbStatus,
}

/// Display form of a verified Nitro document.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedNitroReport {
    #[serde(rename = "moduleId")]
    pub module_id: String,
    pub timestamp: u64,
    /// PCR register index to hex digest.
    pub pcrs: BTreeMap<u32, String>,
    #[serde(rename = "aleoPcrValues")]
    pub aleo_pcr_values: String,
    #[serde(rename = "userData")]
    pub user_data: String,
    pub nonce: String,
}

/// Display form of any verified report.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FormattedReport {
    Sgx(FormattedSgxReport),
    Nitro(FormattedNitroReport),
}

/// Render a verified report for API consumers. Presentation only, no
/// security decisions are made here.
pub fn format_report(report: &AttestationReport) -> Result<FormattedReport> {
    match report {
        AttestationReport::Sgx(report) => Ok(FormattedReport::Sgx(FormattedSgxReport {
            data: hex::encode(report.data),
            security_version: report.security_version,
            debug: report.debug,
            unique_id: hex::encode(report.unique_id),
            aleo_unique_id: aleo_u128_pair(&report.unique_id),
            signer_id: hex::encode(report.signer_id),
            aleo_signer_id: aleo_u128_pair(&report.signer_id),
            product_id: hex::encode(report.product_id),
            aleo_product_id: aleo_u128(&report.product_id),
            tcb_status: report.tcb_status,
        })),
        AttestationReport::Nitro(document) => {
            let pinned = document.pinned_pcrs()?;
            let pcrs = document
                .pcrs
                .iter()
                .map(|(idx, digest)| (*idx, hex::encode(digest)))
                .collect();

            Ok(FormattedReport::Nitro(FormattedNitroReport {
                module_id: document.module_id.clone(),
                timestamp: document.timestamp,
                pcrs,
                aleo_pcr_values: format_pcr_values(&pinned),
                user_data: hex::encode(&document.user_data),
                nonce: hex::encode(&document.nonce),
            }))
        }
    }
}
