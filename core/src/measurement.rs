//! Target enclave measurements and u128 chunk encoding.
//!
//! The verifier trusts exactly one approved build: an SGX unique ID
//! (MRENCLAVE, 32 bytes) and three Nitro PCR digests (48 bytes each).
//! On-chain contracts store these as little-endian u128 chunks, so this
//! module also provides the chunk conversion and the Leo struct-text
//! rendering used by the `/info` endpoint and report formatting.

use base64::Engine;
use serde::Serialize;

use crate::error::{Result, VerifyError};

/// SGX unique ID length in bytes.
pub const UNIQUE_ID_LEN: usize = 32;

/// Nitro PCR digest length in bytes (SHA-384).
pub const PCR_LEN: usize = 48;

/// Number of PCR registers pinned by the verifier (PCR0, PCR1, PCR2).
pub const PCR_COUNT: usize = 3;

/// Approved build measurements, fixed at process startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMeasurements {
    pub unique_id: [u8; UNIQUE_ID_LEN],
    pub pcr_values: [[u8; PCR_LEN]; PCR_COUNT],
}

impl TargetMeasurements {
    /// Build target measurements from normalized hex strings.
    pub fn from_hex(unique_id: &str, pcr_values: &[String]) -> Result<Self> {
        if pcr_values.len() != PCR_COUNT {
            return Err(VerifyError::Config(format!(
                "expected {} PCR values, got {}",
                PCR_COUNT,
                pcr_values.len()
            )));
        }

        let unique_id_bytes = decode_measurement(unique_id, UNIQUE_ID_LEN)?;
        let mut unique_id_arr = [0u8; UNIQUE_ID_LEN];
        unique_id_arr.copy_from_slice(&unique_id_bytes);

        let mut pcr_arr = [[0u8; PCR_LEN]; PCR_COUNT];
        for (idx, pcr) in pcr_values.iter().enumerate() {
            let bytes = decode_measurement(pcr, PCR_LEN)?;
            pcr_arr[idx].copy_from_slice(&bytes);
        }

        Ok(Self {
            unique_id: unique_id_arr,
            pcr_values: pcr_arr,
        })
    }

    pub fn unique_id_hex(&self) -> String {
        hex::encode(self.unique_id)
    }

    pub fn pcr_values_hex(&self) -> [String; PCR_COUNT] {
        [
            hex::encode(self.pcr_values[0]),
            hex::encode(self.pcr_values[1]),
            hex::encode(self.pcr_values[2]),
        ]
    }
}

/// Decode a hex- or base64-encoded measurement of a known byte length.
///
/// Hex is tried first; a value that parses as neither, or decodes to
/// the wrong length, is a configuration error.
pub fn decode_measurement(input: &str, expected_len: usize) -> Result<Vec<u8>> {
    let bytes = match hex::decode(input) {
        Ok(bytes) => bytes,
        Err(_) => base64::engine::general_purpose::STANDARD
            .decode(input)
            .map_err(|_| {
                VerifyError::Config(format!(
                    "measurement must be {expected_len} bytes hex- or base64-encoded"
                ))
            })?,
    };

    if bytes.len() != expected_len {
        return Err(VerifyError::Config(format!(
            "measurement must be {expected_len} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Convert a 16-byte slice to a u128, little-endian.
///
/// This is the chunk representation on-chain contracts use for
/// measurement halves.
pub fn slice_to_u128(buf: &[u8]) -> Result<u128> {
    let arr: [u8; 16] = buf
        .try_into()
        .map_err(|_| VerifyError::MalformedInput("cannot convert slice to u128: invalid size".to_string()))?;
    Ok(u128::from_le_bytes(arr))
}

/// Render a 32-byte measurement as a two-chunk Leo struct literal.
pub fn format_u128_pair(bytes: &[u8; 32]) -> String {
    // both halves are exactly 16 bytes, slice_to_u128 cannot fail here
    let chunk_1 = u128::from_le_bytes(bytes[..16].try_into().unwrap());
    let chunk_2 = u128::from_le_bytes(bytes[16..].try_into().unwrap());
    format!("{{ chunk_1: {chunk_1}u128, chunk_2: {chunk_2}u128 }}")
}

/// Render three 48-byte PCR digests as a nine-chunk Leo struct literal.
pub fn format_pcr_values(pcrs: &[[u8; PCR_LEN]; PCR_COUNT]) -> String {
    let mut pairs = Vec::with_capacity(9);

    for (pcr_idx, pcr) in pcrs.iter().enumerate() {
        for chunk_idx in 0..3 {
            let chunk =
                u128::from_le_bytes(pcr[chunk_idx * 16..(chunk_idx + 1) * 16].try_into().unwrap());
            pairs.push(format!("pcr_{}_chunk_{}: {}u128", pcr_idx, chunk_idx + 1, chunk));
        }
    }

    format!("{{ {} }}", pairs.join(", "))
}

/// Descriptor for one target measurement in all of its encodings.
#[derive(Debug, Clone, Serialize)]
pub struct UniqueIdInfo {
    #[serde(rename = "hexEncoded")]
    pub hex: String,
    #[serde(rename = "base64Encoded")]
    pub base64: String,
    #[serde(rename = "aleoEncoded")]
    pub aleo: String,
}

/// Descriptor for the target PCR set in all of its encodings.
#[derive(Debug, Clone, Serialize)]
pub struct PcrValuesInfo {
    #[serde(rename = "hexEncoded")]
    pub hex: [String; PCR_COUNT],
    #[serde(rename = "base64Encoded")]
    pub base64: [String; PCR_COUNT],
    #[serde(rename = "aleoEncoded")]
    pub aleo: String,
}

impl TargetMeasurements {
    /// Build the `/info` descriptors for the target unique ID.
    pub fn unique_id_info(&self) -> UniqueIdInfo {
        UniqueIdInfo {
            hex: self.unique_id_hex(),
            base64: base64::engine::general_purpose::STANDARD.encode(self.unique_id),
            aleo: format_u128_pair(&self.unique_id),
        }
    }

    /// Build the `/info` descriptors for the target PCR values.
    pub fn pcr_values_info(&self) -> PcrValuesInfo {
        let b64 = &base64::engine::general_purpose::STANDARD;
        PcrValuesInfo {
            hex: self.pcr_values_hex(),
            base64: [
                b64.encode(self.pcr_values[0]),
                b64.encode(self.pcr_values[1]),
                b64.encode(self.pcr_values[2]),
            ],
            aleo: format_pcr_values(&self.pcr_values),
        }
    }
}
