//! Process configuration.
//!
//! Loaded once from `config.json` before the server accepts traffic.
//! Measurement targets may be given in hex or base64; both are
//! normalized to hex at load time so the rest of the process only ever
//! sees one representation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};
use crate::measurement::{decode_measurement, PCR_COUNT, PCR_LEN, UNIQUE_ID_LEN};

/// Default reference time for Nitro certificate-chain validity checks:
/// 2024-03-20 15:00:00 UTC, the pinned attestation epoch.
pub const DEFAULT_NITRO_VERIFICATION_TIME: i64 = 1_710_946_800;

fn default_price_feed_urls() -> Vec<String> {
    vec![
        "price_feed: btc".to_string(),
        "price_feed: eth".to_string(),
        "price_feed: aleo".to_string(),
    ]
}

fn default_nitro_verification_time() -> i64 {
    DEFAULT_NITRO_VERIFICATION_TIME
}

/// Live on-chain measurement check settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveCheckConfig {
    /// Skip the startup assertion against the live contract.
    #[serde(default)]
    pub skip: bool,

    /// Base URL of the blockchain node API.
    #[serde(rename = "apiBaseUrl", default)]
    pub api_base_url: String,

    /// Name of the contract holding the measurement assertions.
    #[serde(rename = "contractName", default)]
    pub contract_name: String,
}

/// Server configuration (`config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub port: u16,

    /// Expected SGX unique ID, hex or base64. Empty means "reproduce
    /// the enclave build locally to obtain it".
    #[serde(rename = "uniqueIdTarget", default)]
    pub unique_id_target: String,

    /// Expected Nitro PCR0..PCR2 values, hex or base64.
    #[serde(rename = "pcrValuesTarget", default)]
    pub pcr_values_target: Vec<String>,

    #[serde(rename = "liveCheck", default)]
    pub live_check: LiveCheckConfig,

    /// URL identifiers whose attestation data arrives pre-formatted
    /// and must skip the normal padding step.
    #[serde(rename = "priceFeedUrls", default = "default_price_feed_urls")]
    pub price_feed_urls: Vec<String>,

    /// Accept structurally-valid reports without hardware signatures.
    /// Development and testing only; the server refuses to start
    /// without capability providers otherwise.
    #[serde(default)]
    pub simulation: bool,

    /// Unix timestamp used as the reference time when checking Nitro
    /// certificate validity windows.
    #[serde(
        rename = "nitroVerificationTime",
        default = "default_nitro_verification_time"
    )]
    pub nitro_verification_time: i64,
}

impl Configuration {
    /// Parse and validate configuration from raw JSON bytes.
    pub fn load(content: &[u8]) -> Result<Self> {
        let mut conf: Configuration = serde_json::from_slice(content)?;

        if conf.live_check.api_base_url.is_empty() || conf.live_check.contract_name.is_empty() {
            return Err(VerifyError::Config(
                "\"liveCheck\" is not configured correctly, must have \"apiBaseUrl\" and \"contractName\"".to_string(),
            ));
        }

        if !conf.live_check.contract_name.ends_with(".aleo") {
            conf.live_check.contract_name.push_str(".aleo");
        }

        conf.normalize_unique_id()?;
        conf.normalize_pcr_values()?;

        Ok(conf)
    }

    /// Whether both measurement targets are present in the config.
    pub fn has_measurement_targets(&self) -> bool {
        !self.unique_id_target.is_empty() && self.pcr_values_target.len() == PCR_COUNT
    }

    fn normalize_unique_id(&mut self) -> Result<()> {
        if self.unique_id_target.is_empty() {
            return Ok(());
        }

        let bytes = decode_measurement(&self.unique_id_target, UNIQUE_ID_LEN).map_err(|_| {
            tracing::warn!(value = %self.unique_id_target, "invalid SGX unique ID in config");
            VerifyError::Config(format!(
                "\"uniqueIdTarget\" must be {UNIQUE_ID_LEN} bytes hex- or base64-encoded"
            ))
        })?;
        self.unique_id_target = hex::encode(bytes);

        Ok(())
    }

    fn normalize_pcr_values(&mut self) -> Result<()> {
        for pcr in self.pcr_values_target.iter_mut() {
            let bytes = decode_measurement(pcr, PCR_LEN).map_err(|_| {
                tracing::warn!(value = %pcr, "invalid Nitro PCR value in config");
                VerifyError::Config(format!(
                    "\"pcrValuesTarget\" values must be {PCR_LEN} bytes hex- or base64-encoded"
                ))
            })?;
            *pcr = hex::encode(bytes);
        }

        Ok(())
    }
}
