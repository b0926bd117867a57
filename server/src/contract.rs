//! Live contract measurement lookup.
//!
//! The oracle program publishes its approved enclave measurements as
//! mapping values holding Leo struct text: `sgx_unique_id` keeps the
//! SGX unique ID as two u128 chunks and `nitro_pcr_values` keeps the
//! three Nitro PCRs as nine u128 chunks. The node API wraps the struct
//! text in a JSON string, with the literal `"null"` standing for an
//! unset mapping key. Chunks decode little-endian, matching the
//! encoding the enclave uses when it submits measurements on-chain.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;

use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::{PCR_COUNT, PCR_LEN, UNIQUE_ID_LEN};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(3);

const CHUNK_LEN: usize = 16;
const PCR_CHUNKS: usize = PCR_LEN / CHUNK_LEN;

pub struct ContractClient {
    client: reqwest::Client,
    api_base_url: String,
    contract_name: String,
}

impl ContractClient {
    pub fn new(api_base_url: &str, contract_name: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| VerifyError::Contract(err.to_string()))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            contract_name: contract_name.to_string(),
        })
    }

    /// Fetch the SGX unique ID the live contract asserts, hex-encoded.
    pub async fn sgx_unique_id(&self) -> Result<String> {
        let text = self.fetch_mapping_value("sgx_unique_id").await?;
        parse_sgx_unique_id_struct(&text)
    }

    /// Fetch the Nitro PCR0..PCR2 values the live contract asserts,
    /// hex-encoded.
    pub async fn nitro_pcr_values(&self) -> Result<[String; PCR_COUNT]> {
        let text = self.fetch_mapping_value("nitro_pcr_values").await?;
        parse_nitro_pcr_values(&text)
    }

    fn mapping_url(&self, mapping: &str) -> String {
        format!(
            "{}/program/{}/mapping/{}/0u8",
            self.api_base_url, self.contract_name, mapping
        )
    }

    /// GET a mapping value, returning the Leo struct text it holds.
    /// A 404 or server error is retried once; explorer nodes briefly
    /// answer either while re-syncing a program.
    async fn fetch_mapping_value(&self, mapping: &str) -> Result<String> {
        let url = self.mapping_url(mapping);
        let mut retry = true;

        loop {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|err| VerifyError::Contract(err.to_string()))?;

            let status = response.status();
            if retry && (status == StatusCode::NOT_FOUND || status.is_server_error()) {
                tracing::warn!(%url, status = status.as_u16(), "mapping lookup failed, trying again");
                retry = false;
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            if !status.is_success() {
                return Err(VerifyError::Contract(format!(
                    "requesting {url} returned {status}"
                )));
            }

            let text: String = response
                .json()
                .await
                .map_err(|err| VerifyError::Contract(err.to_string()))?;

            if text == "null" {
                return Err(VerifyError::Contract(format!(
                    "mapping value {mapping} is not set"
                )));
            }

            return Ok(text);
        }
    }
}

/// Split Leo struct text into its named fields.
///
/// Input looks like `{ chunk_1: 123u128, chunk_2: 456u128 }`, possibly
/// spread over multiple lines.
fn parse_struct_fields(text: &str) -> Result<BTreeMap<String, String>> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| VerifyError::Contract("mapping value is not a struct".to_string()))?;

    let mut fields = BTreeMap::new();
    for entry in inner.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| VerifyError::Contract(format!("malformed struct field: {entry}")))?;
        fields.insert(name.trim().to_string(), value.trim().to_string());
    }

    Ok(fields)
}

/// Decode one `<decimal>u128` literal into its little-endian bytes.
fn chunk_to_bytes(literal: &str) -> Result<[u8; CHUNK_LEN]> {
    let digits = literal
        .strip_suffix("u128")
        .ok_or_else(|| VerifyError::Contract(format!("not a u128 literal: {literal}")))?;

    let value: u128 = digits
        .parse()
        .map_err(|_| VerifyError::Contract(format!("not a u128 literal: {literal}")))?;

    Ok(value.to_le_bytes())
}

fn parse_sgx_unique_id_struct(text: &str) -> Result<String> {
    let fields = parse_struct_fields(text)?;

    let mut unique_id = Vec::with_capacity(UNIQUE_ID_LEN);
    for name in ["chunk_1", "chunk_2"] {
        let literal = fields
            .get(name)
            .ok_or_else(|| VerifyError::Contract(format!("unique ID struct is missing {name}")))?;
        unique_id.extend_from_slice(&chunk_to_bytes(literal)?);
    }

    if unique_id.len() != UNIQUE_ID_LEN {
        return Err(VerifyError::Contract(
            "malformed unique ID in the contract".to_string(),
        ));
    }

    Ok(hex::encode(unique_id))
}

fn parse_nitro_pcr_values(text: &str) -> Result<[String; PCR_COUNT]> {
    let fields = parse_struct_fields(text)?;

    let mut pcrs = Vec::with_capacity(PCR_COUNT);
    for pcr_idx in 0..PCR_COUNT {
        let mut pcr = Vec::with_capacity(PCR_LEN);
        for chunk_idx in 1..=PCR_CHUNKS {
            let name = format!("pcr_{pcr_idx}_chunk_{chunk_idx}");
            let literal = fields.get(&name).ok_or_else(|| {
                VerifyError::Contract(format!("PCR struct is missing {name}"))
            })?;
            pcr.extend_from_slice(&chunk_to_bytes(literal)?);
        }
        pcrs.push(hex::encode(pcr));
    }

    pcrs.try_into()
        .map_err(|_| VerifyError::Contract("malformed PCR values in the contract".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sgx_unique_id_struct() {
        let text = "{\n  chunk_1: 31929802673692760512905395015836068420u128,\n  chunk_2: 335853521753947303372057454886636012152u128\n}";
        assert_eq!(
            parse_sgx_unique_id_struct(text).unwrap(),
            "446a519b3ff301317d7ab2a6d074051878c23c345b3f85e76dbc69141309abfc"
        );
    }

    #[test]
    fn test_parse_sgx_unique_id_missing_chunk() {
        let text = "{ chunk_1: 31929802673692760512905395015836068420u128 }";
        assert!(parse_sgx_unique_id_struct(text).is_err());
    }

    #[test]
    fn test_parse_sgx_unique_id_not_a_struct() {
        assert!(parse_sgx_unique_id_struct("12345u128").is_err());
    }

    #[test]
    fn test_parse_sgx_unique_id_bad_literal() {
        let text = "{ chunk_1: 123u64, chunk_2: 456u128 }";
        assert!(parse_sgx_unique_id_struct(text).is_err());
    }

    #[test]
    fn test_parse_nitro_pcr_values() {
        let text = "{\n  pcr_0_chunk_1: 71402194384810807695471133674510927100u128,\n  pcr_0_chunk_2: 161208568844425284329478584127483958658u128,\n  pcr_0_chunk_3: 319153641741947202476283715452178757539u128,\n  pcr_1_chunk_1: 160074764010604965432569395010350367491u128,\n  pcr_1_chunk_2: 139766717364114533801335576914874403398u128,\n  pcr_1_chunk_3: 227000420934281803670652481542768973666u128,\n  pcr_2_chunk_1: 264733590264774658848247826143579120213u128,\n  pcr_2_chunk_2: 334747434232414500511461632767813487886u128,\n  pcr_2_chunk_3: 200411607119746324753107350992173755975u128\n}";
        let pcrs = parse_nitro_pcr_values(text).unwrap();
        assert_eq!(
            pcrs[0],
            "fcc4ced3f4bba7352e289a27fb8fb7358255d6b35abafdc8b4a398c418a44779a377979baa62fc78ef6d89aa6bc11af0"
        );
        assert_eq!(
            pcrs[1],
            "0343b056cd8485ca7890ddd833476d78460aed2aa161548e4e26bedf321726696257d623e8805f3f605946b3d8b0c6aa"
        );
        assert_eq!(
            pcrs[2],
            "55a296be86298ce7d58bf289bad529c70e0d50854b475990d4f8ead2bf02d6fb476e717cc80c057abf7cd0f21cdfc596"
        );
    }

    #[test]
    fn test_parse_nitro_pcr_values_missing_chunk() {
        let text = "{ pcr_0_chunk_1: 1u128 }";
        assert!(parse_nitro_pcr_values(text).is_err());
    }

    #[test]
    fn test_mapping_url_strips_trailing_slash() {
        let client = ContractClient::new("https://api.explorer.example/v1/", "oracle.aleo").unwrap();
        assert_eq!(
            client.mapping_url("sgx_unique_id"),
            "https://api.explorer.example/v1/program/oracle.aleo/mapping/sgx_unique_id/0u8"
        );
    }
}
