//! Oracle proof request and decoded payload types.
//!
//! An attestation request describes the HTTP fetch an enclave claims to
//! have performed. The decoded proof embeds that request together with
//! the response status, extracted attestation data, and timestamp.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use oracle_verify_core::error::{Result, VerifyError};

/// Format of the fetched response the selector was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Html,
}

impl ResponseFormat {
    /// One-byte wire tag.
    pub fn wire_tag(self) -> u8 {
        match self {
            ResponseFormat::Json => 0,
            ResponseFormat::Html => 1,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(ResponseFormat::Json),
            1 => Ok(ResponseFormat::Html),
            other => Err(VerifyError::StructuralDecode(format!(
                "unknown response format tag {other}"
            ))),
        }
    }
}

/// What an HTML selector extracted: the element itself or its text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlResultKind {
    Element,
    Value,
}

impl HtmlResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HtmlResultKind::Element => "element",
            HtmlResultKind::Value => "value",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "element" => Ok(HtmlResultKind::Element),
            "value" => Ok(HtmlResultKind::Value),
            other => Err(VerifyError::StructuralDecode(format!(
                "unknown HTML result type {other:?}"
            ))),
        }
    }
}

/// How the attestation data is typed for on-chain consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingValue {
    String,
    Float,
    Int,
}

impl EncodingValue {
    /// Wire tag, stored as a little-endian u64.
    pub fn wire_tag(self) -> u64 {
        match self {
            EncodingValue::String => 0,
            EncodingValue::Float => 1,
            EncodingValue::Int => 2,
        }
    }

    pub fn from_wire_tag(tag: u64) -> Result<Self> {
        match tag {
            0 => Ok(EncodingValue::String),
            1 => Ok(EncodingValue::Float),
            2 => Ok(EncodingValue::Int),
            other => Err(VerifyError::StructuralDecode(format!(
                "unknown encoding option tag {other}"
            ))),
        }
    }
}

/// Typing and precision of the attestation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingOptions {
    pub value: EncodingValue,
    #[serde(default)]
    pub precision: u64,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            value: EncodingValue::String,
            precision: 0,
        }
    }
}

/// The HTTP fetch an enclave attests to.
///
/// Header keys are unique and kept sorted, which makes the encoded
/// header block deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    pub url: String,

    #[serde(rename = "requestMethod")]
    pub request_method: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,

    #[serde(rename = "responseFormat")]
    pub response_format: ResponseFormat,

    #[serde(
        rename = "htmlResultType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub html_result_type: Option<HtmlResultKind>,

    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,

    #[serde(
        rename = "requestContentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_content_type: Option<String>,

    #[serde(
        rename = "requestHeaders",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub request_headers: BTreeMap<String, String>,

    #[serde(rename = "encodingOptions")]
    pub encoding_options: EncodingOptions,

    #[serde(rename = "debugRequest", default, skip_serializing_if = "std::ops::Not::not")]
    pub debug_request: bool,
}

/// The result of decoding a canonical proof payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedProofData {
    #[serde(flatten)]
    pub attestation_request: AttestationRequest,

    #[serde(rename = "attestationData")]
    pub attestation_data: String,

    #[serde(rename = "responseStatusCode")]
    pub response_status_code: u64,

    pub timestamp: i64,
}

/// One report submitted for verification, as produced by an enclave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationResponse {
    #[serde(rename = "attestationReport")]
    pub attestation_report: String,

    /// Self-declared TEE type. Informational only; the report bytes
    /// themselves determine the type during verification.
    #[serde(rename = "reportType", default, skip_serializing_if = "String::is_empty")]
    pub report_type: String,

    #[serde(rename = "attestationData")]
    pub attestation_data: String,

    #[serde(rename = "responseBody", default, skip_serializing_if = "String::is_empty")]
    pub response_body: String,

    #[serde(rename = "responseStatusCode")]
    pub response_status_code: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nonce: String,

    pub timestamp: i64,

    #[serde(rename = "attestationRequest")]
    pub attestation_request: AttestationRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> AttestationRequest {
        AttestationRequest {
            url: "https://example.com/price".to_string(),
            request_method: "GET".to_string(),
            selector: "data.price".to_string(),
            response_format: ResponseFormat::Json,
            html_result_type: None,
            request_body: None,
            request_content_type: None,
            request_headers: BTreeMap::new(),
            encoding_options: EncodingOptions {
                value: EncodingValue::Float,
                precision: 6,
            },
            debug_request: false,
        }
    }

    #[test]
    fn test_response_format_tags_round_trip() {
        for format in [ResponseFormat::Json, ResponseFormat::Html] {
            assert_eq!(ResponseFormat::from_wire_tag(format.wire_tag()).unwrap(), format);
        }
        assert!(ResponseFormat::from_wire_tag(7).is_err());
    }

    #[test]
    fn test_encoding_value_tags_round_trip() {
        for value in [EncodingValue::String, EncodingValue::Float, EncodingValue::Int] {
            assert_eq!(EncodingValue::from_wire_tag(value.wire_tag()).unwrap(), value);
        }
        assert!(EncodingValue::from_wire_tag(3).is_err());
    }

    #[test]
    fn test_html_result_kind_parse() {
        assert_eq!(HtmlResultKind::parse("element").unwrap(), HtmlResultKind::Element);
        assert_eq!(HtmlResultKind::parse("value").unwrap(), HtmlResultKind::Value);
        assert!(HtmlResultKind::parse("attribute").is_err());
    }

    #[test]
    fn test_request_json_field_names() {
        let request = sample_request();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["url"], "https://example.com/price");
        assert_eq!(json["requestMethod"], "GET");
        assert_eq!(json["responseFormat"], "json");
        assert_eq!(json["encodingOptions"]["value"], "float");
        assert_eq!(json["encodingOptions"]["precision"], 6);
        // absent optional fields are omitted entirely
        assert!(json.get("htmlResultType").is_none());
        assert!(json.get("requestBody").is_none());
        assert!(json.get("debugRequest").is_none());
    }

    #[test]
    fn test_decoded_proof_flattens_request() {
        let decoded = DecodedProofData {
            attestation_request: sample_request(),
            attestation_data: "1234.56".to_string(),
            response_status_code: 200,
            timestamp: 1701851063,
        };
        let json = serde_json::to_value(&decoded).unwrap();
        // request fields sit at the top level, next to the proof fields
        assert_eq!(json["url"], "https://example.com/price");
        assert_eq!(json["attestationData"], "1234.56");
        assert_eq!(json["responseStatusCode"], 200);
        assert_eq!(json["timestamp"], 1701851063);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{
            "url": "https://example.com",
            "requestMethod": "GET",
            "responseFormat": "json",
            "encodingOptions": { "value": "string" }
        }"#;
        let request: AttestationRequest = serde_json::from_str(json).unwrap();
        assert!(request.selector.is_empty());
        assert!(request.request_headers.is_empty());
        assert_eq!(request.encoding_options.precision, 0);
        assert!(!request.debug_request);
    }
}
