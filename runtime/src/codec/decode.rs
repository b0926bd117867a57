//! Proof payload decoder.
//!
//! The decoder walks the same field order the encoder writes, never
//! trusting a header length without checking it against the buffer
//! first.

use std::collections::BTreeMap;

use oracle_verify_core::error::{Result, VerifyError};

use crate::proof::{
    AttestationRequest, DecodedProofData, EncodingOptions, EncodingValue, HtmlResultKind,
    ResponseFormat,
};

use super::{align_to_block, bytes_to_number, MetaHeader, META_HEADER_LEN, TARGET_ALIGNMENT};

/// Slice `length` bytes out of `buf` at `pos`, rounded up to a whole
/// block. Returns the slice and the aligned length consumed.
fn get_block_slice(buf: &[u8], pos: usize, length: usize) -> Result<(&[u8], usize)> {
    let aligned = align_to_block(length);

    let end = pos
        .checked_add(aligned)
        .ok_or_else(|| VerifyError::StructuralDecode("invalid position for buffer".to_string()))?;
    if end > buf.len() {
        return Err(VerifyError::StructuralDecode(
            "invalid position for buffer".to_string(),
        ));
    }

    Ok((&buf[pos..end], aligned))
}

fn utf8_field(bytes: &[u8], name: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| VerifyError::StructuralDecode(format!("{name} is not valid UTF-8")))
}

/// Undo the attestation data normalization the encoder applied.
fn decode_attestation_data(
    bytes: &[u8],
    unaligned_len: usize,
    options: &EncodingOptions,
) -> Result<String> {
    if unaligned_len > bytes.len() {
        return Err(VerifyError::StructuralDecode(
            "attestation data length exceeds its field".to_string(),
        ));
    }

    let raw = utf8_field(&bytes[..unaligned_len], "attestation data")?;

    let trimmed = match options.value {
        EncodingValue::String => raw.trim_end_matches('\0').to_string(),
        EncodingValue::Float => raw.trim_end_matches('0').trim_end_matches('.').to_string(),
        EncodingValue::Int => {
            let stripped = raw.trim_start_matches('0');
            if stripped.is_empty() {
                "0".to_string()
            } else {
                stripped.to_string()
            }
        }
    };

    Ok(trimmed)
}

fn decode_encoding_options(bytes: &[u8]) -> Result<EncodingOptions> {
    if bytes.len() < 16 {
        return Err(VerifyError::StructuralDecode(
            "encoding options field is too short".to_string(),
        ));
    }

    Ok(EncodingOptions {
        value: EncodingValue::from_wire_tag(bytes_to_number(&bytes[..8])?)?,
        precision: bytes_to_number(&bytes[8..16])?,
    })
}

/// Decode a u64 field written by the encoder. The header may lie about
/// the length, so the slice is checked before the fixed-width read.
fn decode_number_field(bytes: &[u8], name: &str) -> Result<u64> {
    if bytes.len() < TARGET_ALIGNMENT / 2 {
        return Err(VerifyError::StructuralDecode(format!(
            "{name} field is too short"
        )));
    }
    bytes_to_number(&bytes[..TARGET_ALIGNMENT / 2])
}

fn decode_response_format(bytes: &[u8]) -> Result<ResponseFormat> {
    if bytes.is_empty() {
        return Err(VerifyError::StructuralDecode(
            "response format field is empty".to_string(),
        ));
    }
    ResponseFormat::from_wire_tag(bytes[0])
}

/// Decode the header mapping block.
fn decode_headers(bytes: &[u8]) -> Result<BTreeMap<String, String>> {
    if bytes.len() < TARGET_ALIGNMENT {
        return Err(VerifyError::StructuralDecode(
            "header block is too short".to_string(),
        ));
    }

    let count = bytes_to_number(&bytes[..8])? as usize;
    let entry_blocks = bytes_to_number(&bytes[8..16])? as usize;

    let entry_area_len = entry_blocks
        .checked_mul(TARGET_ALIGNMENT)
        .ok_or_else(|| VerifyError::StructuralDecode("header block size overflow".to_string()))?;
    let limit = TARGET_ALIGNMENT
        .checked_add(entry_area_len)
        .filter(|&limit| limit <= bytes.len())
        .ok_or_else(|| {
            VerifyError::StructuralDecode("header block exceeds its field".to_string())
        })?;

    let mut headers = BTreeMap::new();
    let mut pos = TARGET_ALIGNMENT;

    for _ in 0..count {
        if pos + 2 > limit {
            return Err(VerifyError::StructuralDecode(
                "header entry exceeds its block".to_string(),
            ));
        }
        let entry_len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
        if pos + 2 + entry_len > limit {
            return Err(VerifyError::StructuralDecode(
                "header entry exceeds its block".to_string(),
            ));
        }

        let entry = utf8_field(&bytes[pos + 2..pos + 2 + entry_len], "request header")?;
        let (key, value) = entry.split_once(':').ok_or_else(|| {
            VerifyError::StructuralDecode("request header entry has no separator".to_string())
        })?;
        headers.insert(key.to_string(), value.to_string());

        pos += align_to_block(2 + entry_len);
    }

    Ok(headers)
}

fn read_optional_value(bytes: &[u8], pos: &mut usize, name: &str) -> Result<Option<String>> {
    let (length_block, consumed) = get_block_slice(bytes, *pos, TARGET_ALIGNMENT)?;
    *pos += consumed;

    let value_len = bytes_to_number(&length_block[..8])? as usize;
    if value_len == 0 {
        return Ok(None);
    }

    let (value_block, consumed) = get_block_slice(bytes, *pos, value_len)?;
    *pos += consumed;

    Ok(Some(utf8_field(&value_block[..value_len], name)?))
}

/// Decode the optional request fields: HTML result type, content type,
/// body.
fn decode_optional_fields(
    bytes: &[u8],
) -> Result<(Option<HtmlResultKind>, Option<String>, Option<String>)> {
    let mut pos = 0;

    let html_result_type = read_optional_value(bytes, &mut pos, "HTML result type")?
        .map(|value| HtmlResultKind::parse(&value))
        .transpose()?;
    let content_type = read_optional_value(bytes, &mut pos, "request content type")?;
    let body = read_optional_value(bytes, &mut pos, "request body")?;

    Ok((html_result_type, content_type, body))
}

/// Decode a canonical proof payload.
pub fn decode_proof_data(buf: &[u8]) -> Result<DecodedProofData> {
    if buf.len() < META_HEADER_LEN {
        // the buffer doesn't even have a meta header
        return Err(VerifyError::StructuralDecode(
            "too short to be encoded proof data".to_string(),
        ));
    }

    let header = MetaHeader::read_from(&buf[..META_HEADER_LEN])?;
    let mut pos = META_HEADER_LEN;

    // attestation data bytes are held back until the encoding options
    // further down tell us how to strip its padding
    let (attestation_data_bytes, consumed) =
        get_block_slice(buf, pos, header.attestation_data_len as usize)?;
    pos += consumed;

    let (timestamp_bytes, consumed) = get_block_slice(buf, pos, header.timestamp_len as usize)?;
    let timestamp = decode_number_field(timestamp_bytes, "timestamp")?;
    pos += consumed;

    let (status_code_bytes, consumed) = get_block_slice(buf, pos, header.status_code_len as usize)?;
    let status_code = decode_number_field(status_code_bytes, "status code")?;
    pos += consumed;

    let (url_bytes, consumed) = get_block_slice(buf, pos, header.url_len as usize)?;
    let url = utf8_field(&url_bytes[..header.url_len as usize], "url")?;
    pos += consumed;

    let (selector_bytes, consumed) = get_block_slice(buf, pos, header.selector_len as usize)?;
    let selector = utf8_field(&selector_bytes[..header.selector_len as usize], "selector")?;
    pos += consumed;

    let (response_format_bytes, consumed) =
        get_block_slice(buf, pos, header.response_format_len as usize)?;
    let response_format = decode_response_format(response_format_bytes)?;
    pos += consumed;

    let (method_bytes, consumed) = get_block_slice(buf, pos, header.method_len as usize)?;
    let request_method = utf8_field(&method_bytes[..header.method_len as usize], "request method")?;
    pos += consumed;

    let (encoding_options_bytes, consumed) =
        get_block_slice(buf, pos, header.encoding_options_len as usize)?;
    let encoding_options = decode_encoding_options(encoding_options_bytes)?;
    pos += consumed;

    let attestation_data = decode_attestation_data(
        attestation_data_bytes,
        header.attestation_data_len as usize,
        &encoding_options,
    )?;

    let (headers_bytes, consumed) = get_block_slice(buf, pos, header.headers_len as usize)?;
    let request_headers = decode_headers(headers_bytes)?;
    pos += consumed;

    let (optional_fields_bytes, _) =
        get_block_slice(buf, pos, header.optional_fields_len as usize)?;
    let (html_result_type, request_content_type, request_body) =
        decode_optional_fields(optional_fields_bytes)?;

    Ok(DecodedProofData {
        timestamp: timestamp as i64,
        response_status_code: status_code,
        attestation_data,

        attestation_request: AttestationRequest {
            url,
            request_method,
            selector,
            response_format,
            html_result_type,
            request_body,
            request_content_type,
            request_headers,
            encoding_options,
            debug_request: false,
        },
    })
}
