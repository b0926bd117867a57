//! Proof payload encoder.

use std::collections::BTreeMap;

use oracle_verify_core::error::{Result, VerifyError};

use crate::proof::{AttestationRequest, EncodingOptions, EncodingValue, HtmlResultKind};

use super::{
    align_to_block, number_to_bytes, MetaHeader, ATTESTATION_DATA_SIZE_LIMIT, META_HEADER_LEN,
    TARGET_ALIGNMENT,
};

/// Width numeric attestation data is normalized to before hashing.
const NUMERIC_DATA_WIDTH: usize = u8::MAX as usize;

fn pad_right(value: &str, pad: char, target: usize) -> Result<String> {
    if value.len() > target {
        return Err(VerifyError::MalformedInput(format!(
            "attestation data is too long: {} bytes, limit {target}",
            value.len()
        )));
    }
    let mut out = String::with_capacity(target);
    out.push_str(value);
    for _ in value.len()..target {
        out.push(pad);
    }
    Ok(out)
}

/// Normalize attestation data to a constant width per encoding option.
///
/// Strings are zero-padded on the right up to the size limit. Floats get
/// a decimal point if they lack one, then trailing zeros. Integers get
/// leading zeros, which decimal parsing ignores no matter how many
/// there are.
fn prepare_attestation_data(data: &str, options: &EncodingOptions) -> Result<String> {
    match options.value {
        EncodingValue::String => pad_right(data, '\0', ATTESTATION_DATA_SIZE_LIMIT),
        EncodingValue::Float => {
            if data.contains('.') {
                pad_right(data, '0', NUMERIC_DATA_WIDTH)
            } else {
                pad_right(&format!("{data}."), '0', NUMERIC_DATA_WIDTH)
            }
        }
        EncodingValue::Int => {
            if data.len() > NUMERIC_DATA_WIDTH {
                return Err(VerifyError::MalformedInput(format!(
                    "attestation data is too long: {} bytes, limit {NUMERIC_DATA_WIDTH}",
                    data.len()
                )));
            }
            let mut out = String::with_capacity(NUMERIC_DATA_WIDTH);
            for _ in data.len()..NUMERIC_DATA_WIDTH {
                out.push('0');
            }
            out.push_str(data);
            Ok(out)
        }
    }
}

/// Encode the encoding options as two little-endian u64s: value tag and
/// precision.
pub(super) fn encode_encoding_options(options: &EncodingOptions) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&number_to_bytes(options.value.wire_tag()));
    buf[8..].copy_from_slice(&number_to_bytes(options.precision));
    buf
}

/// Encode the header mapping.
///
/// Layout: header count (u64), entry area size in blocks (u64), then
/// one entry per header in key order. An entry is the u16 length of
/// `key:value` followed by its bytes, padded to a block boundary.
pub(super) fn encode_headers(headers: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let mut entries = Vec::new();

    for (key, value) in headers {
        let joined = format!("{key}:{value}");
        if joined.len() > u16::MAX as usize {
            return Err(VerifyError::MalformedInput(format!(
                "request header {key:?} is too long"
            )));
        }
        entries.extend_from_slice(&(joined.len() as u16).to_le_bytes());
        entries.extend_from_slice(joined.as_bytes());
        entries.resize(align_to_block(entries.len()), 0);
    }

    let mut buf = Vec::with_capacity(TARGET_ALIGNMENT + entries.len());
    buf.extend_from_slice(&number_to_bytes(headers.len() as u64));
    buf.extend_from_slice(&number_to_bytes((entries.len() / TARGET_ALIGNMENT) as u64));
    buf.extend_from_slice(&entries);

    Ok(buf)
}

fn push_optional_value(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(value) => {
            buf.extend_from_slice(&number_to_bytes(value.len() as u64));
            buf.extend_from_slice(&[0u8; 8]);
            buf.extend_from_slice(value.as_bytes());
            buf.resize(align_to_block(buf.len()), 0);
        }
        None => buf.extend_from_slice(&[0u8; 16]),
    }
}

/// Encode the optional request fields in a fixed order: HTML result
/// type, content type, body. Each field is a one-block length prefix
/// followed by the padded value bytes; an absent field is a zero-length
/// prefix with no value bytes.
pub(super) fn encode_optional_fields(
    html_result_type: Option<HtmlResultKind>,
    content_type: Option<&str>,
    body: Option<&str>,
) -> Result<Vec<u8>> {
    for value in [content_type, body] {
        if value.is_some_and(|v| v.len() > u16::MAX as usize) {
            return Err(VerifyError::MalformedInput(
                "optional request field is too long".to_string(),
            ));
        }
    }

    let mut buf = Vec::new();
    push_optional_value(&mut buf, html_result_type.map(|kind| kind.as_str()));
    push_optional_value(&mut buf, content_type);
    push_optional_value(&mut buf, body);
    Ok(buf)
}

fn write_with_padding(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(bytes);
    buf.resize(align_to_block(buf.len()), 0);
}

fn field_len_u16(len: usize, name: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        VerifyError::MalformedInput(format!("cannot create meta header: {name} is too long"))
    })
}

/// Encode a proof payload into its canonical byte form.
///
/// URLs listed in `price_feed_urls` carry pre-formatted attestation
/// data and skip the normalization step.
pub fn encode_proof_data(
    status_code: u64,
    attestation_data: &str,
    timestamp: i64,
    req: &AttestationRequest,
    price_feed_urls: &[String],
) -> Result<Vec<u8>> {
    let prepped_data = if price_feed_urls.iter().any(|url| *url == req.url) {
        attestation_data.to_string()
    } else {
        prepare_attestation_data(attestation_data, &req.encoding_options)?
    };

    let encoded_headers = encode_headers(&req.request_headers)?;
    let encoded_optional_fields = encode_optional_fields(
        req.html_result_type,
        req.request_content_type.as_deref(),
        req.request_body.as_deref(),
    )?;

    let mut buf = Vec::with_capacity(META_HEADER_LEN + align_to_block(prepped_data.len()));

    // placeholder meta header, back-patched once all lengths are known
    buf.extend_from_slice(&[0u8; META_HEADER_LEN]);

    write_with_padding(&mut buf, prepped_data.as_bytes());
    write_with_padding(&mut buf, &number_to_bytes(timestamp as u64));
    write_with_padding(&mut buf, &number_to_bytes(status_code));
    write_with_padding(&mut buf, req.url.as_bytes());
    write_with_padding(&mut buf, req.selector.as_bytes());
    write_with_padding(&mut buf, &[req.response_format.wire_tag()]);
    write_with_padding(&mut buf, req.request_method.as_bytes());
    write_with_padding(&mut buf, &encode_encoding_options(&req.encoding_options));
    write_with_padding(&mut buf, &encoded_headers);
    write_with_padding(&mut buf, &encoded_optional_fields);

    // failsafe, every write above pads to a whole block
    if buf.len() % TARGET_ALIGNMENT != 0 {
        tracing::warn!(len = buf.len(), "encoded proof data is not aligned");
        return Err(VerifyError::StructuralDecode(
            "critical error while preparing data for verification".to_string(),
        ));
    }

    let header = MetaHeader {
        attestation_data_len: field_len_u16(prepped_data.len(), "attestation data")?,
        timestamp_len: 8,
        status_code_len: 8,
        method_len: field_len_u16(req.request_method.len(), "request method")?,
        response_format_len: 1,
        url_len: field_len_u16(req.url.len(), "url")?,
        selector_len: field_len_u16(req.selector.len(), "selector")?,
        encoding_options_len: 16,
        headers_len: field_len_u16(encoded_headers.len(), "request headers")?,
        optional_fields_len: field_len_u16(encoded_optional_fields.len(), "optional fields")?,
    };
    header.write_into(&mut buf[..META_HEADER_LEN])?;

    Ok(buf)
}
