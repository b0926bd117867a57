//! Canonical proof payload codec.
//!
//! An encoded proof is a fixed meta header (two alignment blocks of
//! little-endian u16 field lengths) followed by the proof fields, each
//! zero-padded to a whole number of 16-byte blocks. The meta header
//! records the *unaligned* byte length of every field; an aligned field
//! occupies `ceil(len / 16) * 16` bytes in the buffer.

mod decode;
mod encode;

pub use decode::decode_proof_data;
pub use encode::encode_proof_data;

use oracle_verify_core::error::{Result, VerifyError};

/// Alignment unit of the proof payload, in bytes.
pub const TARGET_ALIGNMENT: usize = 16;

/// Size of the meta header: two alignment blocks.
pub const META_HEADER_LEN: usize = TARGET_ALIGNMENT * 2;

/// Ceiling on the attestation data after string padding.
pub const ATTESTATION_DATA_SIZE_LIMIT: usize = 3072;

/// Round `num` up to a whole number of alignment blocks.
pub fn align_to_block(num: usize) -> usize {
    match num % TARGET_ALIGNMENT {
        0 => num,
        rem => num + (TARGET_ALIGNMENT - rem),
    }
}

/// Encode a number as 8 little-endian bytes.
pub fn number_to_bytes(num: u64) -> [u8; 8] {
    num.to_le_bytes()
}

/// Decode 8 little-endian bytes as a number.
pub fn bytes_to_number(buf: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = buf.try_into().map_err(|_| {
        VerifyError::StructuralDecode(format!("expected 8 number bytes, got {}", buf.len()))
    })?;
    Ok(u64::from_le_bytes(arr))
}

/// Unaligned field lengths recorded by the meta header, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetaHeader {
    pub attestation_data_len: u16,
    pub timestamp_len: u16,
    pub status_code_len: u16,
    pub method_len: u16,
    pub response_format_len: u16,
    pub url_len: u16,
    pub selector_len: u16,
    pub encoding_options_len: u16,
    pub headers_len: u16,
    pub optional_fields_len: u16,
}

impl MetaHeader {
    /// Write the header into a zeroed two-block buffer.
    pub fn write_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != META_HEADER_LEN {
            return Err(VerifyError::StructuralDecode(format!(
                "meta header buffer must be {META_HEADER_LEN} bytes, got {}",
                buf.len()
            )));
        }

        let lengths = [
            self.attestation_data_len,
            self.timestamp_len,
            self.status_code_len,
            self.method_len,
            self.response_format_len,
            self.url_len,
            self.selector_len,
            self.encoding_options_len,
            self.headers_len,
            self.optional_fields_len,
        ];

        for (idx, len) in lengths.iter().enumerate() {
            buf[idx * 2..idx * 2 + 2].copy_from_slice(&len.to_le_bytes());
        }

        Ok(())
    }

    /// Read the header from the first two blocks of an encoded proof.
    pub fn read_from(buf: &[u8]) -> Result<Self> {
        if buf.len() < META_HEADER_LEN {
            return Err(VerifyError::StructuralDecode(
                "too short to be encoded proof data".to_string(),
            ));
        }

        let read = |idx: usize| u16::from_le_bytes([buf[idx * 2], buf[idx * 2 + 1]]);

        Ok(Self {
            attestation_data_len: read(0),
            timestamp_len: read(1),
            status_code_len: read(2),
            method_len: read(3),
            response_format_len: read(4),
            url_len: read(5),
            selector_len: read(6),
            encoding_options_len: read(7),
            headers_len: read(8),
            optional_fields_len: read(9),
        })
    }
}
