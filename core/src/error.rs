use thiserror::Error;

/// Oracle verification error types.
///
/// Request-local failures (everything except `Config` and `Contract`)
/// are surfaced to the caller and never terminate the process. The
/// startup path treats `Config` and `Contract` errors as fatal so the
/// server never serves traffic with an unverified trust anchor.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Request shape is invalid; rejected before the core is invoked.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Buffer too short, field out of bounds, or oversized field in
    /// an encoded proof or report.
    #[error("structural decoding error: {0}")]
    StructuralDecode(String),

    /// Signature or certificate chain rejected by the quote
    /// verification capability. The message is passed through verbatim.
    #[error("{0}")]
    Cryptographic(String),

    /// Enclave measurement (unique ID, PCR set, or nonce) differs from
    /// the expected target.
    #[error("measurement mismatch: expected {expected}, got {actual}")]
    MeasurementMismatch { expected: String, actual: String },

    /// Recomputed proof digest does not match the report's committed
    /// bytes.
    #[error("binding mismatch: proof data does not match the report's committed hash; the proof may use a different encoder version, please check for updates")]
    BindingMismatch,

    /// Report prefix matches neither supported TEE type.
    #[error("unsupported report type")]
    UnsupportedReportType,

    /// Failed to prepare canonical proof bytes for binding.
    #[error("verification error: failed to prepare data for report verification: {0}")]
    BindingPrepare(String),

    /// The signer session failed to format the message.
    #[error("verification error: failed to format message for report verification: {0}")]
    BindingFormat(String),

    /// The signer session failed to hash the message.
    #[error("verification error: failed to hash message for report verification: {0}")]
    BindingHash(String),

    /// Signer session could not be opened or used.
    #[error("signer session error: {0}")]
    Session(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// On-chain measurement lookup error.
    #[error("contract error: {0}")]
    Contract(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        VerifyError::Serialization(err.to_string())
    }
}

/// Result type alias for oracle verification operations.
pub type Result<T> = std::result::Result<T, VerifyError>;
