use thiserror::Error;

/// Failures writing to the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store quota exceeded writing '{key}': {requested} bytes requested, {used} of {quota} used")]
    QuotaExceeded {
        key: String,
        requested: usize,
        used: usize,
        quota: usize,
    },

    #[error("failed to encode value for '{key}': {reason}")]
    Encode { key: String, reason: String },
}

/// Failures decoding an exit message or window record.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload failed to decompress: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("decompressed payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("payload is not a valid message: {0}")]
    Json(#[from] serde_json::Error),
}
