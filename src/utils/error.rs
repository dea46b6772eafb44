use thiserror::Error;

/// Errors raised while auditing a key sheet.
///
/// Only `ImageLoad` aborts a run. Key-format and recognition failures are
/// caught at the pair that produced them and recorded in the report.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Image load error: {0}")]
    ImageLoad(String),

    #[error("Key format error: {0}")]
    KeyFormat(String),

    #[error("Text recognition error: {0}")]
    Recognition(String),
}
