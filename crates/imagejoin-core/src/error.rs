use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("No images uploaded")]
    NoInput,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("PDF processing failed: {0}")]
    PdfProcessing(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}
