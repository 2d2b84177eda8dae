use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

/// A file part that has been written to temporary storage.
///
/// The file belongs to the request that produced it and is removed once the
/// response has been sent.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub path: PathBuf,
    pub content_type: Option<String>,
    pub size: u64,
}

pub type Files = HashMap<String, UploadedFile>;

/// Result of decoding a multipart body, independent of how it was decoded.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MultipartOutput {
    pub fields: HashMap<String, String>,
    pub files: Files,
}

/// What the `Content-Disposition` (and friends) of one part said.
#[derive(Debug, Clone, PartialEq)]
pub struct PartInfo {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MultipartLimits {
    pub max_part_header_bytes: usize,
    pub max_field_bytes: usize,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        MultipartLimits {
            max_part_header_bytes: 4 * 1024,
            max_field_bytes: 64 * 1024,
        }
    }
}

/// Failure of a single part. Never fatal to the request.
#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("part headers are not terminated")]
    MissingHeaderTerminator,
    #[error("part headers exceed {0} bytes")]
    HeadersTooLarge(usize),
    #[error("did not receive a Content-Disposition")]
    MissingDisposition,
    #[error("Content-Disposition has no name")]
    MissingName,
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("field value exceeds {0} bytes")]
    FieldTooLarge(usize),
    #[error("could not store upload: {0}")]
    Io(#[from] io::Error),
}
