use std::path::PathBuf;

use tokio::fs;

/// A file part whose bytes are being written as they arrive.
pub struct OpenFile {
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub path: PathBuf,
    pub file: fs::File,
    pub written: u64,
}

/// A text field collected in memory until its closing delimiter shows up.
pub struct FieldPart {
    pub name: String,
    pub value: Vec<u8>,
}

pub enum PostRequestState {
    SeekingBoundary,
    ReadingPartHeaders,
    StreamingFileBody(OpenFile),
    BufferingFieldBody(FieldPart),
    /// A part failed; drop its bytes until the next delimiter.
    DiscardingPart,
    Done,
}

impl PostRequestState {
    pub fn name(&self) -> &'static str {
        match self {
            PostRequestState::SeekingBoundary => "seeking boundary",
            PostRequestState::ReadingPartHeaders => "reading part headers",
            PostRequestState::StreamingFileBody(_) => "streaming file body",
            PostRequestState::BufferingFieldBody(_) => "buffering field body",
            PostRequestState::DiscardingPart => "discarding part",
            PostRequestState::Done => "done",
        }
    }
}
