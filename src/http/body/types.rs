use crate::http::http_core::types::Body;
use crate::http::multipart::types::Files;

/// What the Content-Type says the body is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    Multipart { boundary: String },
    UrlEncoded,
    Other,
}

/// How the body is consumed from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStrategy {
    Empty,
    /// Read fully into memory, then decode as `BodyKind`.
    Buffered(BodyKind),
    /// Decode multipart incrementally while reading.
    Streaming { boundary: String },
}

/// The body and uploads handed to a handler, whichever strategy produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody {
    pub body: Body,
    pub files: Files,
}

impl DecodedBody {
    pub fn empty() -> DecodedBody {
        DecodedBody {
            body: Body::None,
            files: Files::new(),
        }
    }
}
