//! Picks how a request body is read and turns it into a `Body`.

use std::path::Path;

use tokio::io::AsyncRead;

pub mod types;

use types::{BodyKind, BodyStrategy, DecodedBody};

use crate::http::http_core::types::{Body, FrameError};
use crate::http::http_core::{parse_query, BodyReader};
use crate::http::multipart::types::MultipartLimits;
use crate::http::multipart::{decode_buffered, get_boundary};
use crate::http::post_buffer::PostBuffer;
use crate::http::temp_files::TempFiles;

pub fn body_kind(content_type: Option<&str>) -> BodyKind {
    let content_type = match content_type {
        Some(ct) => ct,
        None => return BodyKind::Other,
    };
    if let Some(boundary) = get_boundary(content_type) {
        return BodyKind::Multipart {
            boundary: boundary.to_string(),
        };
    }
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        BodyKind::UrlEncoded
    } else {
        BodyKind::Other
    }
}

/// Multipart bodies over `streaming_threshold` bytes are streamed; everything
/// else is buffered.
pub fn select_strategy(content_length: usize, content_type: Option<&str>, streaming_threshold: usize) -> BodyStrategy {
    if content_length == 0 {
        return BodyStrategy::Empty;
    }
    match body_kind(content_type) {
        BodyKind::Multipart { boundary } if content_length > streaming_threshold => {
            BodyStrategy::Streaming { boundary: boundary }
        }
        kind => BodyStrategy::Buffered(kind),
    }
}

/// Decodes a body that has been read completely.
pub async fn decode_in_memory(
    kind: &BodyKind,
    bytes: Vec<u8>,
    upload_dir: &Path,
    limits: MultipartLimits,
    uploads: &mut TempFiles,
) -> DecodedBody {
    match kind {
        BodyKind::Multipart { boundary } => {
            let out = decode_buffered(&bytes, boundary, upload_dir, limits, uploads).await;
            DecodedBody {
                body: Body::Form(out.fields),
                files: out.files,
            }
        }
        BodyKind::UrlEncoded => DecodedBody {
            body: Body::Form(parse_query(&String::from_utf8_lossy(&bytes))),
            ..DecodedBody::empty()
        },
        BodyKind::Other => {
            if bytes.iter().all(|b| b.is_ascii_whitespace()) {
                return DecodedBody::empty();
            }
            let body = match serde_json::from_slice(&bytes) {
                Ok(value) => Body::Json(value),
                Err(e) => {
                    tracing::debug!(error = %e, size = bytes.len(), "body is not JSON, passing raw bytes");
                    Body::Raw(bytes)
                }
            };
            DecodedBody {
                body: body,
                ..DecodedBody::empty()
            }
        }
    }
}

/// Reads the request body off `reader` with the chosen strategy.
///
/// Any file written before a socket error stays registered in `uploads`.
pub async fn consume<R>(
    strategy: BodyStrategy,
    reader: &mut R,
    body_reader: &mut BodyReader,
    upload_dir: &Path,
    limits: MultipartLimits,
    uploads: &mut TempFiles,
) -> Result<DecodedBody, FrameError>
where
    R: AsyncRead + Unpin,
{
    match strategy {
        BodyStrategy::Empty => Ok(DecodedBody::empty()),
        BodyStrategy::Buffered(kind) => {
            let bytes = body_reader.read_to_end(reader).await?;
            Ok(decode_in_memory(&kind, bytes, upload_dir, limits, uploads).await)
        }
        BodyStrategy::Streaming { boundary } => {
            let mut pb = match PostBuffer::new(&boundary, upload_dir.to_path_buf(), limits) {
                Some(pb) => pb,
                None => {
                    // Not reachable with a non-empty boundary; drain the body anyway.
                    body_reader.read_to_end(reader).await?;
                    return Ok(DecodedBody::empty());
                }
            };
            while let Some(chunk) = body_reader.next_chunk(reader).await? {
                pb.handle_new_data(&chunk, uploads).await;
            }
            let out = pb.finish().await;
            Ok(DecodedBody {
                body: Body::Form(out.fields),
                files: out.files,
            })
        }
    }
}
