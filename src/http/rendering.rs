//! Turns a `Reply` into the bytes written back to the client.

use crate::http::http_core::status_to_message;
use crate::http::http_core::types::Reply;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("could not serialize reply: {0}")]
    Json(#[from] serde_json::Error),
}

/// Status, content type and payload of a reply.
pub fn render_parts(reply: &Reply) -> Result<(u16, &str, Vec<u8>), RenderError> {
    match reply {
        Reply::Json { value, status } => Ok((*status, DEFAULT_CONTENT_TYPE, serde_json::to_vec(value)?)),
        Reply::Raw {
            content,
            status,
            content_type,
        } => Ok((
            *status,
            content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
            content.clone(),
        )),
        Reply::StaticFile {
            content,
            status,
            content_type,
        } => Ok((*status, *content_type, content.clone())),
    }
}

/// A complete response. The connection is always closed afterwards.
pub fn render_response(reply: &Reply) -> Result<Vec<u8>, RenderError> {
    let (status, content_type, body) = render_parts(reply)?;
    let head = format!(
        "HTTP/1.1 {code} {message}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n",
        code = status,
        message = status_to_message(status),
        content_type = content_type,
        len = body.len()
    );
    let mut out = Vec::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn json_reply_drops_status_key() {
        let reply = Reply::json(json!({ "message": "Invalid password", "status": 400 }));
        assert_eq!(
            text(render_response(&reply).unwrap()),
            "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: 30\r\nConnection: close\r\n\r\n{\"message\":\"Invalid password\"}"
        );
    }

    #[test]
    fn json_reply_defaults_to_200() {
        let out = text(render_response(&Reply::json(json!({ "ok": true }))).unwrap());
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("\r\n\r\n{\"ok\":true}"));
    }

    #[test]
    fn unknown_codes_use_generic_phrase() {
        let out = text(render_response(&Reply::json(json!({ "status": 401 }))).unwrap());
        assert!(out.starts_with("HTTP/1.1 401 Internal Server Error\r\n"));
        assert!(out.ends_with("\r\n\r\n{}"));
    }

    #[test]
    fn raw_reply_keeps_default_type_unless_given() {
        let out = text(render_response(&Reply::raw("plain", 200)).unwrap());
        assert!(out.contains("Content-Type: application/json\r\n"));
        assert!(out.contains("Content-Length: 5\r\n"));

        let out = text(render_response(&Reply::raw_typed("<p>", 200, "text/html")).unwrap());
        assert!(out.contains("Content-Type: text/html\r\n"));
        assert!(out.ends_with("<p>"));
    }

    #[test]
    fn static_file_reply() {
        let reply = Reply::StaticFile {
            content: b"body{}".to_vec(),
            status: 200,
            content_type: "text/css",
        };
        let out = render_response(&reply).unwrap();
        assert!(text(out).contains("Content-Type: text/css\r\nContent-Length: 6\r\nConnection: close\r\n\r\nbody{}"));
    }
}
