use std::collections::HashMap;
use std::io;

use serde_json::Value;

pub type Params = HashMap<String, String>;

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl HttpMethod {
    pub fn parse(verb: &str) -> Option<HttpMethod> {
        match verb {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
        }
    }
}

/// The parsed request line and header block.
///
/// `method` is `None` when the verb is outside the supported set; such a
/// request can never match a route.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Option<HttpMethod>,
    pub path: String,
    pub query: Params,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn new(method: Option<HttpMethod>, path: String, query: Params) -> RequestHead {
        RequestHead {
            method: method,
            path: path,
            query: query,
            headers: Vec::new(),
        }
    }

    /// What a malformed request degrades to.
    pub fn fallback() -> RequestHead {
        RequestHead::new(Some(HttpMethod::GET), "/".to_string(), Params::new())
    }

    pub fn add_header(&mut self, key: &str, value: &str) {
        self.headers
            .push((key.trim().to_lowercase(), value.trim().to_string()));
    }

    /// Case-insensitive lookup; the first occurrence wins.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> usize {
        self.get_header("content-length")
            .and_then(|len| len.parse().ok())
            .unwrap_or(0)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }
}

/// A decoded request body, as handed to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    None,
    Json(Value),
    Form(HashMap<String, String>),
    Raw(Vec<u8>),
}

impl Body {
    pub fn is_none(&self) -> bool {
        *self == Body::None
    }

    /// Looks a key up in either a JSON object or a form body.
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Body::Json(Value::Object(map)) => map.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            Body::Form(fields) => fields.get(key).cloned(),
            _ => None,
        }
    }
}

/// What a handler, the static resolver or the router itself produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Serialized as JSON. `status` never appears in the payload.
    Json { value: Value, status: u16 },
    /// Raw payload; `content_type` of `None` means the server default.
    Raw {
        content: Vec<u8>,
        status: u16,
        content_type: Option<String>,
    },
    StaticFile {
        content: Vec<u8>,
        status: u16,
        content_type: &'static str,
    },
}

impl Reply {
    /// Builds a JSON reply, lifting the reserved `status` key out of an object.
    pub fn json(value: Value) -> Reply {
        match value {
            Value::Object(mut map) => {
                let status = match map.remove("status") {
                    Some(Value::Number(n)) => n
                        .as_u64()
                        .and_then(|n| u16::try_from(n).ok())
                        .unwrap_or(200),
                    _ => 200,
                };
                Reply::Json {
                    value: Value::Object(map),
                    status: status,
                }
            }
            other => Reply::Json {
                value: other,
                status: 200,
            },
        }
    }

    pub fn raw(content: impl Into<Vec<u8>>, status: u16) -> Reply {
        Reply::Raw {
            content: content.into(),
            status: status,
            content_type: None,
        }
    }

    pub fn raw_typed(content: impl Into<Vec<u8>>, status: u16, content_type: &str) -> Reply {
        Reply::Raw {
            content: content.into(),
            status: status,
            content_type: Some(content_type.to_string()),
        }
    }

    pub fn not_found() -> Reply {
        Reply::json(serde_json::json!({ "error": "Not Found", "status": 404 }))
    }

    pub fn server_error(msg: &str) -> Reply {
        Reply::json(serde_json::json!({ "error": msg, "status": 500 }))
    }

    pub fn status(&self) -> u16 {
        match self {
            Reply::Json { status, .. } => *status,
            Reply::Raw { status, .. } => *status,
            Reply::StaticFile { status, .. } => *status,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed after {received} of {expected} body bytes")]
    UnexpectedEof { expected: usize, received: usize },
}
