use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::http::http_core::types::{Body, HttpMethod, Params, Reply};
use crate::http::http_core::undo_percent_encoding;
use crate::http::multipart::types::Files;

pub type HandlerError = Box<dyn Error + Send + Sync>;
pub type HandlerResult = Result<Reply, HandlerError>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type Handler = Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Everything a handler gets to see about its request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Option<HttpMethod>,
    pub path: String,
    pub body: Body,
    pub query: Params,
    pub params: Params,
    pub files: Files,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// `/api/pin/:pin` style pattern, split on `/` with empty segments dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(source: &str) -> Pattern {
        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Pattern {
            source: source.to_string(),
            segments: segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Path parameters if `path` has this shape.
    ///
    /// `path` is split while still percent-encoded; each segment is decoded
    /// afterwards.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            let part = undo_percent_encoding(part);
            match segment {
                Segment::Param(name) => {
                    params.insert(name.clone(), part);
                }
                Segment::Literal(lit) => {
                    if *lit != part {
                        return None;
                    }
                }
            }
        }
        Some(params)
    }
}

pub struct Route {
    pub method: HttpMethod,
    pub pattern: Pattern,
    pub handler: Handler,
}

/// Why a request got a 404. Clients can't tell these apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    NoRoute,
    NoStaticFile,
}

impl NotFound {
    pub fn reason(&self) -> &'static str {
        match self {
            NotFound::NoRoute => "no dynamic route",
            NotFound::NoStaticFile => "no static file",
        }
    }
}
