#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod http;
pub mod logging;
pub mod opts;

pub use config::types::ServerConfig;
pub use http::http_core::types::{Body, HttpMethod, Params, Reply};
pub use http::multipart::types::{Files, UploadedFile};
pub use http::routing::types::{HandlerError, HandlerResult, RouteRequest};
pub use http::routing::Router;
pub use http::{handle_connection, HttpServer, ServerError};
