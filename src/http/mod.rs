//! The HTTP engine: one task per connection, one request per connection.
//!
//! A connection is framed (`http_core`), its body consumed with the strategy
//! `body` picks, dispatched through the `Router`, rendered (`rendering`) and
//! closed. Files written while decoding the body are removed afterwards
//! whatever happened in between (`temp_files`).

pub mod body;
pub mod boyer_moore;
pub mod http_core;
pub mod multipart;
pub mod post_buffer;
pub mod rendering;
pub mod routing;
pub mod static_files;
pub mod temp_files;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::types::ServerConfig;

use body::select_strategy;
use http_core::types::{FrameError, Reply};
use http_core::{parse_head, read_head, BodyReader};
use rendering::{render_response, RenderError};
use routing::types::RouteRequest;
use routing::Router;
use temp_files::TempFiles;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("failed to read local address: {0}")]
    LocalAddr(io::Error),
}

/// Why a connection was closed without a response.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Owns the listening socket and the shared, read-only routing state.
pub struct HttpServer {
    listener: TcpListener,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
}

impl HttpServer {
    pub async fn bind(config: ServerConfig, router: Router) -> Result<HttpServer, ServerError> {
        let addr = format!("{host}:{port}", host = config.host, port = config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind { addr: addr.clone(), source: e })?;
        Ok(HttpServer {
            listener: listener,
            router: Arc::new(router),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Accepts connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accepts connections until `shutdown` completes. Connections already
    /// accepted finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutting down listener");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let router = Arc::clone(&self.router);
            let config = Arc::clone(&self.config);
            tokio::spawn(async move {
                handle_connection(&router, &config, stream, &peer.to_string()).await;
            });
        }
    }
}

/// Serves exactly one request on `stream` and closes it.
pub async fn handle_connection<S>(router: &Router, config: &ServerConfig, mut stream: S, peer: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut uploads = TempFiles::new();

    match serve_request(router, config, &mut stream, &mut uploads, peer).await {
        Ok(response) => {
            if let Err(e) = write_response(&mut stream, &response).await {
                tracing::debug!(peer = peer, error = %e, "client went away before the response was sent");
            }
        }
        Err(e) => {
            tracing::warn!(peer = peer, error = %e, "closing connection without a response");
        }
    }

    uploads.release().await;
}

async fn write_response<S>(stream: &mut S, response: &[u8]) -> Result<(), io::Error>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(response).await?;
    stream.flush().await?;
    stream.shutdown().await
}

async fn serve_request<S>(
    router: &Router,
    config: &ServerConfig,
    stream: &mut S,
    uploads: &mut TempFiles,
    peer: &str,
) -> Result<Vec<u8>, ConnectionError>
where
    S: AsyncRead + Unpin,
{
    let (head, early_body) = read_head(stream, config.max_header_bytes).await?;
    let req = parse_head(&head);
    let content_length = req.content_length();

    let strategy = select_strategy(content_length, req.content_type(), config.streaming_threshold);
    tracing::trace!(peer = peer, ?strategy, content_length = content_length, "reading body");

    let mut body_reader = BodyReader::new(early_body, content_length, config.chunk_size);
    let decoded = body::consume(
        strategy,
        stream,
        &mut body_reader,
        &config.upload_dir,
        config.limits(),
        uploads,
    )
    .await?;

    let method = req.method.map(|m| m.as_str()).unwrap_or("???");
    let route_req = RouteRequest {
        method: req.method,
        path: req.path.clone(),
        body: decoded.body,
        query: req.query,
        params: Default::default(),
        files: decoded.files,
    };

    let reply = match router.dispatch(route_req).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(peer = peer, method = method, path = %req.path, error = %e, "handler failed");
            Reply::server_error(&e.to_string())
        }
    };

    tracing::info!(peer = peer, method = method, path = %req.path, status = reply.status(), "request");
    Ok(render_response(&reply)?)
}
