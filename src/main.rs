use std::collections::HashMap;
use std::error::Error;
use std::process;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::sync::RwLock;

use microrouter::config::load_config;
use microrouter::config::types::ServerConfig;
use microrouter::opts::types::Opts;
use microrouter::opts::{apply_overrides, verify_opts};
use microrouter::{logging, HttpServer, Reply, Router};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("GIT_HASH");

type PinModes = Arc<RwLock<HashMap<String, String>>>;

/// Demo route table: pin modes held in memory, an upload endpoint that
/// reports what it received, the static mounts, and a single-page app
/// fallback when a "/" mount is configured.
fn build_router(config: &ServerConfig) -> Router {
    let mut router = Router::new();
    router.index_file(&config.index_file);
    for mount in &config.mounts {
        router.static_dir(&mount.prefix, mount.directory.clone());
    }

    let pins: PinModes = Arc::default();

    let modes = Arc::clone(&pins);
    router.post("/api/pin/set-mode/:pin/:mode", move |req| {
        let modes = Arc::clone(&modes);
        async move {
            let pin = req.params["pin"].clone();
            let mode = req.params["mode"].clone();
            if mode != "in" && mode != "out" {
                return Ok(Reply::json(json!({ "message": "mode must be in or out", "status": 400 })));
            }
            modes.write().await.insert(pin.clone(), mode.clone());
            Ok(Reply::json(json!({ "pin": pin, "mode": mode })))
        }
    });

    let modes = Arc::clone(&pins);
    router.get("/api/pin/:pin", move |req| {
        let modes = Arc::clone(&modes);
        async move {
            match modes.read().await.get(&req.params["pin"]) {
                Some(mode) => Ok(Reply::json(json!({ "pin": req.params["pin"], "mode": mode }))),
                None => Ok(Reply::json(json!({ "message": "unknown pin", "status": 404 }))),
            }
        }
    });

    router.post("/upload/:id", |req| async move {
        let files: Vec<_> = req
            .files
            .iter()
            .map(|(field, file)| {
                json!({
                    "field": field,
                    "filename": file.filename,
                    "content_type": file.content_type,
                    "size": file.size,
                })
            })
            .collect();
        Ok(Reply::json(json!({ "id": req.params["id"], "files": files })))
    });

    router.get("/api/status", |_req| async {
        Ok(Reply::json(json!({ "version": VERSION, "git": GIT_HASH })))
    });

    if let Some(root) = config.mounts.iter().find(|m| m.prefix == "/") {
        let index = root.directory.join(&config.index_file);
        router.fallback(move |_req| {
            let index = index.clone();
            async move {
                match tokio::fs::read(&index).await {
                    Ok(content) => Ok(Reply::raw_typed(content, 200, "text/html")),
                    Err(_) => Ok(Reply::not_found()),
                }
            }
        });
    }

    router
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let opts = Opts::parse();
    logging::init(&opts.log_level);

    if let Err(e) = verify_opts(&opts) {
        tracing::error!("{}", e);
        process::exit(1);
    }

    let mut config = match &opts.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %path.display(), "{}", e);
                process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    apply_overrides(&opts, &mut config)?;

    tracing::info!(version = VERSION, git = GIT_HASH, "microrouter starting");

    let router = build_router(&config);
    let server = HttpServer::bind(config, router).await?;
    tracing::info!(address = %server.local_addr()?, "listening");

    server.run_until(shutdown_signal()).await;
    Ok(())
}
