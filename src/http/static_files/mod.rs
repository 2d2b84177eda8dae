use std::path::{Path, PathBuf};

use tokio::fs;

pub mod types;

use types::StaticMount;

use crate::http::http_core::types::Reply;
use crate::http::http_core::undo_percent_encoding;

/// Content type for a file name, by extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// URL prefix to directory mapping. The first mount that has the file wins.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    mounts: Vec<StaticMount>,
    index_file: String,
}

impl StaticResolver {
    pub fn new(index_file: &str) -> StaticResolver {
        StaticResolver {
            mounts: Vec::new(),
            index_file: index_file.to_string(),
        }
    }

    pub fn mount(&mut self, mount: StaticMount) {
        self.mounts.push(mount);
    }

    pub fn mounts(&self) -> &[StaticMount] {
        &self.mounts
    }

    pub fn set_index_file(&mut self, index_file: &str) {
        self.index_file = index_file.to_string();
    }

    /// The file `path` maps to under `mount`, if the mount covers it.
    pub fn candidate_path(&self, mount: &StaticMount, path: &str) -> Option<PathBuf> {
        let remainder = path.strip_prefix(mount.url_prefix()).or_else(|| {
            // `/static` against a `/static/` mount
            if format!("{}/", path) == mount.url_prefix() {
                Some("")
            } else {
                None
            }
        })?;
        // Never let a remainder turn into an absolute path.
        let remainder = remainder.trim_start_matches('/');

        let mut file = PathBuf::new();
        for raw in remainder.split('/').filter(|s| !s.is_empty()) {
            let seg = undo_percent_encoding(raw);
            if seg == ".." || seg.contains('/') || seg.contains('\\') {
                return None;
            }
            file.push(seg);
        }
        if remainder.is_empty() || remainder.ends_with('/') {
            file.push(&self.index_file);
        }
        Some(mount.directory().join(file))
    }

    /// Looks `path` up in each mount in registration order.
    pub async fn resolve(&self, path: &str) -> Option<Reply> {
        for mount in &self.mounts {
            let candidate = match self.candidate_path(mount, path) {
                Some(c) => c,
                None => continue,
            };
            match fs::read(&candidate).await {
                Ok(content) => {
                    return Some(Reply::StaticFile {
                        content: content,
                        status: 200,
                        content_type: guess_mime(&candidate),
                    });
                }
                Err(e) => {
                    tracing::trace!(path = %candidate.display(), error = %e, "static miss");
                }
            }
        }
        None
    }
}
