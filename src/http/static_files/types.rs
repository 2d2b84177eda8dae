use std::path::PathBuf;

/// Serves `directory` under the URL prefix `url_prefix`.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMount {
    url_prefix: String,
    directory: PathBuf,
}

impl StaticMount {
    /// The prefix always ends up with a trailing `/`.
    pub fn new(url_prefix: &str, directory: impl Into<PathBuf>) -> StaticMount {
        let mut url_prefix = url_prefix.to_string();
        if !url_prefix.ends_with('/') {
            url_prefix.push('/');
        }
        StaticMount {
            url_prefix: url_prefix,
            directory: directory.into(),
        }
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn directory(&self) -> &PathBuf {
        &self.directory
    }
}
