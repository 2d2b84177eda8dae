use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Route table HTTP server for small devices")]
pub struct Opts {
    #[arg(short, long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(short = 'm', long, help = "Address to listen on")]
    pub host: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(
        short,
        long = "upload-dir",
        help = "Directory for uploaded files. They are removed once the request is answered."
    )]
    pub upload_dir: Option<PathBuf>,
    #[arg(
        short = 's',
        long = "static",
        value_name = "PREFIX=DIR",
        help = "Serve DIR under the URL PREFIX. May be given more than once."
    )]
    pub statics: Vec<String>,
    #[arg(
        long = "streaming-threshold",
        help = "Multipart bodies larger than this many bytes are decoded as they arrive"
    )]
    pub streaming_threshold: Option<usize>,
    #[arg(long = "index-file", help = "File served when a static directory is requested")]
    pub index_file: Option<String>,
    #[arg(
        short,
        long = "log-level",
        env = "MICROROUTER_LOG",
        default_value = "info",
        help = "Log level. RUST_LOG takes precedence."
    )]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptsError {
    #[error("invalid --static value {0:?}: expected PREFIX=DIR")]
    InvalidStatic(String),
    #[error("invalid index file {0:?}")]
    InvalidIndexFile(String),
}
