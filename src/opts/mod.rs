pub mod types;

use std::path::PathBuf;

use types::{Opts, OptsError};

use crate::config::types::{MountConfig, ServerConfig};

pub fn verify_opts(opts: &Opts) -> Result<(), OptsError> {
    for spec in &opts.statics {
        parse_static(spec)?;
    }

    if let Some(index_file) = &opts.index_file {
        if index_file.is_empty() || index_file.contains('/') {
            return Err(OptsError::InvalidIndexFile(index_file.clone()));
        }
    }

    Ok(())
}

/// Splits a `PREFIX=DIR` argument.
pub fn parse_static(spec: &str) -> Result<MountConfig, OptsError> {
    let invalid = || OptsError::InvalidStatic(spec.to_string());
    let (prefix, directory) = spec.split_once('=').ok_or_else(invalid)?;
    if !prefix.starts_with('/') || directory.is_empty() {
        return Err(invalid());
    }
    Ok(MountConfig {
        prefix: prefix.to_string(),
        directory: PathBuf::from(directory),
    })
}

/// Command-line values win over the configuration file. `--static` mounts
/// are added after the ones from the file.
pub fn apply_overrides(opts: &Opts, config: &mut ServerConfig) -> Result<(), OptsError> {
    if let Some(host) = &opts.host {
        config.host = host.clone();
    }
    if let Some(port) = opts.port {
        config.port = port;
    }
    if let Some(dir) = &opts.upload_dir {
        config.upload_dir = dir.clone();
    }
    if let Some(threshold) = opts.streaming_threshold {
        config.streaming_threshold = threshold;
    }
    if let Some(index_file) = &opts.index_file {
        config.index_file = index_file.clone();
    }
    for spec in &opts.statics {
        config.mounts.push(parse_static(spec)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;

    fn opts(args: &[&str]) -> Opts {
        Opts::try_parse_from(std::iter::once("microrouter").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn static_specs() {
        assert_eq!(
            parse_static("/=/web").unwrap(),
            MountConfig {
                prefix: "/".to_string(),
                directory: PathBuf::from("/web"),
            }
        );
        assert_eq!(parse_static("/assets=./a=b").unwrap().directory, PathBuf::from("./a=b"));
        for bad in ["/web", "assets=/web", "/assets="] {
            assert_eq!(parse_static(bad), Err(OptsError::InvalidStatic(bad.to_string())));
        }
    }

    #[test]
    fn verify_rejects_bad_values() {
        assert!(verify_opts(&opts(&["--static", "/=/web"])).is_ok());
        assert!(verify_opts(&opts(&["--static", "web"])).is_err());
        assert_eq!(
            verify_opts(&opts(&["--index-file", "x/index.html"])),
            Err(OptsError::InvalidIndexFile("x/index.html".to_string()))
        );
    }

    #[test]
    fn cli_overrides_file() {
        let mut config = ServerConfig::default();
        config.mounts.push(MountConfig {
            prefix: "/".to_string(),
            directory: PathBuf::from("/web"),
        });

        let opts = opts(&["-p", "8080", "--static", "/assets=/srv/assets", "--streaming-threshold", "0"]);
        apply_overrides(&opts, &mut config).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.streaming_threshold, 0);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[1].prefix, "/assets");
    }
}
