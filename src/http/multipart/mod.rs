//! `multipart/form-data` decoding for bodies that fit in memory, plus the
//! part-header and storage helpers shared with the streaming decoder in
//! `post_buffer`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod types;

use types::{MultipartLimits, MultipartOutput, PartError, PartInfo, UploadedFile};

use crate::http::boyer_moore::{compile, find_body_start, find_from};
use crate::http::temp_files::TempFiles;

/// Extracts the boundary from a `multipart/form-data` content type.
pub fn get_boundary(content_type: &str) -> Option<&str> {
    let mut segments = content_type.split(';');
    let mime = segments.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    for segment in segments {
        let segment = segment.trim();
        let is_boundary = match segment.get(..9) {
            Some(key) => key.eq_ignore_ascii_case("boundary="),
            None => false,
        };
        if is_boundary && segment.len() > 9 {
            let inner = &segment[9..];

            // Remove the surrounding quotes
            if inner.len() >= 2 && inner.starts_with('"') && inner.ends_with('"') {
                return Some(&inner[1..inner.len() - 1]);
            }

            return Some(inner);
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Reads the headers of one part (everything before its blank line).
pub fn parse_part_headers(meta: &str) -> Result<PartInfo, PartError> {
    let mut disposition: Option<&str> = None;
    let mut content_type: Option<String> = None;

    for line in meta.split("\r\n") {
        let (head, val) = match line.find(':') {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => continue,
        };
        if head.trim().eq_ignore_ascii_case("content-disposition") {
            disposition = Some(val);
        } else if head.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(val.trim().to_string());
        }
    }

    let info = disposition.ok_or(PartError::MissingDisposition)?;

    let mut name: Option<String> = None;
    let mut filename: Option<String> = None;
    for kv in info.split(';') {
        if let Some(idx) = kv.find('=') {
            let (k, v) = kv.split_at(idx);
            match k.trim() {
                "name" => name = Some(unquote(&v[1..]).to_string()),
                "filename" => filename = Some(unquote(&v[1..]).to_string()),
                _ => {}
            }
        }
    }

    match name {
        Some(name) if !name.is_empty() => Ok(PartInfo {
            name: name,
            filename: filename,
            content_type: content_type,
        }),
        _ => Err(PartError::MissingName),
    }
}

/// Where an upload called `filename` is stored: its base name under `upload_dir`.
///
/// Two in-flight uploads with the same base name share a path.
pub fn storage_path(upload_dir: &Path, filename: &str) -> Result<PathBuf, PartError> {
    let base = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        return Err(PartError::InvalidFilename(filename.to_string()));
    }
    Ok(upload_dir.join(base))
}

/// Creates the storage file for a part, registering it for cleanup first.
pub async fn create_upload_file(
    upload_dir: &Path,
    filename: &str,
    uploads: &mut TempFiles,
) -> Result<(PathBuf, fs::File), PartError> {
    let path = storage_path(upload_dir, filename)?;
    fs::create_dir_all(upload_dir).await?;
    uploads.track(&path);
    let file = fs::File::create(&path).await?;
    Ok((path, file))
}

fn strip_trailing_crlf(content: &[u8]) -> &[u8] {
    if content.ends_with(b"\r\n") {
        &content[..content.len() - 2]
    } else {
        content
    }
}

/// Decodes a multipart body held entirely in memory.
///
/// Malformed parts are logged and skipped; their siblings are still decoded.
pub async fn decode_buffered(
    body: &[u8],
    boundary: &str,
    upload_dir: &Path,
    limits: MultipartLimits,
    uploads: &mut TempFiles,
) -> MultipartOutput {
    let mut output = MultipartOutput::default();
    let marker = format!("--{}", boundary);
    let delim = match compile(marker.as_bytes()) {
        Some(d) => d,
        None => return output,
    };

    // A marker only delimits at the start of the body or right after a CRLF.
    let mut starts: Vec<usize> = Vec::new();
    let mut search_from = 0;
    while let Some(idx) = find_from(&delim, body, search_from) {
        if idx == 0 || body[..idx].ends_with(b"\r\n") {
            starts.push(idx);
            search_from = idx + marker.len();
        } else {
            search_from = idx + 1;
        }
    }

    for (i, start) in starts.iter().enumerate() {
        let seg_start = start + marker.len();
        let seg_end = match starts.get(i + 1) {
            Some(next) => *next,
            None => body.len(),
        };
        let segment = &body[seg_start..seg_end];

        if segment.starts_with(b"--") {
            // Closing delimiter
            break;
        }
        let segment = segment.strip_prefix(&b"\r\n"[..]).unwrap_or(segment);
        if segment.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        if let Err(e) = decode_part(segment, upload_dir, limits, uploads, &mut output).await {
            tracing::warn!(error = %e, "skipping malformed multipart part");
        }
    }

    output
}

async fn decode_part(
    segment: &[u8],
    upload_dir: &Path,
    limits: MultipartLimits,
    uploads: &mut TempFiles,
    output: &mut MultipartOutput,
) -> Result<(), PartError> {
    let body_start = find_body_start(segment).ok_or(PartError::MissingHeaderTerminator)?;
    if body_start > limits.max_part_header_bytes {
        return Err(PartError::HeadersTooLarge(limits.max_part_header_bytes));
    }
    let meta = String::from_utf8_lossy(&segment[..body_start]);
    let info = parse_part_headers(&meta)?;
    let content = strip_trailing_crlf(&segment[body_start..]);

    match info.filename {
        Some(filename) => {
            let (path, mut file) = create_upload_file(upload_dir, &filename, uploads).await?;
            file.write_all(content).await?;
            file.flush().await?;
            tracing::debug!(field = %info.name, filename = %filename, size = content.len(), "stored upload");
            output.files.insert(
                info.name,
                UploadedFile {
                    filename: filename,
                    path: path,
                    content_type: info.content_type,
                    size: content.len() as u64,
                },
            );
        }
        None => {
            if content.len() > limits.max_field_bytes {
                return Err(PartError::FieldTooLarge(limits.max_field_bytes));
            }
            output
                .fields
                .insert(info.name, String::from_utf8_lossy(content).to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a body with text fields first, then file parts.
    pub(crate) fn encode(boundary: &str, fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        for (name, filename, content) in files {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(get_boundary("multipart/form-data; boundary=abc"), Some("abc"));
        assert_eq!(get_boundary("Multipart/Form-Data;boundary=\"a b\""), Some("a b"));
        assert_eq!(get_boundary("multipart/form-data"), None);
        assert_eq!(get_boundary("application/json; boundary=abc"), None);
    }

    #[test]
    fn part_headers() {
        let info = parse_part_headers(
            "Content-Disposition: form-data; name=\"file\"; filename=\"report.txt\"\r\nContent-Type: text/plain",
        )
        .unwrap();
        assert_eq!(info.name, "file");
        assert_eq!(info.filename.as_deref(), Some("report.txt"));
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));

        let info = parse_part_headers("content-disposition: form-data; name=plain").unwrap();
        assert_eq!(info.name, "plain");
        assert_eq!(info.filename, None);

        assert!(matches!(
            parse_part_headers("Content-Type: text/plain"),
            Err(PartError::MissingDisposition)
        ));
        assert!(matches!(
            parse_part_headers("Content-Disposition: form-data"),
            Err(PartError::MissingName)
        ));
    }

    #[test]
    fn storage_path_uses_base_name() {
        let dir = Path::new("/tmp/up");
        assert_eq!(storage_path(dir, "report.txt").unwrap(), dir.join("report.txt"));
        assert_eq!(storage_path(dir, "../../etc/passwd").unwrap(), dir.join("passwd"));
        assert_eq!(storage_path(dir, "C:\\x\\y.bin").unwrap(), dir.join("y.bin"));
        assert!(storage_path(dir, "").is_err());
        assert!(storage_path(dir, "a/..").is_err());
    }

    #[tokio::test]
    async fn buffered_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let body = encode("XyZ", &[("name", "foo")], &[("file", "report.txt", &b"hello"[..])]);
        let mut uploads = TempFiles::new();

        let out = decode_buffered(&body, "XyZ", dir.path(), MultipartLimits::default(), &mut uploads).await;

        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields["name"], "foo");
        let file = &out.files["file"];
        assert_eq!(file.filename, "report.txt");
        assert_eq!(file.size, 5);
        assert_eq!(std::fs::read(&file.path).unwrap(), b"hello");
        assert_eq!(uploads.len(), 1);

        uploads.release().await;
        assert!(!file.path.exists());
    }

    #[tokio::test]
    async fn content_with_crlf_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let content: &[u8] = b"line one\r\nline two\r\n\r\n";
        let body = encode("b", &[], &[("file", "lines.txt", content)]);
        let mut uploads = TempFiles::new();

        let out = decode_buffered(&body, "b", dir.path(), MultipartLimits::default(), &mut uploads).await;
        assert_eq!(std::fs::read(&out.files["file"].path).unwrap(), content);
    }

    #[tokio::test]
    async fn malformed_part_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = Vec::new();
        body.extend_from_slice(b"--bnd\r\nX-Nothing: here\r\n\r\nignored\r\n");
        body.extend_from_slice(b"--bnd\r\nContent-Disposition: form-data; name=\"f\"; filename=\"..\"\r\n\r\nnope\r\n");
        body.extend_from_slice(b"--bnd\r\nContent-Disposition: form-data; name=\"ok\"\r\n\r\nyes\r\n");
        body.extend_from_slice(b"--bnd--\r\n");
        let mut uploads = TempFiles::new();

        let out = decode_buffered(&body, "bnd", dir.path(), MultipartLimits::default(), &mut uploads).await;
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields["ok"], "yes");
        assert!(out.files.is_empty());
    }

    #[tokio::test]
    async fn oversized_field_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let big = "x".repeat(32);
        let body = encode("b", &[("big", big.as_str()), ("small", "s")], &[]);
        let limits = MultipartLimits {
            max_part_header_bytes: 1024,
            max_field_bytes: 16,
        };
        let mut uploads = TempFiles::new();

        let out = decode_buffered(&body, "b", dir.path(), limits, &mut uploads).await;
        assert_eq!(out.fields.get("big"), None);
        assert_eq!(out.fields["small"], "s");
    }
}
