//! Incremental `multipart/form-data` decoding for bodies too large to hold in
//! memory.
//!
//! The socket is read in small chunks and fed to a `PostBuffer`, which keeps
//! only a sliding window of unparsed bytes. File parts are written to their
//! storage path as the window fills, always holding back enough bytes that a
//! delimiter split across two reads is never written into the file.

use std::mem;
use std::path::PathBuf;

use boyer_moore_magiclen::BMByte;
use tokio::io::AsyncWriteExt;

pub mod types;

use types::{FieldPart, OpenFile, PostRequestState};

use crate::http::boyer_moore::{compile, find_body_start, find_from};
use crate::http::multipart::types::{MultipartLimits, MultipartOutput, PartError, PartInfo, UploadedFile};
use crate::http::multipart::{create_upload_file, parse_part_headers};
use crate::http::temp_files::TempFiles;

pub struct PostBuffer {
    buffer: Vec<u8>,
    // `--boundary`
    delimiter: BMByte,
    delimiter_len: usize,
    // `\r\n--boundary`, which ends every part body
    part_end: BMByte,
    part_end_len: usize,
    state: PostRequestState,
    dir: PathBuf,
    limits: MultipartLimits,
    output: MultipartOutput,
}

impl PostBuffer {
    pub fn new(boundary: &str, dir: PathBuf, limits: MultipartLimits) -> Option<PostBuffer> {
        let delimiter = format!("--{}", boundary);
        let part_end = format!("\r\n--{}", boundary);
        Some(PostBuffer {
            buffer: Vec::new(),
            delimiter: compile(delimiter.as_bytes())?,
            delimiter_len: delimiter.len(),
            part_end: compile(part_end.as_bytes())?,
            part_end_len: part_end.len(),
            state: PostRequestState::SeekingBoundary,
            dir: dir,
            limits: limits,
            output: MultipartOutput::default(),
        })
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, PostRequestState::Done)
    }

    /// Bytes currently held back, waiting for more input.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Consumes one chunk of body, advancing as far as the data allows.
    pub async fn handle_new_data(&mut self, data: &[u8], uploads: &mut TempFiles) {
        if self.is_done() {
            // Epilogue after the closing delimiter.
            return;
        }
        self.buffer.extend_from_slice(data);
        while self.advance(uploads).await {}
    }

    /// Ends decoding. A part still open here never saw its closing delimiter
    /// and is dropped; its file stays tracked so it is still removed.
    pub async fn finish(mut self) -> MultipartOutput {
        match mem::replace(&mut self.state, PostRequestState::Done) {
            PostRequestState::Done => {}
            PostRequestState::StreamingFileBody(part) => {
                tracing::warn!(field = %part.name, filename = %part.filename, "upload ended before its closing boundary");
            }
            PostRequestState::BufferingFieldBody(field) => {
                tracing::warn!(field = %field.name, "field ended before its closing boundary");
            }
            other => {
                tracing::debug!(state = other.name(), "multipart body ended without closing boundary");
            }
        }
        self.output
    }

    /// Bytes that can leave the window without risking a split delimiter.
    fn safe_len(&self) -> usize {
        self.buffer.len().saturating_sub(self.part_end_len)
    }

    /// Runs one state transition. Returns false when more input is needed.
    async fn advance(&mut self, uploads: &mut TempFiles) -> bool {
        match mem::replace(&mut self.state, PostRequestState::Done) {
            PostRequestState::Done => {
                self.buffer.clear();
                false
            }
            PostRequestState::SeekingBoundary => {
                let idx = match find_from(&self.delimiter, &self.buffer, 0) {
                    Some(idx) => idx,
                    None => {
                        // Preamble. Keep a possible delimiter prefix.
                        let keep = self.delimiter_len - 1;
                        let drop_to = self.buffer.len().saturating_sub(keep);
                        self.buffer.drain(..drop_to);
                        self.state = PostRequestState::SeekingBoundary;
                        return false;
                    }
                };
                let after = idx + self.delimiter_len;
                if self.buffer.len() < after + 2 {
                    // Need to get \r\n or --
                    self.state = PostRequestState::SeekingBoundary;
                    return false;
                }
                if &self.buffer[after..after + 2] == b"--" {
                    // Read final delimiter, so we're done.
                    self.buffer.clear();
                    self.state = PostRequestState::Done;
                    return false;
                }
                let skip = if &self.buffer[after..after + 2] == b"\r\n" {
                    after + 2
                } else {
                    after
                };
                self.buffer.drain(..skip);
                self.state = PostRequestState::ReadingPartHeaders;
                true
            }
            PostRequestState::ReadingPartHeaders => {
                let body_start = match find_body_start(&self.buffer) {
                    Some(idx) => idx,
                    None => {
                        if self.buffer.len() > self.limits.max_part_header_bytes {
                            self.abort_part(PartError::HeadersTooLarge(self.limits.max_part_header_bytes));
                            return true;
                        }
                        // Waiting for more metadata
                        self.state = PostRequestState::ReadingPartHeaders;
                        return false;
                    }
                };
                let meta = String::from_utf8_lossy(&self.buffer[..body_start]).to_string();
                self.buffer.drain(..body_start);
                match parse_part_headers(&meta) {
                    Ok(info) => self.open_part(info, uploads).await,
                    Err(e) => self.abort_part(e),
                }
                true
            }
            PostRequestState::StreamingFileBody(mut part) => {
                match find_from(&self.part_end, &self.buffer, 0) {
                    Some(end) => {
                        match write_chunk(&mut part, &self.buffer[..end]).await {
                            Ok(()) => {
                                tracing::debug!(field = %part.name, filename = %part.filename, size = part.written, "stored upload");
                                // Dropping the handle closes the file before the next part opens.
                                self.output.files.insert(
                                    part.name,
                                    UploadedFile {
                                        filename: part.filename,
                                        path: part.path,
                                        content_type: part.content_type,
                                        size: part.written,
                                    },
                                );
                            }
                            Err(e) => {
                                tracing::warn!(field = %part.name, error = %e, "dropping upload");
                            }
                        }
                        // Leave `--boundary` at the front for the next state.
                        self.buffer.drain(..end + 2);
                        self.state = PostRequestState::SeekingBoundary;
                        true
                    }
                    None => {
                        let safe = self.safe_len();
                        if safe == 0 {
                            self.state = PostRequestState::StreamingFileBody(part);
                            return false;
                        }
                        let res = write_chunk(&mut part, &self.buffer[..safe]).await;
                        self.buffer.drain(..safe);
                        match res {
                            Ok(()) => {
                                self.state = PostRequestState::StreamingFileBody(part);
                                false
                            }
                            Err(e) => {
                                tracing::warn!(field = %part.name, "dropping upload");
                                self.abort_part(e);
                                true
                            }
                        }
                    }
                }
            }
            PostRequestState::BufferingFieldBody(mut field) => {
                let (take, found) = match find_from(&self.part_end, &self.buffer, 0) {
                    Some(end) => (end, true),
                    None => (self.safe_len(), false),
                };
                field.value.extend_from_slice(&self.buffer[..take]);
                self.buffer.drain(..take);

                if field.value.len() > self.limits.max_field_bytes {
                    tracing::warn!(field = %field.name, "dropping field");
                    self.abort_part(PartError::FieldTooLarge(self.limits.max_field_bytes));
                    return true;
                }
                if !found {
                    self.state = PostRequestState::BufferingFieldBody(field);
                    return false;
                }
                self.output
                    .fields
                    .insert(field.name, String::from_utf8_lossy(&field.value).to_string());
                self.buffer.drain(..2);
                self.state = PostRequestState::SeekingBoundary;
                true
            }
            PostRequestState::DiscardingPart => match find_from(&self.part_end, &self.buffer, 0) {
                Some(end) => {
                    self.buffer.drain(..end + 2);
                    self.state = PostRequestState::SeekingBoundary;
                    true
                }
                None => {
                    let safe = self.safe_len();
                    self.buffer.drain(..safe);
                    self.state = PostRequestState::DiscardingPart;
                    false
                }
            },
        }
    }

    async fn open_part(&mut self, info: PartInfo, uploads: &mut TempFiles) {
        self.state = match info.filename {
            Some(filename) => match create_upload_file(&self.dir, &filename, uploads).await {
                Ok((path, file)) => PostRequestState::StreamingFileBody(OpenFile {
                    name: info.name,
                    filename: filename,
                    content_type: info.content_type,
                    path: path,
                    file: file,
                    written: 0,
                }),
                Err(e) => {
                    tracing::warn!(field = %info.name, error = %e, "skipping multipart part");
                    PostRequestState::DiscardingPart
                }
            },
            None => PostRequestState::BufferingFieldBody(FieldPart {
                name: info.name,
                value: Vec::new(),
            }),
        };
    }

    fn abort_part(&mut self, e: PartError) {
        tracing::warn!(error = %e, "skipping multipart part");
        self.state = PostRequestState::DiscardingPart;
    }
}

async fn write_chunk(part: &mut OpenFile, data: &[u8]) -> Result<(), PartError> {
    part.file.write_all(data).await?;
    part.file.flush().await?;
    part.written += data.len() as u64;
    Ok(())
}
