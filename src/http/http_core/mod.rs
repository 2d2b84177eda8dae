use regex::bytes::{Captures, Regex};

use std::borrow::Cow;
use std::cmp::min;

use tokio::io::{AsyncRead, AsyncReadExt};

pub mod types;
use types::{FrameError, HttpMethod, Params, RequestHead};

use crate::http::boyer_moore::find_body_start;

const HEAD_READ_SIZE: usize = 1024;

/// Reason phrase for a status line. Anything not in the table collapses to
/// the generic server error phrase.
pub fn status_to_message(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

/// Reads from `reader` until the header terminator has been seen.
///
/// Returns the header block (terminator included) and whatever body bytes
/// arrived in the same reads. A peer that closes early, or a head that
/// outgrows `max_header_bytes`, yields whatever was buffered; `parse_head`
/// turns that into the fallback request.
pub async fn read_head<R>(reader: &mut R, max_header_bytes: usize) -> Result<(Vec<u8>, Vec<u8>), FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(HEAD_READ_SIZE);
    let mut chunk = [0u8; HEAD_READ_SIZE];
    // Only rescan the bytes that could complete a terminator.
    let mut scan_from = 0;

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok((buffer, Vec::new()));
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(start) = find_body_start(&buffer[scan_from..]) {
            let start = start + scan_from;
            let body = buffer.split_off(start);
            return Ok((buffer, body));
        }
        scan_from = buffer.len().saturating_sub(3);

        if buffer.len() > max_header_bytes {
            tracing::warn!(size = buffer.len(), "request head too large");
            return Ok((buffer, Vec::new()));
        }
    }
}

/// Parses a request line and header block.
///
/// Never fails: anything that cannot be understood becomes `GET /`.
pub fn parse_head(head: &[u8]) -> RequestHead {
    if find_body_start(head).is_none() {
        if !head.is_empty() {
            tracing::debug!(size = head.len(), "incomplete request head");
        }
        return RequestHead::fallback();
    }

    let head_str = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, "request head is not valid UTF-8");
            return RequestHead::fallback();
        }
    };

    let mut lines = head_str.split("\r\n");
    let request_line = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return RequestHead::fallback(),
    };

    /* METHOD path[?query] HTTP/1.1
     * Only method and target are read. The version and anything after it
     * are ignored.
     */
    let tokens: Vec<&str> = request_line.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.len() < 2 {
        tracing::debug!(line = request_line, "malformed request line");
        return RequestHead::fallback();
    }

    let (path, query) = split_target(tokens[1]);
    let mut req = RequestHead::new(HttpMethod::parse(tokens[0]), path, query);

    for header_line in lines {
        if let Some(idx) = header_line.find(':') {
            let (key, value) = header_line.split_at(idx);
            req.add_header(key, &value[1..]);
        }
    }

    req
}

/// The path stays encoded so an escaped `/` cannot add a segment. Routing
/// and the static resolver decode segment by segment.
fn split_target(target: &str) -> (String, Params) {
    match target.find('?') {
        Some(idx) => (target[..idx].to_string(), parse_query(&target[idx + 1..])),
        None => (target.to_string(), Params::new()),
    }
}

/// `a=1&b=2`. Pairs without `=` are dropped and a repeated key keeps its last value.
pub fn parse_query(query: &str) -> Params {
    let mut params = Params::new();
    for pair in query.split('&') {
        if let Some(idx) = pair.find('=') {
            let (key, value) = pair.split_at(idx);
            params.insert(undo_percent_encoding(key), undo_percent_encoding(&value[1..]));
        }
    }
    params
}

fn get_byte_from_hex(tens_dig: u8, ones_dig: u8) -> u8 {
    fn get_byte_from_hex_digit(dig: u8) -> u8 {
        match dig {
            b'0'..=b'9' => dig - b'0',
            b'a'..=b'f' => dig - b'a' + 10,
            b'A'..=b'F' => dig - b'A' + 10,
            _ => 0,
        }
    }

    (get_byte_from_hex_digit(tens_dig) << 4) + get_byte_from_hex_digit(ones_dig)
}

pub fn undo_percent_encoding(s: &str) -> String {
    lazy_static! {
        static ref RE: Option<Regex> = Regex::new("%([0-9a-fA-F])([0-9a-fA-F])").ok();
    }
    let re = match RE.as_ref() {
        Some(re) => re,
        None => return s.to_string(),
    };
    let decoded = re.replace_all(s.as_bytes(), |caps: &Captures| {
        vec![get_byte_from_hex(caps[1][0], caps[2][0])]
    });
    match decoded {
        Cow::Borrowed(_) => s.to_string(),
        Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).to_string(),
    }
}

/// Hands out exactly `Content-Length` body bytes, never more than
/// `chunk_size` at a time.
pub struct BodyReader {
    pending: Vec<u8>,
    expected: usize,
    received: usize,
    chunk_size: usize,
}

impl BodyReader {
    pub fn new(mut already_read: Vec<u8>, expected: usize, chunk_size: usize) -> BodyReader {
        // Anything past Content-Length is not ours to consume.
        already_read.truncate(expected);
        BodyReader {
            pending: already_read,
            expected: expected,
            received: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.expected - self.received
    }

    /// The next slice of body, or `None` once Content-Length is satisfied.
    pub async fn next_chunk<R>(&mut self, reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        if self.remaining() == 0 {
            return Ok(None);
        }

        if !self.pending.is_empty() {
            let take = min(self.chunk_size, self.pending.len());
            let chunk: Vec<u8> = self.pending.drain(..take).collect();
            self.received += chunk.len();
            return Ok(Some(chunk));
        }

        let mut chunk = vec![0u8; min(self.chunk_size, self.remaining())];
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(FrameError::UnexpectedEof {
                expected: self.expected,
                received: self.received,
            });
        }
        chunk.truncate(read);
        self.received += read;
        Ok(Some(chunk))
    }

    /// Collects the whole body into memory.
    pub async fn read_to_end<R>(&mut self, reader: &mut R) -> Result<Vec<u8>, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut body = Vec::with_capacity(min(self.remaining(), 64 * 1024));
        while let Some(chunk) = self.next_chunk(reader).await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
