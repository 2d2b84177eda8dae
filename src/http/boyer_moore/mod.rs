use boyer_moore_magiclen::BMByte;

pub mod types;

use types::BMBuf;

lazy_static! {
    static ref BODY_DELIM: Option<BMByte> = BMByte::from(BMBuf(b"\r\n\r\n"));
}

/// Index of the first byte after the `\r\n\r\n` header terminator.
pub fn find_body_start(buffer: &[u8]) -> Option<usize> {
    let delim = BODY_DELIM.as_ref()?;
    find_from(delim, buffer, 0).map(|idx| idx + 4)
}

/// Compiles a delimiter. Empty delimiters cannot be searched for.
pub fn compile(pattern: &[u8]) -> Option<BMByte> {
    BMByte::from(BMBuf(pattern))
}

/// First occurrence of `delim` in `buffer[start..]`, as an index into `buffer`.
pub fn find_from(delim: &BMByte, buffer: &[u8], start: usize) -> Option<usize> {
    if start >= buffer.len() {
        return None;
    }
    let vec = delim.find_in(BMBuf(&buffer[start..]), 1);
    if vec.len() < 1 {
        None
    } else {
        Some(vec[0] + start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_start_is_after_terminator() {
        let req = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody";
        assert_eq!(find_body_start(req), Some(req.len() - 4));
        assert_eq!(find_body_start(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
    }

    #[test]
    fn find_from_respects_offset() {
        let delim = compile(b"--ab").unwrap();
        let buf = b"--ab one --ab two";
        assert_eq!(find_from(&delim, buf, 0), Some(0));
        assert_eq!(find_from(&delim, buf, 1), Some(9));
        assert_eq!(find_from(&delim, buf, 10), None);
        assert_eq!(find_from(&delim, buf, 100), None);
    }

    #[test]
    fn empty_pattern_does_not_compile() {
        assert!(compile(b"").is_none());
    }
}
