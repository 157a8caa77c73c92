//! Multipart body framing.
//!
//! A body is a sequence of parts, each introduced by the delimiter
//! `--<boundary>`. The rest of the delimiter line is ignored unless it reads
//! `--`, which ends the stream. Header lines of the form `Name: Value`
//! follow, closed by a blank line, and then the part's bytes run up to the
//! next delimiter. Part bodies are kept byte-exact: no line ending before a
//! delimiter is stripped.

use bytes::Bytes;
use geofetch_cache::Headers;
use thiserror::Error;

use crate::data::Part;

const FALLBACK_BOUNDARY: &str = "wcs";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    #[error("multipart body does not start with boundary '{boundary}'")]
    MissingBoundary { boundary: String },

    #[error("multipart body ended inside part {index}")]
    Truncated { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting the first delimiter.
    Start,
    /// Just consumed a delimiter.
    Delimited,
    Done,
}

/// Pull-based multipart parser over an in-memory body.
///
/// Each call to `next` yields one part. After the closing delimiter, or
/// after the first error, the iterator is exhausted.
///
/// ```
/// use geofetch::MultipartDecoder;
///
/// let body = b"--XY\r\nContent-Type: text/plain\r\n\r\nhello--XY--";
/// let parts: Vec<_> = MultipartDecoder::new(body, "XY").collect::<Result<_, _>>().unwrap();
///
/// assert_eq!(parts.len(), 1);
/// assert_eq!(&parts[0].data[..], b"hello");
/// assert_eq!(parts[0].headers.get("content-type"), Some("text/plain"));
/// ```
pub struct MultipartDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    delimiter: Vec<u8>,
    state: State,
    index: usize,
}

impl<'a> MultipartDecoder<'a> {
    pub fn new(input: &'a [u8], boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Self {
            input,
            pos: 0,
            delimiter,
            state: State::Start,
            index: 0,
        }
    }

    fn boundary(&self) -> String {
        String::from_utf8_lossy(&self.delimiter[2..]).into_owned()
    }

    /// The next line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.input.len() {
            return None;
        }
        let input: &'a [u8] = self.input;
        let rest = &input[self.pos..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }

    /// Header block up to the blank line. `Ok(None)` means a bare `--` line
    /// closed the stream instead.
    fn read_headers(&mut self) -> Result<Option<Headers>, MultipartError> {
        let mut headers = Headers::new();
        loop {
            let line = self.read_line().ok_or(MultipartError::Truncated { index: self.index })?;
            if line.is_empty() {
                return Ok(Some(headers));
            }
            if line == b"--" {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(line);
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim(), value.trim());
            }
        }
    }

    /// Body bytes up to and excluding the next delimiter.
    ///
    /// `pending` holds the bytes that may still turn out to be the start of
    /// a delimiter. When it stops being a delimiter prefix its leading byte is
    /// released into the body and the remainder is re-examined.
    fn read_body(&mut self) -> Result<Bytes, MultipartError> {
        let mut body = Vec::new();
        let mut pending: Vec<u8> = Vec::with_capacity(self.delimiter.len());

        while let Some(&byte) = self.input.get(self.pos) {
            self.pos += 1;
            pending.push(byte);

            if pending == self.delimiter {
                return Ok(Bytes::from(body));
            }
            while !self.delimiter.starts_with(&pending) {
                body.push(pending.remove(0));
            }
        }

        Err(MultipartError::Truncated { index: self.index })
    }

    fn next_part(&mut self) -> Result<Option<Part>, MultipartError> {
        loop {
            match self.state {
                State::Done => return Ok(None),
                State::Start => {
                    if !self.input.starts_with(&self.delimiter) {
                        return Err(MultipartError::MissingBoundary {
                            boundary: self.boundary(),
                        });
                    }
                    self.pos = self.delimiter.len();
                    self.state = State::Delimited;
                }
                State::Delimited => {
                    let Some(rest) = self.read_line() else {
                        return Ok(None);
                    };
                    if rest.trim_ascii() == b"--" {
                        return Ok(None);
                    }
                    let Some(headers) = self.read_headers()? else {
                        return Ok(None);
                    };
                    let data = self.read_body()?;
                    self.index += 1;
                    return Ok(Some(Part { headers, data }));
                }
            }
        }
    }
}

impl Iterator for MultipartDecoder<'_> {
    type Item = Result<Part, MultipartError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next_part();
        if !matches!(next, Ok(Some(_))) {
            self.state = State::Done;
        }
        next.transpose()
    }
}

/// Parts decoded before the stream ended or broke.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub parts: Vec<Part>,
    pub error: Option<MultipartError>,
}

/// Decode a whole body, keeping the parts completed before any error.
pub fn decode_multipart(body: &[u8], boundary: &str) -> Decoded {
    let mut decoded = Decoded::default();
    for next in MultipartDecoder::new(body, boundary) {
        match next {
            Ok(part) => decoded.parts.push(part),
            Err(e) => decoded.error = Some(e),
        }
    }
    decoded
}

/// Frame `parts` so that [`decode_multipart`] returns them unchanged.
///
/// Part bodies must not contain the delimiter `--<boundary>`.
pub fn encode_multipart(parts: &[Part], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        for (name, value) in part.headers.iter() {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&part.data);
    }
    out.extend_from_slice(format!("--{boundary}--").as_bytes());
    out
}

/// The `boundary` parameter of a `multipart/*` content type.
///
/// Falls back to `wcs` when the parameter is absent.
pub fn boundary_from_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
        .unwrap_or_else(|| FALLBACK_BOUNDARY.to_string())
}
