//! Request head of the portal's HTTP/1.x exchanges.

use core::fmt;

const HEAD_END: &[u8] = b"\r\n\r\n";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Route {
    Page,
    Save,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestError {
    Incomplete,
    NotUtf8,
    BadRequestLine,
    InvalidContentLength,
    DuplicateContentLength,
    MissingContentLength,
}

impl RequestError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete request head",
            Self::NotUtf8 => "request head is not utf-8",
            Self::BadRequestLine => "bad request line",
            Self::InvalidContentLength => "invalid content-length",
            Self::DuplicateContentLength => "duplicate content-length",
            Self::MissingContentLength => "content-length required",
        }
    }

    /// Status line answered for this error.
    pub const fn status(self) -> (u16, &'static str) {
        match self {
            Self::MissingContentLength => (411, "Length Required"),
            _ => (400, "Bad Request"),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length of the request head including the blank line, once it has fully
/// arrived in `buf`.
pub fn head_len(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len())
        .position(|window| window == HEAD_END)
        .map(|end| end + HEAD_END.len())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RequestHead<'a> {
    pub method: &'a str,
    /// Request target without its query string.
    pub path: &'a str,
    pub content_length: Option<usize>,
    /// Offset of the first body byte in the parsed buffer.
    pub body_start: usize,
}

impl<'a> RequestHead<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, RequestError> {
        let body_start = head_len(buf).ok_or(RequestError::Incomplete)?;
        let head = core::str::from_utf8(&buf[..body_start - HEAD_END.len()])
            .map_err(|_| RequestError::NotUtf8)?;
        let mut lines = head.split("\r\n");

        let mut request_line = lines.next().unwrap_or_default().split_ascii_whitespace();
        let (Some(method), Some(target), Some(version), None) = (
            request_line.next(),
            request_line.next(),
            request_line.next(),
            request_line.next(),
        ) else {
            return Err(RequestError::BadRequestLine);
        };
        if !version.starts_with("HTTP/1.") {
            return Err(RequestError::BadRequestLine);
        }
        let path = target.split_once('?').map_or(target, |(path, _)| path);

        let mut content_length = None;
        for (name, value) in lines.filter_map(|line| line.split_once(':')) {
            if !name.trim().eq_ignore_ascii_case("content-length") {
                continue;
            }
            let length = value
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::InvalidContentLength)?;
            if content_length.replace(length).is_some() {
                return Err(RequestError::DuplicateContentLength);
            }
        }

        Ok(Self {
            method,
            path,
            content_length,
            body_start,
        })
    }

    pub fn route(&self) -> Route {
        match (self.method, self.path) {
            ("GET", "/" | "/index.html") => Route::Page,
            ("POST", "/save") => Route::Save,
            _ => Route::Unknown,
        }
    }

    /// Declared body length of a request that must carry one.
    pub fn body_len(&self) -> Result<usize, RequestError> {
        self.content_length
            .ok_or(RequestError::MissingContentLength)
    }
}
