//! Request parsing and validation.
//!
//! The framer hands over a complete, sentinel-terminated request head;
//! `parse` tokenizes it into owned strings and `validate` checks the
//! protocol version and method against the supported sets.

use std::fmt;

/// Upper bound on header lines per request.
pub const MAX_HEADERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    POST,
}

impl Method {
    pub fn from_token(token: &str) -> Option<Method> {
        match token {
            "GET" => Some(Method::GET),
            "HEAD" => Some(Method::HEAD),
            "POST" => Some(Method::POST),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request line and headers as owned tokens, before validation.
///
/// Headers keep their wire order, duplicates, and name casing.
#[derive(Debug)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    pub minor_version: u8,
    pub headers: Vec<(String, String)>,
}

/// A request that passed version and method validation.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

/// The framed bytes do not form a well-formed request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("malformed request head")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateError {
    UnsupportedVersion,
    UnknownMethod,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidateError::UnsupportedVersion => f.write_str("unsupported protocol version"),
            ValidateError::UnknownMethod => f.write_str("unsupported request method"),
        }
    }
}

/// Tokenizes a complete request head.
///
/// The request line must be exactly `METHOD SP PATH SP VERSION`; fewer or
/// extra tokens, an empty head, or a version outside `HTTP/1.x` are all
/// malformed. Every extracted token is an independently owned copy, so the
/// framing buffer can be reused or dropped afterward.
pub fn parse(bytes: &[u8]) -> Result<RawRequest, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);
    match parsed.parse(bytes) {
        Ok(httparse::Status::Complete(_)) => {}
        // the framer only hands over sentinel-terminated input, so a
        // partial result means the head itself is broken
        Ok(httparse::Status::Partial) | Err(_) => return Err(ParseError),
    }

    let method = parsed.method.ok_or(ParseError)?.to_string();
    let path = parsed.path.ok_or(ParseError)?.to_string();
    let minor_version = parsed.version.ok_or(ParseError)?;
    let headers = parsed
        .headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    Ok(RawRequest {
        method,
        path,
        minor_version,
        headers,
    })
}

/// Accepts exactly HTTP/1.0 and a method in the supported set.
pub fn validate(raw: RawRequest) -> Result<Request, ValidateError> {
    if raw.minor_version != 0 {
        return Err(ValidateError::UnsupportedVersion);
    }
    let method = Method::from_token(&raw.method).ok_or(ValidateError::UnknownMethod)?;
    Ok(Request {
        method,
        path: raw.path,
        headers: raw.headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = parse(b"GET /index.html HTTP/1.0\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(raw.method, "GET");
        assert_eq!(raw.path, "/index.html");
        assert_eq!(raw.minor_version, 0);
        assert_eq!(raw.headers.len(), 1);
    }

    #[test]
    fn tokens_outlive_the_input_buffer() {
        let raw;
        {
            let input = b"GET / HTTP/1.0\r\n\r\n".to_vec();
            raw = parse(&input).unwrap();
        }
        assert_eq!(raw.method, "GET");
        assert_eq!(raw.path, "/");
    }
}
