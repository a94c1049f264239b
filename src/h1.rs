//! The HTTP/1.x line/header parser collaborator and chunked-transfer codec (§4.6).
//!
//! §1 treats the HTTP/1.x byte-parser as an external collaborator; this crate exposes
//! that boundary as the `Http1Parser` trait and ships one concrete implementation,
//! `HttparseParser`, built on the `httparse` crate the way `hyperium-hyper`'s manifest
//! uses it (see DESIGN.md). Callers may supply their own parser via
//! [`crate::builder::Builder::http1_parser`].

use bytes::Bytes;
use http::{Method, StatusCode};

/// Ceiling on a buffered-but-incomplete HTTP/1.x request/status line + headers (§6).
pub const MAX_HTTP1_HEADER_SIZE: usize = 2048;

/// Ceiling on the number of headers a single HTTP/1.x message may carry (§6).
pub const MAX_HEADERS: usize = 64;

/// One raw header field as lexed off the wire, before the lowercase/`:authority`
/// translation step in §4.6 is applied.
#[derive(Debug, Clone)]
pub struct Http1Header {
    pub name: Bytes,
    pub value: Bytes,
}

#[derive(Debug, Clone)]
pub struct Http1Request {
    pub method: Method,
    pub path: Bytes,
    pub minor_version: u8,
    pub headers: Vec<Http1Header>,
}

#[derive(Debug, Clone)]
pub struct Http1Response {
    pub status: StatusCode,
    pub minor_version: u8,
    pub headers: Vec<Http1Header>,
}

/// Mirrors §1's three-way outcome: need more bytes, a bad message, or a structured
/// result plus how many bytes of the input it consumed.
#[derive(Debug, Clone)]
pub enum ParseOutcome<T> {
    NeedMoreData,
    Parsed { message: T, consumed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Http1ParseError;

/// The pluggable HTTP/1.x byte-parser boundary (§1, §6).
pub trait Http1Parser {
    fn parse_request(&self, buf: &[u8]) -> Result<ParseOutcome<Http1Request>, Http1ParseError>;
    fn parse_response(&self, buf: &[u8]) -> Result<ParseOutcome<Http1Response>, Http1ParseError>;
}

/// Default `Http1Parser`, backed by `httparse`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttparseParser;

impl Http1Parser for HttparseParser {
    fn parse_request(&self, buf: &[u8]) -> Result<ParseOutcome<Http1Request>, Http1ParseError> {
        let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut raw_headers);
        match req.parse(buf) {
            Ok(httparse::Status::Complete(consumed)) => {
                let method = req.method.ok_or(Http1ParseError)?;
                let method = Method::from_bytes(method.as_bytes()).map_err(|_| Http1ParseError)?;
                let path = Bytes::copy_from_slice(req.path.ok_or(Http1ParseError)?.as_bytes());
                let minor_version = req.version.ok_or(Http1ParseError)?;
                let headers = req
                    .headers
                    .iter()
                    .map(|header| Http1Header {
                        name: Bytes::copy_from_slice(header.name.as_bytes()),
                        value: Bytes::copy_from_slice(header.value),
                    })
                    .collect();
                Ok(ParseOutcome::Parsed {
                    message: Http1Request { method, path, minor_version, headers },
                    consumed,
                })
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HTTP1_HEADER_SIZE {
                    Err(Http1ParseError)
                } else {
                    Ok(ParseOutcome::NeedMoreData)
                }
            }
            Err(_) => Err(Http1ParseError),
        }
    }

    fn parse_response(&self, buf: &[u8]) -> Result<ParseOutcome<Http1Response>, Http1ParseError> {
        let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut resp = httparse::Response::new(&mut raw_headers);
        match resp.parse(buf) {
            Ok(httparse::Status::Complete(consumed)) => {
                let code = resp.code.ok_or(Http1ParseError)?;
                let status = StatusCode::from_u16(code).map_err(|_| Http1ParseError)?;
                let minor_version = resp.version.ok_or(Http1ParseError)?;
                let headers = resp
                    .headers
                    .iter()
                    .map(|header| Http1Header {
                        name: Bytes::copy_from_slice(header.name.as_bytes()),
                        value: Bytes::copy_from_slice(header.value),
                    })
                    .collect();
                Ok(ParseOutcome::Parsed {
                    message: Http1Response { status, minor_version, headers },
                    consumed,
                })
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HTTP1_HEADER_SIZE {
                    Err(Http1ParseError)
                } else {
                    Ok(ParseOutcome::NeedMoreData)
                }
            }
            Err(_) => Err(Http1ParseError),
        }
    }
}

/// Writes one chunked-transfer-encoding chunk: `hex-length CRLF data CRLF` (§4.7
/// `write_data`).
pub fn write_chunk(dst: &mut Vec<u8>, data: &[u8]) {
    dst.extend_from_slice(format!("{:x}", data.len()).as_bytes());
    dst.extend_from_slice(b"\r\n");
    dst.extend_from_slice(data);
    dst.extend_from_slice(b"\r\n");
}

/// Writes the terminating zero-length chunk (§4.7 `write_data` on `final`).
pub fn write_last_chunk(dst: &mut Vec<u8>) {
    dst.extend_from_slice(b"0\r\n\r\n");
}

/// Parses one chunk-size line (`hex-length [; ext] CRLF`) at the start of `buf` (§4.6
/// H1_READING chunked branch). Returns `Ok(None)` when more bytes are needed, or
/// `Ok(Some((chunk_size, header_len)))` where `header_len` is the number of bytes the
/// size line itself occupies (including its trailing CRLF).
pub fn parse_chunk_header(buf: &[u8]) -> Result<Option<(usize, usize)>, Http1ParseError> {
    let pos = match buf.windows(2).position(|w| w == b"\r\n") {
        Some(p) => p,
        None => return Ok(None),
    };
    let size_field = &buf[..pos];
    let size_field = size_field.split(|&b| b == b';').next().unwrap_or(size_field);
    let text = std::str::from_utf8(size_field).map_err(|_| Http1ParseError)?;
    let size = usize::from_str_radix(text.trim(), 16).map_err(|_| Http1ParseError)?;
    Ok(Some((size, pos + 2)))
}
