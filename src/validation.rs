//! Pseudo-header validation and the HPACK ↔ message bridge (§4.5.1).
//!
//! Grounded on the teacher's `frame::headers::Headers::load`, which partitions a decoded
//! header block into pseudo-headers and a regular `http::HeaderMap` before the rest of
//! the connection ever sees it. This module generalizes that single request-shaped
//! routine into one validator shared by requests, responses, and trailers, per the
//! spec's unified rule set.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::frame::headers::{Pseudo, PseudoError};
use crate::hpack::DecodedHeader;

/// What kind of header block is being validated; each has its own required pseudo-header
/// set (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Request,
    Response,
    Trailers,
}

/// A fully validated message: pseudo-headers split out, regular headers lowercase and
/// collected into an `http::HeaderMap` (§4.5.1 "Pseudo-headers are stripped from the
/// visible array before emission").
#[derive(Debug, Clone)]
pub struct Message {
    pub pseudo: Pseudo,
    pub headers: HeaderMap,
}

/// Validates a decoded header list per §4.5.1: pseudo-header ordering/case/uniqueness,
/// the required set for the given `ctx`, and (for trailers) the absence of any
/// pseudo-header at all.
pub fn validate(raw: &[DecodedHeader], ctx: Context) -> Result<Message, PseudoError> {
    let mut pseudo = Pseudo::default();
    let mut headers = HeaderMap::new();
    let mut seen_regular = false;

    let mut seen_method = false;
    let mut seen_path = false;
    let mut seen_scheme = false;
    let mut seen_authority = false;
    let mut seen_status = false;

    for h in raw {
        if h.name.iter().any(u8::is_ascii_uppercase) {
            return Err(PseudoError::UppercaseName);
        }

        let is_pseudo = h.name.first() == Some(&b':');
        if is_pseudo {
            if seen_regular {
                return Err(PseudoError::PseudoAfterRegular);
            }
            if ctx == Context::Trailers {
                return Err(PseudoError::TrailerHasPseudo);
            }
            match h.name.as_ref() {
                b":method" => {
                    if seen_method {
                        return Err(PseudoError::DuplicatePseudo);
                    }
                    seen_method = true;
                    pseudo.method =
                        Some(Method::from_bytes(&h.value).map_err(|_| PseudoError::InvalidHeaderBytes)?);
                }
                b":path" => {
                    if seen_path {
                        return Err(PseudoError::DuplicatePseudo);
                    }
                    seen_path = true;
                    if h.value.is_empty() {
                        return Err(PseudoError::EmptyPath);
                    }
                    pseudo.path = Some(h.value.clone());
                }
                b":scheme" => {
                    if seen_scheme {
                        return Err(PseudoError::DuplicatePseudo);
                    }
                    seen_scheme = true;
                    pseudo.scheme = Some(h.value.clone());
                }
                b":authority" => {
                    if seen_authority {
                        return Err(PseudoError::DuplicatePseudo);
                    }
                    seen_authority = true;
                    pseudo.authority = Some(h.value.clone());
                }
                b":status" => {
                    if seen_status {
                        return Err(PseudoError::DuplicatePseudo);
                    }
                    seen_status = true;
                    pseudo.status = Some(parse_status(&h.value)?);
                }
                _ => return Err(PseudoError::UnknownPseudo),
            }
        } else {
            seen_regular = true;
            let name = HeaderName::from_bytes(&h.name).map_err(|_| PseudoError::InvalidHeaderBytes)?;
            let value =
                HeaderValue::from_bytes(&h.value).map_err(|_| PseudoError::InvalidHeaderBytes)?;
            headers.append(name, value);
        }
    }

    match ctx {
        Context::Request => {
            if !seen_method || !seen_path || !seen_scheme {
                return Err(PseudoError::MissingRequestPseudo);
            }
        }
        Context::Response => {
            if !seen_status {
                return Err(PseudoError::MissingResponsePseudo);
            }
        }
        Context::Trailers => {}
    }

    Ok(Message { pseudo, headers })
}

fn parse_status(value: &Bytes) -> Result<StatusCode, PseudoError> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(PseudoError::InvalidStatus);
    }
    let text = std::str::from_utf8(value).map_err(|_| PseudoError::InvalidStatus)?;
    let code: u16 = text.parse().map_err(|_| PseudoError::InvalidStatus)?;
    StatusCode::from_u16(code).map_err(|_| PseudoError::InvalidStatus)
}
