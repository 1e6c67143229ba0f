/*
 * framer.rs
 *
 * This file is part of saslkit, a client-side SASL authentication engine.
 *
 * saslkit is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * saslkit is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with saslkit.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Base64 line framer: translates a protocol's continuation-line convention
//! (`"+ "` for IMAP/POP3, `"334 "` for SMTP) to/from raw challenge/response
//! byte buffers. Pure codec — no I/O; the caller owns the transport.

use crate::base64util;
use crate::error::SaslError;

const CONTINUATION_TOKENS: &[&str] = &["+ ", "334 "];

/// Strip a known continuation token and base64-decode the remainder of a
/// server line. A stripped empty challenge decodes to an empty byte string.
pub fn decode_challenge_line(line: &str) -> Result<Vec<u8>, SaslError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = CONTINUATION_TOKENS
        .iter()
        .find_map(|tok| line.strip_prefix(tok))
        .unwrap_or(line);
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    base64_decode_transport(payload)
}

/// Encode a raw client response as a base64 line with a trailing CRLF
/// (no continuation token — that's a server-to-client convention).
pub fn encode_response_line(bytes: &[u8]) -> String {
    format!("{}\r\n", base64util::encode(bytes))
}

fn base64_decode_transport(s: &str) -> Result<Vec<u8>, SaslError> {
    base64util::decode(s).map_err(|e| SaslError::TransportProtocolError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_imap_continuation() {
        let decoded = decode_challenge_line("+ dGVzdA==\r\n").unwrap();
        assert_eq!(decoded, b"test");
    }

    #[test]
    fn strips_smtp_continuation() {
        let decoded = decode_challenge_line("334 dGVzdA==\r\n").unwrap();
        assert_eq!(decoded, b"test");
    }

    #[test]
    fn empty_challenge_is_empty_bytes() {
        assert_eq!(decode_challenge_line("+ \r\n").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn bad_base64_is_transport_error() {
        let err = decode_challenge_line("+ not-base64!!").unwrap_err();
        assert!(matches!(err, SaslError::TransportProtocolError(_)));
    }

    #[test]
    fn encode_appends_crlf() {
        assert_eq!(encode_response_line(b"hi"), "aGk=\r\n");
    }
}
