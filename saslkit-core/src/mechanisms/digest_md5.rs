/*
 * digest_md5.rs
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

//! DIGEST-MD5 (RFC 2831). Two steps: parse the server's directive list,
//! compute the response digest, then emit an empty ack.

use md5::{Digest, Md5};

use crate::collaborators::SecureRandom;
use crate::credentials::Credentials;
use crate::error::{Result, SaslError};
use crate::mechanism::{Mechanism, StepGuard};

/// Service name prefix for the `digest-uri` directive. The original source
/// hard-codes `imap/`; this crate makes it a constructor parameter instead
/// (Open Question in the design notes — resolved here, see DESIGN.md).
pub struct DigestMd5Mechanism<R: SecureRandom> {
    credentials: Credentials,
    service: String,
    rng: R,
    guard: StepGuard,
}

impl<R: SecureRandom> DigestMd5Mechanism<R> {
    pub fn with_credentials(credentials: Credentials, service: impl Into<String>, rng: R) -> Self {
        Self { credentials, service: service.into(), rng, guard: StepGuard::new() }
    }
}

impl DigestMd5Mechanism<crate::collaborators::OsRandom> {
    pub fn imap(credentials: Credentials) -> Self {
        Self::with_credentials(credentials, "imap", crate::collaborators::OsRandom)
    }
}

impl<R: SecureRandom> Mechanism for DigestMd5Mechanism<R> {
    fn name(&self) -> &'static str {
        "DIGEST-MD5"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        match self.guard.step_index() {
            0 => {
                let password = self
                    .credentials
                    .password
                    .as_deref()
                    .ok_or(SaslError::CredentialsMissing("password"))?;
                let challenge_str = std::str::from_utf8(challenge)
                    .map_err(|_| SaslError::ProtocolViolation("challenge not UTF-8".into()))?;
                let directives = parse_directives(challenge_str)?;
                let realm = directives
                    .get("realm")
                    .ok_or_else(|| SaslError::ProtocolViolation("missing realm".into()))?;
                let nonce = directives
                    .get("nonce")
                    .ok_or_else(|| SaslError::ProtocolViolation("missing nonce".into()))?;
                let qop = directives
                    .get("qop")
                    .cloned()
                    .unwrap_or_else(|| "auth".to_string());

                let mut nonce_bytes = [0u8; 16];
                self.rng.fill(&mut nonce_bytes);
                let cnonce = hex_lower(&nonce_bytes);

                let response = build_response(
                    &self.credentials.username,
                    realm,
                    password,
                    nonce,
                    &cnonce,
                    &qop,
                    &self.service,
                );
                self.guard.advance(false);
                Ok(response.into_bytes())
            }
            1 => {
                self.guard.advance(true);
                Ok(Vec::new())
            }
            _ => unreachable!("StepGuard prevents calls past completion"),
        }
    }
}

fn parse_directives(input: &str) -> Result<std::collections::HashMap<String, String>> {
    let mut out = std::collections::HashMap::new();
    let mut chars = input.trim().chars().peekable();
    while chars.peek().is_some() {
        // skip separators
        while matches!(chars.peek(), Some(',') | Some(' ')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(SaslError::ProtocolViolation("malformed directive".into()));
        }
        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                value.push(c);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        out.insert(key.trim().to_string(), value);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn build_response(
    username: &str,
    realm: &str,
    password: &str,
    nonce: &str,
    cnonce: &str,
    qop: &str,
    service: &str,
) -> String {
    let digest_uri = format!("{service}/{realm}");

    // A1 = MD5(username ":" realm ":" password) [ISO-8859-1], then
    // A1 = <that> ":" nonce ":" cnonce
    let a1_prefix_input = iso_8859_1_bytes(&format!("{username}:{realm}:{password}"));
    let a1_prefix = Md5::digest(&a1_prefix_input);
    let mut a1 = Vec::new();
    a1.extend_from_slice(&a1_prefix);
    a1.extend_from_slice(format!(":{nonce}:{cnonce}").as_bytes());

    let a2 = if qop == "auth" {
        format!("AUTHENTICATE:{digest_uri}")
    } else {
        format!("AUTHENTICATE:{digest_uri}:00000000000000000000000000000000")
    };

    let ha1 = hex_lower(&Md5::digest(&a1));
    let ha2 = hex_lower(&Md5::digest(a2.as_bytes()));
    let kd_input = format!("{ha1}:{nonce}:00000001:{cnonce}:{qop}:{ha2}");
    let response_value = hex_lower(&Md5::digest(kd_input.as_bytes()));

    let directives = [
        format!("username=\"{username}\""),
        format!("realm=\"{realm}\""),
        format!("nonce=\"{nonce}\""),
        "nc=00000001".to_string(),
        format!("cnonce=\"{cnonce}\""),
        format!("digest-uri=\"{digest_uri}\""),
        format!("response={response_value}"),
        format!("qop={qop}"),
    ];
    directives.join(",")
}

/// ISO-8859-1 (Latin-1) is a straight byte-per-codepoint encoding for the
/// first 256 Unicode scalar values; bytes outside that range are not
/// representable and are mapped to `?` rather than silently truncated.
fn iso_8859_1_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 0x0f) as usize] as char);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2831_scenario() {
        let response = build_response(
            "chris",
            "elwood.innosoft.com",
            "secret",
            "OA6MG9tEQGm2hh",
            "OA6MHXh6VqTrRk",
            "auth",
            "imap",
        );
        assert!(response.contains("response=d388dad90d4bbd760a152321f2143af7"));
        assert!(response.contains("digest-uri=\"imap/elwood.innosoft.com\""));
    }

    #[test]
    fn second_step_emits_empty_ack_and_completes() {
        struct NullRandom;
        impl SecureRandom for NullRandom {
            fn fill(&mut self, buf: &mut [u8]) {
                buf.fill(0);
            }
        }
        let creds = Credentials::new("chris").with_password("secret");
        let mut mech = DigestMd5Mechanism::with_credentials(creds, "imap", NullRandom);
        let challenge = b"realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",algorithm=md5-sess";
        mech.step(challenge).unwrap();
        assert!(!mech.is_completed());
        let ack = mech.step(b"rspauth=abcdef").unwrap();
        assert!(ack.is_empty());
        assert!(mech.is_completed());
    }
}
