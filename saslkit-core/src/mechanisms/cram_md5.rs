/*
 * cram_md5.rs
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

//! CRAM-MD5 (RFC 2195). Single step: the server's initial challenge is
//! HMAC-MD5'd with the password and returned hex-encoded next to the
//! username.

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::credentials::Credentials;
use crate::error::{Result, SaslError};
use crate::mechanism::{Mechanism, StepGuard};

type HmacMd5 = Hmac<Md5>;

pub struct CramMd5Mechanism {
    credentials: Credentials,
    guard: StepGuard,
}

impl CramMd5Mechanism {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials, guard: StepGuard::new() }
    }
}

impl Mechanism for CramMd5Mechanism {
    fn name(&self) -> &'static str {
        "CRAM-MD5"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        let password = self
            .credentials
            .password
            .as_deref()
            .ok_or(SaslError::CredentialsMissing("password"))?;

        let mut mac = HmacMd5::new_from_slice(password.as_bytes())
            .map_err(|e| SaslError::CryptoFailure(e.to_string()))?;
        mac.update(challenge);
        let digest = mac.finalize().into_bytes();

        let response = format!("{} {}", self.credentials.username, hex_lower(&digest));
        self.guard.advance(true);
        Ok(response.into_bytes())
    }
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
