/*
 * xoauth.rs
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

//! XOAUTH (legacy, single-shot opaque token) and XOAUTH2 (Gmail/Outlook
//! bearer-token SASL, two steps: initial response, then an empty ack sent
//! only if the server rejects the first).

use crate::credentials::Credentials;
use crate::error::{Result, SaslError};
use crate::mechanism::{Mechanism, StepGuard};

pub struct XOAuthMechanism {
    credentials: Credentials,
    guard: StepGuard,
}

impl XOAuthMechanism {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials, guard: StepGuard::new() }
    }
}

impl Mechanism for XOAuthMechanism {
    fn name(&self) -> &'static str {
        "XOAUTH"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        let token = self
            .credentials
            .access_token
            .as_deref()
            .ok_or(SaslError::CredentialsMissing("access_token"))?;
        self.guard.advance(true);
        Ok(token.as_bytes().to_vec())
    }
}

pub struct XOAuth2Mechanism {
    credentials: Credentials,
    guard: StepGuard,
}

impl XOAuth2Mechanism {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials, guard: StepGuard::new() }
    }
}

impl Mechanism for XOAuth2Mechanism {
    fn name(&self) -> &'static str {
        "XOAUTH2"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        match self.guard.step_index() {
            0 => {
                let token = self
                    .credentials
                    .access_token
                    .as_deref()
                    .ok_or(SaslError::CredentialsMissing("access_token"))?;
                let response = format!(
                    "user={}\x01auth=Bearer {}\x01\x01",
                    self.credentials.username, token
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
