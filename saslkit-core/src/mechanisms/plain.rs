/*
 * plain.rs
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

//! PLAIN (RFC 4616). Single step, no challenge expected.

use crate::credentials::Credentials;
use crate::error::{Result, SaslError};
use crate::mechanism::{Mechanism, StepGuard};

pub struct PlainMechanism {
    credentials: Credentials,
    guard: StepGuard,
}

impl PlainMechanism {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials, guard: StepGuard::new() }
    }
}

impl Mechanism for PlainMechanism {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        if self.credentials.username.is_empty() {
            return Err(SaslError::CredentialsMissing("username"));
        }
        let password = self
            .credentials
            .password
            .as_deref()
            .ok_or(SaslError::CredentialsMissing("password"))?;

        let mut response = Vec::new();
        response.push(0u8);
        response.extend_from_slice(self.credentials.username.as_bytes());
        response.push(0u8);
        response.extend_from_slice(password.as_bytes());

        self.guard.advance(true);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_jdoe_secret() {
        let creds = Credentials::new("jdoe").with_password("secret");
        let mut mech = PlainMechanism::with_credentials(creds);
        let response = mech.step(&[]).unwrap();
        assert_eq!(
            response,
            vec![0x00, 0x6A, 0x64, 0x6F, 0x65, 0x00, 0x73, 0x65, 0x63, 0x72, 0x65, 0x74]
        );
        assert!(mech.is_completed());
    }

    #[test]
    fn missing_password_is_credentials_missing() {
        let creds = Credentials::new("jdoe");
        let mut mech = PlainMechanism::with_credentials(creds);
        let err = mech.step(&[]).unwrap_err();
        assert!(matches!(err, SaslError::CredentialsMissing("password")));
    }

    #[test]
    fn empty_username_is_credentials_missing() {
        let creds = Credentials::new("").with_password("secret");
        let mut mech = PlainMechanism::with_credentials(creds);
        let err = mech.step(&[]).unwrap_err();
        assert!(matches!(err, SaslError::CredentialsMissing("username")));
    }

    #[test]
    fn second_step_after_completion_is_protocol_violation() {
        let creds = Credentials::new("jdoe").with_password("secret");
        let mut mech = PlainMechanism::with_credentials(creds);
        mech.step(&[]).unwrap();
        let err = mech.step(&[]).unwrap_err();
        assert!(matches!(err, SaslError::ProtocolViolation(_)));
    }
}
