/*
 * credentials.rs
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

//! Caller-supplied credentials. Fields are mechanism-specific; a mechanism
//! ignores whatever it doesn't need rather than erroring on extras.

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub access_token: Option<String>,
    pub authzid: Option<String>,
    pub domain: Option<String>,
    pub workstation: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_authzid(mut self, authzid: impl Into<String>) -> Self {
        self.authzid = Some(authzid.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_workstation(mut self, workstation: impl Into<String>) -> Self {
        self.workstation = Some(workstation.into());
        self
    }

    pub fn authzid_str(&self) -> &str {
        self.authzid.as_deref().unwrap_or("")
    }
}
