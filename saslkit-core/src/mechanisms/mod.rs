/*
 * mod.rs
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

//! One module per mechanism, plus the IANA-name registration table.

pub mod cram_md5;
pub mod digest_md5;
pub mod ntlm;
pub mod plain;
pub mod scram;
pub mod srp;
pub mod xoauth;

use crate::collaborators::OsRandom;
use crate::mechanism::Registry;

/// Registers every mechanism this crate implements under its IANA name.
/// Called by `Registry::default()`; also callable directly when a caller
/// wants a registry pre-populated without going through `Default`.
pub fn register_all(registry: &mut Registry) {
    registry.register("PLAIN", |creds| Box::new(plain::PlainMechanism::with_credentials(creds)));
    registry.register("CRAM-MD5", |creds| Box::new(cram_md5::CramMd5Mechanism::with_credentials(creds)));
    registry.register("XOAUTH", |creds| Box::new(xoauth::XOAuthMechanism::with_credentials(creds)));
    registry.register("XOAUTH2", |creds| Box::new(xoauth::XOAuth2Mechanism::with_credentials(creds)));
    registry.register("DIGEST-MD5", |creds| {
        Box::new(digest_md5::DigestMd5Mechanism::<OsRandom>::imap(creds))
    });
    registry.register("SCRAM-SHA-1", |creds| Box::new(scram::ScramSha1Mechanism::new(creds)));
    registry.register("NTLM", |creds| Box::new(ntlm::NtlmMechanism::new(creds)));
    registry.register("SRP", |creds| Box::new(srp::SrpMechanism::new(creds)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;

    #[test]
    fn all_mechanisms_registered() {
        let mut registry = Registry::new();
        register_all(&mut registry);
        for name in ["PLAIN", "CRAM-MD5", "XOAUTH", "XOAUTH2", "DIGEST-MD5", "SCRAM-SHA-1", "NTLM", "SRP"] {
            assert!(registry.is_registered(name), "{name} should be registered");
        }
    }

    #[test]
    fn created_mechanism_reports_its_own_name() {
        let mut registry = Registry::new();
        register_all(&mut registry);
        let mech = registry.create("plain", Credentials::new("u")).unwrap();
        assert_eq!(mech.name(), "PLAIN");
    }
}
