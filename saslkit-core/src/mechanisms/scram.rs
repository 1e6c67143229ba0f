/*
 * scram.rs
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

//! SCRAM-SHA-1 (RFC 5802). Three steps, no channel binding.

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::{Digest, Sha1};

use crate::base64util;
use crate::collaborators::SecureRandom;
use crate::credentials::Credentials;
use crate::error::{Result, SaslError};
use crate::mechanism::{Mechanism, StepGuard};

type HmacSha1 = Hmac<Sha1>;

pub struct ScramSha1Mechanism<R: SecureRandom> {
    credentials: Credentials,
    rng: R,
    guard: StepGuard,
    client_nonce: String,
    client_first_bare: String,
    auth_message: Option<String>,
    salted_password: Option<Vec<u8>>,
}

impl<R: SecureRandom> ScramSha1Mechanism<R> {
    pub fn with_credentials(credentials: Credentials, rng: R) -> Self {
        Self {
            credentials,
            rng,
            guard: StepGuard::new(),
            client_nonce: String::new(),
            client_first_bare: String::new(),
            auth_message: None,
            salted_password: None,
        }
    }
}

impl ScramSha1Mechanism<crate::collaborators::OsRandom> {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_credentials(credentials, crate::collaborators::OsRandom)
    }
}

impl<R: SecureRandom> Mechanism for ScramSha1Mechanism<R> {
    fn name(&self) -> &'static str {
        "SCRAM-SHA-1"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        match self.guard.step_index() {
            0 => {
                let mut nonce_bytes = [0u8; 18];
                self.rng.fill(&mut nonce_bytes);
                self.client_nonce = base64util::encode(&nonce_bytes);
                self.client_first_bare =
                    format!("n={},r={}", sasl_name(&self.credentials.username), self.client_nonce);
                let message = format!("n,,{}", self.client_first_bare);
                self.guard.advance(false);
                Ok(message.into_bytes())
            }
            1 => {
                let password = self
                    .credentials
                    .password
                    .as_deref()
                    .ok_or(SaslError::CredentialsMissing("password"))?;
                let server_first = std::str::from_utf8(challenge)
                    .map_err(|_| SaslError::ProtocolViolation("server-first not UTF-8".into()))?;
                let (nonce, salt_b64, iterations) = parse_server_first(server_first)?;
                if !nonce.starts_with(&self.client_nonce) {
                    return Err(SaslError::ProtocolViolation(
                        "server nonce does not extend client nonce".into(),
                    ));
                }
                let salt = base64util::decode(&salt_b64)?;

                let salted_password = hi(password, &salt, iterations);
                let client_key = hmac(&salted_password, b"Client Key");
                let stored_key = Sha1::digest(&client_key);

                let channel_binding = base64util::encode(b"n,,");
                let client_final_no_proof = format!("c={channel_binding},r={nonce}");
                let auth_message =
                    format!("{},{},{}", self.client_first_bare, server_first, client_final_no_proof);
                let client_signature = hmac(&stored_key, auth_message.as_bytes());
                let client_proof = xor(&client_key, &client_signature);

                let client_final = format!(
                    "{client_final_no_proof},p={}",
                    base64util::encode(&client_proof)
                );

                self.salted_password = Some(salted_password);
                self.auth_message = Some(auth_message);
                self.guard.advance(false);
                Ok(client_final.into_bytes())
            }
            2 => {
                let salted_password = self
                    .salted_password
                    .as_deref()
                    .ok_or_else(|| SaslError::ProtocolViolation("step out of order".into()))?;
                let auth_message = self
                    .auth_message
                    .clone()
                    .ok_or_else(|| SaslError::ProtocolViolation("step out of order".into()))?;

                let server_final = std::str::from_utf8(challenge)
                    .map_err(|_| SaslError::ProtocolViolation("server-final not UTF-8".into()))?;
                let server_signature_claimed = parse_server_final(server_final)?;

                let server_key = hmac(salted_password, b"Server Key");
                let expected = hmac(&server_key, auth_message.as_bytes());

                if expected == server_signature_claimed {
                    self.guard.advance(true);
                    Ok(Vec::new())
                } else {
                    // Conceptually the mechanism emits the "*" SASL cancel token here;
                    // this engine surfaces that as a terminal error instead.
                    self.guard.advance(true);
                    Err(SaslError::AuthenticationFailed)
                }
            }
            _ => unreachable!("StepGuard prevents calls past completion"),
        }
    }
}

fn sasl_name(s: &str) -> String {
    s.replace('=', "=3D").replace(',', "=2C")
}

fn parse_server_first(input: &str) -> Result<(String, String, u32)> {
    let mut r = None;
    let mut s = None;
    let mut i = None;
    for part in input.split(',') {
        if let Some(v) = part.strip_prefix("r=") {
            r = Some(v.to_string());
        } else if let Some(v) = part.strip_prefix("s=") {
            s = Some(v.to_string());
        } else if let Some(v) = part.strip_prefix("i=") {
            i = Some(v.to_string());
        }
    }
    let r = r.ok_or_else(|| SaslError::ProtocolViolation("missing r in server-first".into()))?;
    let s = s.ok_or_else(|| SaslError::ProtocolViolation("missing s in server-first".into()))?;
    let i_str = i.ok_or_else(|| SaslError::ProtocolViolation("missing i in server-first".into()))?;
    let iterations: u32 = i_str
        .parse()
        .map_err(|_| SaslError::ProtocolViolation("invalid iteration count".into()))?;
    if iterations == 0 {
        return Err(SaslError::ProtocolViolation("iteration count must be positive".into()));
    }
    Ok((r, s, iterations))
}

fn parse_server_final(input: &str) -> Result<Vec<u8>> {
    let v = input
        .strip_prefix("v=")
        .ok_or_else(|| SaslError::ProtocolViolation("server-final missing v=".into()))?;
    base64util::decode(v)
}

fn hi(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut out = [0u8; 20];
    pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut out);
    out.to_vec()
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedNonce(&'static [u8]);
    impl SecureRandom for FixedNonce {
        fn fill(&mut self, buf: &mut [u8]) {
            buf.copy_from_slice(&self.0[..buf.len()]);
        }
    }

    #[test]
    fn rfc5802_scenario() {
        // client nonce bytes chosen so base64("n,,"-free client-first nonce)
        // reproduces the RFC 5802 example nonce "fyko+d2lbbFgONRv9qkxdawL".
        let client_nonce = "fyko+d2lbbFgONRv9qkxdawL";
        let creds = Credentials::new("user").with_password("pencil");
        let mut mech = ScramSha1Mechanism::with_credentials(creds, FixedNonce(&[0u8; 18]));
        mech.client_nonce = client_nonce.to_string();
        mech.client_first_bare = format!("n=user,r={client_nonce}");
        mech.guard.advance(false);

        let server_first =
            "r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096";
        let client_final = mech.step(server_first.as_bytes()).unwrap();
        let client_final = String::from_utf8(client_final).unwrap();
        assert!(client_final.contains("p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts="));

        let server_final = "v=rmF9pqV8S7suAoZWja4dJRkFsKQ=";
        let ack = mech.step(server_final.as_bytes()).unwrap();
        assert!(ack.is_empty());
        assert!(mech.is_completed());
    }

    #[test]
    fn server_nonce_not_extending_client_nonce_is_protocol_violation() {
        let creds = Credentials::new("user").with_password("pencil");
        let mut mech = ScramSha1Mechanism::with_credentials(creds, FixedNonce(&[1u8; 18]));
        mech.step(&[]).unwrap(); // produces client-first, sets client_nonce
        let bogus = "r=totally-different-nonce,s=QSXCR+Q6sek8bf92,i=4096";
        let err = mech.step(bogus.as_bytes()).unwrap_err();
        assert!(matches!(err, SaslError::ProtocolViolation(_)));
    }

    #[test]
    fn bad_server_signature_is_authentication_failed() {
        let creds = Credentials::new("user").with_password("pencil");
        let mut mech = ScramSha1Mechanism::with_credentials(creds, FixedNonce(&[0u8; 18]));
        mech.client_nonce = "fyko+d2lbbFgONRv9qkxdawL".to_string();
        mech.client_first_bare = "n=user,r=fyko+d2lbbFgONRv9qkxdawL".to_string();
        mech.guard.advance(false);
        let server_first =
            "r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096";
        mech.step(server_first.as_bytes()).unwrap();
        let err = mech.step(b"v=bm90dGhlcmlnaHRzaWc=").unwrap_err();
        assert!(matches!(err, SaslError::AuthenticationFailed));
    }
}
