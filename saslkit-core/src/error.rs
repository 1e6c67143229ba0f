/*
 * error.rs
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

//! Error kinds shared by every mechanism and by the base64 line framer.

use std::fmt;
use std::io;

/// Everything that can go wrong driving a SASL exchange.
#[derive(Debug)]
pub enum SaslError {
    /// A required credential field was missing or empty before `step`.
    CredentialsMissing(&'static str),
    /// The registry has no mechanism registered under the requested name.
    UnsupportedMechanism(String),
    /// A mechanism-specific option the server asked for isn't supported
    /// (SRP mandatory extensions, an NTLM target-info version we don't parse).
    UnsupportedOption(String),
    /// A server message violated the mechanism's wire format, arrived out
    /// of order, or `step` was called after completion / reentrantly.
    ProtocolViolation(String),
    /// A cryptographic primitive failed (bad base64, DES key build, etc).
    CryptoFailure(String),
    /// Server-side proof verification failed (SCRAM server signature, SRP
    /// `M2`). The mechanism has already emitted the SASL cancel token.
    AuthenticationFailed,
    /// The transport-facing framing (base64/CRLF/continuation token) was
    /// malformed.
    TransportProtocolError(String),
}

impl fmt::Display for SaslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaslError::CredentialsMissing(field) => {
                write!(f, "missing required credential: {field}")
            }
            SaslError::UnsupportedMechanism(name) => {
                write!(f, "unsupported SASL mechanism: {name}")
            }
            SaslError::UnsupportedOption(msg) => write!(f, "unsupported option: {msg}"),
            SaslError::ProtocolViolation(msg) => write!(f, "protocol violation: {msg}"),
            SaslError::CryptoFailure(msg) => write!(f, "cryptographic failure: {msg}"),
            SaslError::AuthenticationFailed => write!(f, "authentication failed"),
            SaslError::TransportProtocolError(msg) => write!(f, "transport framing error: {msg}"),
        }
    }
}

impl std::error::Error for SaslError {}

impl From<io::Error> for SaslError {
    fn from(e: io::Error) -> Self {
        SaslError::TransportProtocolError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SaslError>;
