/*
 * lib.rs
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

//! Client-side SASL authentication engine for line-oriented, base64-framed
//! protocols (IMAP, POP3, SMTP): PLAIN, CRAM-MD5, DIGEST-MD5, SCRAM-SHA-1,
//! XOAUTH, XOAUTH2, NTLM (v1/v2), and SRP, behind one `Mechanism` contract
//! and a name registry.
//!
//! IMAP/POP3/SMTP command dispatch, MIME, and TLS negotiation are out of
//! scope; the transport is modeled as an abstract line-duplex channel
//! (see [`collaborators::Transport`]) driven by the host application.

pub mod base64util;
pub mod bytebuilder;
pub mod collaborators;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod framer;
pub mod mechanism;
pub mod mechanisms;

pub use credentials::Credentials;
pub use error::{Result, SaslError};
pub use mechanism::{Mechanism, Registry};
