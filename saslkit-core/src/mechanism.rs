/*
 * mechanism.rs
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

//! Mechanism abstraction and name registry.
//!
//! The source this engine is modeled on used a property bag for
//! mechanism-specific credentials and a single abstract base class for every
//! mechanism. Here that becomes a small trait (`Mechanism`) implemented by
//! one concrete type per mechanism, each built from `Credentials` through its
//! own `with_credentials` constructor, and a registry of name -> constructor
//! closures (`create`) rather than runtime class lookup.

use std::collections::HashMap;

use crate::base64util;
use crate::credentials::Credentials;
use crate::error::{Result, SaslError};

/// Common contract every mechanism implements.
///
/// `step` must be called strictly sequentially; calling it again after
/// `is_completed()` is true is a protocol error rather than silently
/// restarting the exchange.
pub trait Mechanism {
    fn name(&self) -> &'static str;
    fn is_completed(&self) -> bool;
    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Base64 convenience wrapper around `step` for callers driving a
    /// base64-framed transport directly.
    fn step_b64(&mut self, challenge_b64: &str) -> Result<String> {
        let challenge = if challenge_b64.is_empty() {
            Vec::new()
        } else {
            base64util::decode(challenge_b64)?
        };
        let response = self.step(&challenge)?;
        Ok(base64util::encode(&response))
    }
}

/// Tracks step ordering and completion so every mechanism gets the same
/// "reentrant/past-completion step is a protocol error" behavior for free.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepGuard {
    step_index: u32,
    completed: bool,
}

impl StepGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Call at the top of `step`: errors if the mechanism already completed.
    pub fn check(&self) -> Result<()> {
        if self.completed {
            return Err(SaslError::ProtocolViolation(
                "step called after mechanism completed".into(),
            ));
        }
        Ok(())
    }

    /// Call after producing a response, marking completion when this was
    /// the mechanism's last client message.
    pub fn advance(&mut self, completes: bool) {
        self.step_index += 1;
        self.completed = completes;
    }
}

type Constructor = Box<dyn Fn(Credentials) -> Box<dyn Mechanism> + Send + Sync>;

/// Process-wide mapping from IANA mechanism name to constructor. Reads are
/// safe to share; additional `register` calls must be serialized by the
/// caller (not internally locked — mechanism instances are single-threaded).
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Register a mechanism constructor under `name` (case-insensitive).
    /// A duplicate registration replaces the previous constructor.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(Credentials) -> Box<dyn Mechanism> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_ascii_uppercase(), Box::new(constructor));
    }

    pub fn create(&self, name: &str, credentials: Credentials) -> Result<Box<dyn Mechanism>> {
        self.constructors
            .get(&name.to_ascii_uppercase())
            .map(|ctor| ctor(credentials))
            .ok_or_else(|| SaslError::UnsupportedMechanism(name.to_string()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_uppercase())
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::new();
        crate::mechanisms::register_all(&mut registry);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mechanism_is_unsupported() {
        let registry = Registry::default();
        let err = registry.create("NOT-A-MECHANISM", Credentials::new("u")).unwrap_err();
        assert!(matches!(err, SaslError::UnsupportedMechanism(_)));
    }

    #[test]
    fn registration_is_case_insensitive() {
        let registry = Registry::default();
        assert!(registry.is_registered("plain"));
        assert!(registry.is_registered("PLAIN"));
    }

    #[test]
    fn step_guard_rejects_reentrant_step_after_completion() {
        let mut guard = StepGuard::new();
        guard.check().unwrap();
        guard.advance(true);
        assert!(guard.is_completed());
        assert!(guard.check().is_err());
    }
}
