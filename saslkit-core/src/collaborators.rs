/*
 * collaborators.rs
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

//! Collaborator contracts the engine is driven through: a line-duplex
//! transport (used only by the optional filter adapter), a cryptographic
//! RNG, and a UTC clock (NTLMv2 timestamps). Kept as traits so tests can
//! substitute deterministic fakes instead of real time/entropy.

use std::io;

use chrono::{TimeZone, Utc};
use rand::RngCore;

/// CRLF-terminated, ASCII line-duplex channel. Implemented by the host
/// application; this crate only calls into it from the filter adapter.
pub trait Transport {
    fn read_line(&mut self) -> io::Result<String>;
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Cryptographically strong randomness, scoped to a single `step` call.
pub trait SecureRandom {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Default `SecureRandom` backed by the OS CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buf);
    }
}

/// UTC wall clock abstraction, expressed as hundred-nanosecond intervals
/// since 1601-01-01 UTC (Windows FILETIME epoch), per NTLMv2's blob format.
///
/// NTLMv2 needs a wall-clock timestamp for its blob, and a naive
/// `now()` that reads local time is a hidden, untestable dependency.
/// This trait makes the clock explicit and swappable.
pub trait Clock {
    fn now_filetime(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_filetime(&self) -> u64 {
        filetime_from_utc(Utc::now())
    }
}

/// A clock that always returns a fixed value — for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_filetime(&self) -> u64 {
        self.0
    }
}

fn filetime_from_utc(now: chrono::DateTime<Utc>) -> u64 {
    let epoch = Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap();
    let delta = now.signed_duration_since(epoch);
    // 100ns intervals.
    (delta.num_microseconds().unwrap_or(0) as u64).saturating_mul(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filetime_is_monotonic_with_wall_clock() {
        let a = filetime_from_utc(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
        let b = filetime_from_utc(Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());
        assert!(b > a);
    }

    #[test]
    fn fixed_clock_returns_fixed_value() {
        assert_eq!(FixedClock(42).now_filetime(), 42);
    }
}
