/*
 * base64util.rs
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

//! Single base64 codec used everywhere a mechanism or the line framer needs
//! one (standard alphabet, padded): SCRAM, the base64 line framer, and the
//! filter adapter.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::SaslError;

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode(s: &str) -> Result<Vec<u8>, SaslError> {
    STANDARD
        .decode(s.trim_end_matches(['\r', '\n']))
        .map_err(|e| SaslError::CryptoFailure(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"hello, sasl";
        assert_eq!(decode(&encode(data)).unwrap(), data);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not base64 at all!!").is_err());
    }
}
