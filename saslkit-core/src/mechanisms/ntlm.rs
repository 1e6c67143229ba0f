/*
 * ntlm.rs
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

//! NTLM v1 and NTLMv2. Two steps: a Type 1 negotiate message, then a Type 3
//! response built from the server's Type 2 challenge.
//!
//! Type 1/2/3 are modeled as plain structs built with `ByteBuilder`/parsed
//! with `ByteReader` rather than mutable objects whose offsets depend on
//! construction order; Type 3's security-buffer offsets are computed once,
//! at serialize time, from the actual payload lengths.

use bitflags::bitflags;
use cipher::{BlockEncrypt, KeyInit};
use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;

use crate::bytebuilder::{ByteBuilder, ByteReader};
use crate::collaborators::{Clock, OsRandom, SecureRandom, SystemClock};
use crate::credentials::Credentials;
use crate::error::{Result, SaslError};
use crate::mechanism::{Mechanism, StepGuard};

type HmacMd5 = Hmac<Md5>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NtlmFlags: u32 {
        const NEGOTIATE_UNICODE = 0x0000_0001;
        const REQUEST_TARGET = 0x0000_0004;
        const NEGOTIATE_NTLM = 0x0000_0200;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;
    }
}

const DEFAULT_TYPE1_FLAGS: NtlmFlags = NtlmFlags::from_bits_truncate(
    NtlmFlags::NEGOTIATE_UNICODE.bits()
        | NtlmFlags::REQUEST_TARGET.bits()
        | NtlmFlags::NEGOTIATE_NTLM.bits()
        | NtlmFlags::NEGOTIATE_DOMAIN_SUPPLIED.bits()
        | NtlmFlags::NEGOTIATE_WORKSTATION_SUPPLIED.bits(),
);

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

fn truncated(what: &'static str) -> SaslError {
    SaslError::ProtocolViolation(format!("truncated NTLM message while reading {what}"))
}

/// `{length: u16, allocated: u16 (== length), offset: u32}`.
#[derive(Debug, Clone, Copy)]
struct SecurityBuffer {
    length: u16,
    offset: u32,
}

impl SecurityBuffer {
    fn write(self, out: &mut ByteBuilder) {
        out.u16_le(self.length);
        out.u16_le(self.length);
        out.u32_le(self.offset);
    }

    fn read(r: &mut ByteReader) -> Result<Self> {
        let length = r.u16_le().ok_or_else(|| truncated("security buffer length"))?;
        let _allocated = r.u16_le().ok_or_else(|| truncated("security buffer allocated"))?;
        let offset = r.u32_le().ok_or_else(|| truncated("security buffer offset"))?;
        Ok(Self { length, offset })
    }
}

/// Builds the Type 1 negotiate message per §4.7.
pub fn build_type1(domain: &str, workstation: &str) -> Vec<u8> {
    let domain_bytes = domain.to_ascii_uppercase().into_bytes();
    let workstation_bytes = workstation.to_ascii_uppercase().into_bytes();

    let domain_offset = 40u32;
    let workstation_offset = domain_offset + domain_bytes.len() as u32;

    let mut out = ByteBuilder::new();
    out.bytes(SIGNATURE);
    out.u32_le(1);
    out.u32_le(DEFAULT_TYPE1_FLAGS.bits());
    SecurityBuffer { length: domain_bytes.len() as u16, offset: domain_offset }.write(&mut out);
    SecurityBuffer { length: workstation_bytes.len() as u16, offset: workstation_offset }
        .write(&mut out);
    out.u8(5); // OS major
    out.u8(1); // OS minor
    out.u16_le(2600); // OS build
    out.bytes(&[0x00, 0x00, 0x00, 0x0F]);
    out.bytes(&domain_bytes);
    out.bytes(&workstation_bytes);
    out.into_vec()
}

/// The fields of a parsed Type 2 challenge this engine needs to respond to.
struct Type2Message {
    server_challenge: [u8; 8],
    flags: NtlmFlags,
    target_name: Vec<u8>,
    target_info: Vec<u8>,
}

fn parse_type2(bytes: &[u8]) -> Result<Type2Message> {
    let mut r = ByteReader::new(bytes);
    let signature = r.take(8).ok_or_else(|| truncated("signature"))?;
    if signature != SIGNATURE {
        return Err(SaslError::ProtocolViolation("bad NTLM signature".into()));
    }
    let message_type = r.u32_le().ok_or_else(|| truncated("message type"))?;
    if message_type != 2 {
        return Err(SaslError::ProtocolViolation(format!(
            "expected NTLM message type 2, got {message_type}"
        )));
    }
    let target_name_buf = SecurityBuffer::read(&mut r)?;
    if ![32, 48, 56].contains(&target_name_buf.offset) {
        return Err(SaslError::UnsupportedOption("NTLM target version unknown".into()));
    }
    let flags = NtlmFlags::from_bits_truncate(r.u32_le().ok_or_else(|| truncated("flags"))?);
    let mut server_challenge = [0u8; 8];
    server_challenge.copy_from_slice(r.take(8).ok_or_else(|| truncated("server challenge"))?);

    let mut target_info = Vec::new();
    if target_name_buf.offset == 48 || target_name_buf.offset == 56 {
        let _context = r.take(8).ok_or_else(|| truncated("context handle"))?;
        let target_info_buf = SecurityBuffer::read(&mut r)?;
        if target_name_buf.offset == 56 {
            let _os_version = r.take(5).ok_or_else(|| truncated("OS version"))?;
        }
        if target_info_buf.length > 0 {
            let start = target_info_buf.offset as usize;
            let end = start + target_info_buf.length as usize;
            target_info = bytes
                .get(start..end)
                .ok_or_else(|| SaslError::ProtocolViolation("target-info out of bounds".into()))?
                .to_vec();
        }
    }

    let target_name = if target_name_buf.length > 0 {
        let start = target_name_buf.offset as usize;
        let end = start + target_name_buf.length as usize;
        bytes
            .get(start..end)
            .ok_or_else(|| SaslError::ProtocolViolation("target-name out of bounds".into()))?
            .to_vec()
    } else {
        Vec::new()
    };

    Ok(Type2Message { server_challenge, flags, target_name, target_info })
}

fn decode_target_name(msg: &Type2Message) -> String {
    if msg.flags.contains(NtlmFlags::NEGOTIATE_UNICODE) {
        utf16le_to_string(&msg.target_name)
    } else {
        String::from_utf8_lossy(&msg.target_name).into_owned()
    }
}

fn utf16le_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn string_to_utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

// --- DES key derivation (NTLMv1) ---

/// Expands 7 bytes into an 8-byte DES key, applying odd-parity correction
/// per byte.
fn des_key_from_7_bytes(key7: &[u8]) -> [u8; 8] {
    debug_assert_eq!(key7.len(), 7);
    let mut bits = Vec::with_capacity(56);
    for &byte in key7 {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    let mut key = [0u8; 8];
    for (i, chunk) in bits.chunks(7).enumerate() {
        let mut byte = 0u8;
        for &bit in chunk {
            byte = (byte << 1) | bit;
        }
        byte <<= 1;
        key[i] = set_odd_parity(byte);
    }
    key
}

fn set_odd_parity(byte: u8) -> u8 {
    let high_bits = byte >> 1;
    let parity = (high_bits.count_ones() % 2) as u8;
    // If the XOR of the high 7 bits is even, set the low bit; else clear it.
    (byte & 0xFE) | (1 - parity)
}

fn des_ecb_encrypt_block(key7: &[u8], block: &[u8; 8]) -> [u8; 8] {
    let key = des_key_from_7_bytes(key7);
    let cipher = des::Des::new_from_slice(&key).expect("DES key is always 8 bytes");
    let mut buf = cipher::generic_array::GenericArray::clone_from_slice(&block[..]);
    cipher.encrypt_block(&mut buf);
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf);
    out
}

const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";

fn lm_hash(password: &str) -> [u8; 16] {
    let upper = password.to_ascii_uppercase();
    let mut padded = upper.into_bytes();
    padded.resize(14, 0);

    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&des_ecb_encrypt_block(&padded[0..7], LM_MAGIC));
    out[8..16].copy_from_slice(&des_ecb_encrypt_block(&padded[7..14], LM_MAGIC));
    out
}

fn ntlm_hash(password: &str) -> [u8; 16] {
    let utf16 = string_to_utf16le(password);
    let digest = Md4::digest(&utf16);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// `LMResponse(hash, challenge)`: right-pad `hash` to 21 bytes, DES-encrypt
/// `challenge` with three derived keys, concatenate to 24 bytes. Used for
/// both the LM response and the (misleadingly-named) NTLM v1 response.
fn lm_style_response(hash: &[u8; 16], challenge: &[u8; 8]) -> [u8; 24] {
    let mut padded = [0u8; 21];
    padded[0..16].copy_from_slice(hash);

    let mut out = [0u8; 24];
    out[0..8].copy_from_slice(&des_ecb_encrypt_block(&padded[0..7], challenge));
    out[8..16].copy_from_slice(&des_ecb_encrypt_block(&padded[7..14], challenge));
    out[16..24].copy_from_slice(&des_ecb_encrypt_block(&padded[14..21], challenge));
    out
}

fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut mac = HmacMd5::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result);
    out
}

fn ntlmv2_hash(username: &str, target: &str, password: &str) -> [u8; 16] {
    let nt_hash = ntlm_hash(password);
    let identity = format!("{}{}", username.to_ascii_uppercase(), target);
    hmac_md5(&nt_hash, &string_to_utf16le(&identity))
}

struct NtlmV2Response {
    nt_response: Vec<u8>,
    lm_response: Vec<u8>,
}

fn compute_ntlmv2_response(
    ntlmv2_hash_value: &[u8; 16],
    server_challenge: &[u8; 8],
    client_nonce: &[u8; 8],
    timestamp: u64,
    target_info: &[u8],
) -> NtlmV2Response {
    let mut blob = ByteBuilder::new();
    blob.bytes(&[0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    blob.u64_le(timestamp);
    blob.bytes(client_nonce);
    blob.u32_le(0);
    blob.bytes(target_info);
    blob.u32_le(0);
    let blob = blob.into_vec();

    let mut nt_proof_input = Vec::with_capacity(8 + blob.len());
    nt_proof_input.extend_from_slice(server_challenge);
    nt_proof_input.extend_from_slice(&blob);
    let nt_proof = hmac_md5(ntlmv2_hash_value, &nt_proof_input);

    let mut nt_response = Vec::with_capacity(16 + blob.len());
    nt_response.extend_from_slice(&nt_proof);
    nt_response.extend_from_slice(&blob);

    let mut lm_input = Vec::with_capacity(16);
    lm_input.extend_from_slice(server_challenge);
    lm_input.extend_from_slice(client_nonce);
    let lm_proof = hmac_md5(ntlmv2_hash_value, &lm_input);
    let mut lm_response = Vec::with_capacity(24);
    lm_response.extend_from_slice(&lm_proof);
    lm_response.extend_from_slice(client_nonce);

    NtlmV2Response { nt_response, lm_response }
}

#[allow(clippy::too_many_arguments)]
fn build_type3(
    lm_response: &[u8],
    nt_response: &[u8],
    target_name: &str,
    username: &str,
    workstation: &str,
    unicode: bool,
) -> Vec<u8> {
    let encode = |s: &str| -> Vec<u8> {
        if unicode {
            string_to_utf16le(s)
        } else {
            s.as_bytes().to_vec()
        }
    };

    let target_bytes = encode(target_name);
    let username_bytes = encode(username);
    let workstation_bytes = encode(workstation);
    let session_key_bytes: Vec<u8> = Vec::new();

    const HEADER_SIZE: u32 = 72;
    let lm_offset = HEADER_SIZE;
    let nt_offset = lm_offset + lm_response.len() as u32;
    let target_offset = nt_offset + nt_response.len() as u32;
    let username_offset = target_offset + target_bytes.len() as u32;
    let workstation_offset = username_offset + username_bytes.len() as u32;
    let session_key_offset = workstation_offset + workstation_bytes.len() as u32;

    let mut out = ByteBuilder::new();
    out.bytes(SIGNATURE);
    out.u32_le(3);
    SecurityBuffer { length: lm_response.len() as u16, offset: lm_offset }.write(&mut out);
    SecurityBuffer { length: nt_response.len() as u16, offset: nt_offset }.write(&mut out);
    SecurityBuffer { length: target_bytes.len() as u16, offset: target_offset }.write(&mut out);
    SecurityBuffer { length: username_bytes.len() as u16, offset: username_offset }
        .write(&mut out);
    SecurityBuffer { length: workstation_bytes.len() as u16, offset: workstation_offset }
        .write(&mut out);
    SecurityBuffer { length: 0, offset: session_key_offset }.write(&mut out);

    let mut flags = NtlmFlags::REQUEST_TARGET | NtlmFlags::NEGOTIATE_NTLM;
    if unicode {
        flags |= NtlmFlags::NEGOTIATE_UNICODE;
    }
    out.u32_le(flags.bits());
    out.u8(5);
    out.u16_le(2600);
    out.bytes(&[0x00, 0x00, 0x00, 0x0F]);

    out.bytes(lm_response);
    out.bytes(nt_response);
    out.bytes(&target_bytes);
    out.bytes(&username_bytes);
    out.bytes(&workstation_bytes);
    out.bytes(&session_key_bytes);
    out.into_vec()
}

pub struct NtlmMechanism<R: SecureRandom, C: Clock> {
    credentials: Credentials,
    use_ntlm_v2: bool,
    rng: R,
    clock: C,
    guard: StepGuard,
}

impl<R: SecureRandom, C: Clock> NtlmMechanism<R, C> {
    pub fn with_collaborators(credentials: Credentials, use_ntlm_v2: bool, rng: R, clock: C) -> Self {
        Self { credentials, use_ntlm_v2, rng, clock, guard: StepGuard::new() }
    }
}

impl NtlmMechanism<OsRandom, SystemClock> {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_collaborators(credentials, true, OsRandom, SystemClock)
    }
}

impl<R: SecureRandom, C: Clock> Mechanism for NtlmMechanism<R, C> {
    fn name(&self) -> &'static str {
        "NTLM"
    }

    fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.guard.check()?;
        match self.guard.step_index() {
            0 => {
                let domain = self.credentials.domain.as_deref().unwrap_or("");
                let workstation = self.credentials.workstation.as_deref().unwrap_or("");
                let message = build_type1(domain, workstation);
                self.guard.advance(false);
                Ok(message)
            }
            1 => {
                let password = self
                    .credentials
                    .password
                    .as_deref()
                    .ok_or(SaslError::CredentialsMissing("password"))?;
                let type2 = parse_type2(challenge)?;

                let (lm_response, nt_response, target_name) = if self.use_ntlm_v2 {
                    let target_name = decode_target_name(&type2);
                    let hash = ntlmv2_hash(&self.credentials.username, &target_name, password);
                    let mut client_nonce = [0u8; 8];
                    self.rng.fill(&mut client_nonce);
                    let timestamp = self.clock.now_filetime();
                    let response = compute_ntlmv2_response(
                        &hash,
                        &type2.server_challenge,
                        &client_nonce,
                        timestamp,
                        &type2.target_info,
                    );
                    (response.lm_response, response.nt_response, target_name)
                } else {
                    let lm = lm_hash(password);
                    let nt = ntlm_hash(password);
                    let lm_response = lm_style_response(&lm, &type2.server_challenge).to_vec();
                    let nt_response = lm_style_response(&nt, &type2.server_challenge).to_vec();
                    (lm_response, nt_response, decode_target_name(&type2))
                };

                let workstation = self.credentials.workstation.as_deref().unwrap_or("");
                let message = build_type3(
                    &lm_response,
                    &nt_response,
                    &target_name,
                    &self.credentials.username,
                    workstation,
                    type2.flags.contains(NtlmFlags::NEGOTIATE_UNICODE) || self.use_ntlm_v2,
                );
                self.guard.advance(true);
                Ok(message)
            }
            _ => unreachable!("StepGuard prevents calls past completion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02X}")).collect()
    }

    #[test]
    fn ntlmv1_lm_and_ntlm_hash_vectors() {
        assert_eq!(hex(&lm_hash("SecREt01")), "F0D412BD764FFE81AAD3B435B51404EE");
        assert_eq!(hex(&ntlm_hash("SecREt01")), "CD06CA7C7E10C99B1D33B7498BCA5713");
    }

    #[test]
    fn ntlmv1_responses() {
        let challenge = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        let lm = lm_hash("SecREt01");
        let nt = ntlm_hash("SecREt01");
        assert_eq!(
            hex(&lm_style_response(&lm, &challenge)),
            "C337CD5CBD44FC9782A667AF6D427C6DE67C20C2D3E77C56"
        );
        assert_eq!(
            hex(&lm_style_response(&nt, &challenge)),
            "25A98C1C31E81847466B29B2DF4680F39958FB8C213A9CC6"
        );
    }

    #[test]
    fn odd_parity_is_applied_to_every_des_key_byte() {
        let key = des_key_from_7_bytes(&[0xFF; 7]);
        for byte in key {
            assert_eq!(byte.count_ones() % 2, 1, "byte {byte:08b} has even parity");
        }
    }

    #[test]
    fn type3_security_buffer_lengths_sum_to_total_minus_header() {
        let lm = vec![0u8; 24];
        let nt = vec![0u8; 24];
        let message = build_type3(&lm, &nt, "DOMAIN", "user", "WKS", true);
        let payload_len = lm.len()
            + nt.len()
            + string_to_utf16le("DOMAIN").len()
            + string_to_utf16le("user").len()
            + string_to_utf16le("WKS").len();
        assert_eq!(message.len(), 72 + payload_len);
    }

    #[test]
    fn type1_message_has_ntlmssp_signature_and_message_type_1() {
        let type1 = build_type1("DOMAIN", "WKS");
        assert_eq!(&type1[0..8], SIGNATURE);
        assert_eq!(u32::from_le_bytes(type1[8..12].try_into().unwrap()), 1);
    }
}
