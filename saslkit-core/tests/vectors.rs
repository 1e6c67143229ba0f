/*
 * vectors.rs
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

//! Golden-vector scenarios driven through the public registry surface
//! rather than a mechanism's internals, exercising the full `create` ->
//! `step` -> `is_completed` loop each mechanism promises.

use saslkit_core::credentials::Credentials;
use saslkit_core::mechanism::Registry;

#[test]
fn plain_golden_vector_via_registry() {
    let registry = Registry::default();
    let mut mech = registry
        .create("PLAIN", Credentials::new("jdoe").with_password("secret"))
        .unwrap();
    let response = mech.step(&[]).unwrap();
    assert_eq!(
        response,
        vec![0x00, 0x6A, 0x64, 0x6F, 0x65, 0x00, 0x73, 0x65, 0x63, 0x72, 0x65, 0x74]
    );
    assert!(mech.is_completed());
}

#[test]
fn cram_md5_golden_vector_via_registry() {
    let registry = Registry::default();
    let mut mech = registry
        .create("CRAM-MD5", Credentials::new("tim").with_password("tanstaaftanstaaf"))
        .unwrap();
    let response = mech.step(b"<1896.697170952@postoffice.reston.mci.net>").unwrap();
    assert_eq!(String::from_utf8(response).unwrap(), "tim b913a602c7eda7a495b4e6e7334d3890");
}

#[test]
fn scram_sha1_client_first_via_step_b64() {
    let registry = Registry::default();
    let mut mech = registry
        .create("SCRAM-SHA-1", Credentials::new("user").with_password("pencil"))
        .unwrap();

    // Drive through step_b64 to exercise the base64 convenience path; the
    // client nonce is random here, so only the structure is checked. Exact
    // digests against a fixed nonce are covered by the mechanism's own
    // golden-vector unit test.
    let first_b64 = mech.step_b64("").unwrap();
    let first = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &first_b64).unwrap();
    let first = String::from_utf8(first).unwrap();
    assert!(first.starts_with("n,,n=user,r="));
    assert!(!mech.is_completed());
}

#[test]
fn unsupported_mechanism_name_is_rejected() {
    let registry = Registry::default();
    let err = registry.create("GSSAPI", Credentials::new("u")).unwrap_err();
    assert!(matches!(err, saslkit_core::SaslError::UnsupportedMechanism(_)));
}

#[test]
fn xoauth2_full_exchange_via_registry() {
    let registry = Registry::default();
    let mut mech = registry
        .create("xoauth2", Credentials::new("user@example.com").with_access_token("ya29.token123"))
        .unwrap();
    let first = mech.step(&[]).unwrap();
    assert_eq!(first, b"user=user@example.com\x01auth=Bearer ya29.token123\x01\x01");
    assert!(!mech.is_completed());
    let second = mech.step(b"error").unwrap();
    assert!(second.is_empty());
    assert!(mech.is_completed());
}

/// Builds a minimal NTLMv2-shaped Type 2 challenge (target-offset 48, empty
/// target name and target-information block) so the Type 3 response this
/// engine builds can be checked against the security-buffer invariant in
/// §8: `sum(payload lengths) + 72 == total message length`.
fn build_fake_type2() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"NTLMSSP\0");
    out.extend_from_slice(&2u32.to_le_bytes()); // message type
    out.extend_from_slice(&0u16.to_le_bytes()); // target name length
    out.extend_from_slice(&0u16.to_le_bytes()); // target name allocated
    out.extend_from_slice(&48u32.to_le_bytes()); // target name offset (v2 layout)
    out.extend_from_slice(&0x0000_0001u32.to_le_bytes()); // flags: unicode
    out.extend_from_slice(&[0xAA; 8]); // server challenge
    out.extend_from_slice(&[0u8; 8]); // context handle
    out.extend_from_slice(&0u16.to_le_bytes()); // target-info length
    out.extend_from_slice(&0u16.to_le_bytes()); // target-info allocated
    out.extend_from_slice(&48u32.to_le_bytes()); // target-info offset
    out
}

#[test]
fn ntlm_type3_payload_lengths_satisfy_security_buffer_invariant() {
    let registry = Registry::default();
    let mut mech = registry
        .create("NTLM", Credentials::new("user").with_password("SecREt01").with_domain("DOMAIN"))
        .unwrap();
    let _type1 = mech.step(&[]).unwrap();
    let type3 = mech.step(&build_fake_type2()).unwrap();
    assert!(mech.is_completed());

    // Re-read the six security-buffer (length, _, offset) triples and check
    // the last one's offset plus its length reaches exactly the end of the
    // message, which holds iff every earlier buffer is packed contiguously
    // starting at the 72-byte header.
    let last_buffer_start = 12 + 5 * 8; // six buffers, 8 bytes each, starting at offset 12
    let session_key_length = u16::from_le_bytes([type3[last_buffer_start], type3[last_buffer_start + 1]]);
    let session_key_offset = u32::from_le_bytes(
        type3[last_buffer_start + 4..last_buffer_start + 8].try_into().unwrap(),
    );
    assert_eq!(session_key_offset as usize + session_key_length as usize, type3.len());
}
