/*
 * bytebuilder.rs
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

//! Growable byte accumulator used by every wire-format producer (NTLM, SRP).
//!
//! Thin wrapper around `bytes::BytesMut` + `BufMut`, the same pair the HPACK
//! encoder in this codebase's lineage uses for length-prefixed integer and
//! string encoding.

use bytes::{Buf, BufMut, BytesMut};

#[derive(Debug, Default, Clone)]
pub struct ByteBuilder {
    buf: BytesMut,
}

impl ByteBuilder {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: BytesMut::with_capacity(cap) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn u16_le(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16_le(v);
        self
    }

    pub fn u16_be(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16(v);
        self
    }

    pub fn u32_le(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32_le(v);
        self
    }

    pub fn u32_be(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32(v);
        self
    }

    pub fn u64_le(&mut self, v: u64) -> &mut Self {
        self.buf.put_u64_le(v);
        self
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.put_slice(b);
        self
    }

    /// Pads with `0x00` bytes until `self.len() == total`. No-op if already
    /// at or past `total`.
    pub fn pad_to(&mut self, total: usize) -> &mut Self {
        while self.buf.len() < total {
            self.buf.put_u8(0);
        }
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Minimal big/little-endian cursor for parsing the fixed-layout messages
/// (NTLM, SRP). Tracks a read position over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Option<()> {
        if pos > self.data.len() {
            return None;
        }
        self.pos = pos;
        Some(())
    }

    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(s)
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    pub fn u16_le(&mut self) -> Option<u16> {
        let mut b = [0u8; 2];
        b.copy_from_slice(self.take(2)?);
        Some(u16::from_le_bytes(b))
    }

    pub fn u32_le(&mut self) -> Option<u32> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Some(u32::from_le_bytes(b))
    }

    pub fn u16_be(&mut self) -> Option<u16> {
        let mut cursor = self.take(2)?;
        Some(cursor.get_u16())
    }

    pub fn u32_be(&mut self) -> Option<u32> {
        let mut cursor = self.take(4)?;
        Some(cursor.get_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_little_endian() {
        let mut b = ByteBuilder::new();
        b.u16_le(0x1234).u32_le(0xdead_beef);
        let bytes = b.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.u16_le(), Some(0x1234));
        assert_eq!(r.u32_le(), Some(0xdead_beef));
    }

    #[test]
    fn round_trip_big_endian() {
        let mut b = ByteBuilder::new();
        b.u16_be(0x1234).u32_be(0xdead_beef);
        let bytes = b.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.u16_be(), Some(0x1234));
        assert_eq!(r.u32_be(), Some(0xdead_beef));
    }

    #[test]
    fn pad_to_extends_with_zero() {
        let mut b = ByteBuilder::new();
        b.u8(1).u8(2);
        b.pad_to(5);
        assert_eq!(b.into_vec(), vec![1, 2, 0, 0, 0]);
    }
}
