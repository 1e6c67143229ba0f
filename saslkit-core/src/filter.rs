/*
 * filter.rs
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

//! Optional adapter for hosts that drive authentication through an
//! OS-provided negotiate pipeline instead of calling mechanisms directly.
//! Sits between that pipeline and a [`crate::collaborators::Transport`],
//! translating handshake-framed writes into base64 lines and back.

use crate::collaborators::Transport;
use crate::error::{Result, SaslError};
use crate::framer;

const MESSAGE_DONE: u8 = 0x14;
const MESSAGE_ERROR: u8 = 0x15;
const MESSAGE_IN_PROGRESS: u8 = 0x16;
const HANDSHAKE_SIZE: usize = 5;
const BASE64_DECODE_ERROR_CODE: [u8; 8] = [0, 0, 0, 0, 0, 0, 0x06, 0xFE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadingHandshake,
    ReadingPayload,
    WaitingForServerResponse,
    SatisfyRead,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Handshake {
    message_id: u8,
    major: u8,
    minor: u8,
    payload_size: u16,
}

impl Handshake {
    fn parse(bytes: &[u8; HANDSHAKE_SIZE]) -> Result<Self> {
        let message_id = bytes[0];
        if message_id != MESSAGE_DONE && message_id != MESSAGE_ERROR && message_id != MESSAGE_IN_PROGRESS {
            return Err(SaslError::ProtocolViolation(format!(
                "unknown handshake message id 0x{message_id:02X}"
            )));
        }
        Ok(Self {
            message_id,
            major: bytes[1],
            minor: bytes[2],
            payload_size: u16::from_be_bytes([bytes[3], bytes[4]]),
        })
    }

    fn encode(self) -> [u8; HANDSHAKE_SIZE] {
        let size = self.payload_size.to_be_bytes();
        [self.message_id, self.major, self.minor, size[0], size[1]]
    }

    fn done(payload_size: u16) -> Self {
        Self { message_id: MESSAGE_DONE, major: 1, minor: 0, payload_size }
    }

    fn error(payload_size: u16) -> Self {
        Self { message_id: MESSAGE_ERROR, major: 1, minor: 0, payload_size }
    }

    fn in_progress(payload_size: u16) -> Self {
        Self { message_id: MESSAGE_IN_PROGRESS, major: 1, minor: 0, payload_size }
    }
}

/// Drives the handshake-frame <-> base64-line translation described in the
/// optional filter adapter component. Not used by the mechanisms directly;
/// hosts that drive authentication through an OS negotiate pipeline wire
/// this between that pipeline and a [`Transport`].
pub struct NegotiateFilter<T: Transport> {
    transport: T,
    state: State,
    handshake: Option<Handshake>,
    payload_buffer: Vec<u8>,
}

impl<T: Transport> NegotiateFilter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: State::ReadingHandshake,
            handshake: None,
            payload_buffer: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feed bytes written by the caller (negotiate-pipeline side). The first
    /// five bytes of a fresh write are a handshake header; remaining bytes
    /// accumulate as payload until `payload_size` is reached, at which point
    /// the payload is base64-framed out to the transport.
    pub fn write(&mut self, mut bytes: &[u8]) -> Result<()> {
        loop {
            match self.state {
                State::ReadingHandshake => {
                    if bytes.is_empty() {
                        return Ok(());
                    }
                    let take = HANDSHAKE_SIZE.min(bytes.len());
                    self.payload_buffer.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                    if self.payload_buffer.len() < HANDSHAKE_SIZE {
                        return Ok(());
                    }
                    let mut header = [0u8; HANDSHAKE_SIZE];
                    header.copy_from_slice(&self.payload_buffer[..HANDSHAKE_SIZE]);
                    let handshake = Handshake::parse(&header)?;
                    self.payload_buffer.clear();
                    self.handshake = Some(handshake);
                    self.state = State::ReadingPayload;
                }
                State::ReadingPayload => {
                    let handshake = self.handshake.expect("set when entering ReadingPayload");
                    let needed = handshake.payload_size as usize - self.payload_buffer.len();
                    let take = needed.min(bytes.len());
                    self.payload_buffer.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                    if self.payload_buffer.len() < handshake.payload_size as usize {
                        return Ok(());
                    }
                    self.transport
                        .write_all(framer::encode_response_line(&self.payload_buffer).as_bytes())?;
                    self.payload_buffer.clear();
                    if handshake.message_id == MESSAGE_DONE {
                        self.state = State::Done;
                        return Ok(());
                    }
                    self.state = State::WaitingForServerResponse;
                    if bytes.is_empty() {
                        return Ok(());
                    }
                }
                State::WaitingForServerResponse | State::SatisfyRead | State::Done => return Ok(()),
            }
        }
    }

    /// Produce the next frame the caller should read. Only meaningful after
    /// a non-`done` handshake has been written; synthesizes a `done` header
    /// once the exchange has completed.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        match self.state {
            State::Done => Ok(Handshake::done(0).encode().to_vec()),
            State::WaitingForServerResponse => {
                let line = self.transport.read_line()?;
                self.state = State::SatisfyRead;
                match framer::decode_challenge_line(&line) {
                    Ok(payload) => {
                        let mut out = Handshake::in_progress(payload.len() as u16).encode().to_vec();
                        out.extend_from_slice(&payload);
                        self.state = State::ReadingHandshake;
                        Ok(out)
                    }
                    Err(_) => {
                        let mut out =
                            Handshake::error(BASE64_DECODE_ERROR_CODE.len() as u16).encode().to_vec();
                        out.extend_from_slice(&BASE64_DECODE_ERROR_CODE);
                        self.state = State::ReadingHandshake;
                        Ok(out)
                    }
                }
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    struct FakeTransport {
        written: Vec<u8>,
        lines: VecDeque<String>,
    }

    impl Transport for FakeTransport {
        fn read_line(&mut self) -> io::Result<String> {
            self.lines
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more lines"))
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn in_progress_handshake_emits_base64_payload_then_waits_for_server() {
        let transport = FakeTransport { written: Vec::new(), lines: VecDeque::new() };
        let mut filter = NegotiateFilter::new(transport);

        let mut write = Handshake::in_progress(4).encode().to_vec();
        write.extend_from_slice(b"test");
        filter.write(&write).unwrap();

        assert_eq!(filter.transport.written, b"dGVzdA==\r\n");
        assert_eq!(filter.state, State::WaitingForServerResponse);
    }

    #[test]
    fn done_handshake_stops_further_transport_writes() {
        let transport = FakeTransport { written: Vec::new(), lines: VecDeque::new() };
        let mut filter = NegotiateFilter::new(transport);

        let mut write = Handshake::done(2).encode().to_vec();
        write.extend_from_slice(b"ok");
        filter.write(&write).unwrap();

        assert!(filter.is_done());
        let frame = filter.read().unwrap();
        assert_eq!(frame, Handshake::done(0).encode().to_vec());
    }

    #[test]
    fn server_response_is_wrapped_in_progress_header() {
        let mut lines = VecDeque::new();
        lines.push_back("+ aGVsbG8=\r\n".to_string());
        let transport = FakeTransport { written: Vec::new(), lines };
        let mut filter = NegotiateFilter::new(transport);
        filter.state = State::WaitingForServerResponse;

        let frame = filter.read().unwrap();
        let handshake = Handshake::parse(&frame[..HANDSHAKE_SIZE].try_into().unwrap()).unwrap();
        assert_eq!(handshake.message_id, MESSAGE_IN_PROGRESS);
        assert_eq!(&frame[HANDSHAKE_SIZE..], b"hello");
    }

    #[test]
    fn bad_base64_from_server_yields_error_frame() {
        let mut lines = VecDeque::new();
        lines.push_back("+ not-base64!!\r\n".to_string());
        let transport = FakeTransport { written: Vec::new(), lines };
        let mut filter = NegotiateFilter::new(transport);
        filter.state = State::WaitingForServerResponse;

        let frame = filter.read().unwrap();
        let handshake = Handshake::parse(&frame[..HANDSHAKE_SIZE].try_into().unwrap()).unwrap();
        assert_eq!(handshake.message_id, MESSAGE_ERROR);
        assert_eq!(&frame[HANDSHAKE_SIZE..], &BASE64_DECODE_ERROR_CODE);
    }
}
