// src/gps/frame.rs
//! Sentence framing and checksum validation

use super::source::ByteSource;
use crate::error::Result;

/// Longest frame accepted before the buffer is thrown away
pub const MAX_SENTENCE_LEN: usize = 512;

/// XOR of every byte, as carried after the `*` of an NMEA sentence
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Pulls bytes from a [`ByteSource`] until a complete, checksum-valid line
/// is assembled.
///
/// The returned sentence keeps its leading `$` and drops the `*hh`
/// checksum and line terminator. Corrupt lines are dropped silently;
/// only a dead source is reported as an error.
pub struct FrameReader<S> {
    source: S,
    buffer: Vec<u8>,
    checksum_text: Vec<u8>,
    in_checksum: bool,
    overflowed: bool,
    discarded: u64,
}

impl<S: ByteSource> FrameReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Vec::with_capacity(128),
            checksum_text: Vec::with_capacity(4),
            in_checksum: false,
            overflowed: false,
            discarded: 0,
        }
    }

    /// Block until the next valid sentence arrives
    pub fn next_sentence(&mut self) -> Result<String> {
        loop {
            let byte = self.source.read_byte()?;
            if let Some(sentence) = self.push_byte(byte) {
                return Ok(sentence);
            }
        }
    }

    pub fn close(&mut self) {
        self.source.close();
        self.reset();
    }
}

impl<S> FrameReader<S> {
    /// Feed one byte; yields a sentence when a terminator completes a valid frame
    pub fn push_byte(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\n' => {
                let sentence = self.finish_line();
                self.reset();
                sentence
            }
            _ if self.overflowed => None,
            b'*' => {
                self.in_checksum = true;
                None
            }
            _ => {
                if self.in_checksum {
                    self.checksum_text.push(byte);
                } else {
                    self.buffer.push(byte);
                }

                if self.buffer.len() + self.checksum_text.len() > MAX_SENTENCE_LEN {
                    self.overflowed = true;
                    self.buffer.clear();
                    self.checksum_text.clear();
                }
                None
            }
        }
    }

    /// Number of non-blank lines rejected so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn finish_line(&mut self) -> Option<String> {
        if self.overflowed {
            log::debug!("Discarding frame longer than {} bytes", MAX_SENTENCE_LEN);
            self.discarded += 1;
            return None;
        }

        let start = self
            .buffer
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buffer.len());
        let line = &self.buffer[start..];

        if line.is_empty() {
            return None;
        }

        if line[0] != b'$' {
            log::debug!("Discarding frame without leading '$': {}", String::from_utf8_lossy(line));
            self.discarded += 1;
            return None;
        }

        let expected = format!("{:02X}", checksum(&line[1..]));
        let received = String::from_utf8_lossy(&self.checksum_text);
        if received.trim() != expected {
            log::debug!(
                "Checksum mismatch (expected {}, got {:?}): {}",
                expected,
                received.trim(),
                String::from_utf8_lossy(line)
            );
            self.discarded += 1;
            return None;
        }

        match String::from_utf8(line.to_vec()) {
            Ok(sentence) => Some(sentence),
            Err(_) => {
                log::debug!("Discarding frame with non-ASCII content");
                self.discarded += 1;
                None
            }
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.checksum_text.clear();
        self.in_checksum = false;
        self.overflowed = false;
    }
}
