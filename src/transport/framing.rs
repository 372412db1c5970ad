//! Meshtastic wired stream framing: `0x94 0xC3 len_hi len_lo <protobuf>`.
//!
//! Bytes outside a frame (device console text, line noise) are skipped by
//! realigning on the next `0x94`.

use log::trace;

use super::TransportError;
use crate::logutil::hex_snippet;

pub const START1: u8 = 0x94;
pub const START2: u8 = 0xC3;
/// Largest protobuf payload a radio accepts in one frame.
pub const MAX_FRAME_LEN: usize = 512;

/// Prefix `payload` with the stream header.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(payload.len()));
    }
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(START1);
    out.push(START2);
    out.push(((payload.len() >> 8) & 0xFF) as u8);
    out.push((payload.len() & 0xFF) as u8);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Accumulates raw stream bytes and yields complete frame payloads.
#[derive(Debug, Default)]
pub struct StreamFramer {
    rx_buf: Vec<u8>,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.rx_buf.len()
    }

    /// Feed `data` and return every frame payload now complete, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.rx_buf.extend_from_slice(data);
        let mut frames = Vec::new();
        loop {
            if self.rx_buf.len() < 4 {
                break;
            }

            // Realign to header if needed
            if !(self.rx_buf[0] == START1 && self.rx_buf[1] == START2) {
                let skip = self
                    .rx_buf
                    .iter()
                    .skip(1)
                    .position(|&b| b == START1)
                    .map(|p| p + 1)
                    .unwrap_or(self.rx_buf.len());
                trace!(
                    "framer: skipping {} non-frame bytes: {}",
                    skip,
                    hex_snippet(&self.rx_buf[..skip], 32)
                );
                self.rx_buf.drain(0..skip);
                continue;
            }

            let declared = ((self.rx_buf[2] as usize) << 8) | (self.rx_buf[3] as usize);
            if declared == 0 || declared > MAX_FRAME_LEN {
                // Corrupt header: drop one byte and resync
                self.rx_buf.drain(0..1);
                continue;
            }
            if self.rx_buf.len() < 4 + declared {
                break;
            }

            frames.push(self.rx_buf[4..4 + declared].to_vec());
            self.rx_buf.drain(0..4 + declared);
        }
        frames
    }
}
