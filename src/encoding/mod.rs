// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! VNC encoding implementations and `FramebufferUpdate` serialization.
//!
//! Rectangles are always emitted with Raw encoding, whatever the client listed
//! in `SetEncodings`: every RFB viewer is required to understand it.

use crate::framebuffer::Region;
use crate::protocol::{PixelFormat, Rectangle, ENCODING_RAW, SERVER_MSG_FRAMEBUFFER_UPDATE};
use bytes::{BufMut, BytesMut};

pub mod raw;

pub use raw::RawEncoding;

/// Trait defining the interface for VNC encoding implementations.
pub trait Encoding {
    /// The RFB encoding type written into each rectangle header.
    fn id(&self) -> i32;

    /// Encodes pixel data into a VNC-compatible byte stream.
    ///
    /// # Arguments
    ///
    /// * `data` - Pixel data in the server-native format (4 bytes per pixel, row-major)
    /// * `width` - Width of the rectangle
    /// * `height` - Height of the rectangle
    /// * `format` - Pixel format the client accepted
    ///
    /// # Returns
    ///
    /// Encoded data as `BytesMut`
    fn encode(&self, data: &[u8], width: u16, height: u16, format: &PixelFormat) -> BytesMut;
}

/// Creates an encoder instance for the specified encoding type.
#[must_use]
pub fn get_encoder(encoding_type: i32) -> Option<Box<dyn Encoding + Send + Sync>> {
    match encoding_type {
        ENCODING_RAW => Some(Box::new(RawEncoding)),
        _ => None,
    }
}

/// One rectangle of an outgoing framebuffer update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRect {
    /// Position and size on the framebuffer.
    pub region: Region,
    /// Pixels in the server-native format, `region.area() * 4` bytes.
    pub pixels: Vec<u8>,
}

impl UpdateRect {
    /// Creates a rectangle from a region and its server-native pixels.
    #[must_use]
    pub fn new(region: Region, pixels: Vec<u8>) -> Self {
        Self { region, pixels }
    }
}

/// Serializes a complete `FramebufferUpdate` message.
///
/// Layout: message type (0), one padding byte, big-endian rectangle count, then
/// for each rectangle its 12-byte header followed by the encoded pixels.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // updates carry a handful of rectangles
pub fn encode_update(rects: &[UpdateRect], encoder: &dyn Encoding, format: &PixelFormat) -> BytesMut {
    let payload: usize = rects.iter().map(|r| 12 + r.region.area() * format.bytes_per_pixel()).sum();
    let mut buf = BytesMut::with_capacity(4 + payload);

    buf.put_u8(SERVER_MSG_FRAMEBUFFER_UPDATE);
    buf.put_u8(0); // padding
    buf.put_u16(rects.len() as u16);

    for rect in rects {
        Rectangle {
            x: rect.region.x,
            y: rect.region.y,
            width: rect.region.width,
            height: rect.region.height,
            encoding: encoder.id(),
        }
        .write_header(&mut buf);
        buf.extend_from_slice(&encoder.encode(&rect.pixels, rect.region.width, rect.region.height, format));
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{Color, Framebuffer};

    /// Minimal viewer-side parser for a raw 32bpp `FramebufferUpdate`.
    fn decode(buf: &[u8]) -> Vec<(Region, i32, Vec<Color>)> {
        assert_eq!(buf[0], 0);
        let count = u16::from_be_bytes([buf[2], buf[3]]);
        let mut pos = 4;
        let mut rects = Vec::new();
        for _ in 0..count {
            let word = |p: usize| u16::from_be_bytes([buf[p], buf[p + 1]]);
            let region = Region::new(word(pos), word(pos + 2), word(pos + 4), word(pos + 6));
            let encoding = i32::from_be_bytes([buf[pos + 8], buf[pos + 9], buf[pos + 10], buf[pos + 11]]);
            pos += 12;
            let len = region.area() * 4;
            let pixels = buf[pos..pos + len]
                .chunks_exact(4)
                .map(|px| Color::new(px[2], px[1], px[0]))
                .collect();
            pos += len;
            rects.push((region, encoding, pixels));
        }
        assert_eq!(pos, buf.len());
        rects
    }

    #[test]
    fn test_full_frame_round_trip() {
        let fb = Framebuffer::new(37, 21);
        let rect = UpdateRect::new(fb.full_region(), fb.read_all());
        let encoded = encode_update(&[rect], &RawEncoding, &PixelFormat::rgb888());

        assert_eq!(encoded.len(), 4 + 12 + 37 * 21 * 4);
        let decoded = decode(&encoded);
        assert_eq!(decoded.len(), 1);
        let (region, encoding, pixels) = &decoded[0];
        assert_eq!(*region, Region::new(0, 0, 37, 21));
        assert_eq!(*encoding, ENCODING_RAW);
        for y in 0..21u16 {
            for x in 0..37u16 {
                let idx = usize::from(y) * 37 + usize::from(x);
                assert_eq!(Some(pixels[idx]), fb.pixel(x, y));
            }
        }
    }

    #[test]
    fn test_header_layout() {
        let rect = UpdateRect::new(Region::new(2, 3, 1, 1), vec![9, 8, 7, 0]);
        let encoded = encode_update(&[rect], &RawEncoding, &PixelFormat::rgb888());
        assert_eq!(
            &encoded[..],
            &[0, 0, 0, 1, 0, 2, 0, 3, 0, 1, 0, 1, 0, 0, 0, 0, 9, 8, 7, 0]
        );
    }

    #[test]
    fn test_multiple_rects_and_translation() {
        let rects = [
            UpdateRect::new(Region::new(0, 0, 1, 1), vec![0, 0, 255, 0]),
            UpdateRect::new(Region::new(5, 5, 2, 1), vec![255, 0, 0, 0, 0, 255, 0, 0]),
        ];
        let encoded = encode_update(&rects, &RawEncoding, &PixelFormat::rgb565());
        assert_eq!(encoded.len(), 4 + 12 + 2 + 12 + 4);
        assert_eq!(&encoded[2..4], &[0, 2]);
        assert_eq!(&encoded[16..18], &0xF800u16.to_le_bytes());
    }

    #[test]
    fn test_only_raw_is_available() {
        assert_eq!(get_encoder(ENCODING_RAW).map(|e| e.id()), Some(ENCODING_RAW));
        assert!(get_encoder(7).is_none());
        assert!(get_encoder(16).is_none());
    }
}
