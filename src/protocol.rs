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

//! VNC Remote Framebuffer (RFB) protocol constants and structures.
//!
//! This module provides the fundamental building blocks for VNC protocol communication,
//! including protocol version negotiation, message types, security handshakes, encodings,
//! and pixel format definitions. It implements the subset of RFC 6143 needed to serve a
//! synthetic desktop with Raw encoding.
//!
//! # Protocol Overview
//!
//! The VNC RFB protocol operates in the following phases:
//! 1. **Protocol Version** - Server and client agree on protocol version
//! 2. **Security Handshake** - Authentication method selection and execution
//! 3. **Initialization** - Exchange of framebuffer parameters and capabilities
//! 4. **Normal Operation** - Ongoing message exchange for input events and screen updates

use crate::error::{Result, VncError};
use bytes::{Buf, BufMut, BytesMut};
use std::io::{self, Read};

/// The RFB protocol version string advertised by the server.
///
/// The version string must be exactly 12 bytes including the newline character.
pub const PROTOCOL_VERSION: &str = "RFB 003.008\n";

/// Length in bytes of a protocol version message.
pub const PROTOCOL_VERSION_LEN: usize = 12;

// Client-to-Server Message Types

/// `SetPixelFormat`: the client picks the format of subsequent updates.
pub const CLIENT_MSG_SET_PIXEL_FORMAT: u8 = 0;

/// `SetEncodings`: the client lists the encodings it understands.
pub const CLIENT_MSG_SET_ENCODINGS: u8 = 2;

/// Message type: Client requests a framebuffer update.
///
/// The client can request either an incremental update (changes only) or
/// a full refresh of a specified rectangular region.
pub const CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;

/// `KeyEvent`: a key went down or up.
pub const CLIENT_MSG_KEY_EVENT: u8 = 4;

/// `PointerEvent`: pointer moved or a button changed.
pub const CLIENT_MSG_POINTER_EVENT: u8 = 5;

/// `ClientCutText`: clipboard contents, ISO 8859-1.
pub const CLIENT_MSG_CLIENT_CUT_TEXT: u8 = 6;

// Server-to-Client Message Types

/// `FramebufferUpdate`: one or more rectangles of pixel data.
pub const SERVER_MSG_FRAMEBUFFER_UPDATE: u8 = 0;

// Encoding Types

/// Encoding type: Raw pixel data.
///
/// The simplest encoding that sends uncompressed pixel data directly.
/// High bandwidth but universally supported, and the only one this server emits.
pub const ENCODING_RAW: i32 = 0;

// Security Types

/// No authentication.
pub const SECURITY_TYPE_NONE: u8 = 1;

/// Security type: VNC Authentication.
///
/// Standard VNC authentication using DES-encrypted challenge-response.
/// The server sends a 16-byte challenge, which the client encrypts with
/// the password and returns.
pub const SECURITY_TYPE_VNC_AUTH: u8 = 2;

// Security Results

/// `SecurityResult` value for success.
pub const SECURITY_RESULT_OK: u32 = 0;

/// `SecurityResult` value for failure; a reason string follows in RFB 3.8.
pub const SECURITY_RESULT_FAILED: u32 = 1;

/// Largest clipboard payload accepted from a client; bigger ones are skipped.
pub const MAX_CUT_TEXT_LEN: u32 = 1024 * 1024;

/// Represents the pixel format of the VNC framebuffer.
///
/// This struct defines how pixel data is interpreted, including color depth,
/// endianness, and RGB component details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    /// Bits per pixel on the wire (8, 16 or 32).
    pub bits_per_pixel: u8,
    /// Number of useful bits within a pixel.
    pub depth: u8,
    /// Non-zero when multi-byte pixels are big-endian.
    pub big_endian_flag: u8,
    /// Non-zero for true colour; zero means a colour map, which is not supported.
    pub true_colour_flag: u8,
    /// Largest red value (`2^n - 1`).
    pub red_max: u16,
    /// Largest green value (`2^n - 1`).
    pub green_max: u16,
    /// Largest blue value (`2^n - 1`).
    pub blue_max: u16,
    /// Bit position of red within a pixel.
    pub red_shift: u8,
    /// Bit position of green within a pixel.
    pub green_shift: u8,
    /// Bit position of blue within a pixel.
    pub blue_shift: u8,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::rgb888()
    }
}

impl PixelFormat {
    /// The server's native format: 32 bpp little-endian with red in bits 16-23,
    /// green in 8-15 and blue in 0-7.
    ///
    /// On the wire each pixel is therefore the byte sequence `(blue, green, red, 0)`.
    #[must_use]
    pub fn rgb888() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// Creates a 16-bit RGB565 pixel format.
    ///
    /// RGB565 uses 5 bits for red, 6 bits for green, and 5 bits for blue.
    #[must_use]
    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 16,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 31,   // 5 bits
            green_max: 63, // 6 bits
            blue_max: 31,  // 5 bits
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// Number of bytes one pixel occupies on the wire.
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel / 8)
    }

    /// Validates that this pixel format is one the server can translate into.
    ///
    /// Only true-colour formats are supported; colour-mapped formats would need a
    /// `SetColourMapEntries` exchange this server never performs.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if !matches!(self.bits_per_pixel, 8 | 16 | 24 | 32) {
            return false;
        }

        if self.depth == 0 || self.depth > 32 {
            return false;
        }

        if self.true_colour_flag == 0 {
            return false;
        }

        #[allow(clippy::cast_possible_truncation)]
        // leading_zeros() of a u16 is at most 16, result always fits in u8
        let bits_needed = |max: u16| -> u8 { (16 - max.leading_zeros()) as u8 };

        let red_bits = bits_needed(self.red_max);
        let green_bits = bits_needed(self.green_max);
        let blue_bits = bits_needed(self.blue_max);

        if red_bits == 0 || green_bits == 0 || blue_bits == 0 {
            return false;
        }
        // Each max must be 2^n - 1, i.e. a contiguous run of low bits.
        let all_ones = |max: u16| (u32::from(max) & (u32::from(max) + 1)) == 0;
        if !(all_ones(self.red_max) && all_ones(self.green_max) && all_ones(self.blue_max)) {
            return false;
        }
        if red_bits + green_bits + blue_bits > self.bits_per_pixel {
            return false;
        }

        let fits = |shift: u8, bits: u8| u32::from(shift) + u32::from(bits) <= u32::from(self.bits_per_pixel);
        fits(self.red_shift, red_bits) && fits(self.green_shift, green_bits) && fits(self.blue_shift, blue_bits)
    }

    /// Writes the pixel format data into a `BytesMut` buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.bits_per_pixel);
        buf.put_u8(self.depth);
        buf.put_u8(self.big_endian_flag);
        buf.put_u8(self.true_colour_flag);
        buf.put_u16(self.red_max);
        buf.put_u16(self.green_max);
        buf.put_u16(self.blue_max);
        buf.put_u8(self.red_shift);
        buf.put_u8(self.green_shift);
        buf.put_u8(self.blue_shift);
        buf.put_bytes(0, 3); // padding
    }

    /// Reads and deserializes a `PixelFormat` from a buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err(io::Error)` if there are not enough bytes in the buffer
    /// to read a complete `PixelFormat`.
    pub fn from_bytes<B: Buf>(buf: &mut B) -> io::Result<Self> {
        if buf.remaining() < 16 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Not enough bytes for PixelFormat",
            ));
        }

        let pf = Self {
            bits_per_pixel: buf.get_u8(),
            depth: buf.get_u8(),
            big_endian_flag: buf.get_u8(),
            true_colour_flag: buf.get_u8(),
            red_max: buf.get_u16(),
            green_max: buf.get_u16(),
            blue_max: buf.get_u16(),
            red_shift: buf.get_u8(),
            green_shift: buf.get_u8(),
            blue_shift: buf.get_u8(),
        };
        buf.advance(3);
        Ok(pf)
    }
}

/// `ServerInit`: the last handshake message, describing the desktop.
#[derive(Debug, Clone)]
pub struct ServerInit {
    /// Framebuffer width in pixels.
    pub framebuffer_width: u16,
    /// Framebuffer height in pixels.
    pub framebuffer_height: u16,
    /// Server-native pixel format.
    pub pixel_format: PixelFormat,
    /// The name of the desktop.
    pub name: String,
}

impl ServerInit {
    /// Serializes the `ServerInit` message into a byte buffer.
    ///
    /// - 2 bytes: framebuffer width
    /// - 2 bytes: framebuffer height
    /// - 16 bytes: pixel format
    /// - 4 bytes: name length
    /// - N bytes: name string (UTF-8)
    #[allow(clippy::cast_possible_truncation)] // Desktop name length limited to u32 per VNC protocol
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16(self.framebuffer_width);
        buf.put_u16(self.framebuffer_height);
        self.pixel_format.write_to(buf);

        let name_bytes = self.name.as_bytes();
        buf.put_u32(name_bytes.len() as u32);
        buf.put_slice(name_bytes);
    }
}

/// A parsed client-to-server message.
///
/// Produced by [`ClientMessage::read_from`]. Unknown discriminants become
/// [`ClientMessage::Unsupported`] and payloads the server refuses to hold become
/// [`ClientMessage::Malformed`]; neither ends the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Client requests a specific pixel format for framebuffer updates.
    SetPixelFormat(PixelFormat),

    /// Client specifies the list of encodings it supports.
    SetEncodings(Vec<i32>),

    /// Client requests a framebuffer update for a specific region.
    FramebufferUpdateRequest {
        /// If true, only send changes since the last update; if false, send full refresh.
        incremental: bool,
        /// X coordinate of the requested region.
        x: u16,
        /// Y coordinate of the requested region.
        y: u16,
        /// Width of the requested region.
        width: u16,
        /// Height of the requested region.
        height: u16,
    },

    /// Client sends a keyboard key event.
    KeyEvent {
        /// True if the key is pressed, false if released.
        down: bool,
        /// The X Window System keysym value of the key.
        key: u32,
    },

    /// Client sends a pointer (mouse) event.
    PointerEvent {
        /// Bitmask of currently pressed mouse buttons.
        button_mask: u8,
        /// X coordinate of the pointer.
        x: u16,
        /// Y coordinate of the pointer.
        y: u16,
    },

    /// Client sends clipboard (cut text) data.
    ClientCutText(String),

    /// A message type this server does not know; only the type byte was consumed.
    Unsupported(u8),

    /// A known message whose payload was consumed but discarded.
    Malformed {
        /// The message type byte.
        message_type: u8,
        /// Why the payload was discarded.
        reason: String,
    },
}

impl ClientMessage {
    /// Reads exactly one client message from `reader`.
    ///
    /// The payload of every known message type is consumed in full, so the stream
    /// stays aligned on message boundaries afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::ConnectionClosed`] on end of stream and
    /// [`VncError::Io`] for any other transport failure.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut kind = [0u8; 1];
        read_exact(reader, &mut kind)?;

        match kind[0] {
            CLIENT_MSG_SET_PIXEL_FORMAT => {
                let mut payload = [0u8; 19];
                read_exact(reader, &mut payload)?;
                let mut buf = &payload[3..];
                Ok(Self::SetPixelFormat(PixelFormat::from_bytes(&mut buf)?))
            }
            CLIENT_MSG_SET_ENCODINGS => {
                let mut header = [0u8; 3];
                read_exact(reader, &mut header)?;
                let count = usize::from(u16::from_be_bytes([header[1], header[2]]));
                let mut payload = vec![0u8; count * 4];
                read_exact(reader, &mut payload)?;
                let encodings = payload
                    .chunks_exact(4)
                    .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok(Self::SetEncodings(encodings))
            }
            CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST => {
                let mut payload = [0u8; 9];
                read_exact(reader, &mut payload)?;
                let mut buf = &payload[..];
                Ok(Self::FramebufferUpdateRequest {
                    incremental: buf.get_u8() != 0,
                    x: buf.get_u16(),
                    y: buf.get_u16(),
                    width: buf.get_u16(),
                    height: buf.get_u16(),
                })
            }
            CLIENT_MSG_KEY_EVENT => {
                let mut payload = [0u8; 7];
                read_exact(reader, &mut payload)?;
                let mut buf = &payload[..];
                let down = buf.get_u8() != 0;
                buf.advance(2);
                Ok(Self::KeyEvent {
                    down,
                    key: buf.get_u32(),
                })
            }
            CLIENT_MSG_POINTER_EVENT => {
                let mut payload = [0u8; 5];
                read_exact(reader, &mut payload)?;
                let mut buf = &payload[..];
                Ok(Self::PointerEvent {
                    button_mask: buf.get_u8(),
                    x: buf.get_u16(),
                    y: buf.get_u16(),
                })
            }
            CLIENT_MSG_CLIENT_CUT_TEXT => {
                let mut header = [0u8; 7];
                read_exact(reader, &mut header)?;
                let len = u32::from_be_bytes([header[3], header[4], header[5], header[6]]);
                if len > MAX_CUT_TEXT_LEN {
                    let skipped = io::copy(&mut reader.take(u64::from(len)), &mut io::sink())?;
                    if skipped < u64::from(len) {
                        return Err(VncError::ConnectionClosed);
                    }
                    return Ok(Self::Malformed {
                        message_type: CLIENT_MSG_CLIENT_CUT_TEXT,
                        reason: format!("cut text of {len} bytes exceeds {MAX_CUT_TEXT_LEN}"),
                    });
                }
                let mut text = vec![0u8; len as usize];
                read_exact(reader, &mut text)?;
                // ClientCutText is ISO 8859-1, which maps 1:1 onto the first 256 code points.
                Ok(Self::ClientCutText(text.iter().map(|&b| char::from(b)).collect()))
            }
            other => Ok(Self::Unsupported(other)),
        }
    }
}

/// Reads exactly `buf.len()` bytes, mapping end of stream to [`VncError::ConnectionClosed`].
///
/// # Errors
///
/// Propagates transport failures as [`VncError::Io`].
pub fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            VncError::ConnectionClosed
        } else {
            VncError::Io(e)
        }
    })
}

/// Represents a rectangle header in a framebuffer update message.
///
/// Each framebuffer update can contain multiple rectangles, each with its own
/// encoding type. The rectangle header specifies the position, dimensions,
/// and encoding of the pixel data that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    /// X coordinate of the top-left corner.
    pub x: u16,
    /// Y coordinate of the top-left corner.
    pub y: u16,
    /// Width of the rectangle in pixels.
    pub width: u16,
    /// Height of the rectangle in pixels.
    pub height: u16,
    /// The encoding type used for this rectangle's pixel data.
    pub encoding: i32,
}

impl Rectangle {
    /// Writes the rectangle header to a byte buffer.
    ///
    /// The header format is:
    /// - 2 bytes: x position
    /// - 2 bytes: y position
    /// - 2 bytes: width
    /// - 2 bytes: height
    /// - 4 bytes: encoding type (signed 32-bit integer)
    pub fn write_header(&self, buf: &mut BytesMut) {
        buf.put_u16(self.x);
        buf.put_u16(self.y);
        buf.put_u16(self.width);
        buf.put_u16(self.height);
        buf.put_i32(self.encoding);
    }
}
