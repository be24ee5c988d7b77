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


//! VNC Raw encoding implementation.
//!
//! The simplest encoding that sends pixel data directly without compression.
//! High bandwidth but universally supported.

use super::Encoding;
use crate::protocol::{PixelFormat, ENCODING_RAW};
use crate::translate::translate_pixels;
use bytes::BytesMut;

/// Implements the VNC "Raw" encoding, which sends pixel data directly without compression.
///
/// With the server-native format each pixel goes out as `(blue, green, red, 0)`;
/// any other accepted format is produced by [`translate_pixels`].
pub struct RawEncoding;

impl Encoding for RawEncoding {
    fn id(&self) -> i32 {
        ENCODING_RAW
    }

    fn encode(&self, data: &[u8], width: u16, height: u16, format: &PixelFormat) -> BytesMut {
        let expected = usize::from(width) * usize::from(height) * 4;
        debug_assert_eq!(data.len(), expected, "raw rectangle size mismatch");
        translate_pixels(&data[..expected.min(data.len())], &PixelFormat::rgb888(), format)
    }
}
