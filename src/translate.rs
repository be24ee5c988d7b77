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


//! Pixel format translation between server and client formats.
//!
//! The framebuffer is always read out in the server-native format
//! ([`PixelFormat::rgb888`]). When a client has negotiated a different true-colour
//! format through `SetPixelFormat`, outgoing rectangles are converted here, pixel by
//! pixel, before they are written to the socket.
//!
//! # Supported Formats
//!
//! - **32bpp**: any shift layout, either endianness
//! - **24bpp**: packed 3-byte pixels
//! - **16bpp**: RGB565, RGB555, BGR565, BGR555
//! - **8bpp**: true-colour layouts such as BGR233

use crate::protocol::PixelFormat;
use bytes::BytesMut;

/// Translates pixel data from the server format to the client's requested format.
///
/// # Arguments
///
/// * `src` - Source pixel data in `server_format` (4 bytes per pixel)
/// * `server_format` - The server's pixel format
/// * `client_format` - The client's accepted pixel format
///
/// # Returns
///
/// A `BytesMut` containing the translated pixel data in the client's format.
/// A trailing partial pixel in `src` is ignored.
#[must_use]
pub fn translate_pixels(
    src: &[u8],
    server_format: &PixelFormat,
    client_format: &PixelFormat,
) -> BytesMut {
    // Fast path: no translation needed
    if pixel_formats_equal(server_format, client_format) {
        return BytesMut::from(src);
    }

    let src_bpp = server_format.bytes_per_pixel().max(1);
    let dst_bpp = client_format.bytes_per_pixel().max(1);
    let mut dst = BytesMut::with_capacity(src.len() / src_bpp * dst_bpp);

    for pixel in src.chunks_exact(src_bpp) {
        let (r, g, b) = extract_rgb(pixel, server_format);
        pack_pixel(&mut dst, r, g, b, client_format);
    }

    dst
}

/// Extracts RGB components from a pixel in the given format.
///
/// # Returns
///
/// A tuple `(r, g, b)` with each component as a u8 value (0-255).
fn extract_rgb(pixel: &[u8], format: &PixelFormat) -> (u8, u8, u8) {
    let big_endian = format.big_endian_flag != 0;
    let pixel_value = match format.bits_per_pixel {
        16 if big_endian => u32::from(u16::from_be_bytes([pixel[0], pixel[1]])),
        16 => u32::from(u16::from_le_bytes([pixel[0], pixel[1]])),
        24 if big_endian => u32::from(pixel[0]) << 16 | u32::from(pixel[1]) << 8 | u32::from(pixel[2]),
        24 => u32::from(pixel[2]) << 16 | u32::from(pixel[1]) << 8 | u32::from(pixel[0]),
        32 if big_endian => u32::from_be_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]),
        32 => u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]),
        _ => u32::from(pixel[0]),
    };

    let r_raw = (pixel_value >> format.red_shift) & u32::from(format.red_max);
    let g_raw = (pixel_value >> format.green_shift) & u32::from(format.green_max);
    let b_raw = (pixel_value >> format.blue_shift) & u32::from(format.blue_max);

    (
        scale_component(r_raw, format.red_max),
        scale_component(g_raw, format.green_max),
        scale_component(b_raw, format.blue_max),
    )
}

/// Packs RGB components into the client's pixel format and appends them to `dst`.
#[allow(clippy::cast_possible_truncation)] // truncation to the pixel width is the point
fn pack_pixel(dst: &mut BytesMut, r: u8, g: u8, b: u8, format: &PixelFormat) {
    let pixel_value = (u32::from(downscale_component(r, format.red_max)) << format.red_shift)
        | (u32::from(downscale_component(g, format.green_max)) << format.green_shift)
        | (u32::from(downscale_component(b, format.blue_max)) << format.blue_shift);

    let big_endian = format.big_endian_flag != 0;
    match format.bits_per_pixel {
        16 if big_endian => dst.extend_from_slice(&(pixel_value as u16).to_be_bytes()),
        16 => dst.extend_from_slice(&(pixel_value as u16).to_le_bytes()),
        24 if big_endian => {
            dst.extend_from_slice(&[(pixel_value >> 16) as u8, (pixel_value >> 8) as u8, pixel_value as u8]);
        }
        24 => dst.extend_from_slice(&[pixel_value as u8, (pixel_value >> 8) as u8, (pixel_value >> 16) as u8]),
        32 if big_endian => dst.extend_from_slice(&pixel_value.to_be_bytes()),
        32 => dst.extend_from_slice(&pixel_value.to_le_bytes()),
        _ => dst.extend_from_slice(&[pixel_value as u8]),
    }
}

/// Scales a color component from its format-specific range to 8-bit (0-255).
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn scale_component(value: u32, max: u16) -> u8 {
    match max {
        0 => 0,
        255 => value as u8,
        _ => ((u64::from(value) * 255) / u64::from(max)) as u8,
    }
}

/// Downscales a color component from 8-bit (0-255) to the format-specific range.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn downscale_component(value: u8, max: u16) -> u16 {
    match max {
        0 => 0,
        255 => u16::from(value),
        _ => ((u32::from(value) * u32::from(max)) / 255) as u16,
    }
}

/// Checks if two pixel formats produce identical bytes (no translation needed).
fn pixel_formats_equal(a: &PixelFormat, b: &PixelFormat) -> bool {
    a.bits_per_pixel == b.bits_per_pixel
        && a.depth == b.depth
        && (a.big_endian_flag == b.big_endian_flag || a.bits_per_pixel == 8)
        && a.true_colour_flag == b.true_colour_flag
        && a.red_max == b.red_max
        && a.green_max == b.green_max
        && a.blue_max == b.blue_max
        && a.red_shift == b.red_shift
        && a.green_shift == b.green_shift
        && a.blue_shift == b.blue_shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_translation() {
        let server_format = PixelFormat::rgb888();
        let client_format = PixelFormat::rgb888();

        let src = vec![0u8, 0, 255, 0, 0, 255, 0, 0]; // Red, Green pixels
        let dst = translate_pixels(&src, &server_format, &client_format);

        assert_eq!(&src[..], &dst[..]);
    }

    #[test]
    fn test_rgb888_to_rgb565() {
        let server_format = PixelFormat::rgb888();
        let client_format = PixelFormat::rgb565();

        // Pure red on the wire is (B, G, R, 0)
        let src = vec![0u8, 0, 255, 0];
        let dst = translate_pixels(&src, &server_format, &client_format);

        // In RGB565: red=(255*31/255)<<11 = 31<<11 = 0xF800
        assert_eq!(dst.len(), 2);
        let value = u16::from_le_bytes([dst[0], dst[1]]);
        assert_eq!(value, 0xF800);
    }

    #[test]
    fn test_rgb888_to_big_endian_rgbx() {
        let server_format = PixelFormat::rgb888();
        let mut client_format = PixelFormat::rgb888();
        client_format.big_endian_flag = 1;
        client_format.red_shift = 24;
        client_format.green_shift = 16;
        client_format.blue_shift = 8;

        let src = vec![30u8, 20, 10, 0];
        let dst = translate_pixels(&src, &server_format, &client_format);
        assert_eq!(&dst[..], &[10, 20, 30, 0]);
    }

    #[test]
    fn test_extract_rgb_rgb888() {
        let format = PixelFormat::rgb888();
        let pixel = [32u8, 64, 128, 0];

        let (r, g, b) = extract_rgb(&pixel, &format);
        assert_eq!(r, 128);
        assert_eq!(g, 64);
        assert_eq!(b, 32);
    }

    #[test]
    fn test_scale_component() {
        // 5-bit (0-31) to 8-bit (0-255)
        assert_eq!(scale_component(0, 31), 0);
        assert_eq!(scale_component(31, 31), 255);
        assert_eq!(scale_component(15, 31), 123); // 15 * 255 / 31 = 123.387... = 123

        // Identity: 8-bit to 8-bit
        assert_eq!(scale_component(128, 255), 128);
    }

    #[test]
    fn test_downscale_component() {
        // 8-bit (0-255) to 5-bit (0-31)
        assert_eq!(downscale_component(0, 31), 0);
        assert_eq!(downscale_component(255, 31), 31);
        assert_eq!(downscale_component(128, 31), 15); // ~half

        // Identity: 8-bit to 8-bit
        assert_eq!(downscale_component(128, 255), 128);
    }
}
