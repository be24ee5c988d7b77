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

//! Shared framebuffer holding the synthetic desktop.
//!
//! The framebuffer is a fixed-size, row-major grid of RGB pixels behind a single
//! mutex. Every full-grid read and every region write takes that lock, so sessions
//! running on different threads never observe a half-written rectangle.
//!
//! All coordinates handed to [`Framebuffer::set_region`] are clamped to the grid;
//! callers may pass rectangles hanging off any edge.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Layout of the synthetic desktop is authored against this size and scaled.
const REFERENCE_WIDTH: u32 = 1024;
const REFERENCE_HEIGHT: u32 = 768;

const TOP_BAR: Color = Color::new(52, 73, 94);
const TASKBAR: Color = Color::new(44, 62, 80);
const ICON: Color = Color::new(255, 255, 255);

/// A 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Creates a colour from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Encodes the colour in the server's native pixel format: `(blue, green, red, 0)`.
    #[must_use]
    pub const fn to_wire(self) -> [u8; 4] {
        [self.b, self.g, self.r, 0]
    }
}

/// An axis-aligned rectangle in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Left edge.
    pub x: u16,
    /// Top edge.
    pub y: u16,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
}

impl Region {
    /// Creates a region.
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Number of pixels covered.
    #[must_use]
    pub fn area(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// The shared pixel grid.
///
/// Width and height are fixed for the lifetime of the value.
#[derive(Debug)]
pub struct Framebuffer {
    width: u16,
    height: u16,
    pixels: Mutex<Vec<Color>>,
}

impl Framebuffer {
    /// Creates a framebuffer painted with the synthetic desktop.
    ///
    /// Painting is deterministic: the same size always yields the same image.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: Mutex::new(paint_desktop(width, height)),
        }
    }

    /// Creates a framebuffer filled with a single colour.
    #[must_use]
    pub fn filled(width: u16, height: u16, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: Mutex::new(vec![color; usize::from(width) * usize::from(height)]),
        }
    }

    /// Framebuffer width in pixels.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Framebuffer height in pixels.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The region covering the whole framebuffer.
    #[must_use]
    pub fn full_region(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Intersects a possibly out-of-range rectangle with the framebuffer bounds.
    ///
    /// Returns `None` when nothing of the rectangle lies on the grid.
    #[must_use]
    pub fn clamp(&self, x: i32, y: i32, width: u32, height: u32) -> Option<Region> {
        let clamp_axis = |start: i32, len: u32, limit: u16| -> Option<(u16, u16)> {
            let start = i64::from(start);
            let end = start + i64::from(len);
            let lo = start.clamp(0, i64::from(limit));
            let hi = end.clamp(0, i64::from(limit));
            if hi <= lo {
                return None;
            }
            // Both bounds are within 0..=limit, which is a u16.
            Some((u16::try_from(lo).ok()?, u16::try_from(hi - lo).ok()?))
        };

        let (cx, cw) = clamp_axis(x, width, self.width)?;
        let (cy, ch) = clamp_axis(y, height, self.height)?;
        Some(Region::new(cx, cy, cw, ch))
    }

    /// Fills a rectangle with `color`, clamping it to the framebuffer first.
    ///
    /// Returns the region actually written, or `None` if the rectangle lies
    /// entirely outside the grid. The lock is held only for the fill itself.
    pub fn set_region(&self, x: i32, y: i32, width: u32, height: u32, color: Color) -> Option<Region> {
        let region = self.clamp(x, y, width, height)?;
        let mut pixels = self.lock();
        fill(&mut pixels, self.width, region, color);
        Some(region)
    }

    /// Returns the colour at `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = usize::from(y) * usize::from(self.width) + usize::from(x);
        self.lock().get(idx).copied()
    }

    /// Copies a region out as server-native pixel bytes (4 bytes per pixel, row-major).
    ///
    /// The region is clamped to the grid; the copy happens under the lock so it
    /// never mixes pixels from before and after a concurrent write.
    #[must_use]
    pub fn read_region(&self, region: Region) -> Vec<u8> {
        let Some(region) = self.clamp(
            i32::from(region.x),
            i32::from(region.y),
            u32::from(region.width),
            u32::from(region.height),
        ) else {
            return Vec::new();
        };

        let stride = usize::from(self.width);
        let mut out = Vec::with_capacity(region.area() * 4);
        let pixels = self.lock();
        for row in usize::from(region.y)..usize::from(region.y) + usize::from(region.height) {
            let start = row * stride + usize::from(region.x);
            for color in &pixels[start..start + usize::from(region.width)] {
                out.extend_from_slice(&color.to_wire());
            }
        }
        out
    }

    /// Copies the whole grid out as server-native pixel bytes.
    #[must_use]
    pub fn read_all(&self) -> Vec<u8> {
        self.read_region(self.full_region())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Color>> {
        // A panicking writer cannot leave a pixel half-written, so the data is still usable.
        self.pixels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fill(pixels: &mut [Color], stride: u16, region: Region, color: Color) {
    let stride = usize::from(stride);
    for row in usize::from(region.y)..usize::from(region.y) + usize::from(region.height) {
        let start = row * stride + usize::from(region.x);
        pixels[start..start + usize::from(region.width)].fill(color);
    }
}

/// A window drawn onto the synthetic desktop, in reference coordinates.
struct Window {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    title: Color,
    body: Color,
}

const WINDOWS: [Window; 3] = [
    Window { x0: 100, y0: 100, x1: 400, y1: 300, title: Color::new(41, 128, 185), body: Color::new(236, 240, 241) },
    Window { x0: 500, y0: 200, x1: 800, y1: 400, title: Color::new(231, 76, 60), body: Color::new(46, 204, 113) },
    Window { x0: 300, y0: 430, x1: 700, y1: 650, title: Color::new(142, 68, 173), body: Color::new(253, 246, 227) },
];

const TITLE_BAR_HEIGHT: u32 = 30;
const BAR_HEIGHT: u32 = 50;
const ICON_RADIUS: u32 = 20;

fn paint_desktop(width: u16, height: u16) -> Vec<Color> {
    let (w, h) = (u32::from(width), u32::from(height));
    let mut pixels = Vec::with_capacity(usize::from(width) * usize::from(height));

    for y in 0..h {
        for x in 0..w {
            pixels.push(background(x, y, w, h));
        }
    }

    let sx = |v: u32| v * w / REFERENCE_WIDTH;
    let sy = |v: u32| v * h / REFERENCE_HEIGHT;
    let mut paint = |x0: u32, y0: u32, x1: u32, y1: u32, color: Color| {
        let (x0, x1) = (x0.min(w), x1.min(w));
        let (y0, y1) = (y0.min(h), y1.min(h));
        if x1 > x0 && y1 > y0 {
            // Bounds were just limited to the u16 framebuffer size.
            let region = Region::new(x0 as u16, y0 as u16, (x1 - x0) as u16, (y1 - y0) as u16);
            fill(&mut pixels, width, region, color);
        }
    };

    let bar = sy(BAR_HEIGHT);
    paint(0, 0, w, bar, TOP_BAR);
    paint(0, h.saturating_sub(bar), w, h, TASKBAR);

    for win in &WINDOWS {
        let (x0, y0, x1, y1) = (sx(win.x0), sy(win.y0), sx(win.x1), sy(win.y1));
        let title_end = (y0 + sy(TITLE_BAR_HEIGHT)).min(y1);
        paint(x0, y0, x1, title_end, win.title);
        paint(x0, title_end, x1, y1, win.body);
    }

    // Desktop icons: a column of discs down the left edge.
    let radius = sx(ICON_RADIUS).min(sy(ICON_RADIUS));
    for i in 0..4u32 {
        let (cx, cy) = (sx(50), sy(100 + i * 80));
        for dy in 0..=2 * radius {
            for dx in 0..=2 * radius {
                let (px, py) = ((cx + dx).checked_sub(radius), (cy + dy).checked_sub(radius));
                let (Some(px), Some(py)) = (px, py) else { continue };
                let (ddx, ddy) = (dx.abs_diff(radius), dy.abs_diff(radius));
                if px < w && py < h && ddx * ddx + ddy * ddy <= radius * radius {
                    pixels[(py * w + px) as usize] = ICON;
                }
            }
        }
    }

    pixels
}

/// Blue-to-purple vertical gradient with a faint horizontal tint.
#[allow(clippy::cast_possible_truncation)] // every channel is computed in 0..=255
fn background(x: u32, y: u32, w: u32, h: u32) -> Color {
    let fy = y * 255 / h.max(1);
    let fx = x * 255 / w.max(1);
    Color::new(
        (52 + fy * 100 / 255) as u8,
        (152 - fy * 50 / 255) as u8,
        (169 + fy * 50 / 255 + fx * 30 / 255) as u8,
    )
}
