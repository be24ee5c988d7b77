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

//! Per-client session handling.
//!
//! A [`ClientSession`] owns one connected stream. It runs the handshake, then reads
//! one client message per iteration and answers it:
//!
//! - `FramebufferUpdateRequest` with `incremental = 0` gets one rectangle covering
//!   the whole framebuffer; with `incremental = 1` it gets a small rectangle of
//!   random pixels at a random spot, standing in for damage tracking.
//! - `KeyEvent` and `PointerEvent` (left button) paint a rectangle into the shared
//!   framebuffer and stream it straight back to this session only. A click is
//!   followed 100 ms later by a green flash of the same rectangle.
//! - Everything else is logged and otherwise ignored.
//!
//! Sessions block on socket reads and writes. The stream is expected to carry short
//! read and write timeouts; on every timeout the session checks the server's running
//! flag (and, while reading, its idle timeout), so shutdown and idle disconnects do
//! not depend on the client reading or sending anything.

use crate::auth::VncAuth;
use crate::config::ServerConfig;
use crate::encoding::{encode_update, get_encoder, Encoding, RawEncoding, UpdateRect};
use crate::error::{Result, VncError};
use crate::events::{EventSink, ServerEvent};
use crate::framebuffer::{Color, Framebuffer, Region};
use crate::handshake::{Handshake, HandshakeOutcome};
use crate::protocol::{ClientMessage, PixelFormat, ServerInit, ENCODING_RAW};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Size of the rectangle painted for a key press.
const KEY_RECT: (u32, u32) = (100, 50);

/// Side of the square painted around a pointer click.
const CLICK_SIZE: u32 = 50;

/// Bounds for each side of the synthetic incremental-update rectangle.
const DAMAGE_MIN: u32 = 16;
const DAMAGE_MAX: u32 = 64;

/// Colour painted under a left click.
pub const HIGHLIGHT: Color = Color::new(255, 0, 0);

/// Colour of the follow-up flash sent after a click; never stored.
pub const FLASH: Color = Color::new(0, 255, 0);

/// Delay between the click highlight and the flash.
const FLASH_DELAY: Duration = Duration::from_millis(100);

/// Colours keyed off the keysym of a key event.
pub const KEY_PALETTE: [Color; 8] = [
    Color::new(46, 204, 113),
    Color::new(231, 76, 60),
    Color::new(52, 152, 219),
    Color::new(241, 196, 15),
    Color::new(155, 89, 182),
    Color::new(26, 188, 156),
    Color::new(230, 126, 34),
    Color::new(236, 240, 241),
];

/// Colour painted for a key event.
#[must_use]
pub fn key_color(keysym: u32) -> Color {
    KEY_PALETTE[(keysym % KEY_PALETTE.len() as u32) as usize]
}

/// Everything a session shares with the server that spawned it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The shared framebuffer.
    pub framebuffer: Arc<Framebuffer>,
    /// Startup configuration.
    pub config: Arc<ServerConfig>,
    /// Cleared when the server stops.
    pub running: Arc<AtomicBool>,
    /// Where input and lifecycle events go.
    pub events: EventSink,
}

/// One connected VNC client.
pub struct ClientSession<S> {
    id: usize,
    peer: SocketAddr,
    stream: S,
    ctx: SessionContext,
    pixel_format: PixelFormat,
    encodings: Vec<i32>,
    encoder: Box<dyn Encoding + Send + Sync>,
    incremental: bool,
    last_activity: Instant,
    rng: StdRng,
}

impl<S: Read + Write> ClientSession<S> {
    /// Creates a session for an accepted stream.
    pub fn new(id: usize, peer: SocketAddr, stream: S, ctx: SessionContext) -> Self {
        let rng = match ctx.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => StdRng::from_entropy(),
        };
        Self {
            id,
            peer,
            stream,
            ctx,
            pixel_format: PixelFormat::rgb888(),
            encodings: Vec::new(),
            encoder: Box::new(RawEncoding),
            incremental: false,
            last_activity: Instant::now(),
            rng,
        }
    }

    /// Client identifier.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Peer address.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the last update request was incremental.
    #[must_use]
    pub fn incremental(&self) -> bool {
        self.incremental
    }

    /// Pixel format updates are currently sent in.
    #[must_use]
    pub fn pixel_format(&self) -> &PixelFormat {
        &self.pixel_format
    }

    /// Encodings from the last `SetEncodings`, in client preference order.
    #[must_use]
    pub fn encodings(&self) -> &[i32] {
        &self.encodings
    }

    /// Runs the handshake and then the message loop until the client goes away.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session; [`VncError::ConnectionClosed`]
    /// for an orderly disconnect.
    pub fn run(mut self) -> Result<()> {
        let outcome = self.handshake()?;
        info!(
            "Client {} ({}) established, version {:?}, shared={}",
            self.id, self.peer, outcome.client_version, outcome.shared
        );

        if self.ctx.config.push_initial_frame {
            self.send_full_frame()?;
        }

        loop {
            let message = self.next_message()?;
            self.handle_message(message)?;
        }
    }

    fn handshake(&mut self) -> Result<HandshakeOutcome> {
        let fb = &self.ctx.framebuffer;
        let server_init = ServerInit {
            framebuffer_width: fb.width(),
            framebuffer_height: fb.height(),
            pixel_format: PixelFormat::rgb888(),
            name: self.ctx.config.desktop_name.clone(),
        };
        let auth = self.ctx.config.password.as_deref().map(VncAuth::new);
        Handshake::new(server_init, auth).run(&mut self.poller())
    }

    fn next_message(&mut self) -> Result<ClientMessage> {
        ClientMessage::read_from(&mut self.poller())
    }

    fn poller(&mut self) -> Poller<'_, S> {
        Poller {
            stream: &mut self.stream,
            running: &self.ctx.running,
            config: &self.ctx.config,
            last_activity: &mut self.last_activity,
        }
    }

    /// Dispatches one parsed client message.
    ///
    /// # Errors
    ///
    /// Only transport errors while writing a response are returned.
    pub fn handle_message(&mut self, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::SetPixelFormat(format) => {
                if format.is_valid() {
                    info!("Client {}: accepted pixel format {:?}", self.id, format);
                    self.pixel_format = format;
                } else {
                    warn!(
                        "Client {}: rejected pixel format {:?}, keeping {} bpp",
                        self.id, format, self.pixel_format.bits_per_pixel
                    );
                }
            }
            ClientMessage::SetEncodings(encodings) => {
                debug!("Client {}: encodings {:?}", self.id, encodings);
                if !encodings.contains(&ENCODING_RAW) {
                    debug!("Client {}: Raw not listed, using it anyway", self.id);
                }
                self.encoder = encodings
                    .iter()
                    .find_map(|&e| get_encoder(e))
                    .unwrap_or_else(|| Box::new(RawEncoding));
                self.encodings = encodings;
            }
            ClientMessage::FramebufferUpdateRequest {
                incremental,
                x,
                y,
                width,
                height,
            } => {
                debug!(
                    "Client {}: update request incremental={} ({},{} {}x{})",
                    self.id, incremental, x, y, width, height
                );
                self.incremental = incremental;
                if incremental {
                    self.send_synthetic_damage()?;
                } else {
                    self.send_full_frame()?;
                }
            }
            ClientMessage::KeyEvent { down, key } => {
                debug!("Client {}: key {:#x} down={}", self.id, key, down);
                self.ctx.events.emit(ServerEvent::KeyEvent {
                    client_id: self.id,
                    key,
                    pressed: down,
                });
                self.animate_key(key)?;
            }
            ClientMessage::PointerEvent { button_mask, x, y } => {
                debug!("Client {}: pointer ({}, {}) buttons={:#04b}", self.id, x, y, button_mask);
                self.ctx.events.emit(ServerEvent::PointerEvent {
                    client_id: self.id,
                    x,
                    y,
                    button_mask,
                });
                if button_mask & 1 != 0 {
                    self.animate_click(x, y)?;
                }
            }
            ClientMessage::ClientCutText(text) => {
                debug!("Client {}: {} bytes of cut text", self.id, text.len());
                self.ctx.events.emit(ServerEvent::ClipboardReceived {
                    client_id: self.id,
                    text,
                });
            }
            ClientMessage::Unsupported(kind) => {
                warn!("Client {}: ignoring unsupported message type {}", self.id, kind);
            }
            ClientMessage::Malformed { message_type, reason } => {
                warn!("Client {}: discarded message type {}: {}", self.id, message_type, reason);
            }
        }
        Ok(())
    }

    fn send_full_frame(&mut self) -> Result<()> {
        let fb = &self.ctx.framebuffer;
        let rect = UpdateRect::new(fb.full_region(), fb.read_all());
        self.send_update(&[rect])
    }

    fn send_synthetic_damage(&mut self) -> Result<()> {
        let fb = Arc::clone(&self.ctx.framebuffer);
        let w = self.rng.gen_range(DAMAGE_MIN..=DAMAGE_MAX);
        let h = self.rng.gen_range(DAMAGE_MIN..=DAMAGE_MAX);
        let (x, y) = self.random_origin(&fb, w, h);
        let Some(region) = fb.clamp(x, y, w, h) else {
            return Ok(());
        };

        let mut pixels = vec![0u8; region.area() * 4];
        self.rng.fill_bytes(&mut pixels);
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 0;
        }
        self.send_update(&[UpdateRect::new(region, pixels)])
    }

    fn animate_key(&mut self, key: u32) -> Result<()> {
        let fb = Arc::clone(&self.ctx.framebuffer);
        let (x, y) = self.random_origin(&fb, KEY_RECT.0, KEY_RECT.1);
        match fb.set_region(x, y, KEY_RECT.0, KEY_RECT.1, key_color(key)) {
            Some(region) => self.send_region(region),
            None => Ok(()),
        }
    }

    fn animate_click(&mut self, x: u16, y: u16) -> Result<()> {
        let half = (CLICK_SIZE / 2) as i32;
        let region = self.ctx.framebuffer.set_region(
            i32::from(x) - half,
            i32::from(y) - half,
            CLICK_SIZE,
            CLICK_SIZE,
            HIGHLIGHT,
        );
        let Some(region) = region else {
            return Ok(());
        };
        self.send_region(region)?;

        if self.ctx.config.click_flash {
            thread::sleep(FLASH_DELAY);
            let pixels = FLASH.to_wire().repeat(region.area());
            self.send_update(&[UpdateRect::new(region, pixels)])?;
        }
        Ok(())
    }

    /// Picks a top-left corner so that a `w`x`h` rectangle fits when possible.
    fn random_origin(&mut self, fb: &Framebuffer, w: u32, h: u32) -> (i32, i32) {
        let max_x = u32::from(fb.width()).saturating_sub(w);
        let max_y = u32::from(fb.height()).saturating_sub(h);
        // Both maxima are below u16::MAX.
        (self.rng.gen_range(0..=max_x) as i32, self.rng.gen_range(0..=max_y) as i32)
    }

    fn send_region(&mut self, region: Region) -> Result<()> {
        let pixels = self.ctx.framebuffer.read_region(region);
        self.send_update(&[UpdateRect::new(region, pixels)])
    }

    fn send_update(&mut self, rects: &[UpdateRect]) -> Result<()> {
        let buf = encode_update(rects, self.encoder.as_ref(), &self.pixel_format);
        let mut out = self.poller();
        out.write_all(&buf)?;
        out.flush()?;
        Ok(())
    }
}

/// Why a [`Poller`] gave up on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
enum PollerExit {
    #[error("server stopping")]
    Stopping,
    #[error("client idle")]
    Idle,
}

impl PollerExit {
    fn into_io(self) -> io::Error {
        let kind = match self {
            Self::Stopping => io::ErrorKind::ConnectionAborted,
            Self::Idle => io::ErrorKind::TimedOut,
        };
        io::Error::new(kind, self)
    }

    fn of(e: &io::Error) -> Option<Self> {
        e.get_ref()?.downcast_ref::<Self>().copied()
    }
}

/// Blocking stream wrapper that rides out socket timeouts.
///
/// A timed-out read is retried unless the server has stopped or the client has
/// been silent for longer than the configured idle timeout. A timed-out write
/// is retried until the server stops, so a client that stops reading cannot pin
/// its session past shutdown.
struct Poller<'a, S> {
    stream: &'a mut S,
    running: &'a AtomicBool,
    config: &'a ServerConfig,
    last_activity: &'a mut Instant,
}

impl<S: Read> Read for Poller<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.stream.read(buf) {
                Ok(n) => {
                    if n > 0 {
                        *self.last_activity = Instant::now();
                    }
                    return Ok(n);
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    if !self.running.load(Ordering::Relaxed) {
                        return Err(PollerExit::Stopping.into_io());
                    }
                    if let Some(limit) = self.config.idle_timeout {
                        if self.last_activity.elapsed() >= limit {
                            return Err(PollerExit::Idle.into_io());
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: Write> Write for Poller<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.stream.write(buf) {
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    if !self.running.load(Ordering::Relaxed) {
                        return Err(PollerExit::Stopping.into_io());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                result => return result,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Describes why a session ended, for the disconnect log line.
#[must_use]
pub fn describe_exit(result: &Result<()>) -> String {
    match result {
        Ok(()) => "finished".to_string(),
        Err(VncError::Io(e)) if PollerExit::of(e) == Some(PollerExit::Stopping) => "server stopping".to_string(),
        Err(VncError::Io(e)) if PollerExit::of(e) == Some(PollerExit::Idle) => "idle timeout".to_string(),
        Err(e) if e.is_disconnect() => "client disconnected".to_string(),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::tests::MockStream;
    use std::net::{IpAddr, Ipv4Addr};

    fn context(width: u16, height: u16) -> SessionContext {
        let config = ServerConfig {
            seed: Some(7),
            ..ServerConfig::with_size(width, height)
        };
        SessionContext {
            framebuffer: Arc::new(Framebuffer::new(width, height)),
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(true)),
            events: EventSink::new(),
        }
    }

    fn session(ctx: SessionContext) -> ClientSession<MockStream> {
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1234);
        ClientSession::new(1, peer, MockStream::new(Vec::new()), ctx)
    }

    fn rect_header(out: &[u8]) -> (u16, Region, i32) {
        let word = |p: usize| u16::from_be_bytes([out[p], out[p + 1]]);
        let encoding = i32::from_be_bytes([out[12], out[13], out[14], out[15]]);
        (word(2), Region::new(word(4), word(6), word(8), word(10)), encoding)
    }

    #[test]
    fn test_full_update_ignores_requested_subrect() {
        let mut s = session(context(64, 48));
        s.handle_message(ClientMessage::FramebufferUpdateRequest {
            incremental: false,
            x: 10,
            y: 10,
            width: 5,
            height: 5,
        })
        .unwrap();

        let out = &s.stream.output;
        let (count, region, encoding) = rect_header(out);
        assert_eq!(count, 1);
        assert_eq!(region, Region::new(0, 0, 64, 48));
        assert_eq!(encoding, ENCODING_RAW);
        assert_eq!(out.len(), 16 + 64 * 48 * 4);
        assert!(!s.incremental());
    }

    #[test]
    fn test_incremental_update_is_small_and_in_bounds() {
        let mut s = session(context(40, 30));
        for _ in 0..20 {
            s.stream.output.clear();
            s.handle_message(ClientMessage::FramebufferUpdateRequest {
                incremental: true,
                x: 0,
                y: 0,
                width: 40,
                height: 30,
            })
            .unwrap();
            let (count, region, _) = rect_header(&s.stream.output);
            assert_eq!(count, 1);
            assert!(region.x + region.width <= 40);
            assert!(region.y + region.height <= 30);
            assert!(region.area() >= 16 * 16);
            assert_eq!(s.stream.output.len(), 16 + region.area() * 4);
        }
        assert!(s.incremental());
    }

    #[test]
    fn test_click_paints_shared_framebuffer() {
        let ctx = context(200, 200);
        let fb = Arc::clone(&ctx.framebuffer);
        let mut s = session(ctx);
        s.handle_message(ClientMessage::PointerEvent { button_mask: 1, x: 100, y: 100 })
            .unwrap();

        let out = &s.stream.output;
        let (_, region, _) = rect_header(out);
        assert_eq!(region, Region::new(75, 75, 50, 50));
        assert_eq!(&out[16..20], &HIGHLIGHT.to_wire());

        // The green flash follows for the same region but is not stored.
        let flash = &out[16 + 50 * 50 * 4..];
        assert_eq!(rect_header(flash).1, region);
        assert_eq!(flash.len(), 16 + 50 * 50 * 4);
        assert!(flash[16..].chunks_exact(4).all(|px| px == FLASH.to_wire()));
        assert_eq!(fb.pixel(100, 100), Some(HIGHLIGHT));
    }

    #[test]
    fn test_click_flash_can_be_disabled() {
        let mut ctx = context(200, 200);
        ctx.config = Arc::new(ServerConfig {
            click_flash: false,
            ..(*ctx.config).clone()
        });
        let mut s = session(ctx);
        s.handle_message(ClientMessage::PointerEvent { button_mask: 1, x: 100, y: 100 })
            .unwrap();
        assert_eq!(s.stream.output.len(), 16 + 50 * 50 * 4);
    }

    #[test]
    fn test_click_near_corner_is_clamped() {
        let mut s = session(context(200, 200));
        s.handle_message(ClientMessage::PointerEvent { button_mask: 1, x: 5, y: 199 })
            .unwrap();
        let (_, region, _) = rect_header(&s.stream.output);
        assert_eq!(region, Region::new(0, 174, 30, 26));
    }

    #[test]
    fn test_pointer_move_without_button_sends_nothing() {
        let ctx = context(100, 100);
        let events = ctx.events.subscribe(8);
        let mut s = session(ctx);
        s.handle_message(ClientMessage::PointerEvent { button_mask: 0, x: 50, y: 50 })
            .unwrap();
        assert!(s.stream.output.is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            ServerEvent::PointerEvent { client_id: 1, x: 50, y: 50, button_mask: 0 }
        );
    }

    #[test]
    fn test_key_event_paints_keyed_color() {
        let ctx = context(300, 200);
        let fb = Arc::clone(&ctx.framebuffer);
        let mut s = session(ctx);
        s.handle_message(ClientMessage::KeyEvent { down: true, key: 0x61 }).unwrap();

        let (_, region, _) = rect_header(&s.stream.output);
        assert_eq!((region.width, region.height), (100, 50));
        assert_eq!(fb.pixel(region.x, region.y), Some(key_color(0x61)));
        assert_eq!(&s.stream.output[16..20], &key_color(0x61).to_wire());
    }

    #[test]
    fn test_key_event_on_tiny_framebuffer() {
        let mut s = session(context(10, 4));
        s.handle_message(ClientMessage::KeyEvent { down: false, key: 1 }).unwrap();
        let (_, region, _) = rect_header(&s.stream.output);
        assert_eq!(region, Region::new(0, 0, 10, 4));
    }

    #[test]
    fn test_pixel_format_negotiation() {
        let mut s = session(context(8, 8));
        s.handle_message(ClientMessage::SetPixelFormat(PixelFormat::rgb565())).unwrap();
        assert_eq!(s.pixel_format(), &PixelFormat::rgb565());

        let mut colour_mapped = PixelFormat::rgb888();
        colour_mapped.true_colour_flag = 0;
        s.handle_message(ClientMessage::SetPixelFormat(colour_mapped)).unwrap();
        assert_eq!(s.pixel_format(), &PixelFormat::rgb565());

        s.handle_message(ClientMessage::FramebufferUpdateRequest {
            incremental: false,
            x: 0,
            y: 0,
            width: 8,
            height: 8,
        })
        .unwrap();
        assert_eq!(s.stream.output.len(), 16 + 8 * 8 * 2);
    }

    #[test]
    fn test_encodings_recorded_but_raw_used() {
        let mut s = session(context(4, 4));
        s.handle_message(ClientMessage::SetEncodings(vec![16, 7, 5])).unwrap();
        assert_eq!(s.encodings(), &[16, 7, 5]);
        assert_eq!(s.encoder.id(), ENCODING_RAW);
    }

    #[test]
    fn test_unsupported_and_cut_text_do_not_fail() {
        let ctx = context(4, 4);
        let events = ctx.events.subscribe(8);
        let mut s = session(ctx);
        s.handle_message(ClientMessage::Unsupported(250)).unwrap();
        s.handle_message(ClientMessage::ClientCutText("hi".into())).unwrap();
        assert!(s.stream.output.is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            ServerEvent::ClipboardReceived { client_id: 1, text: "hi".into() }
        );
    }

    #[test]
    fn test_run_over_scripted_stream() {
        let mut input = b"RFB 003.008\n".to_vec();
        input.extend_from_slice(&[1, 1]);
        input.push(99); // unknown type
        input.extend_from_slice(&[3, 0, 0, 0, 0, 0, 0, 16, 0, 16]);
        let ctx = context(16, 16);
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1);
        let session = ClientSession::new(3, peer, MockStream::new(input), ctx);
        let result = session.run();
        assert!(matches!(result, Err(VncError::ConnectionClosed)));
        assert_eq!(describe_exit(&result), "client disconnected");
    }

    /// A peer that has stopped reading: every write times out.
    struct StalledPeer;

    impl Read for StalledPeer {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    impl Write for StalledPeer {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stalled_write_aborts_once_stopped() {
        let ctx = context(8, 8);
        ctx.running.store(false, Ordering::SeqCst);
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1);
        let mut s = ClientSession::new(1, peer, StalledPeer, ctx);
        let result = s.handle_message(ClientMessage::FramebufferUpdateRequest {
            incremental: false,
            x: 0,
            y: 0,
            width: 8,
            height: 8,
        });
        assert_eq!(describe_exit(&result), "server stopping");
    }

    #[test]
    fn test_describe_exit_reasons() {
        let stopping = Err(VncError::Io(PollerExit::Stopping.into_io()));
        assert_eq!(describe_exit(&stopping), "server stopping");
        let idle = Err(VncError::Io(PollerExit::Idle.into_io()));
        assert_eq!(describe_exit(&idle), "idle timeout");
        // Same kind and message, but not raised by the poller.
        let reset = Err(VncError::Io(io::Error::new(io::ErrorKind::ConnectionAborted, "server stopping")));
        assert_eq!(describe_exit(&reset), "client disconnected");
        assert_eq!(describe_exit(&Ok(())), "finished");
    }

    #[test]
    fn test_key_color_palette() {
        assert_eq!(key_color(0), KEY_PALETTE[0]);
        assert_eq!(key_color(9), KEY_PALETTE[1]);
        assert_ne!(key_color(0x61), key_color(0x62));
    }
}
