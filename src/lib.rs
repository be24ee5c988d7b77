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


//! # vncsim
//!
//! A small RFB (VNC) server that serves a synthetic desktop.
//!
//! There is no real screen behind it: the framebuffer is painted once with a
//! fake desktop (gradient, top bar, taskbar, a few windows and icons) and then
//! mutated in response to client input. It is meant as a target for testing VNC
//! viewers, proxies, and supervisors.
//!
//! ## Features
//!
//! - **RFB 3.8 handshake** with security types None and VNC Authentication
//! - **Raw encoding** in any valid true-colour pixel format the client asks for
//! - **Thread per connection** on plain `std::net` sockets, no async runtime
//! - **Synthetic activity**: incremental update requests get random damage,
//!   key presses paint coloured blocks, clicks paint a red square
//!
//! ## Quick Start
//!
//! ```no_run
//! use vncsim::{ServerConfig, ServerEvent, VncServer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         password: Some("secret".to_string()),
//!         ..ServerConfig::with_size(1280, 720)
//!     };
//!     let server = VncServer::new(config)?;
//!     let events = server.events();
//!
//!     let handle = server.start()?;
//!     println!("listening on {}", handle.local_addr());
//!
//!     while let Ok(event) = events.recv() {
//!         if let ServerEvent::ClientDisconnected { id } = event {
//!             println!("client {id} left");
//!         }
//!     }
//!     handle.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   listener thread (accept loop)
//!        │ one OS thread per connection
//!        ├──────────────┬──────────────┐
//!        ▼              ▼              ▼
//!   ┌────────┐     ┌────────┐     ┌────────┐
//!   │Client 1│     │Client 2│     │Client N│
//!   └────────┘     └────────┘     └────────┘
//!        │              │              │
//!        └──────────────┴──────────────┘
//!                       ▼
//!   ┌─────────────────────────────────────┐
//!   │   Framebuffer (Arc + Mutex)         │
//!   └─────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod events;
pub mod framebuffer;
pub mod handshake;
pub mod protocol;
pub mod server;

mod translate;

// Re-exports
pub use config::ServerConfig;
pub use encoding::Encoding;
pub use error::{Result, VncError};
pub use events::ServerEvent;
pub use framebuffer::{Color, Framebuffer, Region};
pub use protocol::{PixelFormat, PROTOCOL_VERSION};
pub use server::{probe, ServerHandle, ServerStatus, VncServer};

/// Default VNC port.
pub const DEFAULT_PORT: u16 = 5900;
