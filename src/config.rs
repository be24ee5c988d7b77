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

//! Server configuration.
//!
//! A [`ServerConfig`] is assembled once at startup, validated, and then shared
//! read-only by the listener and every client session.

use crate::error::{Result, VncError};
use crate::DEFAULT_PORT;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default framebuffer width in pixels.
pub const DEFAULT_WIDTH: u16 = 1024;

/// Default framebuffer height in pixels.
pub const DEFAULT_HEIGHT: u16 = 768;

/// Default desktop name advertised in `ServerInit`.
pub const DEFAULT_DESKTOP_NAME: &str = "Synthetic Desktop";

/// Default cap on simultaneously connected clients.
pub const DEFAULT_MAX_CLIENTS: usize = 64;

/// Default interval at which blocked sockets wake up to check for shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// VNC authentication only ever keys DES with the first 8 password bytes.
pub const MAX_PASSWORD_LEN: usize = 8;

/// Startup configuration of the VNC server.
///
/// The `Debug` output never includes the password.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the listening socket to.
    pub bind_address: IpAddr,
    /// TCP port to listen on (0 picks an ephemeral port).
    pub port: u16,
    /// Framebuffer width in pixels.
    pub width: u16,
    /// Framebuffer height in pixels.
    pub height: u16,
    /// Desktop name sent in `ServerInit`.
    pub desktop_name: String,
    /// Enables VNC authentication when set.
    pub password: Option<String>,
    /// Connections beyond this count are dropped right after accept.
    pub max_clients: usize,
    /// Disconnect clients that send nothing for this long.
    pub idle_timeout: Option<Duration>,
    /// Socket poll interval used to notice shutdown requests.
    pub poll_interval: Duration,
    /// Send a full frame right after `ServerInit` without waiting for a request.
    pub push_initial_frame: bool,
    /// Seed for the synthetic damage generator; random when unset.
    pub seed: Option<u64>,
    /// Follow each click highlight with a short green flash.
    pub click_flash: bool,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("desktop_name", &self.desktop_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_clients", &self.max_clients)
            .field("idle_timeout", &self.idle_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("push_initial_frame", &self.push_initial_frame)
            .field("seed", &self.seed)
            .field("click_flash", &self.click_flash)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            desktop_name: DEFAULT_DESKTOP_NAME.to_string(),
            password: None,
            max_clients: DEFAULT_MAX_CLIENTS,
            idle_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            push_initial_frame: false,
            seed: None,
            click_flash: true,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with the given framebuffer size and defaults elsewhere.
    #[must_use]
    pub fn with_size(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Socket address the listener binds to.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Checks the configuration for values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::Config`] describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VncError::Config(format!(
                "framebuffer size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.desktop_name.is_empty() {
            return Err(VncError::Config("desktop name must not be empty".into()));
        }
        if self.max_clients == 0 {
            return Err(VncError::Config("max_clients must be at least 1".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(VncError::Config("poll interval must be non-zero".into()));
        }
        if let Some(password) = &self.password {
            if password.is_empty() {
                return Err(VncError::Config("password must not be empty".into()));
            }
            if password.len() > MAX_PASSWORD_LEN {
                return Err(VncError::Config(format!(
                    "password longer than {MAX_PASSWORD_LEN} bytes would be silently truncated"
                )));
            }
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(VncError::Config("idle timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 5900);
        assert_eq!(config.socket_addr().port(), 5900);
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(matches!(
            ServerConfig::with_size(0, 10).validate(),
            Err(VncError::Config(_))
        ));
        assert!(ServerConfig::with_size(10, 0).validate().is_err());
        assert!(ServerConfig::with_size(1, 1).validate().is_ok());
    }

    #[test]
    fn test_rejects_long_password() {
        let mut config = ServerConfig::default();
        config.password = Some("123456789".into());
        assert!(config.validate().is_err());
        config.password = Some("12345678".into());
        assert!(config.validate().is_ok());
        config.password = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = ServerConfig::default();
        config.max_clients = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.idle_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ServerConfig {
            password: Some("hunter2".into()),
            ..ServerConfig::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
        assert!(format!("{:?}", ServerConfig::default()).contains("password: None"));
    }
}
