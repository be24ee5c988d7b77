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

//! RFB 3.8 connection handshake.
//!
//! The handshake walks a fixed sequence of states, each performing one exchange:
//!
//! ```text
//! VersionExchange -> SecurityNegotiation -> SecurityResult -> ClientInit -> ServerInit -> Established
//! ```
//!
//! There are no backward transitions. Any transport error aborts the handshake and
//! with it the session. The client's version string and shared flag are recorded
//! but never branched on.
//!
//! Without a password the server offers security type None and always reports
//! success. With a password it offers only VNC Authentication and reports failure,
//! followed by a reason string, when the response does not match.

use crate::auth::{VncAuth, CHALLENGE_LEN};
use crate::error::{Result, VncError};
use crate::protocol::{
    read_exact, ServerInit, PROTOCOL_VERSION, PROTOCOL_VERSION_LEN, SECURITY_RESULT_FAILED,
    SECURITY_RESULT_OK, SECURITY_TYPE_NONE, SECURITY_TYPE_VNC_AUTH,
};
use bytes::{BufMut, BytesMut};
use log::{debug, info, warn};
use std::io::{Read, Write};

/// Handshake progress of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Exchanging `ProtocolVersion` messages.
    VersionExchange,
    /// Offering security types and, with a password, running the challenge.
    SecurityNegotiation,
    /// Reporting the security outcome.
    SecurityResult,
    /// Waiting for `ClientInit`.
    ClientInit,
    /// Sending `ServerInit`.
    ServerInit,
    /// Handshake complete; the message loop takes over.
    Established,
}

/// What the client told us during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// The client's protocol version line, without the trailing newline.
    pub client_version: String,
    /// The security type the client selected.
    pub security_type: u8,
    /// The `ClientInit` shared flag.
    pub shared: bool,
}

/// Drives the handshake for one connection.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    server_init: ServerInit,
    auth: Option<VncAuth>,
    client_version: String,
    security_type: u8,
    auth_failure: Option<String>,
    shared: bool,
}

impl Handshake {
    /// Creates a handshake that will advertise `server_init`.
    ///
    /// Passing an authenticator switches security negotiation to VNC Authentication.
    #[must_use]
    pub fn new(server_init: ServerInit, auth: Option<VncAuth>) -> Self {
        Self {
            state: HandshakeState::VersionExchange,
            server_init,
            auth,
            client_version: String::new(),
            security_type: 0,
            auth_failure: None,
            shared: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs every remaining state to completion.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::AuthenticationFailed`] after reporting a failed
    /// authentication to the client, and transport errors from any exchange.
    pub fn run<S: Read + Write>(mut self, stream: &mut S) -> Result<HandshakeOutcome> {
        while self.state != HandshakeState::Established {
            self.step(stream)?;
        }
        Ok(HandshakeOutcome {
            client_version: self.client_version,
            security_type: self.security_type,
            shared: self.shared,
        })
    }

    /// Performs the exchange of the current state and moves to the next one.
    ///
    /// # Errors
    ///
    /// See [`Handshake::run`].
    pub fn step<S: Read + Write>(&mut self, stream: &mut S) -> Result<HandshakeState> {
        self.state = match self.state {
            HandshakeState::VersionExchange => {
                send(stream, PROTOCOL_VERSION.as_bytes())?;
                let mut version = [0u8; PROTOCOL_VERSION_LEN];
                read_exact(stream, &mut version)?;
                self.client_version = String::from_utf8_lossy(&version).trim_end().to_string();
                debug!("Client protocol version: {:?}", self.client_version);
                HandshakeState::SecurityNegotiation
            }
            HandshakeState::SecurityNegotiation => {
                self.negotiate_security(stream)?;
                HandshakeState::SecurityResult
            }
            HandshakeState::SecurityResult => {
                if let Some(reason) = self.auth_failure.take() {
                    let mut buf = BytesMut::with_capacity(8 + reason.len());
                    buf.put_u32(SECURITY_RESULT_FAILED);
                    #[allow(clippy::cast_possible_truncation)] // fixed short reason strings
                    buf.put_u32(reason.len() as u32);
                    buf.put_slice(reason.as_bytes());
                    send(stream, &buf)?;
                    warn!("VNC authentication failed: {reason}");
                    return Err(VncError::AuthenticationFailed);
                }
                send(stream, &SECURITY_RESULT_OK.to_be_bytes())?;
                HandshakeState::ClientInit
            }
            HandshakeState::ClientInit => {
                let mut flag = [0u8; 1];
                read_exact(stream, &mut flag)?;
                self.shared = flag[0] != 0;
                debug!("ClientInit shared flag: {}", self.shared);
                HandshakeState::ServerInit
            }
            HandshakeState::ServerInit => {
                let mut buf = BytesMut::with_capacity(24 + self.server_init.name.len());
                self.server_init.write_to(&mut buf);
                send(stream, &buf)?;
                info!(
                    "Handshake complete: {}x{} \"{}\"",
                    self.server_init.framebuffer_width, self.server_init.framebuffer_height, self.server_init.name
                );
                HandshakeState::Established
            }
            HandshakeState::Established => HandshakeState::Established,
        };
        Ok(self.state)
    }

    fn negotiate_security<S: Read + Write>(&mut self, stream: &mut S) -> Result<()> {
        let offered = if self.auth.is_some() {
            SECURITY_TYPE_VNC_AUTH
        } else {
            SECURITY_TYPE_NONE
        };
        send(stream, &[1, offered])?;

        let mut chosen = [0u8; 1];
        read_exact(stream, &mut chosen)?;
        self.security_type = chosen[0];

        let Some(auth) = &self.auth else {
            if chosen[0] != SECURITY_TYPE_NONE {
                debug!("Client chose security type {} while only None was offered", chosen[0]);
            }
            return Ok(());
        };

        if chosen[0] != SECURITY_TYPE_VNC_AUTH {
            self.auth_failure = Some(format!("security type {} was not offered", chosen[0]));
            return Ok(());
        }

        let challenge = auth.generate_challenge();
        send(stream, &challenge)?;
        let mut response = [0u8; CHALLENGE_LEN];
        read_exact(stream, &mut response)?;
        if !auth.verify_response(&challenge, &response) {
            self.auth_failure = Some("authentication failed".to_string());
        }
        Ok(())
    }
}

fn send<S: Write>(stream: &mut S, bytes: &[u8]) -> Result<()> {
    stream.write_all(bytes)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::encrypt_challenge;
    use crate::protocol::PixelFormat;
    use std::io::{self, Cursor};

    /// In-memory duplex: reads from a scripted input, records everything written.
    pub(crate) struct MockStream {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
    }

    impl MockStream {
        pub fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn server_init() -> ServerInit {
        ServerInit {
            framebuffer_width: 640,
            framebuffer_height: 480,
            pixel_format: PixelFormat::rgb888(),
            name: "Test Desk".into(),
        }
    }

    #[test]
    fn test_no_auth_handshake() {
        let mut input = b"RFB 003.008\n".to_vec();
        input.push(SECURITY_TYPE_NONE);
        input.push(1); // shared
        let mut stream = MockStream::new(input);

        let outcome = Handshake::new(server_init(), None).run(&mut stream).unwrap();
        assert_eq!(outcome.client_version, "RFB 003.008");
        assert!(outcome.shared);

        let out = &stream.output;
        assert_eq!(&out[..12], b"RFB 003.008\n");
        assert_eq!(&out[12..14], &[1, SECURITY_TYPE_NONE]);
        assert_eq!(&out[14..18], &[0, 0, 0, 0]);
        assert_eq!(&out[18..22], &[0x02, 0x80, 0x01, 0xe0]);
        assert_eq!(&out[38..42], &[0, 0, 0, 9]);
        assert_eq!(&out[42..], b"Test Desk");
    }

    #[test]
    fn test_version_and_security_choice_not_validated() {
        let mut input = b"XYZ 999.999\n".to_vec();
        input.push(42);
        input.push(0);
        let mut stream = MockStream::new(input);
        let outcome = Handshake::new(server_init(), None).run(&mut stream).unwrap();
        assert_eq!(outcome.security_type, 42);
        assert!(!outcome.shared);
    }

    #[test]
    fn test_states_advance_in_order() {
        let mut input = b"RFB 003.008\n".to_vec();
        input.extend_from_slice(&[SECURITY_TYPE_NONE, 1]);
        let mut stream = MockStream::new(input);
        let mut hs = Handshake::new(server_init(), None);
        assert_eq!(hs.state(), HandshakeState::VersionExchange);
        assert_eq!(hs.step(&mut stream).unwrap(), HandshakeState::SecurityNegotiation);
        assert_eq!(hs.step(&mut stream).unwrap(), HandshakeState::SecurityResult);
        assert_eq!(hs.step(&mut stream).unwrap(), HandshakeState::ClientInit);
        assert_eq!(hs.step(&mut stream).unwrap(), HandshakeState::ServerInit);
        assert_eq!(hs.step(&mut stream).unwrap(), HandshakeState::Established);
        assert_eq!(hs.step(&mut stream).unwrap(), HandshakeState::Established);
    }

    #[test]
    fn test_eof_aborts() {
        let mut stream = MockStream::new(b"RFB 003".to_vec());
        let err = Handshake::new(server_init(), None).run(&mut stream).unwrap_err();
        assert!(matches!(err, VncError::ConnectionClosed));
    }

    /// Reads the challenge from the server output and answers it on the fly.
    struct AuthClient {
        password: &'static str,
        stage: usize,
        pending: Vec<u8>,
        output: Vec<u8>,
    }

    impl Read for AuthClient {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                self.stage += 1;
                self.pending = match self.stage {
                    1 => b"RFB 003.008\n".to_vec(),
                    2 => vec![SECURITY_TYPE_VNC_AUTH],
                    3 => {
                        let mut challenge = [0u8; CHALLENGE_LEN];
                        challenge.copy_from_slice(&self.output[14..30]);
                        encrypt_challenge(&challenge, self.password).to_vec()
                    }
                    4 => vec![0],
                    _ => return Ok(0),
                };
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    impl Write for AuthClient {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn auth_client(password: &'static str) -> AuthClient {
        AuthClient {
            password,
            stage: 0,
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    #[test]
    fn test_vnc_auth_success() {
        let mut client = auth_client("hunter2");
        let outcome = Handshake::new(server_init(), Some(VncAuth::new("hunter2")))
            .run(&mut client)
            .unwrap();
        assert_eq!(outcome.security_type, SECURITY_TYPE_VNC_AUTH);
        assert_eq!(&client.output[12..14], &[1, SECURITY_TYPE_VNC_AUTH]);
        assert_eq!(&client.output[30..34], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_vnc_auth_failure_reports_reason() {
        let mut client = auth_client("wrong");
        let err = Handshake::new(server_init(), Some(VncAuth::new("hunter2")))
            .run(&mut client)
            .unwrap_err();
        assert!(matches!(err, VncError::AuthenticationFailed));
        assert_eq!(&client.output[30..34], &[0, 0, 0, 1]);
        let len = u32::from_be_bytes([client.output[34], client.output[35], client.output[36], client.output[37]]);
        assert_eq!(client.output.len(), 38 + len as usize);
    }

    #[test]
    fn test_vnc_auth_rejects_none_choice() {
        let mut input = b"RFB 003.008\n".to_vec();
        input.push(SECURITY_TYPE_NONE);
        let mut stream = MockStream::new(input);
        let err = Handshake::new(server_init(), Some(VncAuth::new("pw")))
            .run(&mut stream)
            .unwrap_err();
        assert!(matches!(err, VncError::AuthenticationFailed));
        assert_eq!(&stream.output[14..18], &[0, 0, 0, 1]);
    }
}
