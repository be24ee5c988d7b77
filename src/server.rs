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

//! TCP listener and client registry.
//!
//! The server runs one accept loop and one OS thread per connected client. The
//! listening socket is non-blocking and polled, so clearing the running flag makes
//! the accept loop return and drop (close) the socket within one poll interval.
//! Client threads notice the same flag on their next read or write timeout.

use crate::client::{describe_exit, ClientSession, SessionContext};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::events::{EventSink, ServerEvent};
use crate::framebuffer::Framebuffer;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Capacity of the channel returned by [`VncServer::events`].
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A connected client as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Unique client identifier.
    pub id: usize,
    /// Peer address.
    pub address: SocketAddr,
    /// When the connection was accepted.
    pub connected_at: Instant,
}

/// Book-keeping of live sessions, bounded by `max_clients`.
#[derive(Debug, Default)]
struct ClientRegistry {
    clients: Mutex<HashMap<usize, ClientInfo>>,
}

impl ClientRegistry {
    fn try_register(&self, info: ClientInfo, max_clients: usize) -> bool {
        let mut clients = self.lock();
        if clients.len() >= max_clients {
            return false;
        }
        clients.insert(info.id, info);
        true
    }

    fn remove(&self, id: usize) {
        self.lock().remove(&id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn snapshot(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<_> = self.lock().values().cloned().collect();
        clients.sort_by_key(|c| c.id);
        clients
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, ClientInfo>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time view of the server for supervisors and dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    /// Whether the accept loop is running.
    pub running: bool,
    /// Bound address, once the listener is up.
    pub local_addr: Option<SocketAddr>,
    /// Number of connected clients.
    pub clients: usize,
    /// Framebuffer width.
    pub width: u16,
    /// Framebuffer height.
    pub height: u16,
}

/// The VNC server.
///
/// Cheap to clone; clones share the framebuffer, registry, and running flag.
#[derive(Debug, Clone)]
pub struct VncServer {
    config: Arc<ServerConfig>,
    framebuffer: Arc<Framebuffer>,
    running: Arc<AtomicBool>,
    registry: Arc<ClientRegistry>,
    events: EventSink,
    next_id: Arc<AtomicUsize>,
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
}

impl VncServer {
    /// Creates a server and paints its synthetic desktop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VncError::Config`] if the configuration is invalid.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let framebuffer = Arc::new(Framebuffer::new(config.width, config.height));
        if config.password.is_none() {
            info!("No password configured: clients connect without authentication");
        }
        Ok(Self {
            config: Arc::new(config),
            framebuffer,
            running: Arc::new(AtomicBool::new(false)),
            registry: Arc::new(ClientRegistry::default()),
            events: EventSink::new(),
            next_id: Arc::new(AtomicUsize::new(1)),
            local_addr: Arc::new(Mutex::new(None)),
        })
    }

    /// The configuration the server was created with.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared framebuffer.
    #[must_use]
    pub fn framebuffer(&self) -> &Arc<Framebuffer> {
        &self.framebuffer
    }

    /// Subscribes to server events, replacing any previous subscriber.
    #[must_use]
    pub fn events(&self) -> Receiver<ServerEvent> {
        self.events.subscribe(EVENT_CHANNEL_CAPACITY)
    }

    /// Returns `true` while the accept loop runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Connected clients, ordered by id.
    #[must_use]
    pub fn clients(&self) -> Vec<ClientInfo> {
        self.registry.snapshot()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            running: self.is_running(),
            local_addr: *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner),
            clients: self.client_count(),
            width: self.framebuffer.width(),
            height: self.framebuffer.height(),
        }
    }

    /// Binds the configured address and runs the accept loop on this thread.
    ///
    /// Returns once [`VncServer::stop`] is called from another clone.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub fn listen(&self) -> Result<()> {
        let listener = self.bind()?;
        self.running.store(true, Ordering::SeqCst);
        self.serve(listener)
    }

    /// Binds the configured address and runs the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound or the thread cannot start.
    pub fn start(&self) -> Result<ServerHandle> {
        let listener = self.bind()?;
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);

        let server = self.clone();
        let spawned = thread::Builder::new()
            .name("vnc-listener".into())
            .spawn(move || {
                if let Err(e) = server.serve(listener) {
                    error!("Accept loop failed: {e}");
                    server.running.store(false, Ordering::SeqCst);
                }
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        Ok(ServerHandle {
            server: self.clone(),
            local_addr,
            thread: Some(thread),
        })
    }

    /// Asks the accept loop and all sessions to stop.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping VNC server");
        }
    }

    fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr).map_err(|e| {
            error!("Failed to bind {addr}: {e}");
            e
        })?;
        let local = listener.local_addr()?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local);
        info!(
            "VNC server listening on {} ({}x{} \"{}\")",
            local, self.config.width, self.config.height, self.config.desktop_name
        );
        Ok(listener)
    }

    fn serve(&self, listener: TcpListener) -> Result<()> {
        listener.set_nonblocking(true)?;

        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, address)) => self.accept(stream, address),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.config.poll_interval);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Accept failed: {e}");
                    thread::sleep(self.config.poll_interval);
                }
            }
        }

        drop(listener);
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = None;
        info!("VNC listener closed");
        Ok(())
    }

    fn accept(&self, stream: TcpStream, address: SocketAddr) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = ClientInfo {
            id,
            address,
            connected_at: Instant::now(),
        };
        if !self.registry.try_register(info, self.config.max_clients) {
            warn!(
                "Rejecting {address}: {} clients already connected",
                self.config.max_clients
            );
            return;
        }

        if let Err(e) = prepare_stream(&stream, self.config.poll_interval) {
            warn!("Dropping {address}: socket setup failed: {e}");
            self.registry.remove(id);
            return;
        }

        info!("Client {id} connected from {address}");
        let ctx = SessionContext {
            framebuffer: Arc::clone(&self.framebuffer),
            config: Arc::clone(&self.config),
            running: Arc::clone(&self.running),
            events: self.events.clone(),
        };
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();

        let spawned = thread::Builder::new()
            .name(format!("vnc-client-{id}"))
            .spawn(move || {
                events.emit(ServerEvent::ClientConnected { id, address });
                let result = ClientSession::new(id, address, stream, ctx).run();
                info!("Client {id} ({address}) disconnected: {}", describe_exit(&result));
                registry.remove(id);
                events.emit(ServerEvent::ClientDisconnected { id });
            });

        if let Err(e) = spawned {
            error!("Could not spawn session thread for {address}: {e}");
            self.registry.remove(id);
        }
    }
}

fn prepare_stream(stream: &TcpStream, poll_interval: Duration) -> io::Result<()> {
    // Some platforms hand out accepted sockets inheriting the listener's non-blocking mode.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(poll_interval))?;
    stream.set_write_timeout(Some(poll_interval))?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!("TCP_NODELAY unavailable: {e}");
    }
    Ok(())
}

/// Handle to a server started with [`VncServer::start`].
///
/// Dropping the handle stops the server.
#[derive(Debug)]
pub struct ServerHandle {
    server: VncServer,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The running server.
    #[must_use]
    pub fn server(&self) -> &VncServer {
        &self.server
    }

    /// Returns `true` while the accept loop runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// Stops accepting, waits for the listening socket to close, and returns.
    ///
    /// Sessions already running wind down within one poll interval of their next
    /// read or write timeout, even if their client has stopped reading.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.server.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("VNC listener thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bare TCP liveness check, as performed by external supervisors.
#[must_use]
pub fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&addr, timeout).is_ok()
}
