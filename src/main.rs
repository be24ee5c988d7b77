//! `vncsim` command line: run the synthetic-desktop VNC server or probe one.
//!
//! Usage:
//!   vncsim serve --port 5900 --width 1024 --height 768
//!   vncsim probe --host 127.0.0.1 --port 5900
//!
//! Then connect with a VNC viewer to localhost:5900

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use vncsim::config::{DEFAULT_DESKTOP_NAME, DEFAULT_HEIGHT, DEFAULT_MAX_CLIENTS, DEFAULT_WIDTH};
use vncsim::{ServerConfig, ServerEvent, VncServer, DEFAULT_PORT};

#[derive(Debug, Parser)]
#[command(
    name = "vncsim",
    about = "VNC server with a synthetic desktop, for testing viewers and supervisors",
    author,
    version,
    propagate_version = true
)]
struct Cli {
    /// Log more (repeat for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the server until the process is killed.
    Serve(ServeArgs),
    /// Check whether something accepts TCP connections on the VNC port.
    Probe {
        #[arg(long, env = "VNCSIM_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "VNCSIM_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Connect timeout in milliseconds.
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "VNCSIM_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,
    #[arg(long, env = "VNCSIM_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, env = "VNCSIM_WIDTH", default_value_t = DEFAULT_WIDTH)]
    width: u16,
    #[arg(long, env = "VNCSIM_HEIGHT", default_value_t = DEFAULT_HEIGHT)]
    height: u16,
    /// Desktop name reported to viewers.
    #[arg(long, env = "VNCSIM_NAME", default_value = DEFAULT_DESKTOP_NAME)]
    name: String,
    /// Require VNC authentication with this password (at most 8 bytes).
    #[arg(long, env = "VNCSIM_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, env = "VNCSIM_MAX_CLIENTS", default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,
    /// Disconnect clients silent for this many seconds.
    #[arg(long, env = "VNCSIM_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,
    /// Push a full frame right after the handshake.
    #[arg(long, env = "VNCSIM_INITIAL_FRAME")]
    initial_frame: bool,
    /// Seed the synthetic damage generator for reproducible sessions.
    #[arg(long, env = "VNCSIM_SEED")]
    seed: Option<u64>,
    /// Skip the green flash that follows a click highlight.
    #[arg(long, env = "VNCSIM_NO_CLICK_FLASH")]
    no_click_flash: bool,
}

impl ServeArgs {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_address: self.bind,
            port: self.port,
            desktop_name: self.name,
            password: self.password,
            max_clients: self.max_clients,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            push_initial_frame: self.initial_frame,
            seed: self.seed,
            click_flash: !self.no_click_flash,
            ..ServerConfig::with_size(self.width, self.height)
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn serve(args: ServeArgs) -> ExitCode {
    let server = match VncServer::new(args.into_config()) {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let events = server.events();
    let spawned = thread::Builder::new().name("vnc-events".into()).spawn(move || {
        for event in events {
            match event {
                ServerEvent::KeyEvent { client_id, key, pressed } => {
                    info!("Client {client_id}: key {key:#x} {}", if pressed { "down" } else { "up" });
                }
                ServerEvent::ClipboardReceived { client_id, text } => {
                    info!("Client {client_id}: clipboard ({} bytes)", text.len());
                }
                other => log::debug!("{other:?}"),
            }
        }
    });
    if let Err(e) = spawned {
        error!("Could not start event logger: {e}");
    }

    match server.listen() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn probe(host: &str, port: u16, timeout: Duration) -> ExitCode {
    let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            error!("Cannot resolve {host}: {e}");
            return ExitCode::FAILURE;
        }
    };
    if addrs.into_iter().any(|addr| vncsim::probe(addr, timeout)) {
        println!("VNC server on {host}:{port} is accepting connections");
        ExitCode::SUCCESS
    } else {
        println!("No VNC server reachable on {host}:{port}");
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Serve(args) => serve(args),
        Commands::Probe { host, port, timeout_ms } => {
            probe(&host, port, Duration::from_millis(timeout_ms))
        }
    }
}
