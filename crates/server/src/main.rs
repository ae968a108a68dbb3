//! warden-server — policy-governed key/value server over TCP.
//!
//! One thread per connection; each connection runs exactly one program and
//! closes. Exit codes are part of the contract: 255 for invalid usage, 63
//! when the port cannot be bound, 0 on clean shutdown (signal or admin
//! `exit`).

use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::process;
use std::sync::Arc;
use std::thread;

use clap::error::ErrorKind;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use warden_core::limits::READ_TIMEOUT;
use warden_server::config::{build_cli, Config};
use warden_server::{Handler, Outcome};
use warden_store::Store;

fn main() {
    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(e) if e.kind() == ErrorKind::DisplayHelp || e.kind() == ErrorKind::DisplayVersion => {
            e.exit()
        }
        Err(_) => process::exit(255),
    };
    let config = Config::from_matches(&matches);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Uncommitted work is lost on a signal by design; just exit cleanly.
    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            thread::spawn(move || {
                if signals.forever().next().is_some() {
                    info!("signal received, shutting down");
                    process::exit(0);
                }
            });
        }
        Err(e) => warn!(error = %e, "failed to install signal handler"),
    }

    let listener = match TcpListener::bind(("0.0.0.0", config.port)) {
        Ok(listener) => listener,
        Err(e) => {
            warn!(port = config.port, error = %e, "failed to bind");
            process::exit(63);
        }
    };
    info!(port = config.port, "listening");

    let store = Arc::new(Store::new(&config.admin_password));
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                let store = Arc::clone(&store);
                thread::spawn(move || serve(stream, store));
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
}

fn serve(stream: TcpStream, store: Arc<Store>) {
    let peer = stream.peer_addr().ok();
    debug!(?peer, "connection accepted");
    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        warn!(?peer, error = %e, "failed to set read deadline");
        return;
    }
    let reader = match stream.try_clone() {
        Ok(read_half) => BufReader::new(read_half),
        Err(e) => {
            warn!(?peer, error = %e, "failed to clone stream");
            return;
        }
    };
    match Handler::new(store).execute(reader, stream) {
        Outcome::Done => debug!(?peer, "connection closed"),
        Outcome::Exit => {
            info!(?peer, "admin requested exit");
            process::exit(0);
        }
    }
}
