//! The reactor: one blocking poll, one thread, all registry mutation.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::unix::EventedFd;
use mio::{Events, Poll, PollOpt, Ready, Token};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::conn::Connection;
use crate::registry::Registry;

const LISTENER: Token = Token(0);
const SHUTDOWN: Token = Token(1);
const FIRST_CLIENT: Token = Token(2);

const EVENTS_CAPACITY: usize = 1024;

pub struct Server {
    poll: Poll,
    listener: mio::net::TcpListener,
    listener_ready: Ready,
    registry: Registry<Connection>,
    root: PathBuf,
    shutdown: Arc<AtomicBool>,
    shutdown_rx: UnixStream,
}

impl Server {
    /// Binds the listener, wires SIGINT/SIGTERM to the shutdown flag and
    /// the wakeup pipe, and registers both with the poller. Every failure
    /// here is fatal to the process; after this point failures only ever
    /// affect single connections.
    pub fn new(config: &Config) -> io::Result<Server> {
        let poll = Poll::new()?;

        let listener = mio::net::TcpListener::bind(&config.addr)?;
        poll.register(&listener, LISTENER, Ready::readable(), PollOpt::edge())?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (shutdown_rx, shutdown_tx) = UnixStream::pair()?;
        shutdown_rx.set_nonblocking(true)?;
        shutdown_tx.set_nonblocking(true)?;
        for &sig in &[signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(sig, Arc::clone(&shutdown))?;
            signal_hook::low_level::pipe::register(sig, shutdown_tx.try_clone()?)?;
        }
        let pipe_fd = shutdown_rx.as_raw_fd();
        poll.register(&EventedFd(&pipe_fd), SHUTDOWN, Ready::readable(), PollOpt::edge())?;

        Ok(Server {
            poll,
            listener,
            listener_ready: Ready::empty(),
            registry: Registry::new(LISTENER, FIRST_CLIENT),
            root: config.root.clone(),
            shutdown,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until a shutdown signal arrives. The poll is the only point
    /// that blocks; everything dispatched from it operates on non-blocking
    /// sockets.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.poll.poll(&mut events, None) {
                Ok(_) => {}
                // a signal can land while the wait is blocked; re-check the
                // flag and wait again instead of failing
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.listener_ready |= event.readiness(),
                    SHUTDOWN => {
                        self.drain_shutdown_pipe();
                        self.shutdown.store(true, Ordering::Relaxed);
                    }
                    token => {
                        if let Some(index) = self.registry.index_of(token) {
                            self.registry.get_mut(index).add_readiness(event.readiness());
                        }
                    }
                }
            }

            // the listener is always serviced before existing clients
            if self.listener_ready.contains(Ready::readable()) {
                self.accept_ready();
            }

            // highest index first: removing an entry only shifts entries
            // above it, which have already been visited
            for index in (0..self.registry.len()).rev() {
                let conn = self.registry.get_mut(index);
                if !conn.is_ready() {
                    continue;
                }
                match conn.make_progress(&self.root) {
                    Ok(()) => {
                        if conn.is_closed() {
                            let closed = self.registry.remove(index);
                            debug!("{}: connection closed", closed.peer_addr());
                        }
                    }
                    Err(err) => {
                        let failed = self.registry.remove(index);
                        error!("{}: {}", failed.peer_addr(), err);
                    }
                }
            }
        }

        info!(
            "shutdown requested, dropping {} open connection(s)",
            self.registry.len()
        );
        Ok(())
    }

    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => self.admit(stream, peer_addr),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.listener_ready &= !Ready::readable();
                    return;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // transient accept failures must not take the server
                    // down; the next listener event retries
                    error!("accept failed: {}", e);
                    self.listener_ready &= !Ready::readable();
                    return;
                }
            }
        }
    }

    fn admit(&mut self, stream: mio::net::TcpStream, peer_addr: SocketAddr) {
        let conn = match Connection::new(peer_addr, stream) {
            Ok(conn) => conn,
            Err(err) => {
                warn!("{}: rejected: {}", peer_addr, err);
                return;
            }
        };
        let token = match self.registry.insert(conn) {
            Ok(token) => token,
            Err(_rejected) => {
                // dropping the connection closes its socket; existing
                // clients keep their slots
                warn!("{}: rejected: registry growth failed", peer_addr);
                return;
            }
        };
        let index = self.registry.len() - 1;
        if let Err(err) = self.poll.register(
            self.registry.get_mut(index).stream(),
            token,
            Ready::all(),
            PollOpt::edge(),
        ) {
            let _ = self.registry.remove(index);
            warn!("{}: rejected: {}", peer_addr, err);
            return;
        }
        info!("accepted connection from {}", peer_addr);
    }

    fn drain_shutdown_pipe(&mut self) {
        let mut buf = [0u8; 16];
        loop {
            match self.shutdown_rx.read(&mut buf) {
                Ok(0) => return,
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return,
            }
        }
    }
}
