//! One accepted client connection and the state machine that drives it
//! from framing through the response.

use std::fs;
use std::io::{self, Read, Write};
use std::mem;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::buffer::RecvBuffer;
use crate::request::{self, Method, RawRequest, Request, ValidateError};
use crate::resolve::{self, ResolveError};
use crate::response::{self, StatusCode};

/// End-of-request-head sentinel.
pub const REQUEST_SENTINEL: &[u8] = b"\r\n\r\n";

/// Lifecycle of a connection. Each state is entered at most once; errors
/// jump straight to `Responding` with an error payload (or to `Closed`
/// when the socket is beyond writing). A connection serves exactly one
/// request.
#[derive(Debug)]
enum State {
    /// Reading single bytes until the head sentinel arrives.
    Framing,
    /// Head tokenized into owned strings.
    Parsed(RawRequest),
    /// Version and method checked against the supported sets.
    Validated(Request),
    /// Request path pinned to a canonical location under the root.
    Resolved(Request, PathBuf),
    /// Draining the staged response bytes to the socket.
    Responding,
    Closed,
}

pub struct Connection {
    state: State,
    ready: mio::Ready,

    peer_addr: SocketAddr,
    stream: mio::net::TcpStream,

    buf: RecvBuffer,

    out_buf: Vec<u8>,
    out_pos: usize,
}

impl Connection {
    /// Fails only when the framing buffer cannot be allocated, in which
    /// case the caller rejects the connection.
    pub fn new(peer_addr: SocketAddr, stream: mio::net::TcpStream) -> io::Result<Connection> {
        Ok(Connection {
            state: State::Framing,
            ready: mio::Ready::readable() | mio::Ready::writable(),
            peer_addr,
            stream,
            buf: RecvBuffer::new()?,
            out_buf: Vec::new(),
            out_pos: 0,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stream(&self) -> &mio::net::TcpStream {
        &self.stream
    }

    pub fn add_readiness(&mut self, ready: mio::Ready) {
        self.ready |= ready;
    }

    pub fn is_ready(&self) -> bool {
        match self.state {
            State::Framing => self.ready.contains(mio::Ready::readable()),
            State::Parsed(_) | State::Validated(_) | State::Resolved(..) => true,
            State::Responding => self.ready.contains(mio::Ready::writable()),
            State::Closed => true,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Advances the state machine as far as the socket allows. Returns
    /// `Ok` when the connection parks for the next readiness event or
    /// reaches `Closed`; `Err` means an unrecoverable I/O failure and the
    /// caller must drop the connection.
    pub fn make_progress(&mut self, root: &Path) -> io::Result<()> {
        loop {
            match self.state {
                State::Framing => {
                    self.buf.ensure_headroom()?;
                    match self.stream.read(&mut self.buf.spare_mut()[..1]) {
                        Ok(0) => {
                            debug!("{}: EOF before request completed", self.peer_addr);
                            self.state = State::Closed;
                        }
                        Ok(n) => {
                            self.buf.advance(n);
                            if self.buf.ends_with(REQUEST_SENTINEL) {
                                self.state = match request::parse(self.buf.as_slice()) {
                                    Ok(raw) => State::Parsed(raw),
                                    Err(err) => {
                                        warn!("{}: {}", self.peer_addr, err);
                                        self.error_state(StatusCode::BadRequest, false)
                                    }
                                };
                            }
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                            self.ready &= !mio::Ready::readable();
                            return Ok(());
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }

                State::Parsed(_) => {
                    if let State::Parsed(raw) = mem::replace(&mut self.state, State::Closed) {
                        self.state = self.validate_request(raw);
                    }
                }

                State::Validated(_) => {
                    if let State::Validated(req) = mem::replace(&mut self.state, State::Closed) {
                        self.state = self.resolve_request(req, root);
                    }
                }

                State::Resolved(..) => {
                    if let State::Resolved(req, path) = mem::replace(&mut self.state, State::Closed)
                    {
                        self.state = self.build_response(&req, &path);
                    }
                }

                State::Responding => {
                    match self.stream.write(&self.out_buf[self.out_pos..]) {
                        Ok(0) => {
                            self.state = State::Closed;
                        }
                        Ok(n) => {
                            self.out_pos += n;
                            if self.out_pos == self.out_buf.len() {
                                self.state = State::Closed;
                            }
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                            self.ready &= !mio::Ready::writable();
                            return Ok(());
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }

                State::Closed => return Ok(()),
            }
        }
    }

    fn validate_request(&mut self, raw: RawRequest) -> State {
        match request::validate(raw) {
            Ok(req) => State::Validated(req),
            Err(err) => {
                warn!("{}: {}", self.peer_addr, err);
                let status = match err {
                    ValidateError::UnsupportedVersion => StatusCode::HttpVersionNotSupported,
                    ValidateError::UnknownMethod => StatusCode::NotImplemented,
                };
                self.error_state(status, false)
            }
        }
    }

    fn resolve_request(&mut self, req: Request, root: &Path) -> State {
        match resolve::resolve(root, &req.path) {
            Ok(path) => State::Resolved(req, path),
            Err(err) => {
                warn!("{}: {} {}: {}", self.peer_addr, req.method, req.path, err);
                let status = match err {
                    ResolveError::NotFound => StatusCode::NotFound,
                    ResolveError::Outside => StatusCode::Forbidden,
                };
                self.error_state(status, req.method == Method::HEAD)
            }
        }
    }

    fn build_response(&mut self, req: &Request, path: &Path) -> State {
        match req.method {
            Method::GET | Method::HEAD => match fs::read(path) {
                Ok(body) => {
                    debug!(
                        "{}: {} {} -> 200 ({} bytes)",
                        self.peer_addr,
                        req.method,
                        req.path,
                        body.len()
                    );
                    self.out_buf = response::encode(
                        StatusCode::Ok,
                        response::content_type_for(path),
                        &body,
                        req.method == Method::HEAD,
                    );
                    self.out_pos = 0;
                    State::Responding
                }
                Err(err) => {
                    warn!("{}: reading {} failed: {}", self.peer_addr, path.display(), err);
                    let status = match err.kind() {
                        io::ErrorKind::NotFound => StatusCode::NotFound,
                        io::ErrorKind::PermissionDenied => StatusCode::Forbidden,
                        _ => StatusCode::InternalServerError,
                    };
                    self.error_state(status, req.method == Method::HEAD)
                }
            },
            Method::POST => {
                // no write-side semantics; answer with a well-formed 501
                debug!("{}: POST {} -> 501", self.peer_addr, req.path);
                self.error_state(StatusCode::NotImplemented, false)
            }
        }
    }

    fn error_state(&mut self, status: StatusCode, head_only: bool) -> State {
        let body = response::error_page(status);
        self.out_buf = response::encode(status, "text/html", &body, head_only);
        self.out_pos = 0;
        State::Responding
    }
}
