//! The listening socket and its accept loop.

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{error, info, warn};

use crate::config::{DrainPolicy, ServerConfig};
use crate::connection::Connection;
use crate::dispatch::Handlers;
use crate::thread_pool::{ThreadPool, WorkerPool};
use crate::writer::ResponseWriter;

const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Ask the accept loop to return. Open connections are left to finish.
    pub fn shutdown(&self) {
        info!("shutting down server");
        self.0.store(true, Ordering::Relaxed);
    }
}

/// A bound listener plus everything its connections share.
pub struct Server<H: Handlers> {
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    handlers: H,
    drain: DrainPolicy,
    shutdown: Arc<AtomicBool>,
}

impl<H: Handlers> Server<H> {
    /// Bind `config.addr` and start the handler workers.
    pub fn bind(config: &ServerConfig, handlers: H) -> io::Result<Self> {
        let pool = WorkerPool::new(config.workers)?;
        let listener = TcpListener::bind(&config.addr)?;
        // non-blocking so the loop can notice a shutdown request
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            pool: Arc::new(pool),
            handlers,
            drain: config.drain,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle that makes [`run`](Self::run) return.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Accept connections until shut down. Each connection gets its own
    /// reader thread; handlers run on the shared worker pool.
    pub fn run(&self) -> io::Result<()> {
        info!(
            "listening on {} with {} handler workers",
            self.local_addr()?,
            self.pool.size()
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    return Err(e);
                }
            }
        }

        info!("server stopped accepting connections");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let handlers = self.handlers.clone();
        let pool = self.pool.clone();
        let drain = self.drain;
        let spawned = thread::Builder::new()
            .name(format!("linedb-conn-{peer}"))
            .spawn(move || {
                info!("client connected: {peer}");
                match handle_stream(stream, handlers, pool, drain) {
                    Ok(()) => info!("client disconnected: {peer}"),
                    Err(e) => warn!("connection {peer} failed: {e}"),
                }
            });
        if let Err(e) = spawned {
            error!("could not start a thread for {peer}: {e}");
        }
    }
}

fn handle_stream<H: Handlers>(
    stream: TcpStream,
    handlers: H,
    pool: Arc<WorkerPool>,
    drain: DrainPolicy,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    let writer = ResponseWriter::new(stream.try_clone()?);
    Connection::new(handlers, pool, writer, drain).serve(stream)
}
