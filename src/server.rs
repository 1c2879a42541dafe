//! TCP server for iris classification sessions.
//!
//! Binds the listening socket, accepts connections, and runs one task per
//! session. The accept loop stops when the shared `Shutdown` fires; the
//! listener is dropped at that point and already-open sessions are left
//! to finish on their own.

use crate::config::Config;
use crate::protocol::{handle_connection, SessionOptions};
use crate::shutdown::Shutdown;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    options: SessionOptions,
    connection_limit: Arc<Semaphore>,
    shutdown: Shutdown,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Bind failures are returned to the caller; the server never starts.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::from_std(create_listener(addr)?)?;
        let local_addr = listener.local_addr()?;

        Ok(Server {
            listener,
            local_addr,
            options: config.session_options(),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            shutdown: Shutdown::new(),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops the accept loop when triggered
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown, then wait for open sessions to end
    pub async fn run(self) -> io::Result<()> {
        info!(address = %self.local_addr(), "Server listening");

        let Server {
            listener,
            local_addr,
            options,
            connection_limit,
            shutdown,
        } = self;

        let mut sessions = JoinSet::new();

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = shutdown.wait() => break,
                permit = connection_limit.clone().acquire_owned() => {
                    permit.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                }
            };

            let accepted = tokio::select! {
                _ = shutdown.wait() => break,
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    log_session_exit(finished);
                    continue;
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");

                    let shutdown = shutdown.clone();
                    let options = options.clone();

                    sessions.spawn(async move {
                        let result = handle_connection(stream, shutdown, options).await;
                        drop(permit);
                        (peer, result)
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }

        // Closing the listener refuses any further connections
        drop(listener);
        info!(address = %local_addr, "Server stopped accepting connections");

        if !sessions.is_empty() {
            info!(open = sessions.len(), "Waiting for open sessions to finish");
        }
        while let Some(finished) = sessions.join_next().await {
            log_session_exit(finished);
        }

        info!("Server has been shut down");
        Ok(())
    }
}

fn log_session_exit(
    finished: Result<(SocketAddr, io::Result<()>), tokio::task::JoinError>,
) {
    match finished {
        Ok((peer, Ok(()))) => debug!(peer = %peer, "Connection closed"),
        Ok((peer, Err(e))) => debug!(peer = %peer, error = %e, "Connection error"),
        Err(e) => warn!(error = %e, "Session task failed"),
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR set.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
