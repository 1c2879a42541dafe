//! Iris protocol connection handler.
//!
//! Frames the byte stream into lines, feeds them to a `Session`, and
//! writes back each reply. The handler owns the stream, so it is released
//! on every return path.

use super::parser::{find_line, ParseError, Response};
use crate::classifier::Classifier;
use crate::session::{Action, Session};
use crate::shutdown::Shutdown;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Read buffer size
const BUFFER_SIZE: usize = 4 * 1024;

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Longest accepted command line in bytes, excluding the terminator
    pub max_line_length: usize,
    /// Close the connection after this long without input
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_line_length: 1024,
            idle_timeout: None,
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<S>(
    mut stream: S,
    shutdown: Shutdown,
    options: SessionOptions,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(Classifier::iris());
    stream.write_all(session.greet()).await?;

    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    // Set while skipping the remainder of an overlong line
    let mut discarding = false;

    loop {
        while let Some((line_len, consumed)) = find_line(&buffer) {
            let line = buffer.split_to(consumed);
            if discarding {
                discarding = false;
                continue;
            }

            if line_len > options.max_line_length {
                debug!(len = line_len, "Command line too long");
                stream.write_all(&Response::error(ParseError::InvalidCommand)).await?;
                continue;
            }

            let text = String::from_utf8_lossy(&line[..line_len]);
            trace!(command = %text, "Processing command");

            let reply = session.handle_line(&text);
            stream.write_all(&reply.data).await?;

            match reply.action {
                Action::Continue => {}
                Action::Close => {
                    debug!("Client closed session");
                    return Ok(());
                }
                Action::Shutdown => {
                    if shutdown.trigger() {
                        debug!("Client requested server shutdown");
                    }
                    return Ok(());
                }
            }
        }

        // A trailing `\r` may still be waiting for its `\n`
        let pending = match buffer.last() {
            Some(b'\r') => buffer.len() - 1,
            _ => buffer.len(),
        };
        if pending > options.max_line_length {
            if !discarding {
                debug!(len = pending, "Command line too long");
                stream.write_all(&Response::error(ParseError::InvalidCommand)).await?;
                discarding = true;
            }
            buffer.clear();
        }

        let n = match options.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.read_buf(&mut buffer)).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!(timeout = ?limit, "Idle timeout");
                    session.close();
                    return Ok(());
                }
            },
            None => stream.read_buf(&mut buffer).await?,
        };

        if n == 0 {
            // Connection closed
            trace!("Connection closed by client");
            session.close();
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_scripted_session() {
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"input sepallength 5.1\r\n")
            .write(b"OK\r\n")
            .read(b"input sepalwidth 3.5\ninput petallength 1.4\n")
            .write(b"OK\r\n")
            .write(b"OK\r\n")
            .read(b"INPUT PETALWIDTH 0.2\r\nclassify\r\n")
            .write(b"OK\r\n")
            .write(b"Classification complete\r\n")
            .read(b"return class\r\n")
            .write(b"Classification: Iris setosa\r\n")
            .read(b"quit\r\n")
            .write(b"200 OK\r\nConnection closed.\r\n")
            .build();

        let shutdown = Shutdown::new();
        handle_connection(stream, shutdown.clone(), SessionOptions::default())
            .await
            .unwrap();
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_command_split_across_reads() {
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"cle")
            .read(b"ar")
            .read(b"\r\n")
            .write(Response::cleared())
            .build();

        handle_connection(stream, Shutdown::new(), SessionOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_eof_ends_session_without_reply() {
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"input petalwidth 0.2\n")
            .write(b"OK\r\n")
            .build();

        handle_connection(stream, Shutdown::new(), SessionOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_blank_line_is_invalid() {
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"\r\n")
            .write(b"400 Command not valid.\r\n")
            .read(b"close\r\n")
            .write(b"200 OK\r\n")
            .build();

        handle_connection(stream, Shutdown::new(), SessionOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_triggers_signal() {
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"shutdown\n")
            .write(b"200 OK\r\nServer is shutting down...\r\n")
            .build();

        let shutdown = Shutdown::new();
        handle_connection(stream, shutdown.clone(), SessionOptions::default())
            .await
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_overlong_line_is_rejected_and_skipped() {
        let options = SessionOptions {
            max_line_length: 16,
            idle_timeout: None,
        };
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"input sepallength 5.1 and then some")
            .write(b"400 Command not valid.\r\n")
            .read(b" more trailing garbage")
            .read(b" end\nclear\n")
            .write(Response::cleared())
            .build();

        handle_connection(stream, Shutdown::new(), options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_overlong_line_in_one_read_is_rejected() {
        let options = SessionOptions {
            max_line_length: 16,
            idle_timeout: None,
        };
        let mut line = b"input sepallength 5.1".to_vec();
        line.extend_from_slice(&[b' '; 40]);
        line.push(b'\n');

        let stream = Builder::new()
            .write(Response::welcome())
            .read(&line)
            .write(b"400 Command not valid.\r\n")
            .read(b"return inputs\n")
            .write(b"400 Error: No input values set.\r\n")
            .build();

        handle_connection(stream, Shutdown::new(), options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_line_at_limit_with_split_terminator() {
        let options = SessionOptions {
            max_line_length: 8,
            idle_timeout: None,
        };
        let stream = Builder::new()
            .write(Response::welcome())
            .read(b"classify\r")
            .read(b"\n")
            .write(b"400 Error: Insufficient input values for classification.\r\n")
            .read(b"classify\r\n")
            .write(b"400 Error: Insufficient input values for classification.\r\n")
            .build();

        handle_connection(stream, Shutdown::new(), options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connection_reset_is_an_error() {
        let stream = Builder::new()
            .write(Response::welcome())
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = handle_connection(stream, Shutdown::new(), SessionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_quietly() {
        let (client, server) = duplex(1024);
        let options = SessionOptions {
            max_line_length: 1024,
            idle_timeout: Some(Duration::from_millis(50)),
        };

        let handler = tokio::spawn(handle_connection(server, Shutdown::new(), options));

        let mut client = client;
        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut received))
            .await
            .expect("server should close the idle connection")
            .unwrap();

        assert_eq!(received, Response::welcome());
        handler.await.unwrap().unwrap();
    }
}
