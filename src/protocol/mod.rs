//! Iris classification protocol.
//!
//! A line-oriented request/reply protocol. The server greets first, then
//! answers every command line with exactly one reply:
//!
//! ```text
//! Server:  Server is ready...\r\nWelcome to the Iris Server\r\n
//! Client:  input sepallength 5.1\n
//! Server:  OK\r\n
//! Client:  classify\n
//! Server:  Classification complete\r\n
//! Client:  return class\n
//! Server:  Classification: Iris setosa\r\n
//! ```
//!
//! Commands are case-insensitive. Lines end with `\n`; a preceding `\r`
//! is ignored. Failures are answered with a `400 ` status line and leave
//! the session open.

pub mod handler;
pub mod parser;

pub use handler::{handle_connection, SessionOptions};
pub use parser::{Command, Parser, Response, ReturnOption, SessionError};
